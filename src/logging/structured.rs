// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structured logging backed by slog.

use slog::{Drain, FnValue, Logger, Never, Record, o};
use slog_async::Async;
use slog_json::Json;
use slog_term::{FullFormat, TermDecorator};
use std::io;

/// Structured logging format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable terminal output
    Terminal,
    /// JSON formatted output
    Json,
}

/// Structured logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LogFormat,
    pub level: slog::Level,
    pub include_location: bool,
    pub include_thread_id: bool,
    /// Key-value pairs attached to every record
    pub static_fields: Vec<(String, String)>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            level: slog::Level::Info,
            include_location: true,
            include_thread_id: true,
            static_fields: Vec::new(),
        }
    }
}

/// Create a structured logger with the given configuration
pub fn create_logger(config: &LoggerConfig) -> Logger {
    match config.format {
        LogFormat::Terminal => {
            let decorator = TermDecorator::new().build();
            finish(FullFormat::new(decorator).build().fuse(), config)
        }
        LogFormat::Json => finish(
            Json::new(io::stdout()).add_default_keys().build().fuse(),
            config,
        ),
    }
}

fn finish<D>(drain: D, config: &LoggerConfig) -> Logger
where
    D: Drain<Ok = (), Err = Never> + Send + 'static,
{
    let drain = drain.filter_level(config.level).fuse();
    let drain = Async::new(drain).build().fuse();

    let mut logger = Logger::root(drain, o!());

    if config.include_location {
        logger = logger.new(o!(
            "location" => FnValue(|record: &Record| format!("{}:{}", record.file(), record.line()))
        ));
    }
    if config.include_thread_id {
        logger = logger.new(o!(
            "thread" => FnValue(|_: &Record| format!("{:?}", std::thread::current().id()))
        ));
    }

    for (key, value) in &config.static_fields {
        // slog keys are 'static; the logger is built once per process
        let key: &'static str = Box::leak(key.clone().into_boxed_str());
        logger = logger.new(o!(key => value.clone()));
    }

    logger
}

/// Keeps the global logger installed for as long as it lives.
pub struct LoggerGuard {
    _guard: slog_scope::GlobalLoggerGuard,
}

impl std::fmt::Debug for LoggerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LoggerGuard")
    }
}

/// Initialize the global structured logger
pub fn init_global_logger(config: &LoggerConfig) -> LoggerGuard {
    let logger = create_logger(config);
    let guard = slog_scope::set_global_logger(logger);

    LoggerGuard { _guard: guard }
}
