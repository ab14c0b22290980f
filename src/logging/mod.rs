// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging utilities for Pax Web.
//!
//! Everything in the crate logs through the `log` facade. By default the
//! facade is backed by `env_logger`; with `structured = true` in the
//! `org.ops4j.pax.web.log` configuration it is bridged into a global `slog`
//! logger instead (terminal or JSON output).

pub mod config;
pub mod structured;
#[macro_use]
pub mod wrapper;

#[cfg(test)]
pub mod test_logger;

use log::{debug, error, info, trace, warn, LevelFilter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Once, OnceLock};

use config::LoggingConfig;
use structured::LoggerGuard;

static INIT: Once = Once::new();
static USING_STRUCTURED: AtomicBool = AtomicBool::new(false);
static GUARD: OnceLock<LoggerGuard> = OnceLock::new();

fn level_name(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Trace => "trace",
        LevelFilter::Debug => "debug",
        LevelFilter::Info => "info",
        LevelFilter::Warn => "warn",
        LevelFilter::Error => "error",
        LevelFilter::Off => "off",
    }
}

/// Initialize logging with the specified level.
///
/// This function ensures logging is only initialized once.
pub fn init(level: Option<LevelFilter>) {
    INIT.call_once(|| init_env_logger(level));
}

/// Initialize logging from the `org.ops4j.pax.web.log` configuration.
///
/// Only the first call of either `init` function has an effect.
pub fn init_with_config(level: LevelFilter, config: &LoggingConfig) {
    INIT.call_once(|| {
        if !config.structured {
            init_env_logger(Some(level));
            return;
        }

        let logger_config = config.to_logger_config();
        let guard = structured::init_global_logger(&logger_config);
        let _ = GUARD.set(guard);

        match slog_stdlog::init() {
            Ok(()) => {
                log::set_max_level(level);
                USING_STRUCTURED.store(true, Ordering::SeqCst);
                info!("Structured logging initialized at level: {}", level);
            }
            Err(e) => eprintln!("failed to bridge log into slog: {e}"),
        }
    });
}

fn init_env_logger(level: Option<LevelFilter>) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level.map_or("info", level_name));

    let result = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_target(true)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", log::max_level());
    }
}

/// Whether the `log` facade is bridged into slog.
pub fn is_structured_logging() -> bool {
    USING_STRUCTURED.load(Ordering::SeqCst)
}

/// Log an error with context and return the error.
///
/// This is useful for logging errors in a chain of Results.
pub fn log_error<E: std::fmt::Display>(context: &str, err: E) -> E {
    error!("{}: {}", context, err);
    err
}

/// Log a warning with context.
pub fn log_warning<E: std::fmt::Display>(context: &str, err: E) {
    warn!("{}: {}", context, err);
}

/// Log a debug message with context.
pub fn log_debug<M: std::fmt::Display>(context: &str, msg: M) {
    debug!("{}: {}", context, msg);
}

/// Log a trace message with context.
pub fn log_trace<M: std::fmt::Display>(context: &str, msg: M) {
    trace!("{}: {}", context, msg);
}

/// Log an info message with context.
pub fn log_info<M: std::fmt::Display>(context: &str, msg: M) {
    info!("{}: {}", context, msg);
}
