// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal CLI wrapper so the library can run as a stand-alone container.
//!
//!  Build it with `cargo build --release --bin pax-web`
//!  The binary honours PAXWEB_CONFIG_FILE or falls back to
//!  /etc/pax-web/org.ops4j.pax.web.cfg. Every argument is a directory that is
//!  deployed as a web application at `/<directory name>`.

use std::env;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use paxweb::war::CONTEXT_PATH_HEADER;
use paxweb::{Bundle, ClassSpace, PaxWeb, error_fmt, info_fmt, warn_fmt};

const DEFAULT_CONFIG_FILE: &str = "/etc/pax-web/org.ops4j.pax.web.cfg";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("Starting Pax Web");

    // Base loader always pulls env vars; file path is optional.
    let mut loader = PaxWeb::loader().with_env_vars();
    match env::var("PAXWEB_CONFIG_FILE").ok() {
        Some(path) => {
            println!("Using configuration from {path}");
            loader = loader.with_config_file(&path);
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            println!("Using configuration from {DEFAULT_CONFIG_FILE}");
            loader = loader.with_config_file(DEFAULT_CONFIG_FILE);
        }
        None => println!("No configuration file found, using defaults"),
    }

    let pax = match loader.build() {
        Ok(pax) => pax,
        Err(e) => {
            println!("Failed to build Pax Web: {e}");
            return Err(e.into());
        }
    };

    let mut bundles = Vec::new();
    for (index, dir) in env::args().skip(1).enumerate() {
        let root = Path::new(&dir);
        let Some(name) = root.file_name().and_then(|n| n.to_str()) else {
            warn_fmt!("Deploy", "Skipping {}: not a directory name", dir);
            continue;
        };
        let bundle = Arc::new(
            Bundle::new(index as u64 + 1, name, root).with_header(CONTEXT_PATH_HEADER, &format!("/{name}")),
        );
        match pax.deployer().deploy(&bundle, &ClassSpace::new()) {
            Ok(context_path) => {
                info_fmt!("Deploy", "{} deployed at {}", dir, context_path);
                bundles.push(bundle);
            }
            Err(e) => error_fmt!("Deploy", "Failed to deploy {}: {}", dir, e),
        }
    }

    if let Err(e) = pax.start() {
        error_fmt!("PaxWeb", "Server failed to start: {}", e);
        return Err(e.into());
    }

    shutdown_signal().await;
    info_fmt!("PaxWeb", "Shutdown signal received");

    for bundle in &bundles {
        if let Err(e) = pax.deployer().undeploy(bundle) {
            warn_fmt!("Deploy", "Failed to undeploy {}: {}", bundle, e);
        }
    }
    pax.shutdown()?;
    info_fmt!("PaxWeb", "Server stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error_fmt!("PaxWeb", "Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error_fmt!("PaxWeb", "Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
