// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry-point – "turn the key and go".
//!
//! The [`PaxWebLoader`] consumes configuration, initializes logging, wires
//! the [`ServerController`] to a backend and returns a [`PaxWeb`] holding the
//! HttpService factory plus the WAR and whiteboard extenders.


use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use log::LevelFilter;
use thiserror::Error;

use crate::config::{
    Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider,
    PropertiesConfigProvider, WebConfiguration, keys,
};
use crate::controller::{BackendFactory, ServerController, ServerState};
use crate::core::{Bundle, WebError};
use crate::logging::config::LoggingConfig;
use crate::logging::init_with_config;
use crate::server::EmbeddedBackendFactory;
use crate::service::{HttpServiceFactory, HttpServiceProxy, JspServletFactory};
use crate::war::WebAppDeployer;
use crate::whiteboard::WhiteboardExtender;
use crate::{init_logging, log_error, log_info};

/// Errors that can occur during Pax Web initialization.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Container error
    #[error("web container error: {0}")]
    WebError(#[from] WebError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Builder for initializing and configuring Pax Web.
#[derive(Default)]
pub struct PaxWebLoader {
    config: Option<Config>,
    config_file_path: Option<String>,
    use_env_vars: bool,
    env_prefix: Option<String>,
    providers: Vec<Arc<dyn ConfigProvider>>,
    backend: Option<Arc<dyn BackendFactory>>,
    jsp_support: Option<JspServletFactory>,
}

impl std::fmt::Debug for PaxWebLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaxWebLoader")
            .field("config_file_path", &self.config_file_path)
            .field("use_env_vars", &self.use_env_vars)
            .field("env_prefix", &self.env_prefix)
            .field("providers", &self.providers.len())
            .field("custom_backend", &self.backend.is_some())
            .field("jsp_support", &self.jsp_support.is_some())
            .finish()
    }
}

impl PaxWebLoader {
    /// Create a new loader with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a ready-made configuration; file, env and provider settings are ignored.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load a configuration file: `.cfg`/`.properties`, TOML, JSON or YAML.
    pub fn with_config_file(mut self, file_path: &str) -> Self {
        self.config_file_path = Some(file_path.to_string());
        self
    }

    /// Enable environment variable configuration.
    pub fn with_env_vars(mut self) -> Self {
        self.use_env_vars = true;
        self
    }

    /// Set a custom prefix for environment variables (default is "PAXWEB_").
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.use_env_vars = true;
        self
    }

    /// Add a custom configuration provider; it overrides file and env values.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Run on another servlet engine instead of the embedded one.
    pub fn with_backend(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.backend = Some(factory);
        self
    }

    /// Enable `register_jsps` with the given JSP servlet factory.
    pub fn with_jsp_support(mut self, factory: JspServletFactory) -> Self {
        self.jsp_support = Some(factory);
        self
    }

    fn build_config(&mut self) -> Result<Config, LoaderError> {
        if let Some(config) = self.config.take() {
            return Ok(config);
        }
        let mut builder = Config::builder();

        if let Some(file_path) = &self.config_file_path {
            builder = if PropertiesConfigProvider::handles(file_path) {
                builder.with_provider(PropertiesConfigProvider::new(file_path)?)
            } else {
                builder.with_provider(FileConfigProvider::new(file_path)?)
            };
        }

        if self.use_env_vars {
            let env_provider = match &self.env_prefix {
                Some(prefix) => EnvConfigProvider::new(prefix),
                None => EnvConfigProvider::default(),
            };
            builder = builder.with_provider(env_provider);
        }

        for provider in self.providers.drain(..) {
            builder = builder.with_shared_provider(provider);
        }
        Ok(builder.build())
    }

    /// Build and configure Pax Web. The server is not started yet.
    pub fn build(mut self) -> Result<PaxWeb, LoaderError> {
        let config = Arc::new(self.build_config()?);

        // Then initialize the logger
        let log_level = match env::var("RUST_LOG_LEVEL").ok().as_deref() {
            Some("trace") => LevelFilter::Trace,
            Some("debug") => LevelFilter::Debug,
            Some("info") => LevelFilter::Info,
            Some("warn") => LevelFilter::Warn,
            Some("error") => LevelFilter::Error,
            _ => LevelFilter::Info,
        };

        match config.get::<LoggingConfig>(keys::LOG) {
            Ok(Some(logging_config)) => init_with_config(log_level, &logging_config),
            Ok(None) => {
                log_info("Startup", "Logging configuration not found. Initializing with default settings.");
                init_logging(Some(log_level));
            }
            Err(e) => {
                log_error("Startup", format!("Failed to read logging configuration: {e}"));
                init_logging(Some(log_level));
            }
        }

        log::info!("Pax Web starting up");

        let web_configuration = WebConfiguration::from_config(&config)?;
        let backend: Arc<dyn BackendFactory> = match self.backend.take() {
            Some(backend) => backend,
            None => Arc::new(EmbeddedBackendFactory::new()),
        };
        let controller = Arc::new(ServerController::new(backend));
        controller.configure(web_configuration)?;

        let mut services = HttpServiceFactory::new(controller.clone());
        if let Some(jsp_support) = self.jsp_support.take() {
            services = services.with_jsp_support(jsp_support);
        }
        let services = Arc::new(services);

        Ok(PaxWeb {
            config,
            controller,
            deployer: Arc::new(WebAppDeployer::new(services.clone())),
            whiteboard: Arc::new(WhiteboardExtender::new(services.clone())),
            services,
        })
    }
}

/// A configured container: the controller plus everything registering into it.
#[derive(Debug, Clone)]
pub struct PaxWeb {
    config: Arc<Config>,
    controller: Arc<ServerController>,
    services: Arc<HttpServiceFactory>,
    deployer: Arc<WebAppDeployer>,
    whiteboard: Arc<WhiteboardExtender>,
}

impl PaxWeb {
    /// Create a new loader for initializing Pax Web.
    pub fn loader() -> PaxWebLoader {
        PaxWebLoader::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &Arc<ServerController> {
        &self.controller
    }

    pub fn services(&self) -> &Arc<HttpServiceFactory> {
        &self.services
    }

    pub fn deployer(&self) -> &Arc<WebAppDeployer> {
        &self.deployer
    }

    pub fn whiteboard(&self) -> &Arc<WhiteboardExtender> {
        &self.whiteboard
    }

    /// The HttpService of `bundle`; repeated calls return the same proxy.
    pub fn http_service(&self, bundle: Arc<Bundle>) -> Arc<HttpServiceProxy> {
        self.services.get_service(&bundle)
    }

    /// Start the server; pending registrations are applied.
    pub fn start(&self) -> Result<(), LoaderError> {
        self.controller.start().map_err(LoaderError::WebError)
    }

    /// Stop the server; registrations are kept for the next start.
    pub fn stop(&self) -> Result<(), LoaderError> {
        self.controller.stop().map_err(LoaderError::WebError)
    }

    /// Release every HttpService, then stop the server.
    pub fn shutdown(&self) -> Result<(), LoaderError> {
        self.services.unget_all();
        if self.controller.state() == ServerState::Started {
            self.stop()?;
        }
        log::info!("Pax Web shut down");
        Ok(())
    }

    pub fn local_addresses(&self) -> Vec<SocketAddr> {
        self.controller.local_addresses()
    }
}
