// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The seam between the controller and a servlet engine.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{SslConfiguration, WebConfiguration};
use crate::core::WebError;
use crate::model::{
    ContextModel, ErrorPageModel, EventListenerModel, FilterModel, ServletModel, WelcomeFileModel,
};

/// A listening endpoint the backend should open on start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorConfig {
    Http {
        address: String,
        port: u16,
    },
    Secure {
        address: String,
        port: u16,
        ssl: SslConfiguration,
    },
}

impl ConnectorConfig {
    pub fn address(&self) -> &str {
        match self {
            ConnectorConfig::Http { address, .. } | ConnectorConfig::Secure { address, .. } => address,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ConnectorConfig::Http { port, .. } | ConnectorConfig::Secure { port, .. } => *port,
        }
    }
}

impl fmt::Display for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorConfig::Http { address, port } => write!(f, "http://{address}:{port}"),
            ConnectorConfig::Secure { address, port, .. } => write!(f, "https://{address}:{port}"),
        }
    }
}

/// A running (or about to run) servlet engine.
///
/// Every `add_*` call may be repeated with a model the backend already holds;
/// the backend then replaces its entry for that model id.
pub trait ServerBackend: Send + fmt::Debug {
    fn add_connector(&mut self, connector: ConnectorConfig) -> Result<(), WebError>;

    /// Server-wide servlet context attributes and the default session timeout in minutes.
    fn configure_context(
        &mut self,
        attributes: BTreeMap<String, Value>,
        session_timeout: Option<u32>,
    ) -> Result<(), WebError>;

    fn start(&mut self) -> Result<(), WebError>;

    fn stop(&mut self) -> Result<(), WebError>;

    fn add_servlet(&mut self, model: &Arc<ServletModel>) -> Result<(), WebError>;

    fn remove_servlet(&mut self, model: &ServletModel) -> Result<(), WebError>;

    fn add_filter(&mut self, model: &Arc<FilterModel>) -> Result<(), WebError>;

    fn remove_filter(&mut self, model: &FilterModel) -> Result<(), WebError>;

    fn add_event_listener(&mut self, model: &Arc<EventListenerModel>) -> Result<(), WebError>;

    fn remove_event_listener(&mut self, model: &EventListenerModel) -> Result<(), WebError>;

    fn add_error_page(&mut self, model: &Arc<ErrorPageModel>) -> Result<(), WebError>;

    fn remove_error_page(&mut self, model: &ErrorPageModel) -> Result<(), WebError>;

    fn add_welcome_files(&mut self, model: &Arc<WelcomeFileModel>) -> Result<(), WebError>;

    fn remove_welcome_files(&mut self, model: &WelcomeFileModel) -> Result<(), WebError>;

    /// Drop whatever the backend still holds for `context`.
    fn remove_context(&mut self, context: &ContextModel) -> Result<(), WebError>;

    /// Addresses actually bound, once started.
    fn local_addresses(&self) -> Vec<SocketAddr> {
        Vec::new()
    }
}

/// Creates a fresh backend for every start of the controller.
pub trait BackendFactory: Send + Sync + fmt::Debug {
    fn create_server(
        &self,
        configuration: &WebConfiguration,
    ) -> Result<Box<dyn ServerBackend>, WebError>;
}
