// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server lifecycle.
//!
//! [`ServerController`] moves between `Unconfigured`, `Stopped` and `Started`
//! and owns the backend while it runs. Web elements handed to it while the
//! server is not started are reported as [`RegistrationStatus::Pending`]; the
//! HttpService instances replay them when they see [`ServerEvent::Started`].


mod backend;

pub use backend::{BackendFactory, ConnectorConfig, ServerBackend};

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::{WebConfiguration, keys};
use crate::core::{RegistrationStatus, WebError};
use crate::model::{
    ContextModel, ErrorPageModel, EventListenerModel, FilterModel, ServletModel, WelcomeFileModel,
};

/// Broadcast to every [`ServerListener`] after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    Configured,
    Started,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unconfigured,
    Stopped,
    Started,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Unconfigured => "unconfigured",
            ServerState::Stopped => "stopped",
            ServerState::Started => "started",
        };
        f.write_str(name)
    }
}

pub trait ServerListener: Send + Sync {
    fn state_changed(&self, event: ServerEvent);
}

impl<F> ServerListener for F
where
    F: Fn(ServerEvent) + Send + Sync,
{
    fn state_changed(&self, event: ServerEvent) {
        self(event)
    }
}

#[derive(Debug)]
enum Lifecycle {
    Unconfigured,
    Stopped,
    Started(Box<dyn ServerBackend>),
}

#[derive(Debug)]
struct ControllerInner {
    configuration: Option<WebConfiguration>,
    state: Lifecycle,
}

/// Owns the backend and drives it through its lifecycle.
pub struct ServerController {
    factory: Arc<dyn BackendFactory>,
    // serialises transitions; held while listeners run
    lifecycle: Mutex<()>,
    inner: Mutex<ControllerInner>,
    listeners: Mutex<Vec<(u64, Arc<dyn ServerListener>)>>,
    next_listener: AtomicU64,
}

impl fmt::Debug for ServerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerController")
            .field("factory", &self.factory)
            .field("state", &self.state())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl ServerController {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            lifecycle: Mutex::new(()),
            inner: Mutex::new(ControllerInner {
                configuration: None,
                state: Lifecycle::Unconfigured,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> ServerState {
        match self.inner.lock().state {
            Lifecycle::Unconfigured => ServerState::Unconfigured,
            Lifecycle::Stopped => ServerState::Stopped,
            Lifecycle::Started(_) => ServerState::Started,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state() == ServerState::Started
    }

    pub fn configuration(&self) -> Option<WebConfiguration> {
        self.inner.lock().configuration.clone()
    }

    /// Addresses the running backend is bound to; empty when not started.
    pub fn local_addresses(&self) -> Vec<SocketAddr> {
        match &self.inner.lock().state {
            Lifecycle::Started(backend) => backend.local_addresses(),
            _ => Vec::new(),
        }
    }

    /// Store a configuration. A running server is restarted with it.
    pub fn configure(&self, configuration: WebConfiguration) -> Result<(), WebError> {
        configuration
            .validate()
            .map_err(|e| WebError::IllegalArgument(e.to_string()))?;

        let _lifecycle = self.lifecycle.lock();
        let restart = {
            let mut inner = self.inner.lock();
            inner.configuration = Some(configuration);
            match inner.state {
                Lifecycle::Unconfigured => {
                    inner.state = Lifecycle::Stopped;
                    false
                }
                Lifecycle::Stopped => false,
                Lifecycle::Started(_) => true,
            }
        };
        debug!("Server configured");
        self.notify(ServerEvent::Configured);

        if restart {
            info!("Restarting server with the new configuration");
            if self.stop_locked()? {
                self.notify(ServerEvent::Stopped);
            }
            self.start_locked()?;
            self.notify(ServerEvent::Started);
        }
        Ok(())
    }

    pub fn start(&self) -> Result<(), WebError> {
        let _lifecycle = self.lifecycle.lock();
        self.start_locked()?;
        self.notify(ServerEvent::Started);
        Ok(())
    }

    /// Stop a started server. Stopping in any other state does nothing.
    pub fn stop(&self) -> Result<(), WebError> {
        let _lifecycle = self.lifecycle.lock();
        if self.stop_locked()? {
            self.notify(ServerEvent::Stopped);
        }
        Ok(())
    }

    fn start_locked(&self) -> Result<(), WebError> {
        let mut inner = self.inner.lock();
        let configuration = match (&inner.state, &inner.configuration) {
            (Lifecycle::Started(_), _) => {
                return Err(WebError::illegal_state(
                    "server is already started. must be stopped first.",
                ));
            }
            (Lifecycle::Unconfigured, _) | (_, None) => {
                return Err(WebError::illegal_state("server is not yet configured."));
            }
            (Lifecycle::Stopped, Some(configuration)) => configuration.clone(),
        };

        let mut backend = self.factory.create_server(&configuration)?;
        for connector in connectors(&configuration) {
            debug!("Adding connector {}", connector);
            backend.add_connector(connector)?;
        }

        let mut attributes = BTreeMap::new();
        attributes.insert(
            keys::TEMP_DIR.to_string(),
            Value::String(configuration.temporary_directory.display().to_string()),
        );
        backend.configure_context(attributes, configuration.session_timeout)?;

        if let Err(e) = backend.start() {
            error!("Backend failed to start: {}", e);
            return Err(e);
        }
        inner.state = Lifecycle::Started(backend);
        info!("Server started");
        Ok(())
    }

    fn stop_locked(&self) -> Result<bool, WebError> {
        let mut inner = self.inner.lock();
        match std::mem::replace(&mut inner.state, Lifecycle::Stopped) {
            Lifecycle::Started(mut backend) => {
                if let Err(e) = backend.stop() {
                    error!("Backend failed to stop cleanly: {}", e);
                    return Err(e);
                }
                info!("Server stopped");
                Ok(true)
            }
            previous => {
                inner.state = previous;
                Ok(false)
            }
        }
    }

    /// Subscribe to lifecycle events; returns a handle for [`Self::remove_listener`].
    pub fn add_listener(&self, listener: Arc<dyn ServerListener>) -> u64 {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn notify(&self, event: ServerEvent) {
        let listeners: Vec<Arc<dyn ServerListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        debug!("Notifying {} listener(s) of {:?}", listeners.len(), event);
        for listener in listeners {
            listener.state_changed(event);
        }
    }

    fn apply<F>(&self, f: F) -> Result<RegistrationStatus, WebError>
    where
        F: FnOnce(&mut dyn ServerBackend) -> Result<(), WebError>,
    {
        let mut inner = self.inner.lock();
        match &mut inner.state {
            Lifecycle::Started(backend) => {
                f(backend.as_mut())?;
                Ok(RegistrationStatus::Live)
            }
            _ => Ok(RegistrationStatus::Pending),
        }
    }

    pub fn add_servlet(&self, model: &Arc<ServletModel>) -> Result<RegistrationStatus, WebError> {
        self.apply(|backend| backend.add_servlet(model))
    }

    pub fn remove_servlet(&self, model: &ServletModel) -> Result<(), WebError> {
        self.apply(|backend| backend.remove_servlet(model)).map(|_| ())
    }

    pub fn add_filter(&self, model: &Arc<FilterModel>) -> Result<RegistrationStatus, WebError> {
        self.apply(|backend| backend.add_filter(model))
    }

    pub fn remove_filter(&self, model: &FilterModel) -> Result<(), WebError> {
        self.apply(|backend| backend.remove_filter(model)).map(|_| ())
    }

    pub fn add_event_listener(
        &self,
        model: &Arc<EventListenerModel>,
    ) -> Result<RegistrationStatus, WebError> {
        self.apply(|backend| backend.add_event_listener(model))
    }

    pub fn remove_event_listener(&self, model: &EventListenerModel) -> Result<(), WebError> {
        self.apply(|backend| backend.remove_event_listener(model)).map(|_| ())
    }

    pub fn add_error_page(&self, model: &Arc<ErrorPageModel>) -> Result<RegistrationStatus, WebError> {
        self.apply(|backend| backend.add_error_page(model))
    }

    pub fn remove_error_page(&self, model: &ErrorPageModel) -> Result<(), WebError> {
        self.apply(|backend| backend.remove_error_page(model)).map(|_| ())
    }

    pub fn add_welcome_files(
        &self,
        model: &Arc<WelcomeFileModel>,
    ) -> Result<RegistrationStatus, WebError> {
        self.apply(|backend| backend.add_welcome_files(model))
    }

    pub fn remove_welcome_files(&self, model: &WelcomeFileModel) -> Result<(), WebError> {
        self.apply(|backend| backend.remove_welcome_files(model)).map(|_| ())
    }

    pub fn remove_context(&self, context: &ContextModel) -> Result<(), WebError> {
        self.apply(|backend| backend.remove_context(context)).map(|_| ())
    }
}

fn connectors(configuration: &WebConfiguration) -> Vec<ConnectorConfig> {
    let mut connectors = Vec::new();
    for address in &configuration.listening_addresses {
        if configuration.http_enabled {
            connectors.push(ConnectorConfig::Http {
                address: address.clone(),
                port: configuration.http_port,
            });
        }
        if configuration.http_secure_enabled {
            if configuration.ssl.has_passwords() {
                connectors.push(ConnectorConfig::Secure {
                    address: address.clone(),
                    port: configuration.http_secure_port,
                    ssl: configuration.ssl.clone(),
                });
            } else {
                warn!(
                    "SSL password and SSL keystore password must be set in order to enable SSL; \
                     no secure connector on {}",
                    address
                );
            }
        }
    }
    connectors
}
