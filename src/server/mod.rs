// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Embedded servlet engine.
//!
//! The backend is a *thin* wrapper around **hyper-util**. It owns the
//! listening sockets on a dedicated runtime thread and translates hyper
//! requests into fully buffered [`WebRequest`]s for the [`Dispatcher`].
//!
//! **Protocol support**
//! Uses `hyper_util::server::conn::auto::Builder`, so the same connection
//! transparently handles both HTTP/1.1 *and* HTTP/2. TLS is not provided;
//! secure connectors are skipped with a warning.

#[cfg(test)]
mod tests;
mod dispatch;

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, mpsc};
use std::thread;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use log::{debug, error, info, trace, warn};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::WebConfiguration;
use crate::controller::{BackendFactory, ConnectorConfig, ServerBackend};
use crate::core::{WebError, WebRequest};
use crate::model::{
    ContextModel, ErrorPageModel, EventListenerModel, FilterModel, ServletModel, WelcomeFileModel,
};

pub(crate) use dispatch::Dispatcher;

const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Creates [`EmbeddedBackend`]s; the default backend of the loader.
#[derive(Debug, Default, Clone)]
pub struct EmbeddedBackendFactory;

impl EmbeddedBackendFactory {
    pub fn new() -> Self {
        Self
    }
}

impl BackendFactory for EmbeddedBackendFactory {
    fn create_server(
        &self,
        configuration: &WebConfiguration,
    ) -> Result<Box<dyn ServerBackend>, WebError> {
        Ok(Box::new(EmbeddedBackend::new(configuration)))
    }
}

#[derive(Debug)]
struct Running {
    shutdown: watch::Sender<bool>,
    thread: thread::JoinHandle<()>,
}

/// A hyper based servlet engine.
#[derive(Debug)]
pub struct EmbeddedBackend {
    connectors: Vec<ConnectorConfig>,
    dispatcher: Arc<Dispatcher>,
    running: Option<Running>,
    bound: Vec<SocketAddr>,
}

impl EmbeddedBackend {
    pub fn new(configuration: &WebConfiguration) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(&configuration.session_cookie));
        Self {
            connectors: Vec::new(),
            dispatcher,
            running: None,
            bound: Vec::new(),
        }
    }

    /// Context paths that currently have something deployed.
    pub fn context_paths(&self) -> Vec<String> {
        self.dispatcher.context_paths()
    }

    fn socket_addresses(&self) -> Result<Vec<SocketAddr>, WebError> {
        let mut addresses = Vec::new();
        for connector in &self.connectors {
            if let ConnectorConfig::Secure { .. } = connector {
                warn!("Skipping connector {}: the embedded backend does not provide TLS", connector);
                continue;
            }
            let resolved = (connector.address(), connector.port())
                .to_socket_addrs()
                .map_err(|e| WebError::Backend(format!("cannot resolve {connector}: {e}")))?;
            addresses.extend(resolved.take(1));
        }
        if addresses.is_empty() {
            return Err(WebError::Backend("no usable connector configured".to_string()));
        }
        Ok(addresses)
    }
}

impl ServerBackend for EmbeddedBackend {
    fn add_connector(&mut self, connector: ConnectorConfig) -> Result<(), WebError> {
        debug!("Adding connector {}", connector);
        self.connectors.push(connector);
        Ok(())
    }

    fn configure_context(
        &mut self,
        attributes: BTreeMap<String, Value>,
        session_timeout: Option<u32>,
    ) -> Result<(), WebError> {
        self.dispatcher.configure(attributes, session_timeout);
        Ok(())
    }

    fn start(&mut self) -> Result<(), WebError> {
        if self.running.is_some() {
            return Err(WebError::illegal_state("embedded backend is already running"));
        }
        let addresses = self.socket_addresses()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = mpsc::channel();
        let dispatcher = self.dispatcher.clone();

        let thread = thread::Builder::new()
            .name("pax-web-server".to_string())
            .spawn(move || run_server(addresses, dispatcher, shutdown_rx, ready_tx))
            .map_err(|e| WebError::Backend(format!("cannot spawn server thread: {e}")))?;

        let bound = ready_rx
            .recv()
            .map_err(|_| WebError::Backend("server thread exited before binding".to_string()))
            .and_then(|result| result);
        match bound {
            Ok(bound) => {
                for addr in &bound {
                    info!("Pax Web listening on http://{}", addr);
                }
                self.bound = bound;
                self.running = Some(Running { shutdown, thread });
                Ok(())
            }
            Err(e) => {
                if thread.join().is_err() {
                    error!("Server thread panicked during start");
                }
                Err(e)
            }
        }
    }

    fn stop(&mut self) -> Result<(), WebError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        info!("Stopping embedded server on {:?}", self.bound);
        // receivers already gone means the loop has exited on its own
        let _ = running.shutdown.send(true);
        let joined = running.thread.join();
        self.bound.clear();
        self.dispatcher.shutdown();
        joined.map_err(|_| WebError::Backend("server thread panicked".to_string()))
    }

    fn add_servlet(&mut self, model: &Arc<ServletModel>) -> Result<(), WebError> {
        self.dispatcher.add_servlet(model)
    }

    fn remove_servlet(&mut self, model: &ServletModel) -> Result<(), WebError> {
        self.dispatcher.remove_servlet(model);
        Ok(())
    }

    fn add_filter(&mut self, model: &Arc<FilterModel>) -> Result<(), WebError> {
        self.dispatcher.add_filter(model)
    }

    fn remove_filter(&mut self, model: &FilterModel) -> Result<(), WebError> {
        self.dispatcher.remove_filter(model);
        Ok(())
    }

    fn add_event_listener(&mut self, model: &Arc<EventListenerModel>) -> Result<(), WebError> {
        self.dispatcher.add_event_listener(model);
        Ok(())
    }

    fn remove_event_listener(&mut self, model: &EventListenerModel) -> Result<(), WebError> {
        self.dispatcher.remove_event_listener(model);
        Ok(())
    }

    fn add_error_page(&mut self, model: &Arc<ErrorPageModel>) -> Result<(), WebError> {
        self.dispatcher.add_error_page(model);
        Ok(())
    }

    fn remove_error_page(&mut self, model: &ErrorPageModel) -> Result<(), WebError> {
        self.dispatcher.remove_error_page(model);
        Ok(())
    }

    fn add_welcome_files(&mut self, model: &Arc<WelcomeFileModel>) -> Result<(), WebError> {
        self.dispatcher.add_welcome_files(model);
        Ok(())
    }

    fn remove_welcome_files(&mut self, model: &WelcomeFileModel) -> Result<(), WebError> {
        self.dispatcher.remove_welcome_files(model);
        Ok(())
    }

    fn remove_context(&mut self, context: &ContextModel) -> Result<(), WebError> {
        self.dispatcher.remove_context(context);
        Ok(())
    }

    fn local_addresses(&self) -> Vec<SocketAddr> {
        self.bound.clone()
    }
}

impl Drop for EmbeddedBackend {
    fn drop(&mut self) {
        if self.running.is_some() {
            if let Err(e) = self.stop() {
                error!("Failed to stop embedded server: {}", e);
            }
        }
    }
}

/// Body of the server thread: bind, report, serve until shutdown.
fn run_server(
    addresses: Vec<SocketAddr>,
    dispatcher: Arc<Dispatcher>,
    shutdown: watch::Receiver<bool>,
    ready: mpsc::Sender<Result<Vec<SocketAddr>, WebError>>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pax-web-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(WebError::Backend(format!("cannot build runtime: {e}"))));
            return;
        }
    };

    runtime.block_on(async move {
        let mut listeners = Vec::with_capacity(addresses.len());
        let mut bound = Vec::with_capacity(addresses.len());
        for addr in addresses {
            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    bound.push(listener.local_addr().unwrap_or(addr));
                    listeners.push(listener);
                }
                Err(e) => {
                    let _ = ready.send(Err(WebError::Backend(format!("failed to bind {addr}: {e}"))));
                    return;
                }
            }
        }
        if ready.send(Ok(bound)).is_err() {
            return;
        }

        let mut servers = JoinSet::new();
        for listener in listeners {
            servers.spawn(serve(listener, dispatcher.clone(), shutdown.clone()));
        }
        while let Some(result) = servers.join_next().await {
            if let Err(e) = result {
                error!("Listener task failed: {}", e);
            }
        }
    });
    debug!("Server thread finished");
}

/// Accept loop of one listener with graceful connection shutdown.
async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>, mut shutdown: watch::Receiver<bool>) {
    let mut join_set = JoinSet::new();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accept = listener.accept() => {
                match accept {
                    Ok((stream, remote_addr)) => {
                        let dispatcher = dispatcher.clone();
                        let mut conn_shutdown = shutdown.clone();

                        join_set.spawn(async move {
                            let service = service_fn(move |req: Request<Incoming>| {
                                trace!("Incoming over {:?}", req.version());
                                handle_request(req, dispatcher.clone(), remote_addr)
                            });
                            let io = TokioIo::new(stream);

                            let builder = {
                                let mut b = AutoBuilder::new(TokioExecutor::new());
                                b.http1();
                                b.http2();
                                b
                            };

                            let connection = builder.serve_connection(io, service);
                            let mut conn = std::pin::pin!(connection);

                            tokio::select! {
                                res = &mut conn => log_connection_end(res),
                                _ = conn_shutdown.changed() => {
                                    debug!("Connection received shutdown signal, waiting for graceful close");
                                    conn.as_mut().graceful_shutdown();
                                    log_connection_end(conn.await);
                                }
                            }
                        });
                    }
                    Err(e) => error!("Accept error: {}", e),
                }
            }
        }
    }

    info!("Shutting down; waiting for {} connection(s)", join_set.len());
    let shutdown_timeout = tokio::time::Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    let start_time = tokio::time::Instant::now();

    let drain = async {
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(()) => trace!("Connection task completed"),
                Err(e) if e.is_cancelled() => debug!("Connection task cancelled"),
                Err(e) => error!("Connection task failed: {}", e),
            }
        }
    };

    match tokio::time::timeout(shutdown_timeout, drain).await {
        Ok(()) => info!(
            "All connections drained gracefully in {:.1}s",
            start_time.elapsed().as_secs_f32()
        ),
        Err(_) => {
            warn!(
                "Shutdown timed out after {} seconds, some connections may be forcefully closed",
                shutdown_timeout.as_secs()
            );
            join_set.shutdown().await;
        }
    }
}

fn log_connection_end<E: std::fmt::Display>(res: Result<(), E>) {
    match res {
        Ok(()) => trace!("Connection closed normally"),
        Err(e) => {
            let err_str = e.to_string();
            if !err_str.contains("connection closed") && !err_str.contains("connection reset") {
                error!("Connection error: {}", e);
            }
        }
    }
}

/// Turn a hyper request into a [`WebRequest`], dispatch it and convert back.
async fn handle_request(
    req: Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let request = match convert_hyper_request(req, remote_addr).await {
        Ok(request) => request,
        Err(message) => {
            debug!("Rejecting request: {}", message);
            return Ok(plain_response(400, message));
        }
    };

    let response = dispatcher.dispatch(request).await;
    let (status, headers, body) = response.into_parts();

    let mut builder = Response::builder().status(status);
    if let Some(target) = builder.headers_mut() {
        *target = headers;
    }
    match builder.body(Full::new(body)) {
        Ok(response) => Ok(response),
        Err(e) => {
            error!("Failed to build response: {}", e);
            Ok(plain_response(500, "Internal Server Error".to_string()))
        }
    }
}

async fn convert_hyper_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<WebRequest, String> {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| format!("failed to read request body: {e}"))?
        .to_bytes();
    let path = urlencoding::decode(parts.uri.path())
        .map_err(|e| format!("invalid request path: {e}"))?;

    Ok(WebRequest::new(parts.method, &path)
        .with_query(parts.uri.query())
        .with_headers(parts.headers)
        .with_body(body)
        .with_remote_addr(remote_addr))
}

fn plain_response(status: u16, message: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message)));
    if let Ok(status) = hyper::StatusCode::from_u16(status) {
        *response.status_mut() = status;
    }
    response
}
