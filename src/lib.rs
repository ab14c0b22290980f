// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pax Web - registration, lifecycle and WAR deployment core for pluggable
//! servlet containers.
//!
//! Modular units ("bundles") register servlets, filters, listeners, error
//! pages and static resources through a per-bundle [`HttpServiceProxy`]. The
//! registrations are validated, recorded and applied to a single long-lived
//! backend server by the [`ServerController`], which replays everything
//! recorded whenever the backend (re)starts.
//!
//! # Moving parts
//!
//! - **Model**: immutable descriptions of what was registered
//!   ([`ContextModel`], [`ServletModel`], [`FilterModel`], ...).
//! - **Registrations**: alias bookkeeping per context plus a cluster-wide index
//!   that guarantees alias and servlet uniqueness.
//! - **Controller**: the `Unconfigured -> Stopped -> Started` state machine
//!   driving a [`ServerBackend`].
//! - **Service**: the HttpService / WebContainer API, one proxy per bundle.
//! - **WAR extender**: `web.xml` parsing, `@WebServlet` / `@WebFilter` scanning
//!   and deployment of web applications into the same model.
//! - **Whiteboard extender**: turns published services into registrations.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use paxweb::{Bundle, PaxWeb, Servlet, ServletError, WebRequest, WebResponse};
//!
//! #[derive(Debug)]
//! struct Hello;
//!
//! #[async_trait]
//! impl Servlet for Hello {
//!     async fn service(&self, _req: &mut WebRequest, resp: &mut WebResponse) -> Result<(), ServletError> {
//!         resp.set_content_type("text/html");
//!         resp.write_str("<h1>Hello World</h1>");
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pax = PaxWeb::loader().build()?;
//! pax.start()?;
//!
//! let bundle = Arc::new(Bundle::new(1, "org.example.hello", "/opt/hello"));
//! let http = pax.http_service(bundle);
//! http.register_servlet("/hello", Arc::new(Hello), BTreeMap::new(), None)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod core;
pub mod loader;
pub mod logging;
pub mod model;
pub mod registrations;
pub mod server;
pub mod service;
pub mod war;
pub mod whiteboard;

pub use config::{Config, ConfigError, ConfigProvider, WebConfiguration};
pub use controller::{
    BackendFactory, ConnectorConfig, ServerBackend, ServerController, ServerEvent, ServerListener,
    ServerState,
};
pub use core::{
    Bundle, DefaultHttpContext, DispatcherType, EventListener, Filter, FilterChain, FilterConfig,
    HttpContext, HttpSession, InitParams, RegistrationStatus, RequestScope, ResourceServlet,
    Servlet, ServletConfig, ServletContext, ServletError, WebError, WebRequest, WebResponse,
};
pub use loader::{LoaderError, PaxWeb, PaxWebLoader};
pub use model::{
    ContextModel, ErrorPageKey, ErrorPageModel, EventListenerModel, FilterModel, MultipartConfig,
    ResourceModel, ServletModel, WelcomeFileModel,
};
pub use registrations::{Registration, Registrations, RegistrationsCluster};
pub use server::EmbeddedBackendFactory;
pub use service::{FilterOptions, HttpServiceFactory, HttpServiceProxy, JspServletFactory, ServletOptions};
pub use war::{ClassSpace, WebAppDeployer, WebAppModel, WebClass};
pub use whiteboard::{ServiceReference, ServletMapping, WhiteboardExtender, WhiteboardService};

// Re-export the logging helpers
pub use logging::{init as init_logging, log_debug, log_error, log_info, log_trace, log_warning};
