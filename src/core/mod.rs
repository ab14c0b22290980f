// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives – errors, web elements, requests & responses.
//!
//! Everything a bundle hands to the container (servlets, filters, listeners,
//! http contexts) and everything that moves through a dispatch is defined in
//! this module. No registration bookkeeping lives here; that sits in
//! `registrations` and `service`, and protocol IO sits in `server`.


mod context;
mod http;
pub mod path;
mod resource;
mod session;

pub use context::{Bundle, DefaultHttpContext, HttpContext, ServletContext};
pub use http::{RequestScope, WebRequest, WebResponse};
pub use resource::ResourceServlet;
pub use session::{HttpSession, SessionStore};

pub(crate) use http::SessionAccess;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::war::DescriptorError;

/// Init parameters of a servlet, filter or context, ordered by name.
pub type InitParams = BTreeMap<String, String>;

/// Errors raised by the registration and lifecycle API.
#[derive(Error, Debug)]
pub enum WebError {
    /// The alias is malformed or already in use in this or another context.
    #[error("namespace error: {0}")]
    Namespace(String),

    /// The same servlet instance is already registered somewhere in the cluster.
    #[error("servlet already registered with a different alias")]
    ServletAlreadyRegistered,

    /// An argument did not pass validation.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The operation is not allowed in the current state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The operation needs an optional feature that is not available.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The backend server rejected an operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A servlet or filter failed during initialisation.
    #[error("servlet error: {0}")]
    Servlet(#[from] ServletError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A web.xml could not be parsed.
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebError {
    pub(crate) fn illegal_argument(message: impl Into<String>) -> Self {
        WebError::IllegalArgument(message.into())
    }

    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        WebError::IllegalState(message.into())
    }
}

/// Error returned by servlets and filters while serving a request.
///
/// The exception type is matched against `exception-type` error pages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{exception_type}: {message}")]
pub struct ServletError {
    exception_type: String,
    message: String,
}

impl ServletError {
    /// Exception type used when none is given.
    pub const SERVLET_EXCEPTION: &'static str = "javax.servlet.ServletException";

    /// Create a generic servlet error.
    pub fn new(message: impl Into<String>) -> Self {
        Self::of_type(Self::SERVLET_EXCEPTION, message)
    }

    /// Create an error carrying an explicit exception type name.
    pub fn of_type(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            message: message.into(),
        }
    }

    pub fn exception_type(&self) -> &str {
        &self.exception_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ServletError {
    fn from(err: std::io::Error) -> Self {
        ServletError::of_type("java.io.IOException", err.to_string())
    }
}

/// Outcome of a register call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Applied to the running backend.
    Live,
    /// Recorded; applied once the server starts.
    Pending,
    /// Ignored because the service was already stopped.
    Discarded,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStatus::Live => write!(f, "LIVE"),
            RegistrationStatus::Pending => write!(f, "PENDING"),
            RegistrationStatus::Discarded => write!(f, "DISCARDED"),
        }
    }
}

/// The kind of dispatch a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatcherType {
    Request,
    Forward,
    Include,
    Error,
    Async,
}

impl fmt::Display for DispatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherType::Request => write!(f, "REQUEST"),
            DispatcherType::Forward => write!(f, "FORWARD"),
            DispatcherType::Include => write!(f, "INCLUDE"),
            DispatcherType::Error => write!(f, "ERROR"),
            DispatcherType::Async => write!(f, "ASYNC"),
        }
    }
}

impl FromStr for DispatcherType {
    type Err = WebError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "REQUEST" => Ok(DispatcherType::Request),
            "FORWARD" => Ok(DispatcherType::Forward),
            "INCLUDE" => Ok(DispatcherType::Include),
            "ERROR" => Ok(DispatcherType::Error),
            "ASYNC" => Ok(DispatcherType::Async),
            other => Err(WebError::illegal_argument(format!(
                "unknown dispatcher type '{other}'"
            ))),
        }
    }
}

/// Configuration handed to [`Servlet::init`].
#[derive(Debug, Clone)]
pub struct ServletConfig {
    pub servlet_name: String,
    pub init_params: InitParams,
    pub servlet_context: Arc<ServletContext>,
}

impl ServletConfig {
    pub fn init_parameter(&self, name: &str) -> Option<&str> {
        self.init_params.get(name).map(String::as_str)
    }
}

/// Configuration handed to [`Filter::init`].
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub filter_name: String,
    pub init_params: InitParams,
    pub servlet_context: Arc<ServletContext>,
}

impl FilterConfig {
    pub fn init_parameter(&self, name: &str) -> Option<&str> {
        self.init_params.get(name).map(String::as_str)
    }
}

/// A request handler registered under an alias or URL patterns.
#[async_trait]
pub trait Servlet: fmt::Debug + Send + Sync {
    /// Called once before the first request is dispatched to the servlet.
    fn init(&self, _config: &ServletConfig) -> Result<(), ServletError> {
        Ok(())
    }

    /// Serve one request.
    async fn service(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ServletError>;

    /// Called once when the servlet is taken out of service.
    fn destroy(&self) {}
}

/// A request interceptor wrapped around servlets.
#[async_trait]
pub trait Filter: fmt::Debug + Send + Sync {
    fn init(&self, _config: &FilterConfig) -> Result<(), ServletError> {
        Ok(())
    }

    /// Process the request, passing it on with `chain.do_filter` to continue.
    async fn do_filter(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        chain: FilterChain<'_>,
    ) -> Result<(), ServletError>;

    fn destroy(&self) {}
}

/// Context, request and session lifecycle callbacks.
///
/// Every callback defaults to a no-op so a listener only implements what it
/// is interested in.
pub trait EventListener: fmt::Debug + Send + Sync {
    fn context_initialized(&self, _context: &ServletContext) {}
    fn context_destroyed(&self, _context: &ServletContext) {}
    fn request_initialized(&self, _request: &WebRequest) {}
    fn request_destroyed(&self, _request: &WebRequest) {}
    fn session_created(&self, _session: &HttpSession) {}
    fn session_destroyed(&self, _session: &HttpSession) {}
}

/// The remaining filters plus the target servlet of one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct FilterChain<'a> {
    filters: &'a [Arc<dyn Filter>],
    servlet: Option<&'a Arc<dyn Servlet>>,
}

impl<'a> FilterChain<'a> {
    pub fn new(filters: &'a [Arc<dyn Filter>], servlet: Option<&'a Arc<dyn Servlet>>) -> Self {
        Self { filters, servlet }
    }

    /// Invoke the next filter, or the servlet once all filters ran.
    ///
    /// A chain without a servlet ends in a 404.
    pub async fn do_filter(
        self,
        request: &mut WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ServletError> {
        match self.filters.split_first() {
            Some((first, rest)) => {
                let next = FilterChain {
                    filters: rest,
                    servlet: self.servlet,
                };
                first.do_filter(request, response, next).await
            }
            None => match self.servlet {
                Some(servlet) => servlet.service(request, response).await,
                None => {
                    response.send_error(404, None);
                    Ok(())
                }
            },
        }
    }
}

/// Identity of a shared web element (servlet, filter, listener, context).
pub(crate) fn identity<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}
