// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The HttpService / WebContainer API.
//!
//! Every bundle gets its own [`HttpServiceProxy`] from the
//! [`HttpServiceFactory`]. The proxy forwards to an [`HttpServiceStarted`]
//! until it is stopped; after that every call is logged and discarded.

#[cfg(test)]
mod tests;

mod factory;
mod started;

pub use factory::HttpServiceFactory;
pub use started::HttpServiceStarted;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::core::{
    Bundle, DefaultHttpContext, DispatcherType, EventListener, Filter, HttpContext, InitParams,
    RegistrationStatus, Servlet, WebError,
};
use crate::model::{ContextModel, MultipartConfig};

/// Creates the servlet that compiles and serves JSPs of a context.
pub type JspServletFactory = Arc<dyn Fn(&ContextModel) -> Arc<dyn Servlet> + Send + Sync>;

/// How a servlet is mapped when it is registered with URL patterns.
#[derive(Debug, Clone, Default)]
pub struct ServletOptions {
    pub name: Option<String>,
    pub url_patterns: Vec<String>,
    pub init_params: InitParams,
    pub load_on_startup: Option<i32>,
    pub async_supported: bool,
    pub multipart: Option<MultipartConfig>,
}

impl ServletOptions {
    pub fn new<I, S>(url_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url_patterns: url_patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_init_param(mut self, name: &str, value: &str) -> Self {
        self.init_params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_load_on_startup(mut self, load_on_startup: Option<i32>) -> Self {
        self.load_on_startup = load_on_startup;
        self
    }

    pub fn with_async_supported(mut self, async_supported: bool) -> Self {
        self.async_supported = async_supported;
        self
    }

    pub fn with_multipart(mut self, multipart: Option<MultipartConfig>) -> Self {
        self.multipart = multipart;
        self
    }
}

/// Where a filter applies.
///
/// `aliases` name servlets registered through the HttpService API; they are
/// translated to the servlet names behind them.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub name: Option<String>,
    pub url_patterns: Vec<String>,
    pub servlet_names: Vec<String>,
    pub aliases: Vec<String>,
    pub init_params: InitParams,
    pub dispatcher_types: Vec<DispatcherType>,
}

impl FilterOptions {
    pub fn new<I, S>(url_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url_patterns: url_patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_servlet_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servlet_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_init_param(mut self, name: &str, value: &str) -> Self {
        self.init_params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_dispatcher_types(mut self, types: Vec<DispatcherType>) -> Self {
        self.dispatcher_types = types;
        self
    }
}

enum ServiceState {
    Started(Arc<HttpServiceStarted>),
    Stopped,
}

/// The HttpService of one bundle.
pub struct HttpServiceProxy {
    bundle: Arc<Bundle>,
    state: RwLock<ServiceState>,
}

impl fmt::Debug for HttpServiceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServiceProxy")
            .field("bundle", &self.bundle.symbolic_name())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl HttpServiceProxy {
    pub(crate) fn new(started: Arc<HttpServiceStarted>) -> Self {
        Self {
            bundle: started.bundle().clone(),
            state: RwLock::new(ServiceState::Started(started)),
        }
    }

    pub fn bundle(&self) -> &Arc<Bundle> {
        &self.bundle
    }

    pub fn is_stopped(&self) -> bool {
        matches!(*self.state.read(), ServiceState::Stopped)
    }

    fn started(&self) -> Option<Arc<HttpServiceStarted>> {
        match &*self.state.read() {
            ServiceState::Started(started) => Some(started.clone()),
            ServiceState::Stopped => None,
        }
    }

    fn discarded(&self, operation: &str) -> Result<RegistrationStatus, WebError> {
        warn!(
            "Http service of bundle {} has already been stopped; {} ignored",
            self.bundle.symbolic_name(),
            operation
        );
        Ok(RegistrationStatus::Discarded)
    }

    fn ignored(&self, operation: &str) -> Result<(), WebError> {
        warn!(
            "Http service of bundle {} has already been stopped; {} ignored",
            self.bundle.symbolic_name(),
            operation
        );
        Ok(())
    }

    pub fn create_default_http_context(&self) -> Arc<dyn HttpContext> {
        match self.started() {
            Some(started) => started.create_default_http_context(),
            None => Arc::new(DefaultHttpContext::new(self.bundle.clone())),
        }
    }

    pub fn register_servlet(
        &self,
        alias: &str,
        servlet: Arc<dyn Servlet>,
        init_params: InitParams,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_servlet(alias, servlet, init_params, http_context),
            None => self.discarded("register_servlet"),
        }
    }

    pub fn register_servlet_with_patterns(
        &self,
        servlet: Arc<dyn Servlet>,
        options: ServletOptions,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_servlet_with_patterns(servlet, options, http_context),
            None => self.discarded("register_servlet_with_patterns"),
        }
    }

    pub fn register_resources(
        &self,
        alias: &str,
        name: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_resources(alias, name, http_context),
            None => self.discarded("register_resources"),
        }
    }

    pub fn unregister(&self, alias: &str) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.unregister(alias),
            None => self.ignored("unregister"),
        }
    }

    pub fn unregister_servlet(&self, servlet: &Arc<dyn Servlet>) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.unregister_servlet(servlet),
            None => self.ignored("unregister_servlet"),
        }
    }

    pub fn register_filter(
        &self,
        filter: Arc<dyn Filter>,
        options: FilterOptions,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_filter(filter, options, http_context),
            None => self.discarded("register_filter"),
        }
    }

    pub fn unregister_filter(&self, filter: &Arc<dyn Filter>) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.unregister_filter(filter),
            None => self.ignored("unregister_filter"),
        }
    }

    pub fn register_event_listener(
        &self,
        listener: Arc<dyn EventListener>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_event_listener(listener, http_context),
            None => self.discarded("register_event_listener"),
        }
    }

    pub fn unregister_event_listener(&self, listener: &Arc<dyn EventListener>) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.unregister_event_listener(listener),
            None => self.ignored("unregister_event_listener"),
        }
    }

    pub fn register_error_page(
        &self,
        error: &str,
        location: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_error_page(error, location, http_context),
            None => self.discarded("register_error_page"),
        }
    }

    pub fn unregister_error_page(
        &self,
        error: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.unregister_error_page(error, http_context),
            None => self.ignored("unregister_error_page"),
        }
    }

    pub fn register_welcome_files(
        &self,
        files: Vec<String>,
        redirect: bool,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_welcome_files(files, redirect, http_context),
            None => self.discarded("register_welcome_files"),
        }
    }

    pub fn unregister_welcome_files(&self, http_context: Option<&Arc<dyn HttpContext>>) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.unregister_welcome_files(http_context),
            None => self.ignored("unregister_welcome_files"),
        }
    }

    pub fn register_jsps(
        &self,
        url_patterns: Option<Vec<String>>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        match self.started() {
            Some(started) => started.register_jsps(url_patterns, http_context),
            None => self.discarded("register_jsps"),
        }
    }

    pub fn unregister_jsps(&self, http_context: Option<&Arc<dyn HttpContext>>) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.unregister_jsps(http_context),
            None => self.ignored("unregister_jsps"),
        }
    }

    pub fn set_context_param(
        &self,
        params: InitParams,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.set_context_param(params, http_context),
            None => self.ignored("set_context_param"),
        }
    }

    pub fn set_session_timeout(
        &self,
        minutes: Option<u32>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.set_session_timeout(minutes, http_context),
            None => self.ignored("set_session_timeout"),
        }
    }

    pub fn set_context_path(
        &self,
        path: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.set_context_path(path, http_context),
            None => self.ignored("set_context_path"),
        }
    }

    pub fn set_virtual_hosts(
        &self,
        hosts: Vec<String>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.set_virtual_hosts(hosts, http_context),
            None => self.ignored("set_virtual_hosts"),
        }
    }

    pub fn set_mime_mappings(
        &self,
        mappings: BTreeMap<String, String>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.set_mime_mappings(mappings, http_context),
            None => self.ignored("set_mime_mappings"),
        }
    }

    /// Remove everything registered with `http_context`, and only that.
    pub fn release_http_context(&self, http_context: &Arc<dyn HttpContext>) -> Result<(), WebError> {
        match self.started() {
            Some(started) => started.release_http_context(http_context),
            None => self.ignored("release_http_context"),
        }
    }

    /// `Live` or `Pending` for an alias registered by this bundle.
    pub fn status(&self, alias: &str) -> Option<RegistrationStatus> {
        self.started().and_then(|started| started.status(alias))
    }

    /// Number of elements this bundle has registered; zero once stopped.
    pub fn len(&self) -> usize {
        self.started().map_or(0, |started| started.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every registration of this bundle. Only the first call has an effect.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), ServiceState::Stopped);
        match previous {
            ServiceState::Started(started) => started.stop(),
            ServiceState::Stopped => debug!(
                "Http service of bundle {} was already stopped",
                self.bundle.symbolic_name()
            ),
        }
    }
}
