// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request dispatch of the embedded backend.
//!
//! The [`Dispatcher`] keeps an immutable [`DispatchTable`] behind an `Arc`.
//! Requests take a snapshot and never hold a lock while servlets run;
//! registrations copy the table, change the copy and swap it in.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hyper::header;
use indexmap::IndexMap;
use log::{debug, error, trace, warn};
use parking_lot::RwLock;
use serde_json::{Value, json};

use crate::core::path::{UrlPattern, alias_prefixes, extension_of};
use crate::core::{
    DispatcherType, EventListener, Filter, FilterChain, FilterConfig, RequestScope,
    ServletConfig, ServletContext, ServletError, SessionAccess, SessionStore, WebError,
    WebRequest, WebResponse,
};
use crate::model::{
    ContextModel, ErrorPageKey, ErrorPageModel, EventListenerModel, FilterModel, ServletModel,
    WelcomeFileModel,
};

pub(crate) const ERROR_STATUS_CODE: &str = "javax.servlet.error.status_code";
pub(crate) const ERROR_MESSAGE: &str = "javax.servlet.error.message";
pub(crate) const ERROR_REQUEST_URI: &str = "javax.servlet.error.request_uri";
pub(crate) const ERROR_SERVLET_NAME: &str = "javax.servlet.error.servlet_name";
pub(crate) const ERROR_EXCEPTION_TYPE: &str = "javax.servlet.error.exception_type";

/// Where a context-relative path lands.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolution {
    model_id: String,
    servlet_path: String,
    path_info: Option<String>,
    /// Exact, prefix or extension match (anything but the default servlet).
    specific: bool,
}

/// Servlet-spec mapping: exact, then longest prefix, then extension, then default.
#[derive(Debug, Clone, Default)]
struct ServletMapper {
    exact: HashMap<String, String>,
    prefix: HashMap<String, String>,
    extension: HashMap<String, String>,
    default: Option<String>,
}

impl ServletMapper {
    fn build<'a>(servlets: impl Iterator<Item = &'a Arc<ServletModel>>) -> Self {
        let mut mapper = Self::default();
        for model in servlets {
            for pattern in model.url_patterns() {
                let id = model.id().to_string();
                match UrlPattern::parse(pattern) {
                    Ok(UrlPattern::Exact(path)) => {
                        mapper.exact.entry(path).or_insert(id);
                    }
                    Ok(UrlPattern::Prefix(prefix)) => {
                        mapper.prefix.entry(prefix).or_insert(id);
                    }
                    Ok(UrlPattern::Extension(ext)) => {
                        mapper.extension.entry(ext).or_insert(id);
                    }
                    Ok(UrlPattern::Default) => {
                        mapper.default.get_or_insert(id);
                    }
                    Err(e) => warn!("Ignoring url pattern of {}: {}", model, e),
                }
            }
        }
        mapper
    }

    fn resolve(&self, path: &str) -> Option<Resolution> {
        if let Some(id) = self.exact.get(path) {
            return Some(Resolution {
                model_id: id.clone(),
                servlet_path: path.to_string(),
                path_info: None,
                specific: true,
            });
        }
        for candidate in alias_prefixes(path) {
            let key = if candidate == "/" { "" } else { candidate };
            if let Some(id) = self.prefix.get(key) {
                let rest = &path[key.len()..];
                return Some(Resolution {
                    model_id: id.clone(),
                    servlet_path: key.to_string(),
                    path_info: Some(rest.to_string()).filter(|p| !p.is_empty()),
                    specific: true,
                });
            }
        }
        if let Some(id) = extension_of(path).and_then(|ext| self.extension.get(ext)) {
            return Some(Resolution {
                model_id: id.clone(),
                servlet_path: path.to_string(),
                path_info: None,
                specific: true,
            });
        }
        self.default.as_ref().map(|id| Resolution {
            model_id: id.clone(),
            servlet_path: path.to_string(),
            path_info: None,
            specific: false,
        })
    }
}

/// Everything deployed under one context path.
#[derive(Debug, Clone)]
struct ContextHandler {
    context_path: String,
    servlet_context: Arc<ServletContext>,
    sessions: Arc<SessionStore>,
    contexts: IndexMap<String, Arc<ContextModel>>,
    servlets: IndexMap<String, Arc<ServletModel>>,
    mapper: ServletMapper,
    filters: IndexMap<String, Arc<FilterModel>>,
    listeners: IndexMap<String, Arc<EventListenerModel>>,
    listener_snapshot: Arc<Vec<Arc<dyn EventListener>>>,
    error_pages: IndexMap<String, Arc<ErrorPageModel>>,
    welcome_files: IndexMap<String, Arc<WelcomeFileModel>>,
}

impl ContextHandler {
    fn new(context: &ContextModel, settings: &ServerSettings) -> Self {
        let servlet_context = ServletContext::new(context.context_path());
        for (name, value) in &settings.attributes {
            servlet_context.set_attribute(name, value.clone());
        }
        let timeout = context.session_timeout().or(settings.session_timeout);
        Self {
            context_path: context.context_path().to_string(),
            servlet_context: Arc::new(servlet_context),
            sessions: Arc::new(SessionStore::new(timeout, &settings.session_cookie)),
            contexts: IndexMap::new(),
            servlets: IndexMap::new(),
            mapper: ServletMapper::default(),
            filters: IndexMap::new(),
            listeners: IndexMap::new(),
            listener_snapshot: Arc::new(Vec::new()),
            error_pages: IndexMap::new(),
            welcome_files: IndexMap::new(),
        }
    }

    fn attach_context(&mut self, context: &Arc<ContextModel>) {
        self.servlet_context.merge_init_params(context.context_params());
        self.servlet_context.merge_mime_mappings(context.mime_mappings());
        self.contexts
            .entry(context.id().to_string())
            .or_insert_with(|| context.clone());
    }

    fn refresh_listeners(&mut self) {
        self.listener_snapshot = Arc::new(
            self.listeners
                .values()
                .map(|model| model.listener().clone())
                .collect(),
        );
    }

    fn rebuild_mapper(&mut self) {
        self.mapper = ServletMapper::build(self.servlets.values());
    }

    fn add_servlet(&mut self, model: &Arc<ServletModel>) -> Result<(), WebError> {
        self.attach_context(model.context());
        let known = self
            .servlets
            .get(model.id())
            .is_some_and(|existing| existing.servlet_key() == model.servlet_key());
        if !known {
            let config = ServletConfig {
                servlet_name: model.name().to_string(),
                init_params: model.init_params().clone(),
                servlet_context: self.servlet_context.clone(),
            };
            model.servlet().init(&config)?;
            debug!("Initialized servlet {} in context {}", model.name(), self.context_path);
        }
        self.servlets.insert(model.id().to_string(), model.clone());
        self.rebuild_mapper();
        Ok(())
    }

    fn remove_servlet(&mut self, id: &str) {
        if let Some(model) = self.servlets.shift_remove(id) {
            model.servlet().destroy();
            debug!("Destroyed servlet {} in context {}", model.name(), self.context_path);
            self.rebuild_mapper();
        }
    }

    fn add_filter(&mut self, model: &Arc<FilterModel>) -> Result<(), WebError> {
        self.attach_context(model.context());
        let known = self
            .filters
            .get(model.id())
            .is_some_and(|existing| existing.filter_key() == model.filter_key());
        if !known {
            let config = FilterConfig {
                filter_name: model.name().to_string(),
                init_params: model.init_params().clone(),
                servlet_context: self.servlet_context.clone(),
            };
            model.filter().init(&config)?;
        }
        self.filters.insert(model.id().to_string(), model.clone());
        Ok(())
    }

    fn remove_filter(&mut self, id: &str) {
        if let Some(model) = self.filters.shift_remove(id) {
            model.filter().destroy();
        }
    }

    fn add_event_listener(&mut self, model: &Arc<EventListenerModel>) {
        self.attach_context(model.context());
        let known = self
            .listeners
            .get(model.id())
            .is_some_and(|existing| existing.listener_key() == model.listener_key());
        if !known {
            model.listener().context_initialized(&self.servlet_context);
        }
        self.listeners.insert(model.id().to_string(), model.clone());
        self.refresh_listeners();
    }

    fn remove_event_listener(&mut self, id: &str) {
        if let Some(model) = self.listeners.shift_remove(id) {
            model.listener().context_destroyed(&self.servlet_context);
            self.refresh_listeners();
        }
    }

    /// Take out every element of one context; true when nothing is left.
    fn remove_context(&mut self, context_id: &str) -> bool {
        let belongs = |model: &ContextModel| model.id() == context_id;

        let servlets: Vec<String> = self
            .servlets
            .values()
            .filter(|m| belongs(m.context()))
            .map(|m| m.id().to_string())
            .collect();
        for id in servlets {
            self.remove_servlet(&id);
        }
        let filters: Vec<String> = self
            .filters
            .values()
            .filter(|m| belongs(m.context()))
            .map(|m| m.id().to_string())
            .collect();
        for id in filters {
            self.remove_filter(&id);
        }
        let listeners: Vec<String> = self
            .listeners
            .values()
            .filter(|m| belongs(m.context()))
            .map(|m| m.id().to_string())
            .collect();
        for id in listeners {
            self.remove_event_listener(&id);
        }
        self.error_pages.retain(|_, m| !belongs(m.context()));
        self.welcome_files.retain(|_, m| !belongs(m.context()));
        self.contexts.shift_remove(context_id);

        if self.contexts.is_empty() {
            self.sessions.clear(&self.listener_snapshot);
            true
        } else {
            false
        }
    }

    /// Destroy everything; used when the backend stops.
    fn shutdown(&mut self) {
        let ids: Vec<String> = self.contexts.keys().cloned().collect();
        for id in ids {
            self.remove_context(&id);
        }
        self.sessions.clear(&self.listener_snapshot);
    }

    /// True when no attached context names virtual hosts, or one of them
    /// names `host`.
    fn accepts_host(&self, host: Option<&str>) -> bool {
        let mut hosts = self
            .contexts
            .values()
            .flat_map(|context| context.virtual_hosts())
            .peekable();
        if hosts.peek().is_none() {
            return true;
        }
        match host {
            Some(host) => hosts.any(|pattern| host_matches(pattern, host)),
            None => false,
        }
    }

    fn resolve(&self, path: &str) -> Option<(Arc<ServletModel>, Resolution)> {
        let resolution = self.mapper.resolve(path)?;
        let model = self.servlets.get(&resolution.model_id)?.clone();
        Some((model, resolution))
    }

    /// First welcome file under `dir` served by a specific mapping or
    /// existing as a resource.
    fn welcome_target(&self, dir: &str) -> Option<(String, bool)> {
        for model in self.welcome_files.values() {
            for file in model.files() {
                let candidate = format!("{dir}{file}");
                let mapped = self.mapper.resolve(&candidate).is_some_and(|r| r.specific);
                if mapped || model.context().http_context().get_resource(&candidate).is_some() {
                    return Some((candidate, model.redirect()));
                }
            }
        }
        None
    }

    fn error_page(&self, key: &ErrorPageKey, context_id: Option<&str>) -> Option<Arc<ErrorPageModel>> {
        let matching = |page: &&Arc<ErrorPageModel>| page.error() == key;
        context_id
            .and_then(|id| {
                self.error_pages
                    .values()
                    .filter(matching)
                    .find(|page| page.context().id() == id)
            })
            .or_else(|| self.error_pages.values().find(matching))
            .cloned()
    }

    fn filters_for(
        &self,
        context_id: &str,
        dispatcher_type: DispatcherType,
        path: &str,
        servlet_name: &str,
    ) -> Vec<Arc<dyn Filter>> {
        self.filters
            .values()
            .filter(|f| f.context().id() == context_id)
            .filter(|f| f.applies_to(dispatcher_type, path, Some(servlet_name)))
            .map(|f| f.filter().clone())
            .collect()
    }

    fn scope_for(&self, model: &ServletModel, resolution: &Resolution) -> RequestScope {
        RequestScope {
            context: model.context().clone(),
            servlet_context: self.servlet_context.clone(),
            servlet_name: Some(model.name().to_string()),
            servlet_path: resolution.servlet_path.clone(),
            path_info: resolution.path_info.clone(),
        }
    }

    fn public_path(&self) -> &str {
        if self.context_path == "/" {
            ""
        } else {
            &self.context_path
        }
    }

    async fn handle(&self, mut request: WebRequest, relative: String) -> WebResponse {
        let mut response = WebResponse::new();
        let requested_session = session_cookie(&request, self.sessions.cookie_name());
        request.attach_sessions(SessionAccess::new(
            self.sessions.clone(),
            self.listener_snapshot.clone(),
            requested_session,
        ));

        let mut path = relative;
        if path.ends_with('/') {
            if let Some((welcome, redirect)) = self.welcome_target(&path) {
                if redirect {
                    response.send_redirect(&format!("{}{}", self.public_path(), welcome));
                    return response;
                }
                trace!("Serving welcome file {}", welcome);
                path = welcome;
            }
        }

        let Some((model, resolution)) = self.resolve(&path) else {
            debug!("No servlet mapped for {} in context {}", path, self.context_path);
            response.send_error(404, None);
            self.finish_error(&mut request, &mut response, None, &path).await;
            return response;
        };

        let context_id = model.context().id().to_string();
        request.set_scope(self.scope_for(&model, &resolution));

        if !model
            .context()
            .http_context()
            .handle_security(&mut request, &mut response)
        {
            debug!("Request to {} denied by {}", path, model.context());
            if response.status() == 200 && !response.is_error() {
                response.set_status(401);
            }
            if response.is_error() {
                self.finish_error(&mut request, &mut response, Some(&context_id), &path).await;
            }
            self.set_session_cookie(&request, &mut response);
            return response;
        }

        for listener in self.listener_snapshot.iter() {
            listener.request_initialized(&request);
        }

        let filters = self.filters_for(&context_id, DispatcherType::Request, &path, model.name());
        let result = FilterChain::new(&filters, Some(model.servlet()))
            .do_filter(&mut request, &mut response)
            .await;

        for listener in self.listener_snapshot.iter() {
            listener.request_destroyed(&request);
        }

        match result {
            Ok(()) => {
                if response.is_error() {
                    self.finish_error(&mut request, &mut response, Some(&context_id), &path).await;
                }
            }
            Err(e) => {
                error!("Servlet {} failed on {}: {}", model.name(), path, e);
                self.handle_exception(&mut request, &mut response, &context_id, &path, &e, model.name())
                    .await;
            }
        }

        self.set_session_cookie(&request, &mut response);
        response
    }

    async fn handle_exception(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        context_id: &str,
        path: &str,
        failure: &ServletError,
        servlet_name: &str,
    ) {
        let key = ErrorPageKey::Exception(failure.exception_type().to_string());
        request.set_attribute(ERROR_EXCEPTION_TYPE, json!(failure.exception_type()));
        request.set_attribute(ERROR_SERVLET_NAME, json!(servlet_name));
        match self.error_page(&key, Some(context_id)) {
            Some(page) => {
                self.forward_error(request, response, &page, 500, Some(failure.message()), path)
                    .await
            }
            None => response.render_error_body(500, Some(failure.message())),
        }
    }

    /// Replace an error flagged with `send_error` by the matching error page
    /// or a plain error body.
    async fn finish_error(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        context_id: Option<&str>,
        path: &str,
    ) {
        let Some((status, message)) = response.take_error() else {
            return;
        };
        match self.error_page(&ErrorPageKey::Code(status), context_id) {
            Some(page) => {
                self.forward_error(request, response, &page, status, message.as_deref(), path)
                    .await
            }
            None => response.render_error_body(status, message.as_deref()),
        }
    }

    async fn forward_error(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        page: &ErrorPageModel,
        status: u16,
        message: Option<&str>,
        path: &str,
    ) {
        let Some((model, resolution)) = self.resolve(page.location()) else {
            warn!("Error page {} is not mapped to any servlet", page.location());
            response.render_error_body(status, message);
            return;
        };

        request.set_attribute(ERROR_STATUS_CODE, json!(status));
        request.set_attribute(ERROR_MESSAGE, json!(message.unwrap_or_default()));
        request.set_attribute(
            ERROR_REQUEST_URI,
            json!(format!("{}{}", self.public_path(), path)),
        );
        request.set_dispatcher_type(DispatcherType::Error);
        request.set_scope(self.scope_for(&model, &resolution));

        let mut error_response = WebResponse::new();
        for (name, value) in response.headers() {
            if *name != header::CONTENT_TYPE && *name != header::CONTENT_LENGTH {
                error_response.headers_mut().append(name.clone(), value.clone());
            }
        }
        let filters = self.filters_for(
            model.context().id(),
            DispatcherType::Error,
            page.location(),
            model.name(),
        );
        let result = FilterChain::new(&filters, Some(model.servlet()))
            .do_filter(request, &mut error_response)
            .await;

        match result {
            Ok(()) if !error_response.is_error() => {
                error_response.set_status(status);
                *response = error_response;
            }
            Ok(()) => response.render_error_body(status, message),
            Err(e) => {
                error!("Error page {} failed: {}", page.location(), e);
                response.render_error_body(status, message);
            }
        }
    }

    fn set_session_cookie(&self, request: &WebRequest, response: &mut WebResponse) {
        if let Some((name, id)) = request.new_session_cookie() {
            let path = if self.context_path == "/" { "/" } else { &self.context_path };
            let cookie = format!("{name}={id}; Path={path}; HttpOnly");
            if let Err(e) = response.add_header("Set-Cookie", &cookie) {
                warn!("Could not set session cookie: {}", e);
            }
        }
    }
}

/// `example.com` matches itself, `*.example.com` any direct subdomain.
fn host_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(domain) => host
            .split_once('.')
            .is_some_and(|(_, rest)| rest.eq_ignore_ascii_case(domain)),
        None => pattern.eq_ignore_ascii_case(host),
    }
}

/// Host header without the port.
fn request_host(request: &WebRequest) -> Option<&str> {
    let raw = request.headers().get(header::HOST)?.to_str().ok()?.trim();
    let host = match raw.strip_prefix('[') {
        Some(bracketed) => bracketed.split(']').next()?,
        None => raw.split(':').next()?,
    };
    (!host.is_empty()).then_some(host)
}

fn session_cookie(request: &WebRequest, cookie_name: &str) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, id)| id.to_string())
}

/// Settings from `configure_context`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ServerSettings {
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) session_timeout: Option<u32>,
    pub(crate) session_cookie: String,
}

#[derive(Debug, Clone, Default)]
struct DispatchTable {
    contexts: HashMap<String, Arc<ContextHandler>>,
}

impl DispatchTable {
    /// Handler with the longest context path that is a prefix of `path` and
    /// accepts `host`.
    fn find(&self, path: &str, host: Option<&str>) -> Option<&Arc<ContextHandler>> {
        alias_prefixes(path)
            .filter_map(|candidate| self.contexts.get(candidate))
            .find(|handler| handler.accepts_host(host))
    }
}

/// Routes requests to the servlets registered with the backend.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    table: RwLock<Arc<DispatchTable>>,
    settings: RwLock<ServerSettings>,
}

impl Dispatcher {
    pub(crate) fn new(session_cookie: &str) -> Self {
        Self {
            table: RwLock::new(Arc::new(DispatchTable::default())),
            settings: RwLock::new(ServerSettings {
                session_cookie: session_cookie.to_string(),
                ..ServerSettings::default()
            }),
        }
    }

    pub(crate) fn configure(&self, attributes: BTreeMap<String, Value>, session_timeout: Option<u32>) {
        let mut settings = self.settings.write();
        settings.attributes = attributes;
        settings.session_timeout = session_timeout;
    }

    fn update<R>(
        &self,
        context: &ContextModel,
        create: bool,
        f: impl FnOnce(&mut ContextHandler) -> R,
    ) -> Option<R> {
        let settings = self.settings.read().clone();
        let mut guard = self.table.write();
        let table = Arc::make_mut(&mut guard);
        let path = context.context_path();
        if !table.contexts.contains_key(path) {
            if !create {
                return None;
            }
            debug!("Creating servlet context {}", path);
            table
                .contexts
                .insert(path.to_string(), Arc::new(ContextHandler::new(context, &settings)));
        }
        let handler = table.contexts.get_mut(path)?;
        Some(f(Arc::make_mut(handler)))
    }

    pub(crate) fn add_servlet(&self, model: &Arc<ServletModel>) -> Result<(), WebError> {
        self.update(model.context(), true, |handler| handler.add_servlet(model))
            .unwrap_or(Ok(()))
    }

    pub(crate) fn remove_servlet(&self, model: &ServletModel) {
        self.update(model.context(), false, |handler| handler.remove_servlet(model.id()));
    }

    pub(crate) fn add_filter(&self, model: &Arc<FilterModel>) -> Result<(), WebError> {
        self.update(model.context(), true, |handler| handler.add_filter(model))
            .unwrap_or(Ok(()))
    }

    pub(crate) fn remove_filter(&self, model: &FilterModel) {
        self.update(model.context(), false, |handler| handler.remove_filter(model.id()));
    }

    pub(crate) fn add_event_listener(&self, model: &Arc<EventListenerModel>) {
        self.update(model.context(), true, |handler| handler.add_event_listener(model));
    }

    pub(crate) fn remove_event_listener(&self, model: &EventListenerModel) {
        self.update(model.context(), false, |handler| {
            handler.remove_event_listener(model.id())
        });
    }

    pub(crate) fn add_error_page(&self, model: &Arc<ErrorPageModel>) {
        self.update(model.context(), true, |handler| {
            handler.attach_context(model.context());
            handler
                .error_pages
                .insert(model.id().to_string(), model.clone());
        });
    }

    pub(crate) fn remove_error_page(&self, model: &ErrorPageModel) {
        self.update(model.context(), false, |handler| {
            handler.error_pages.shift_remove(model.id());
        });
    }

    pub(crate) fn add_welcome_files(&self, model: &Arc<WelcomeFileModel>) {
        self.update(model.context(), true, |handler| {
            handler.attach_context(model.context());
            handler
                .welcome_files
                .insert(model.id().to_string(), model.clone());
        });
    }

    pub(crate) fn remove_welcome_files(&self, model: &WelcomeFileModel) {
        self.update(model.context(), false, |handler| {
            handler.welcome_files.shift_remove(model.id());
        });
    }

    pub(crate) fn remove_context(&self, context: &ContextModel) {
        let empty = self.update(context, false, |handler| handler.remove_context(context.id()));
        if empty == Some(true) {
            let mut guard = self.table.write();
            Arc::make_mut(&mut guard).contexts.remove(context.context_path());
            debug!("Removed servlet context {}", context.context_path());
        }
    }

    /// Destroy every element and forget every context.
    pub(crate) fn shutdown(&self) {
        let mut guard = self.table.write();
        let table = Arc::make_mut(&mut guard);
        for handler in table.contexts.values_mut() {
            Arc::make_mut(handler).shutdown();
        }
        table.contexts.clear();
    }

    pub(crate) fn context_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.table.read().contexts.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Serve one request against the current snapshot.
    pub(crate) async fn dispatch(&self, request: WebRequest) -> WebResponse {
        let table = self.table.read().clone();
        let Some(handler) = table.find(request.path(), request_host(&request)).cloned() else {
            let mut response = WebResponse::new();
            response.render_error_body(404, None);
            return response;
        };

        let relative = if handler.context_path == "/" {
            request.path().to_string()
        } else {
            request.path()[handler.context_path.len()..].to_string()
        };
        if relative.is_empty() {
            let mut response = WebResponse::new();
            let location = match request.query() {
                Some(query) => format!("{}/?{}", handler.context_path, query),
                None => format!("{}/", handler.context_path),
            };
            response.send_redirect(&location);
            return response;
        }

        trace!("Dispatching {} {} to context {}", request.method(), request.path(), handler.context_path);
        handler.handle(request, relative).await
    }
}
