// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whiteboard extender.
//!
//! Bundles publish servlets, filters, listeners, resources, error pages and
//! http contexts as services; the extender turns each published service into
//! a registration with the publishing bundle's HttpService and removes it
//! again when the service goes away.
//!
//! Elements that name an `httpContext.id` nobody has published yet wait
//! until the matching [`WhiteboardService::HttpContextMapping`] shows up.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::core::{
    Bundle, DispatcherType, EventListener, Filter, HttpContext, InitParams, Servlet, WebError,
};
use crate::service::{FilterOptions, HttpServiceFactory, HttpServiceProxy, ServletOptions};

pub const ALIAS: &str = "alias";
pub const URL_PATTERNS: &str = "urlPatterns";
pub const SERVLET_NAME: &str = "servlet-name";
pub const FILTER_NAME: &str = "filter-name";
pub const SERVLET_NAMES: &str = "servletNames";
pub const DISPATCHER: &str = "dispatcher";
pub const HTTP_CONTEXT_ID: &str = "httpContext.id";
pub const HTTP_CONTEXT_PATH: &str = "httpContext.path";
pub const HTTP_CONTEXT_SHARED: &str = "httpContext.shared";
pub const INIT_PREFIX: &str = "init.";

/// A published service: its id, the bundle that published it and its
/// properties.
#[derive(Debug, Clone)]
pub struct ServiceReference {
    id: u64,
    bundle: Arc<Bundle>,
    properties: BTreeMap<String, String>,
}

impl ServiceReference {
    pub fn new(id: u64, bundle: Arc<Bundle>) -> Self {
        Self {
            id,
            bundle,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bundle(&self) -> &Arc<Bundle> {
        &self.bundle
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// A comma separated property as a list.
    pub fn list_property(&self, key: &str) -> Vec<String> {
        self.property(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every `init.`-prefixed property, with the prefix removed.
    pub fn init_params(&self) -> InitParams {
        self.properties
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(INIT_PREFIX)
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect()
    }

    fn bool_property(&self, key: &str) -> bool {
        self.property(key)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

impl fmt::Display for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service {} of {}", self.id, self.bundle)
    }
}

/// A servlet that carries its own mapping instead of service properties.
#[derive(Debug, Clone)]
pub struct ServletMapping {
    pub servlet: Arc<dyn Servlet>,
    pub alias: Option<String>,
    pub url_patterns: Vec<String>,
    pub servlet_name: Option<String>,
    pub init_params: InitParams,
    pub http_context_id: Option<String>,
}

impl ServletMapping {
    pub fn new(servlet: Arc<dyn Servlet>) -> Self {
        Self {
            servlet,
            alias: None,
            url_patterns: Vec::new(),
            servlet_name: None,
            init_params: InitParams::new(),
            http_context_id: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_url_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_servlet_name(mut self, name: &str) -> Self {
        self.servlet_name = Some(name.to_string());
        self
    }

    pub fn with_init_param(mut self, name: &str, value: &str) -> Self {
        self.init_params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_http_context_id(mut self, id: &str) -> Self {
        self.http_context_id = Some(id.to_string());
        self
    }
}

/// What a whiteboard service provides.
#[derive(Debug, Clone)]
pub enum WhiteboardService {
    /// A servlet mapped through the `alias` or `urlPatterns` property.
    Servlet(Arc<dyn Servlet>),
    ServletMapping(ServletMapping),
    Filter(Arc<dyn Filter>),
    Listener(Arc<dyn EventListener>),
    /// Static resources below `name` served under `alias`.
    Resources { alias: String, name: String },
    ErrorPage { error: String, location: String },
    /// Publishes an http context under the `httpContext.id` property.
    HttpContextMapping(Arc<dyn HttpContext>),
}

impl WhiteboardService {
    fn kind(&self) -> &'static str {
        match self {
            WhiteboardService::Servlet(_) => "servlet",
            WhiteboardService::ServletMapping(_) => "servlet mapping",
            WhiteboardService::Filter(_) => "filter",
            WhiteboardService::Listener(_) => "listener",
            WhiteboardService::Resources { .. } => "resources",
            WhiteboardService::ErrorPage { .. } => "error page",
            WhiteboardService::HttpContextMapping(_) => "http context",
        }
    }
}

/// Private contexts are visible to their own bundle only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContextKey {
    owner: Option<u64>,
    id: String,
}

#[derive(Debug, Clone)]
struct PublishedContext {
    service_id: u64,
    bundle_id: u64,
    http_context: Arc<dyn HttpContext>,
    path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ElementState {
    Registered(Option<ContextKey>),
    /// Waiting for the http context with this id.
    Waiting(String),
    Failed,
}

#[derive(Debug)]
struct Element {
    reference: ServiceReference,
    service: WhiteboardService,
    state: ElementState,
}

impl Element {
    fn http_context_id(&self) -> Option<&str> {
        match &self.service {
            WhiteboardService::ServletMapping(mapping) => mapping.http_context_id.as_deref(),
            _ => self.reference.property(HTTP_CONTEXT_ID),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    contexts: HashMap<ContextKey, PublishedContext>,
    elements: IndexMap<u64, Element>,
}

impl State {
    fn resolve(&self, bundle: &Bundle, id: &str) -> Option<(ContextKey, PublishedContext)> {
        [Some(bundle.id()), None]
            .into_iter()
            .map(|owner| ContextKey {
                owner,
                id: id.to_string(),
            })
            .find_map(|key| self.contexts.get(&key).cloned().map(|context| (key, context)))
    }
}

/// Tracks whiteboard services and keeps their registrations in sync.
pub struct WhiteboardExtender {
    services: Arc<HttpServiceFactory>,
    state: Mutex<State>,
}

impl fmt::Debug for WhiteboardExtender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WhiteboardExtender")
            .field("contexts", &state.contexts.len())
            .field("elements", &state.elements.len())
            .finish()
    }
}

impl WhiteboardExtender {
    pub fn new(services: Arc<HttpServiceFactory>) -> Self {
        Self {
            services,
            state: Mutex::new(State::default()),
        }
    }

    /// A service was published.
    pub fn service_added(&self, reference: ServiceReference, service: WhiteboardService) {
        debug!("Whiteboard {} added: {}", service.kind(), reference);
        let mut state = self.state.lock();
        if state.elements.contains_key(&reference.id())
            || state.contexts.values().any(|c| c.service_id == reference.id())
        {
            warn!("{} is already tracked", reference);
            return;
        }

        if let WhiteboardService::HttpContextMapping(http_context) = &service {
            self.add_context(&mut state, &reference, http_context.clone());
            return;
        }

        let mut element = Element {
            reference,
            service,
            state: ElementState::Failed,
        };
        element.state = self.register(&state, &element);
        state.elements.insert(element.reference.id(), element);
    }

    /// A service went away.
    pub fn service_removed(&self, reference: &ServiceReference) {
        self.remove(reference.id());
    }

    fn remove(&self, service_id: u64) {
        let mut state = self.state.lock();
        if let Some(element) = state.elements.shift_remove(&service_id) {
            debug!("Whiteboard {} removed: {}", element.service.kind(), element.reference);
            if let ElementState::Registered(key) = &element.state {
                let http_context = key
                    .as_ref()
                    .and_then(|key| state.contexts.get(key))
                    .map(|c| c.http_context.clone());
                self.unregister(&element, http_context.as_ref());
            }
            return;
        }
        let key = state
            .contexts
            .iter()
            .find(|(_, context)| context.service_id == service_id)
            .map(|(key, _)| key.clone());
        match key {
            Some(key) => self.remove_context(&mut state, &key),
            None => debug!("Service {} was not tracked", service_id),
        }
    }

    /// Forget everything `bundle` published, elements first.
    pub fn bundle_stopped(&self, bundle: &Bundle) {
        let service_ids: Vec<u64> = {
            let state = self.state.lock();
            let elements = state
                .elements
                .values()
                .filter(|e| e.reference.bundle().id() == bundle.id())
                .map(|e| e.reference.id());
            let contexts = state
                .contexts
                .values()
                .filter(|c| c.bundle_id == bundle.id())
                .map(|c| c.service_id);
            elements.chain(contexts).collect()
        };
        for service_id in service_ids {
            self.remove(service_id);
        }
    }

    /// Ids of elements waiting for their http context.
    pub fn waiting(&self) -> Vec<u64> {
        self.state
            .lock()
            .elements
            .values()
            .filter(|e| matches!(e.state, ElementState::Waiting(_)))
            .map(|e| e.reference.id())
            .collect()
    }

    pub fn is_registered(&self, service_id: u64) -> bool {
        self.state
            .lock()
            .elements
            .get(&service_id)
            .is_some_and(|e| matches!(e.state, ElementState::Registered(_)))
    }

    fn add_context(&self, state: &mut State, reference: &ServiceReference, http_context: Arc<dyn HttpContext>) {
        let Some(id) = reference.property(HTTP_CONTEXT_ID) else {
            error!("{} publishes an http context without {}", reference, HTTP_CONTEXT_ID);
            return;
        };
        let key = ContextKey {
            owner: (!reference.bool_property(HTTP_CONTEXT_SHARED)).then(|| reference.bundle().id()),
            id: id.to_string(),
        };
        if state.contexts.contains_key(&key) {
            warn!("Http context {} is already published, ignoring {}", id, reference);
            return;
        }
        info!("Http context {} published by {}", id, reference);
        state.contexts.insert(
            key,
            PublishedContext {
                service_id: reference.id(),
                bundle_id: reference.bundle().id(),
                http_context,
                path: reference.property(HTTP_CONTEXT_PATH).map(str::to_string),
            },
        );
        self.retry_waiting(state);
    }

    fn remove_context(&self, state: &mut State, key: &ContextKey) {
        info!("Http context {} withdrawn", key.id);
        let Some(removed) = state.contexts.remove(key) else {
            return;
        };
        let dependants: Vec<u64> = state
            .elements
            .values()
            .filter(|e| e.state == ElementState::Registered(Some(key.clone())))
            .map(|e| e.reference.id())
            .collect();
        for id in dependants {
            if let Some(element) = state.elements.get(&id) {
                self.unregister(element, Some(&removed.http_context));
            }
            if let Some(element) = state.elements.get_mut(&id) {
                element.state = ElementState::Waiting(key.id.clone());
            }
        }
        // another context of the same id may serve them
        self.retry_waiting(state);
    }

    fn retry_waiting(&self, state: &mut State) {
        let waiting: Vec<u64> = state
            .elements
            .values()
            .filter(|e| matches!(e.state, ElementState::Waiting(_)))
            .map(|e| e.reference.id())
            .collect();
        for id in waiting {
            let new_state = match state.elements.get(&id) {
                Some(element) => self.register(state, element),
                None => continue,
            };
            if let Some(element) = state.elements.get_mut(&id) {
                element.state = new_state;
            }
        }
    }

    fn register(&self, state: &State, element: &Element) -> ElementState {
        let reference = &element.reference;
        let (key, context) = match element.http_context_id() {
            Some(id) => match state.resolve(reference.bundle(), id) {
                Some((key, context)) => (Some(key), Some(context)),
                None => {
                    debug!("{} waits for http context {}", reference, id);
                    return ElementState::Waiting(id.to_string());
                }
            },
            None => (None, None),
        };

        let service = self.services.get_service(reference.bundle());
        let http_context = context.as_ref().map(|c| &c.http_context);
        if let Some(path) = context.as_ref().and_then(|c| c.path.as_deref()) {
            if let Err(e) = service.set_context_path(path, http_context) {
                debug!("Keeping the context path of {}: {}", reference, e);
            }
        }
        match register_element(&service, reference, &element.service, http_context) {
            Ok(()) => {
                info!("Registered whiteboard {} {}", element.service.kind(), reference);
                ElementState::Registered(key)
            }
            Err(e) => {
                error!("Failed to register whiteboard {} {}: {}", element.service.kind(), reference, e);
                ElementState::Failed
            }
        }
    }

    fn unregister(&self, element: &Element, http_context: Option<&Arc<dyn HttpContext>>) {
        let service = self.services.get_service(element.reference.bundle());
        let result = match &element.service {
            WhiteboardService::Servlet(servlet) => match element.reference.property(ALIAS) {
                Some(alias) => service.unregister(alias),
                None => service.unregister_servlet(servlet),
            },
            WhiteboardService::ServletMapping(mapping) => match mapping.alias.as_deref() {
                Some(alias) => service.unregister(alias),
                None => service.unregister_servlet(&mapping.servlet),
            },
            WhiteboardService::Filter(filter) => service.unregister_filter(filter),
            WhiteboardService::Listener(listener) => service.unregister_event_listener(listener),
            WhiteboardService::Resources { alias, .. } => service.unregister(alias),
            WhiteboardService::ErrorPage { error, .. } => {
                service.unregister_error_page(error, http_context)
            }
            WhiteboardService::HttpContextMapping(_) => Ok(()),
        };
        match result {
            Ok(()) => info!("Unregistered whiteboard {} {}", element.service.kind(), element.reference),
            Err(e) => warn!("Failed to unregister {}: {}", element.reference, e),
        }
    }
}

fn register_element(
    service: &HttpServiceProxy,
    reference: &ServiceReference,
    element: &WhiteboardService,
    http_context: Option<&Arc<dyn HttpContext>>,
) -> Result<(), WebError> {
    match element {
        WhiteboardService::Servlet(servlet) => {
            let mapping = ServletMapping {
                servlet: servlet.clone(),
                alias: reference.property(ALIAS).map(str::to_string),
                url_patterns: reference.list_property(URL_PATTERNS),
                servlet_name: reference.property(SERVLET_NAME).map(str::to_string),
                init_params: reference.init_params(),
                http_context_id: None,
            };
            register_servlet(service, &mapping, http_context)?;
        }
        WhiteboardService::ServletMapping(mapping) => {
            register_servlet(service, mapping, http_context)?;
        }
        WhiteboardService::Filter(filter) => {
            let dispatcher_types = reference
                .list_property(DISPATCHER)
                .iter()
                .map(|value| DispatcherType::from_str(value))
                .collect::<Result<Vec<_>, _>>()?;
            let options = FilterOptions {
                name: reference.property(FILTER_NAME).map(str::to_string),
                url_patterns: reference.list_property(URL_PATTERNS),
                servlet_names: reference.list_property(SERVLET_NAMES),
                aliases: Vec::new(),
                init_params: reference.init_params(),
                dispatcher_types,
            };
            service.register_filter(filter.clone(), options, http_context)?;
        }
        WhiteboardService::Listener(listener) => {
            service.register_event_listener(listener.clone(), http_context)?;
        }
        WhiteboardService::Resources { alias, name } => {
            service.register_resources(alias, name, http_context)?;
        }
        WhiteboardService::ErrorPage { error, location } => {
            service.register_error_page(error, location, http_context)?;
        }
        WhiteboardService::HttpContextMapping(_) => {}
    }
    Ok(())
}

fn register_servlet(
    service: &HttpServiceProxy,
    mapping: &ServletMapping,
    http_context: Option<&Arc<dyn HttpContext>>,
) -> Result<(), WebError> {
    let mut init_params = mapping.init_params.clone();
    if let Some(name) = &mapping.servlet_name {
        init_params.insert(SERVLET_NAME.to_string(), name.clone());
    }
    if let Some(alias) = &mapping.alias {
        service.register_servlet(alias, mapping.servlet.clone(), init_params, http_context)?;
        return Ok(());
    }
    if mapping.url_patterns.is_empty() {
        return Err(WebError::illegal_argument(format!(
            "a servlet needs an {ALIAS} or {URL_PATTERNS}"
        )));
    }
    let options = ServletOptions {
        name: mapping.servlet_name.clone(),
        url_patterns: mapping.url_patterns.clone(),
        init_params,
        ..ServletOptions::default()
    };
    service.register_servlet_with_patterns(mapping.servlet.clone(), options, http_context)?;
    Ok(())
}
