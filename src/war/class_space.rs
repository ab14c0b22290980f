// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The classes a web bundle exposes.
//!
//! Each [`WebClass`] is declared with the contract it satisfies (servlet,
//! filter or listener), a factory for instances and the annotations it
//! carries. Capabilities are fixed at declaration, so scanning and
//! deployment never have to inspect a class twice.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::core::{DispatcherType, EventListener, Filter, InitParams, Servlet, WebError};
use crate::model::MultipartConfig;

type ServletFactory = Arc<dyn Fn() -> Arc<dyn Servlet> + Send + Sync>;
type FilterFactory = Arc<dyn Fn() -> Arc<dyn Filter> + Send + Sync>;
type ListenerFactory = Arc<dyn Fn() -> Arc<dyn EventListener> + Send + Sync>;

#[derive(Clone)]
enum Capability {
    Servlet(ServletFactory),
    Filter(FilterFactory),
    Listener(ListenerFactory),
    None,
}

/// `@WebServlet`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebServletAnnotation {
    pub name: Option<String>,
    /// Shorthand for `url_patterns`; setting both is an error.
    pub value: Vec<String>,
    pub url_patterns: Vec<String>,
    pub load_on_startup: Option<i32>,
    pub init_params: InitParams,
    pub async_supported: bool,
}

impl WebServletAnnotation {
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
}

/// `@WebFilter`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebFilterAnnotation {
    pub filter_name: Option<String>,
    pub value: Vec<String>,
    pub url_patterns: Vec<String>,
    pub servlet_names: Vec<String>,
    pub dispatcher_types: Vec<DispatcherType>,
    pub init_params: InitParams,
    pub async_supported: bool,
}

impl WebFilterAnnotation {
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
        self.filter_name = Some(name.to_string());
        self
    }

    pub fn with_init_param(mut self, name: &str, value: &str) -> Self {
        self.init_params.insert(name.to_string(), value.to_string());
        self
    }
}

/// One class of a web bundle.
#[derive(Clone)]
pub struct WebClass {
    name: String,
    capability: Capability,
    web_servlet: Option<WebServletAnnotation>,
    web_filter: Option<WebFilterAnnotation>,
    multipart: Option<MultipartConfig>,
}

impl fmt::Debug for WebClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capability = match self.capability {
            Capability::Servlet(_) => "servlet",
            Capability::Filter(_) => "filter",
            Capability::Listener(_) => "listener",
            Capability::None => "none",
        };
        f.debug_struct("WebClass")
            .field("name", &self.name)
            .field("capability", &capability)
            .field("web_servlet", &self.web_servlet)
            .field("web_filter", &self.web_filter)
            .finish()
    }
}

impl WebClass {
    fn with_capability(name: &str, capability: Capability) -> Self {
        Self {
            name: name.to_string(),
            capability,
            web_servlet: None,
            web_filter: None,
            multipart: None,
        }
    }

    /// A class implementing the HTTP servlet contract.
    pub fn servlet<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Servlet> + Send + Sync + 'static,
    {
        Self::with_capability(name, Capability::Servlet(Arc::new(factory)))
    }

    pub fn filter<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Filter> + Send + Sync + 'static,
    {
        Self::with_capability(name, Capability::Filter(Arc::new(factory)))
    }

    pub fn listener<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn EventListener> + Send + Sync + 'static,
    {
        Self::with_capability(name, Capability::Listener(Arc::new(factory)))
    }

    /// A class without any web contract, e.g. a helper.
    pub fn plain(name: &str) -> Self {
        Self::with_capability(name, Capability::None)
    }

    pub fn with_web_servlet(mut self, annotation: WebServletAnnotation) -> Self {
        self.web_servlet = Some(annotation);
        self
    }

    pub fn with_web_filter(mut self, annotation: WebFilterAnnotation) -> Self {
        self.web_filter = Some(annotation);
        self
    }

    /// `@MultipartConfig`
    pub fn with_multipart_config(mut self, config: MultipartConfig) -> Self {
        self.multipart = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_servlet(&self) -> bool {
        matches!(self.capability, Capability::Servlet(_))
    }

    pub fn is_filter(&self) -> bool {
        matches!(self.capability, Capability::Filter(_))
    }

    pub fn is_listener(&self) -> bool {
        matches!(self.capability, Capability::Listener(_))
    }

    pub fn web_servlet(&self) -> Option<&WebServletAnnotation> {
        self.web_servlet.as_ref()
    }

    pub fn web_filter(&self) -> Option<&WebFilterAnnotation> {
        self.web_filter.as_ref()
    }

    pub fn multipart_config(&self) -> Option<&MultipartConfig> {
        self.multipart.as_ref()
    }
}

/// All classes of one bundle, by fully qualified name.
#[derive(Debug, Clone, Default)]
pub struct ClassSpace {
    classes: IndexMap<String, WebClass>,
}

impl ClassSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: WebClass) -> Self {
        self.declare(class);
        self
    }

    /// Declare a class, replacing an earlier one of the same name.
    pub fn declare(&mut self, class: WebClass) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn get(&self, name: &str) -> Option<&WebClass> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes carrying `@WebServlet` or `@WebFilter`, in declaration order.
    pub fn annotated(&self) -> impl Iterator<Item = &WebClass> {
        self.classes
            .values()
            .filter(|c| c.web_servlet.is_some() || c.web_filter.is_some())
    }

    fn lookup(&self, name: &str) -> Result<&WebClass, WebError> {
        self.get(name).ok_or_else(|| {
            WebError::illegal_argument(format!("class {name} is not available in the bundle"))
        })
    }

    pub fn new_servlet(&self, name: &str) -> Result<Arc<dyn Servlet>, WebError> {
        match &self.lookup(name)?.capability {
            Capability::Servlet(factory) => Ok(factory()),
            _ => Err(WebError::illegal_argument(format!("{name} is not a servlet"))),
        }
    }

    pub fn new_filter(&self, name: &str) -> Result<Arc<dyn Filter>, WebError> {
        match &self.lookup(name)?.capability {
            Capability::Filter(factory) => Ok(factory()),
            _ => Err(WebError::illegal_argument(format!("{name} is not a filter"))),
        }
    }

    pub fn new_listener(&self, name: &str) -> Result<Arc<dyn EventListener>, WebError> {
        match &self.lookup(name)?.capability {
            Capability::Listener(factory) => Ok(factory()),
            _ => Err(WebError::illegal_argument(format!("{name} is not an event listener"))),
        }
    }
}
