// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WAR extender – deploys web applications into the registration model.
//!
//! A web application is described by its `WEB-INF/web.xml` plus the
//! `@WebServlet` / `@WebFilter` annotations of the classes it exposes. Both
//! are merged into a [`WebAppModel`], with the descriptor taking precedence,
//! and the [`WebAppDeployer`] registers the result through the bundle's
//! HttpService.


mod class_space;
mod deployer;
mod descriptor;
mod scanner;

pub use class_space::{ClassSpace, WebClass, WebFilterAnnotation, WebServletAnnotation};
pub use deployer::{CONTEXT_PATH_HEADER, WEB_XML, WebAppDeployer, WebAppHttpContext};
pub use descriptor::DescriptorParser;
pub use scanner::{ScanError, WebFilterAnnotationScanner, WebServletAnnotationScanner, scan_class_space};

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use thiserror::Error;

use crate::core::{DispatcherType, InitParams};
use crate::model::MultipartConfig;

/// Errors raised while reading a `web.xml`.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("malformed web.xml: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("root element must be <web-app>, found <{0}>")]
    NotAWebApp(String),

    #[error("<{parent}> is missing <{child}>")]
    MissingElement { parent: String, child: String },

    #[error("invalid value '{value}' for <{element}>")]
    InvalidValue { element: String, value: String },

    #[error("duplicate {element} named '{name}'")]
    Duplicate { element: String, name: String },
}

impl DescriptorError {
    pub(crate) fn missing(parent: &str, child: &str) -> Self {
        DescriptorError::MissingElement {
            parent: parent.to_string(),
            child: child.to_string(),
        }
    }

    pub(crate) fn invalid(element: &str, value: &str) -> Self {
        DescriptorError::InvalidValue {
            element: element.to_string(),
            value: value.to_string(),
        }
    }
}

/// A servlet declared in the descriptor or by annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebAppServlet {
    pub name: String,
    pub class: Option<String>,
    pub init_params: InitParams,
    pub load_on_startup: Option<i32>,
    pub async_supported: bool,
    pub multipart: Option<MultipartConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebAppFilter {
    pub name: String,
    pub class: Option<String>,
    pub init_params: InitParams,
    pub async_supported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebAppServletMapping {
    pub servlet_name: String,
    pub url_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebAppFilterMapping {
    pub filter_name: String,
    pub url_patterns: Vec<String>,
    pub servlet_names: Vec<String>,
    pub dispatcher_types: Vec<DispatcherType>,
}

/// `error` is a status code or an exception type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAppErrorPage {
    pub error: String,
    pub location: String,
}

/// A parsed `web.xml` with annotation-declared elements merged in.
///
/// Servlets and filters are keyed by name. Declaration order is kept for
/// both, and mappings keep the order they were added in.
#[derive(Debug, Clone, Default)]
pub struct WebAppModel {
    pub display_name: Option<String>,
    pub metadata_complete: bool,
    pub context_params: InitParams,
    pub session_timeout: Option<u32>,
    pub listeners: Vec<String>,
    pub error_pages: Vec<WebAppErrorPage>,
    pub welcome_files: Vec<String>,
    pub mime_mappings: BTreeMap<String, String>,
    servlets: IndexMap<String, WebAppServlet>,
    filters: IndexMap<String, WebAppFilter>,
    servlet_mappings: Vec<WebAppServletMapping>,
    filter_mappings: Vec<WebAppFilterMapping>,
    mapped_servlets: HashSet<String>,
    mapped_filters: HashSet<String>,
}

impl WebAppModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a servlet; returns `false` when the name is already taken.
    pub fn add_servlet(&mut self, servlet: WebAppServlet) -> bool {
        if self.servlets.contains_key(&servlet.name) {
            return false;
        }
        self.servlets.insert(servlet.name.clone(), servlet);
        true
    }

    pub fn find_servlet(&self, name: &str) -> Option<&WebAppServlet> {
        self.servlets.get(name)
    }

    pub fn find_servlet_mut(&mut self, name: &str) -> Option<&mut WebAppServlet> {
        self.servlets.get_mut(name)
    }

    pub fn servlets(&self) -> impl Iterator<Item = &WebAppServlet> {
        self.servlets.values()
    }

    /// Add a filter; returns `false` when the name is already taken.
    pub fn add_filter(&mut self, filter: WebAppFilter) -> bool {
        if self.filters.contains_key(&filter.name) {
            return false;
        }
        self.filters.insert(filter.name.clone(), filter);
        true
    }

    pub fn find_filter(&self, name: &str) -> Option<&WebAppFilter> {
        self.filters.get(name)
    }

    pub fn find_filter_mut(&mut self, name: &str) -> Option<&mut WebAppFilter> {
        self.filters.get_mut(name)
    }

    pub fn filters(&self) -> impl Iterator<Item = &WebAppFilter> {
        self.filters.values()
    }

    pub fn add_servlet_mapping(&mut self, mapping: WebAppServletMapping) {
        self.mapped_servlets.insert(mapping.servlet_name.clone());
        self.servlet_mappings.push(mapping);
    }

    pub fn add_filter_mapping(&mut self, mapping: WebAppFilterMapping) {
        self.mapped_filters.insert(mapping.filter_name.clone());
        self.filter_mappings.push(mapping);
    }

    pub fn servlet_mappings(&self) -> &[WebAppServletMapping] {
        &self.servlet_mappings
    }

    pub fn filter_mappings(&self) -> &[WebAppFilterMapping] {
        &self.filter_mappings
    }

    /// Whether `name` has at least one servlet mapping already.
    pub fn has_servlet_mapping(&self, name: &str) -> bool {
        self.mapped_servlets.contains(name)
    }

    /// Whether `name` has at least one filter mapping already.
    pub fn has_filter_mapping(&self, name: &str) -> bool {
        self.mapped_filters.contains(name)
    }

    /// Every URL pattern mapped to servlet `name`, duplicates removed.
    pub fn servlet_url_patterns(&self, name: &str) -> Vec<String> {
        let mut patterns: Vec<String> = Vec::new();
        for mapping in self.servlet_mappings.iter().filter(|m| m.servlet_name == name) {
            for pattern in &mapping.url_patterns {
                if !patterns.contains(pattern) {
                    patterns.push(pattern.clone());
                }
            }
        }
        patterns
    }

    /// The mappings of each mapped filter folded into one, ordered by the
    /// first mapping of each filter.
    pub fn merged_filter_mappings(&self) -> Vec<WebAppFilterMapping> {
        let mut merged: IndexMap<&str, WebAppFilterMapping> = IndexMap::new();
        for mapping in &self.filter_mappings {
            let entry = merged
                .entry(mapping.filter_name.as_str())
                .or_insert_with(|| WebAppFilterMapping {
                    filter_name: mapping.filter_name.clone(),
                    ..WebAppFilterMapping::default()
                });
            extend_unique(&mut entry.url_patterns, &mapping.url_patterns);
            extend_unique(&mut entry.servlet_names, &mapping.servlet_names);
            extend_unique(&mut entry.dispatcher_types, &mapping.dispatcher_types);
        }
        merged.into_values().collect()
    }

    /// Nothing at all is declared.
    pub fn is_empty(&self) -> bool {
        self.servlets.is_empty()
            && self.filters.is_empty()
            && self.listeners.is_empty()
            && self.error_pages.is_empty()
            && self.welcome_files.is_empty()
    }
}

fn extend_unique<T: Clone + PartialEq>(target: &mut Vec<T>, values: &[T]) {
    for value in values {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}
