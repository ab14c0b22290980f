// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Merging of `@WebServlet` / `@WebFilter` declarations.
//!
//! The descriptor always wins. An annotation only creates an element the
//! descriptor does not know; for a known element it adds init params the
//! descriptor did not set and, when the descriptor has no mapping for the
//! name, its mapping.

use log::{debug, warn};
use thiserror::Error;

use crate::core::InitParams;

use super::{
    ClassSpace, WebAppFilter, WebAppFilterMapping, WebAppModel, WebAppServlet,
    WebAppServletMapping, WebClass,
};

/// Why an annotated class was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("{0} carries no matching annotation")]
    NotAnnotated(String),

    #[error("{class} does not implement the {contract} contract")]
    WrongContract { class: String, contract: &'static str },

    #[error("{0} sets both value and urlPatterns")]
    ConflictingPatterns(String),

    #[error("{0} declares no url patterns")]
    NoPatterns(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebServletAnnotationScanner;

impl WebServletAnnotationScanner {
    pub fn scan(&self, class: &WebClass, web_app: &mut WebAppModel) -> Result<(), ScanError> {
        let annotation = class
            .web_servlet()
            .ok_or_else(|| ScanError::NotAnnotated(class.name().to_string()))?;
        if !class.is_servlet() {
            return Err(ScanError::WrongContract {
                class: class.name().to_string(),
                contract: "HttpServlet",
            });
        }
        let patterns = match (annotation.value.is_empty(), annotation.url_patterns.is_empty()) {
            (false, false) => return Err(ScanError::ConflictingPatterns(class.name().to_string())),
            (true, true) => return Err(ScanError::NoPatterns(class.name().to_string())),
            (false, true) => annotation.value.clone(),
            (true, false) => annotation.url_patterns.clone(),
        };
        let name = annotation
            .name
            .clone()
            .unwrap_or_else(|| class.name().to_string());

        match web_app.find_servlet_mut(&name) {
            None => {
                debug!("Adding annotated servlet {} ({})", name, class.name());
                web_app.add_servlet(WebAppServlet {
                    name: name.clone(),
                    class: Some(class.name().to_string()),
                    init_params: annotation.init_params.clone(),
                    load_on_startup: annotation.load_on_startup,
                    async_supported: annotation.async_supported,
                    multipart: class.multipart_config().cloned(),
                });
            }
            Some(servlet) => {
                debug!("Servlet {} is declared in web.xml, merging annotation", name);
                merge_init_params(&mut servlet.init_params, &annotation.init_params);
                if servlet.multipart.is_none() {
                    servlet.multipart = class.multipart_config().cloned();
                }
            }
        }

        if web_app.has_servlet_mapping(&name) {
            debug!("web.xml maps servlet {}, ignoring annotated patterns", name);
        } else {
            web_app.add_servlet_mapping(WebAppServletMapping {
                servlet_name: name,
                url_patterns: patterns,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebFilterAnnotationScanner;

impl WebFilterAnnotationScanner {
    pub fn scan(&self, class: &WebClass, web_app: &mut WebAppModel) -> Result<(), ScanError> {
        let annotation = class
            .web_filter()
            .ok_or_else(|| ScanError::NotAnnotated(class.name().to_string()))?;
        if !class.is_filter() {
            return Err(ScanError::WrongContract {
                class: class.name().to_string(),
                contract: "Filter",
            });
        }
        if !annotation.value.is_empty() && !annotation.url_patterns.is_empty() {
            return Err(ScanError::ConflictingPatterns(class.name().to_string()));
        }
        let url_patterns = if annotation.value.is_empty() {
            annotation.url_patterns.clone()
        } else {
            annotation.value.clone()
        };
        let name = annotation
            .filter_name
            .clone()
            .unwrap_or_else(|| class.name().to_string());

        match web_app.find_filter_mut(&name) {
            None => {
                debug!("Adding annotated filter {} ({})", name, class.name());
                web_app.add_filter(WebAppFilter {
                    name: name.clone(),
                    class: Some(class.name().to_string()),
                    init_params: annotation.init_params.clone(),
                    async_supported: annotation.async_supported,
                });
            }
            Some(filter) => {
                debug!("Filter {} is declared in web.xml, merging annotation", name);
                merge_init_params(&mut filter.init_params, &annotation.init_params);
            }
        }

        if web_app.has_filter_mapping(&name) {
            debug!("web.xml maps filter {}, ignoring annotated mapping", name);
        } else if url_patterns.is_empty() && annotation.servlet_names.is_empty() {
            warn!("Filter {} declares neither url patterns nor servlet names", name);
        } else {
            web_app.add_filter_mapping(WebAppFilterMapping {
                filter_name: name,
                url_patterns,
                servlet_names: annotation.servlet_names.clone(),
                dispatcher_types: annotation.dispatcher_types.clone(),
            });
        }
        Ok(())
    }
}

/// Additive; a parameter already present keeps its value.
fn merge_init_params(target: &mut InitParams, annotated: &InitParams) {
    for (name, value) in annotated {
        target
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Run both scanners over every annotated class. Rejected classes are
/// logged and skipped; the number of merged declarations is returned.
pub fn scan_class_space(classes: &ClassSpace, web_app: &mut WebAppModel) -> usize {
    let mut merged = 0;
    for class in classes.annotated() {
        if class.web_servlet().is_some() {
            match WebServletAnnotationScanner.scan(class, web_app) {
                Ok(()) => merged += 1,
                Err(e) => warn!("Skipping @WebServlet on {}: {}", class.name(), e),
            }
        }
        if class.web_filter().is_some() {
            match WebFilterAnnotationScanner.scan(class, web_app) {
                Ok(()) => merged += 1,
                Err(e) => warn!("Skipping @WebFilter on {}: {}", class.name(), e),
            }
        }
    }
    merged
}
