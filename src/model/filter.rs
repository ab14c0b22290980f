// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::sync::Arc;

use crate::core::path::UrlPattern;
use crate::core::{DispatcherType, Filter, InitParams, WebError, identity};

use super::{ContextModel, next_id};

/// Init param that names a filter registered through the HttpService API.
pub const FILTER_NAME_PARAM: &str = "filter-name";

/// A filter mapped to URL patterns and/or servlet names.
#[derive(Debug, Clone)]
pub struct FilterModel {
    id: String,
    context: Arc<ContextModel>,
    filter: Arc<dyn Filter>,
    name: String,
    url_patterns: Vec<String>,
    parsed_patterns: Vec<UrlPattern>,
    servlet_names: Vec<String>,
    dispatcher_types: Vec<DispatcherType>,
    init_params: InitParams,
}

impl FilterModel {
    /// Requires at least one URL pattern or servlet name. Without explicit
    /// dispatcher types the filter applies to `REQUEST` dispatches.
    pub fn new(
        context: Arc<ContextModel>,
        filter: Arc<dyn Filter>,
        name: Option<&str>,
        url_patterns: Vec<String>,
        servlet_names: Vec<String>,
        dispatcher_types: Vec<DispatcherType>,
        init_params: InitParams,
    ) -> Result<Self, WebError> {
        if url_patterns.is_empty() && servlet_names.is_empty() {
            return Err(WebError::illegal_argument(
                "a filter needs at least one url pattern or servlet name",
            ));
        }
        let parsed_patterns = url_patterns
            .iter()
            .map(|p| UrlPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        let dispatcher_types = if dispatcher_types.is_empty() {
            vec![DispatcherType::Request]
        } else {
            dispatcher_types
        };
        let id = next_id("filter");
        let name = name
            .map(str::to_string)
            .or_else(|| init_params.get(FILTER_NAME_PARAM).cloned())
            .unwrap_or_else(|| id.clone());
        Ok(Self {
            id,
            context,
            filter,
            name,
            url_patterns,
            parsed_patterns,
            servlet_names,
            dispatcher_types,
            init_params,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Arc<ContextModel> {
        &self.context
    }

    pub fn filter(&self) -> &Arc<dyn Filter> {
        &self.filter
    }

    pub fn filter_key(&self) -> usize {
        identity(&self.filter)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_patterns(&self) -> &[String] {
        &self.url_patterns
    }

    pub fn servlet_names(&self) -> &[String] {
        &self.servlet_names
    }

    pub fn dispatcher_types(&self) -> &[DispatcherType] {
        &self.dispatcher_types
    }

    pub fn init_params(&self) -> &InitParams {
        &self.init_params
    }

    /// Whether the filter takes part in a dispatch of `path` (context
    /// relative) that resolved to `servlet_name`.
    pub fn applies_to(
        &self,
        dispatcher_type: DispatcherType,
        path: &str,
        servlet_name: Option<&str>,
    ) -> bool {
        if !self.dispatcher_types.contains(&dispatcher_type) {
            return false;
        }
        let by_name = servlet_name.is_some_and(|name| {
            self.servlet_names.iter().any(|n| n == "*" || n == name)
        });
        by_name || self.parsed_patterns.iter().any(|p| p.matches(path))
    }
}

impl fmt::Display for FilterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilterModel{{id={},name={},patterns={:?},servlets={:?}}}",
            self.id, self.name, self.url_patterns, self.servlet_names
        )
    }
}
