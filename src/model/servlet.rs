// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::path::{UrlPattern, qualify, validate_alias};
use crate::core::{InitParams, ResourceServlet, Servlet, WebError, identity};

use super::{ContextModel, next_id};

/// Init param that names a servlet registered through the HttpService API.
pub const SERVLET_NAME_PARAM: &str = "servlet-name";

/// Multipart upload limits of a servlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartConfig {
    pub location: Option<String>,
    pub max_file_size: i64,
    pub max_request_size: i64,
    pub file_size_threshold: i64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            location: None,
            max_file_size: -1,
            max_request_size: -1,
            file_size_threshold: 0,
        }
    }
}

/// Marks a servlet model as serving static resources below `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceModel {
    name: String,
}

impl ResourceModel {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A servlet registered under an alias or a set of URL patterns.
#[derive(Debug, Clone)]
pub struct ServletModel {
    id: String,
    context: Arc<ContextModel>,
    servlet: Arc<dyn Servlet>,
    name: String,
    alias: Option<String>,
    url_patterns: Vec<String>,
    init_params: InitParams,
    load_on_startup: Option<i32>,
    async_supported: bool,
    multipart: Option<MultipartConfig>,
    resource: Option<ResourceModel>,
}

impl ServletModel {
    /// HttpService style registration: the alias covers itself and
    /// everything below it.
    pub fn with_alias(
        context: Arc<ContextModel>,
        servlet: Arc<dyn Servlet>,
        alias: &str,
        init_params: InitParams,
    ) -> Result<Self, WebError> {
        validate_alias(alias)?;
        let pattern = if alias == "/" {
            "/*".to_string()
        } else {
            format!("{alias}/*")
        };
        let id = next_id("servlet");
        let name = init_params
            .get(SERVLET_NAME_PARAM)
            .cloned()
            .unwrap_or_else(|| id.clone());
        Ok(Self {
            id,
            context,
            servlet,
            name,
            alias: Some(alias.to_string()),
            url_patterns: vec![pattern],
            init_params,
            load_on_startup: None,
            async_supported: false,
            multipart: None,
            resource: None,
        })
    }

    /// WebContainer style registration with explicit URL patterns.
    pub fn with_url_patterns(
        context: Arc<ContextModel>,
        servlet: Arc<dyn Servlet>,
        name: Option<&str>,
        url_patterns: Vec<String>,
        init_params: InitParams,
    ) -> Result<Self, WebError> {
        if url_patterns.is_empty() {
            return Err(WebError::illegal_argument(
                "at least one url pattern is required",
            ));
        }
        for pattern in &url_patterns {
            UrlPattern::parse(pattern)?;
        }
        let id = next_id("servlet");
        let name = name
            .map(str::to_string)
            .or_else(|| init_params.get(SERVLET_NAME_PARAM).cloned())
            .unwrap_or_else(|| id.clone());
        Ok(Self {
            id,
            context,
            servlet,
            name,
            alias: None,
            url_patterns,
            init_params,
            load_on_startup: None,
            async_supported: false,
            multipart: None,
            resource: None,
        })
    }

    /// Static resources below `name`, served under `alias`.
    pub fn resources(context: Arc<ContextModel>, alias: &str, name: &str) -> Result<Self, WebError> {
        if name.len() > 1 && name.ends_with('/') {
            return Err(WebError::illegal_argument(format!(
                "name [{name}] ends with a slash (/)"
            )));
        }
        let servlet: Arc<dyn Servlet> = Arc::new(ResourceServlet::for_alias(name));
        let mut model = Self::with_alias(context, servlet, alias, InitParams::new())?;
        model.resource = Some(ResourceModel {
            name: name.to_string(),
        });
        Ok(model)
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

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Arc<ContextModel> {
        &self.context
    }

    pub fn servlet(&self) -> &Arc<dyn Servlet> {
        &self.servlet
    }

    /// Identity of the servlet instance.
    pub fn servlet_key(&self) -> usize {
        identity(&self.servlet)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Alias prefixed with the context path; unique within a cluster.
    pub fn qualified_alias(&self) -> Option<String> {
        self.alias
            .as_deref()
            .map(|alias| qualify(self.context.context_path(), alias))
    }

    /// URL patterns the servlet is mapped to inside its context.
    pub fn url_patterns(&self) -> &[String] {
        &self.url_patterns
    }

    pub fn init_params(&self) -> &InitParams {
        &self.init_params
    }

    pub fn load_on_startup(&self) -> Option<i32> {
        self.load_on_startup
    }

    pub fn async_supported(&self) -> bool {
        self.async_supported
    }

    pub fn multipart(&self) -> Option<&MultipartConfig> {
        self.multipart.as_ref()
    }

    pub fn resource(&self) -> Option<&ResourceModel> {
        self.resource.as_ref()
    }
}

impl fmt::Display for ServletModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServletModel{{id={},name={},patterns={:?},context={}}}",
            self.id,
            self.name,
            self.url_patterns,
            self.context.id()
        )
    }
}
