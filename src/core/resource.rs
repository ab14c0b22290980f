// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static resources served through the request's [`HttpContext`].
//!
//! [`HttpContext`]: super::HttpContext

use async_trait::async_trait;
use hyper::Method;
use log::{debug, trace};

use super::{RequestScope, Servlet, ServletError, WebRequest, WebResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mapping {
    /// Registered under an alias; the path info is appended to the base name.
    Alias,
    /// Registered as the default servlet; the whole context-relative path is
    /// appended to the base name.
    Default,
}

/// Servlet serving files looked up with `HttpContext::get_resource`.
#[derive(Debug, Clone)]
pub struct ResourceServlet {
    base: String,
    mapping: Mapping,
}

impl ResourceServlet {
    /// Resources registered with `register_resources(alias, name)`.
    pub fn for_alias(name: &str) -> Self {
        Self {
            base: base_name(name),
            mapping: Mapping::Alias,
        }
    }

    /// A default servlet serving the context's resources below `base`.
    pub fn default_servlet(base: &str) -> Self {
        Self {
            base: base_name(base),
            mapping: Mapping::Default,
        }
    }

    /// The resource name a request resolves to.
    pub fn resource_name(&self, scope: &RequestScope) -> String {
        let path_info = scope.path_info().unwrap_or("");
        match self.mapping {
            Mapping::Alias => format!("{}{}", self.base, path_info),
            Mapping::Default => format!("{}{}{}", self.base, scope.servlet_path(), path_info),
        }
    }

    /// Whether the request would be served with content.
    pub fn exists(&self, scope: &RequestScope) -> bool {
        let name = self.resource_name(scope);
        !name.ends_with('/') && scope.http_context().get_resource(&name).is_some()
    }
}

fn base_name(name: &str) -> String {
    if name == "/" {
        String::new()
    } else {
        name.to_string()
    }
}

#[async_trait]
impl Servlet for ResourceServlet {
    async fn service(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ServletError> {
        if request.method() != Method::GET && request.method() != Method::HEAD {
            response.set_header("Allow", "GET, HEAD")?;
            response.send_error(405, None);
            return Ok(());
        }
        let Some(scope) = request.scope() else {
            response.send_error(404, None);
            return Ok(());
        };
        let name = self.resource_name(scope);
        trace!("Resolving resource '{}'", name);
        let file = if name.ends_with('/') {
            None
        } else {
            scope.http_context().get_resource(&name)
        };
        let Some(file) = file else {
            debug!("Resource '{}' not found", name);
            response.send_error(404, None);
            return Ok(());
        };

        let content = tokio::fs::read(&file).await?;
        let mime = scope
            .http_context()
            .get_mime_type(&name)
            .or_else(|| scope.servlet_context().mime_type(&name));
        if let Some(mime) = mime {
            response.set_content_type(&mime);
        }
        if request.method() != Method::HEAD {
            response.write(&content);
        }
        Ok(())
    }
}
