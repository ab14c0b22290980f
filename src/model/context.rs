// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::path::normalize_context_path;
use crate::core::{Bundle, HttpContext, InitParams, WebError, identity};

use super::next_id;

/// One `HttpContext` as used by one bundle, plus the settings of the
/// servlet context it is deployed into.
#[derive(Debug, Clone)]
pub struct ContextModel {
    id: String,
    http_context: Arc<dyn HttpContext>,
    bundle: Arc<Bundle>,
    context_path: String,
    context_params: InitParams,
    session_timeout: Option<u32>,
    virtual_hosts: Vec<String>,
    mime_mappings: BTreeMap<String, String>,
}

impl ContextModel {
    /// A context at the root path `/`.
    pub fn new(http_context: Arc<dyn HttpContext>, bundle: Arc<Bundle>) -> Self {
        Self {
            id: next_id("context"),
            http_context,
            bundle,
            context_path: "/".to_string(),
            context_params: InitParams::new(),
            session_timeout: None,
            virtual_hosts: Vec::new(),
            mime_mappings: BTreeMap::new(),
        }
    }

    pub fn with_context_path(mut self, path: &str) -> Result<Self, WebError> {
        self.set_context_path(path)?;
        Ok(self)
    }

    pub fn with_context_params(mut self, params: InitParams) -> Self {
        self.context_params = params;
        self
    }

    pub fn with_session_timeout(mut self, minutes: Option<u32>) -> Self {
        self.session_timeout = minutes;
        self
    }

    /// Host names this context answers to; empty answers to every host.
    pub fn with_virtual_hosts(mut self, hosts: Vec<String>) -> Self {
        self.virtual_hosts = hosts;
        self
    }

    pub(crate) fn set_context_path(&mut self, path: &str) -> Result<(), WebError> {
        self.context_path = normalize_context_path(path)?;
        Ok(())
    }

    pub(crate) fn set_context_params(&mut self, params: InitParams) {
        self.context_params = params;
    }

    pub(crate) fn set_session_timeout(&mut self, minutes: Option<u32>) {
        self.session_timeout = minutes;
    }

    pub(crate) fn set_virtual_hosts(&mut self, hosts: Vec<String>) {
        self.virtual_hosts = hosts;
    }

    pub(crate) fn set_mime_mappings(&mut self, mappings: BTreeMap<String, String>) {
        self.mime_mappings = mappings;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn http_context(&self) -> &Arc<dyn HttpContext> {
        &self.http_context
    }

    /// Identity of the wrapped `HttpContext`.
    pub fn context_key(&self) -> usize {
        identity(&self.http_context)
    }

    pub fn bundle(&self) -> &Arc<Bundle> {
        &self.bundle
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn context_params(&self) -> &InitParams {
        &self.context_params
    }

    /// Session timeout in minutes, `None` uses the server default.
    pub fn session_timeout(&self) -> Option<u32> {
        self.session_timeout
    }

    pub fn virtual_hosts(&self) -> &[String] {
        &self.virtual_hosts
    }

    pub fn mime_mappings(&self) -> &BTreeMap<String, String> {
        &self.mime_mappings
    }
}

impl fmt::Display for ContextModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContextModel{{id={},path={},bundle={}}}",
            self.id, self.context_path, self.bundle
        )
    }
}
