// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::path::extension_of;
use super::{InitParams, WebRequest, WebResponse};

/// A modular unit that registers web elements.
///
/// The resource root stands in for the bundle's own class path: static
/// resources and `WEB-INF/web.xml` are resolved against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    id: u64,
    symbolic_name: String,
    headers: BTreeMap<String, String>,
    root: PathBuf,
}

impl Bundle {
    pub fn new(id: u64, symbolic_name: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            symbolic_name: symbolic_name.to_string(),
            headers: BTreeMap::new(),
            root: root.into(),
        }
    }

    /// Add a manifest header such as `Web-ContextPath`.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a resource name below the bundle root.
    ///
    /// Returns `None` for names escaping the root and for anything that is
    /// not a regular file.
    pub fn resource(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        let candidate = self.root.join(relative);
        candidate.is_file().then_some(candidate)
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.symbolic_name, self.id)
    }
}

/// Per-registration hooks for security, resource lookup and mime types.
///
/// Two registrations share a context exactly when they were given the same
/// `Arc<dyn HttpContext>` instance.
pub trait HttpContext: fmt::Debug + Send + Sync {
    /// Decide whether the request may proceed.
    ///
    /// Returning `false` ends the dispatch; the implementation is expected to
    /// set an appropriate status on the response (401 is used when it does not).
    fn handle_security(&self, _request: &mut WebRequest, _response: &mut WebResponse) -> bool {
        true
    }

    /// Map a resource name to a file.
    fn get_resource(&self, name: &str) -> Option<PathBuf>;

    /// Mime type for a resource name, `None` lets the container decide.
    fn get_mime_type(&self, _name: &str) -> Option<String> {
        None
    }
}

/// The context used when a bundle registers without one: allows every
/// request and serves resources from the bundle root.
#[derive(Debug, Clone)]
pub struct DefaultHttpContext {
    bundle: Arc<Bundle>,
}

impl DefaultHttpContext {
    pub fn new(bundle: Arc<Bundle>) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }
}

impl HttpContext for DefaultHttpContext {
    fn get_resource(&self, name: &str) -> Option<PathBuf> {
        self.bundle.resource(name)
    }
}

/// State shared by every element deployed under one context path.
#[derive(Debug)]
pub struct ServletContext {
    context_path: String,
    init_params: RwLock<InitParams>,
    mime_mappings: RwLock<BTreeMap<String, String>>,
    attributes: RwLock<HashMap<String, Value>>,
}

impl ServletContext {
    pub fn new(context_path: &str) -> Self {
        Self {
            context_path: context_path.to_string(),
            init_params: RwLock::new(InitParams::new()),
            mime_mappings: RwLock::new(BTreeMap::new()),
            attributes: RwLock::new(HashMap::new()),
        }
    }

    /// Context path as seen by applications: empty for the root context.
    pub fn context_path(&self) -> &str {
        if self.context_path == "/" {
            ""
        } else {
            &self.context_path
        }
    }

    pub fn init_parameter(&self, name: &str) -> Option<String> {
        self.init_params.read().get(name).cloned()
    }

    pub fn init_parameters(&self) -> InitParams {
        self.init_params.read().clone()
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.read().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: Value) {
        self.attributes.write().insert(name.to_string(), value);
    }

    pub fn remove_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.write().remove(name)
    }

    /// Mime type from the configured mappings, then from the file extension.
    pub fn mime_type(&self, name: &str) -> Option<String> {
        let ext = extension_of(name)?;
        if let Some(mapped) = self.mime_mappings.read().get(&ext.to_ascii_lowercase()) {
            return Some(mapped.clone());
        }
        mime_guess::from_ext(ext).first().map(|m| m.essence_str().to_string())
    }

    /// Merge params of one more context model; the first value for a name sticks.
    pub(crate) fn merge_init_params(&self, params: &InitParams) {
        let mut current = self.init_params.write();
        for (name, value) in params {
            current.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }

    pub(crate) fn merge_mime_mappings(&self, mappings: &BTreeMap<String, String>) {
        let mut current = self.mime_mappings.write();
        for (ext, mime) in mappings {
            current
                .entry(ext.to_ascii_lowercase())
                .or_insert_with(|| mime.clone());
        }
    }
}
