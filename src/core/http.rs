// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request and response types seen by servlets and filters.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::{HeaderMap, Method};
use log::warn;
use serde_json::Value;

use super::{
    DispatcherType, EventListener, HttpContext, HttpSession, ServletContext, ServletError,
    SessionStore,
};
use crate::model::ContextModel;

/// Where a dispatch landed: the context, the servlet and the split of the
/// request path into servlet path and path info.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub(crate) context: Arc<ContextModel>,
    pub(crate) servlet_context: Arc<ServletContext>,
    pub(crate) servlet_name: Option<String>,
    pub(crate) servlet_path: String,
    pub(crate) path_info: Option<String>,
}

impl RequestScope {
    pub fn context_model(&self) -> &Arc<ContextModel> {
        &self.context
    }

    pub fn http_context(&self) -> &Arc<dyn HttpContext> {
        self.context.http_context()
    }

    pub fn servlet_context(&self) -> &Arc<ServletContext> {
        &self.servlet_context
    }

    pub fn servlet_name(&self) -> Option<&str> {
        self.servlet_name.as_deref()
    }

    pub fn servlet_path(&self) -> &str {
        &self.servlet_path
    }

    pub fn path_info(&self) -> Option<&str> {
        self.path_info.as_deref()
    }
}

/// Session plumbing attached to a request by the dispatcher.
#[derive(Debug)]
pub(crate) struct SessionAccess {
    store: Arc<SessionStore>,
    listeners: Arc<Vec<Arc<dyn EventListener>>>,
    requested_id: Option<String>,
    current: Option<Arc<HttpSession>>,
    created: bool,
}

impl SessionAccess {
    pub(crate) fn new(
        store: Arc<SessionStore>,
        listeners: Arc<Vec<Arc<dyn EventListener>>>,
        requested_id: Option<String>,
    ) -> Self {
        Self {
            store,
            listeners,
            requested_id,
            current: None,
            created: false,
        }
    }
}

/// An incoming request, fully buffered.
#[derive(Debug)]
pub struct WebRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    attributes: HashMap<String, Value>,
    dispatcher_type: DispatcherType,
    scope: Option<RequestScope>,
    session: Option<SessionAccess>,
}

impl WebRequest {
    /// Create a request for a decoded path such as `/war/wc`.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            attributes: HashMap::new(),
            dispatcher_type: DispatcherType::Request,
            scope: None,
            session: None,
        }
    }

    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query.filter(|q| !q.is_empty()).map(str::to_string);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full decoded request path, including the context path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn dispatcher_type(&self) -> DispatcherType {
        self.dispatcher_type
    }

    pub fn scope(&self) -> Option<&RequestScope> {
        self.scope.as_ref()
    }

    pub fn context_path(&self) -> &str {
        self.scope
            .as_ref()
            .map_or("", |s| s.servlet_context.context_path())
    }

    pub fn servlet_path(&self) -> &str {
        self.scope.as_ref().map_or("", |s| s.servlet_path.as_str())
    }

    pub fn path_info(&self) -> Option<&str> {
        self.scope.as_ref().and_then(|s| s.path_info.as_deref())
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// First value of a query parameter, percent-decoded.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            (key == name).then(|| decode_component(value))
        })
    }

    /// The session of this request, created on demand when `create` is set.
    ///
    /// Returns `None` when the request is not dispatched inside a context.
    pub fn session(&mut self, create: bool) -> Option<Arc<HttpSession>> {
        let access = self.session.as_mut()?;
        if let Some(current) = access.current.as_ref().filter(|s| s.is_valid()) {
            return Some(current.clone());
        }
        if let Some(id) = access.requested_id.take() {
            if let Some(found) = access.store.find(&id, &access.listeners) {
                access.current = Some(found.clone());
                return Some(found);
            }
        }
        if !create {
            return None;
        }
        let created = access.store.create(&access.listeners);
        access.current = Some(created.clone());
        access.created = true;
        Some(created)
    }

    pub(crate) fn set_scope(&mut self, scope: RequestScope) {
        self.scope = Some(scope);
    }

    pub(crate) fn set_dispatcher_type(&mut self, dispatcher_type: DispatcherType) {
        self.dispatcher_type = dispatcher_type;
    }

    pub(crate) fn attach_sessions(&mut self, access: SessionAccess) {
        self.session = Some(access);
    }

    /// Cookie name and id of a session created while serving this request.
    pub(crate) fn new_session_cookie(&self) -> Option<(String, String)> {
        let access = self.session.as_ref()?;
        let session = access.current.as_ref().filter(|_| access.created)?;
        Some((access.store.cookie_name().to_string(), session.id().to_string()))
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// The response a servlet writes into.
#[derive(Debug, Clone)]
pub struct WebResponse {
    status: u16,
    headers: HeaderMap,
    body: BytesMut,
    error: Option<(u16, Option<String>)>,
}

impl Default for WebResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl WebResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            error: None,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a header, replacing existing values.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ServletError> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a header value.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), ServletError> {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                self.headers.insert(header::CONTENT_TYPE, value);
            }
            Err(e) => warn!("Ignoring invalid content type '{}': {}", content_type, e),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn reset_body(&mut self) {
        self.body.clear();
    }

    /// Flag the response as an error; the container renders the matching
    /// error page, or a plain error body when there is none.
    pub fn send_error(&mut self, status: u16, message: Option<&str>) {
        self.status = status;
        self.body.clear();
        self.error = Some((status, message.map(str::to_string)));
    }

    pub fn send_redirect(&mut self, location: &str) {
        self.status = 302;
        self.body.clear();
        match HeaderValue::from_str(location) {
            Ok(value) => {
                self.headers.insert(header::LOCATION, value);
            }
            Err(e) => warn!("Ignoring invalid redirect location '{}': {}", location, e),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<(u16, Option<&str>)> {
        self.error
            .as_ref()
            .map(|(status, message)| (*status, message.as_deref()))
    }

    pub(crate) fn take_error(&mut self) -> Option<(u16, Option<String>)> {
        self.error.take()
    }

    /// Write the container's own error body.
    pub(crate) fn render_error_body(&mut self, status: u16, message: Option<&str>) {
        self.status = status;
        self.body.clear();
        self.error = None;
        self.set_content_type("text/html;charset=utf-8");
        let message = message.unwrap_or_else(|| reason_phrase(status));
        self.write_str(&format!(
            "<html><head><title>Error {status}</title></head><body><h2>HTTP ERROR {status}</h2><p>{message}</p></body></html>"
        ));
    }

    pub fn into_parts(self) -> (u16, HeaderMap, Bytes) {
        (self.status, self.headers, self.body.freeze())
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ServletError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ServletError::new(format!("invalid header name '{name}': {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| ServletError::new(format!("invalid header value '{value}': {e}")))?;
    Ok((name, value))
}

fn reason_phrase(status: u16) -> &'static str {
    hyper::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Error")
}
