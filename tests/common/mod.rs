// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common test utilities and helpers for Pax Web integration tests.

use async_trait::async_trait;
use paxweb::config::{ConfigError, ConfigProvider, keys};
use paxweb::{PaxWeb, Servlet, ServletError, WebRequest, WebResponse};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

/// Binds the embedded server to an ephemeral loopback port.
#[derive(Debug, Clone)]
pub struct TestConfigProvider {
    values: HashMap<String, Value>,
}

#[allow(dead_code)]
impl TestConfigProvider {
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(keys::HTTP_PORT.to_string(), json!(0));
        values.insert(keys::LISTENING_ADDRESSES.to_string(), json!("127.0.0.1"));
        Self { values }
    }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

impl ConfigProvider for TestConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "test"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

/// A configured, not yet started container.
pub fn pax_web() -> PaxWeb {
    PaxWeb::loader()
        .with_provider(TestConfigProvider::new())
        .build()
        .expect("pax web builds")
}

/// `http://host:port` of a started container.
pub fn base_url(pax: &PaxWeb) -> String {
    let addr = pax.local_addresses()[0];
    format!("http://{addr}")
}

/// Writes `files` (relative path, content) below a fresh directory.
pub fn bundle_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (path, content) in files {
        let target = dir.path().join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("parent directories");
        }
        fs::write(&target, content).expect("bundle file");
    }
    dir
}

/// Answers every request with the classic greeting.
#[derive(Debug, Default)]
pub struct HelloWorldServlet;

#[async_trait]
impl Servlet for HelloWorldServlet {
    async fn service(&self, _request: &mut WebRequest, response: &mut WebResponse) -> Result<(), ServletError> {
        response.set_content_type("text/html");
        response.write_str("<h1>Hello World</h1>");
        Ok(())
    }
}

/// Always fails with an application exception.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct FailingServlet;

#[async_trait]
impl Servlet for FailingServlet {
    async fn service(&self, _request: &mut WebRequest, _response: &mut WebResponse) -> Result<(), ServletError> {
        Err(ServletError::of_type("java.lang.IllegalStateException", "boom"))
    }
}
