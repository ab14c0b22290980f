// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment variable-based configuration provider implementation.

use serde_json::Value;
use std::collections::HashMap;
use std::env;

use super::{ConfigError, ConfigProvider, parse_scalar};

/// Configuration provider that retrieves values from environment variables.
///
/// `PAXWEB_ORG_OSGI_SERVICE_HTTP_PORT=8181` is visible as
/// `org.osgi.service.http.port`.
#[derive(Debug)]
pub struct EnvConfigProvider {
    /// Prefix for environment variables (e.g., "PAXWEB_").
    prefix: String,
    /// Cache of environment variables that match the prefix.
    cache: HashMap<String, String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable configuration provider with the specified prefix.
    pub fn new(prefix: &str) -> Self {
        let mut provider = Self {
            prefix: prefix.to_string(),
            cache: HashMap::new(),
        };
        provider.refresh_cache();
        provider
    }

    /// Refresh the cache of environment variables.
    pub fn refresh_cache(&mut self) {
        self.cache.clear();

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(&self.prefix) {
                // PAXWEB_SESSION_TIMEOUT -> session.timeout
                let config_key = stripped.to_lowercase().replace('_', ".");
                self.cache.insert(config_key, value);
            }
        }
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new("PAXWEB_")
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "env"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.cache.get(key).map(|value| parse_scalar(value)))
    }
}
