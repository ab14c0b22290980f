// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pax Web configuration subsystem
//!
//! A running container is configured from an ordered list of
//! [`ConfigProvider`]s; later providers override earlier ones. Typical
//! stacking order looks like this:
//!
//! 1. `PropertiesConfigProvider` – `org.ops4j.pax.web.cfg`
//! 2. `FileConfigProvider` – `pax-web.{toml,json,yaml}`
//! 3. `EnvConfigProvider` – `PAXWEB_ORG_OSGI_SERVICE_HTTP_PORT=8181`
//! 4. *your* provider implementing [`ConfigProvider`]
//!
//! Keys follow the configuration admin PID naming of the HttpService:
//!
//! | key | type | default |
//! |-----|------|---------|
//! | `org.osgi.service.http.enabled`          | bool   | `true` |
//! | `org.osgi.service.http.port`             | u16    | `8080` |
//! | `org.osgi.service.http.secure.enabled`   | bool   | `false` |
//! | `org.osgi.service.http.port.secure`      | u16    | `8443` |
//! | `org.ops4j.pax.web.listening.addresses`  | list   | `0.0.0.0` |
//! | `org.ops4j.pax.web.session.timeout`      | minutes| – |
//! | `org.ops4j.pax.web.session.cookie`       | string | `JSESSIONID` |
//! | `org.ops4j.pax.web.ssl.*`                | –      | see [`SslConfiguration`] |
//! | `javax.servlet.context.tempdir`          | path   | OS temp dir |
//! | `org.ops4j.pax.web.log`                  | object | see `logging::config` |

mod env;
pub mod error;
mod file;
mod properties;
mod web;

#[cfg(test)]
mod tests;

pub use env::EnvConfigProvider;
pub use error::ConfigError;
pub use file::FileConfigProvider;
pub use properties::PropertiesConfigProvider;
pub use web::{SslConfiguration, WebConfiguration, keys};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::fmt::Debug;
use std::sync::Arc;

/// Core configuration provider trait that all configuration sources must implement.
/// This trait is object-safe since it doesn't contain generic methods.
pub trait ConfigProvider: Debug + Send + Sync {
    /// Check if the configuration provider has a value for the given key.
    fn has(&self, key: &str) -> bool;

    /// Get the name of the configuration provider for debugging purposes.
    fn provider_name(&self) -> &str;

    /// Get a raw configuration value by key.
    /// Returns a JSON Value that can be later deserialized into specific types.
    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError>;
}

/// Extension trait for ConfigProvider that provides methods for typed access.
/// This trait is not object-safe because it has generic methods.
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a configuration value by key and deserialize it to the specified type.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                ConfigError::ParseError(format!("failed to deserialize '{key}': {e}"))
            }),
            None => Ok(None),
        }
    }
}

impl<T: ConfigProvider> ConfigProviderExt for T {}

/// Builder for the configuration system.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration provider; it overrides the ones added before.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub(crate) fn with_shared_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> Config {
        Config {
            providers: self.providers,
        }
    }
}

/// Holds all providers and resolves values across them.
#[derive(Debug, Clone)]
pub struct Config {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// A configuration without providers; every key falls back to its default.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Get a raw configuration value.
    pub fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        // Later providers (higher index) override earlier ones
        for provider in self.providers.iter().rev() {
            if provider.has(key) {
                return provider.get_raw(key);
            }
        }
        Ok(None)
    }

    /// Get a configuration value by key, deserialized into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                ConfigError::ParseError(format!("failed to deserialize '{key}': {e}"))
            }),
            None => Ok(None),
        }
    }

    /// Get a configuration value by key with a default fallback value.
    pub fn get_or_default<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get(key)? {
            Some(value) => Ok(value),
            None => Ok(default),
        }
    }

    /// Create a configuration from a single file, picking the provider by
    /// extension (`.cfg`/`.properties` or JSON/TOML/YAML).
    pub fn default_file(file_path: &str) -> Result<Self, ConfigError> {
        let builder = Self::builder();
        let builder = if PropertiesConfigProvider::handles(file_path) {
            builder.with_provider(PropertiesConfigProvider::new(file_path)?)
        } else {
            builder.with_provider(FileConfigProvider::new(file_path)?)
        };
        Ok(builder.build())
    }
}

/// Interpret a textual value (env var, properties entry) as JSON where possible.
pub(crate) fn parse_scalar(value: &str) -> Value {
    if let Ok(json_value) = serde_json::from_str(value) {
        return json_value;
    }
    if value.eq_ignore_ascii_case("true") {
        return json!(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return json!(false);
    }
    if let Ok(int_val) = value.parse::<i64>() {
        return json!(int_val);
    }
    if let Ok(float_val) = value.parse::<f64>() {
        return json!(float_val);
    }
    json!(value)
}
