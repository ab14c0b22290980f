// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed view over the HttpService configuration keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::PathBuf;

use super::{Config, ConfigError};

/// Configuration keys understood by [`WebConfiguration`].
pub mod keys {
    pub const HTTP_ENABLED: &str = "org.osgi.service.http.enabled";
    pub const HTTP_PORT: &str = "org.osgi.service.http.port";
    pub const HTTP_SECURE_ENABLED: &str = "org.osgi.service.http.secure.enabled";
    pub const HTTP_SECURE_PORT: &str = "org.osgi.service.http.port.secure";
    pub const LISTENING_ADDRESSES: &str = "org.ops4j.pax.web.listening.addresses";
    pub const SESSION_TIMEOUT: &str = "org.ops4j.pax.web.session.timeout";
    pub const SESSION_COOKIE: &str = "org.ops4j.pax.web.session.cookie";
    pub const TEMP_DIR: &str = "javax.servlet.context.tempdir";

    pub const SSL_KEYSTORE: &str = "org.ops4j.pax.web.ssl.keystore";
    pub const SSL_KEYSTORE_TYPE: &str = "org.ops4j.pax.web.ssl.keystore.type";
    pub const SSL_PASSWORD: &str = "org.ops4j.pax.web.ssl.password";
    pub const SSL_KEY_PASSWORD: &str = "org.ops4j.pax.web.ssl.keypassword";
    pub const SSL_TRUSTSTORE: &str = "org.ops4j.pax.web.ssl.truststore";
    pub const SSL_TRUSTSTORE_PASSWORD: &str = "org.ops4j.pax.web.ssl.truststore.password";
    pub const SSL_CLIENT_AUTH_WANTED: &str = "org.ops4j.pax.web.ssl.clientauthwanted";
    pub const SSL_CLIENT_AUTH_NEEDED: &str = "org.ops4j.pax.web.ssl.clientauthneeded";
    pub const SSL_PROTOCOLS_INCLUDED: &str = "org.ops4j.pax.web.ssl.protocols.included";
    pub const SSL_PROTOCOLS_EXCLUDED: &str = "org.ops4j.pax.web.ssl.protocols.excluded";
    pub const SSL_CIPHERS_INCLUDED: &str = "org.ops4j.pax.web.ssl.ciphersuites.included";
    pub const SSL_CIPHERS_EXCLUDED: &str = "org.ops4j.pax.web.ssl.ciphersuites.excluded";

    pub const LOG: &str = "org.ops4j.pax.web.log";
}

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTPS_PORT: u16 = 8443;
pub const DEFAULT_SESSION_COOKIE: &str = "JSESSIONID";

/// Keystore settings passed through to connectors that terminate TLS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslConfiguration {
    pub keystore: Option<String>,
    pub keystore_type: Option<String>,
    pub password: Option<String>,
    pub key_password: Option<String>,
    pub truststore: Option<String>,
    pub truststore_password: Option<String>,
    pub client_auth_wanted: bool,
    pub client_auth_needed: bool,
    pub protocols_included: Vec<String>,
    pub protocols_excluded: Vec<String>,
    pub ciphers_included: Vec<String>,
    pub ciphers_excluded: Vec<String>,
}

impl SslConfiguration {
    /// A secure connector needs both the keystore and the key password.
    pub fn has_passwords(&self) -> bool {
        self.password.is_some() && self.key_password.is_some()
    }
}

/// Server-wide settings the controller needs to build a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfiguration {
    pub http_enabled: bool,
    pub http_port: u16,
    pub http_secure_enabled: bool,
    pub http_secure_port: u16,
    pub listening_addresses: Vec<String>,
    pub ssl: SslConfiguration,
    /// Minutes; `None` keeps the engine default.
    pub session_timeout: Option<u32>,
    pub session_cookie: String,
    pub temporary_directory: PathBuf,
}

impl Default for WebConfiguration {
    fn default() -> Self {
        Self {
            http_enabled: true,
            http_port: DEFAULT_HTTP_PORT,
            http_secure_enabled: false,
            http_secure_port: DEFAULT_HTTPS_PORT,
            listening_addresses: vec!["0.0.0.0".to_string()],
            ssl: SslConfiguration::default(),
            session_timeout: None,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            temporary_directory: env::temp_dir(),
        }
    }
}

impl WebConfiguration {
    /// Read every key from `config`, falling back to the defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listening_addresses = string_list(config, keys::LISTENING_ADDRESSES)?
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.listening_addresses);

        let ssl = SslConfiguration {
            keystore: string(config, keys::SSL_KEYSTORE)?,
            keystore_type: string(config, keys::SSL_KEYSTORE_TYPE)?,
            password: string(config, keys::SSL_PASSWORD)?,
            key_password: string(config, keys::SSL_KEY_PASSWORD)?,
            truststore: string(config, keys::SSL_TRUSTSTORE)?,
            truststore_password: string(config, keys::SSL_TRUSTSTORE_PASSWORD)?,
            client_auth_wanted: boolean(config, keys::SSL_CLIENT_AUTH_WANTED)?.unwrap_or(false),
            client_auth_needed: boolean(config, keys::SSL_CLIENT_AUTH_NEEDED)?.unwrap_or(false),
            protocols_included: string_list(config, keys::SSL_PROTOCOLS_INCLUDED)?.unwrap_or_default(),
            protocols_excluded: string_list(config, keys::SSL_PROTOCOLS_EXCLUDED)?.unwrap_or_default(),
            ciphers_included: string_list(config, keys::SSL_CIPHERS_INCLUDED)?.unwrap_or_default(),
            ciphers_excluded: string_list(config, keys::SSL_CIPHERS_EXCLUDED)?.unwrap_or_default(),
        };

        Ok(Self {
            http_enabled: boolean(config, keys::HTTP_ENABLED)?.unwrap_or(defaults.http_enabled),
            http_port: port(config, keys::HTTP_PORT)?.unwrap_or(defaults.http_port),
            http_secure_enabled: boolean(config, keys::HTTP_SECURE_ENABLED)?
                .unwrap_or(defaults.http_secure_enabled),
            http_secure_port: port(config, keys::HTTP_SECURE_PORT)?
                .unwrap_or(defaults.http_secure_port),
            listening_addresses,
            ssl,
            session_timeout: minutes(config, keys::SESSION_TIMEOUT)?,
            session_cookie: string(config, keys::SESSION_COOKIE)?
                .filter(|cookie| !cookie.is_empty())
                .unwrap_or(defaults.session_cookie),
            temporary_directory: string(config, keys::TEMP_DIR)?
                .map(PathBuf::from)
                .unwrap_or(defaults.temporary_directory),
        })
    }

    /// At least one connector must be enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.http_enabled && !self.http_secure_enabled {
            return Err(ConfigError::invalid_value(
                keys::HTTP_ENABLED,
                "neither http nor https is enabled",
            ));
        }
        if self.listening_addresses.is_empty() {
            return Err(ConfigError::invalid_value(
                keys::LISTENING_ADDRESSES,
                "no listening address configured",
            ));
        }
        Ok(())
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn with_listening_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listening_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_session_timeout(mut self, minutes: Option<u32>) -> Self {
        self.session_timeout = minutes;
        self
    }
}

// Values from properties files and env vars arrive as strings or numbers
// depending on how they look, so each reader accepts both.

fn string(config: &Config, key: &str) -> Result<Option<String>, ConfigError> {
    Ok(match config.get_raw(key)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn boolean(config: &Config, key: &str) -> Result<Option<bool>, ConfigError> {
    match config.get_raw(key)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(Some(true)),
            "false" | "no" | "off" => Ok(Some(false)),
            other => Err(ConfigError::invalid_value(key, format!("'{other}' is not a boolean"))),
        },
        Some(other) => Err(ConfigError::invalid_value(key, format!("'{other}' is not a boolean"))),
    }
}

fn number(config: &Config, key: &str) -> Result<Option<u64>, ConfigError> {
    match config.get_raw(key)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid_value(key, format!("'{n}' is not a positive integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::invalid_value(key, format!("'{s}' is not a positive integer"))),
        Some(other) => Err(ConfigError::invalid_value(
            key,
            format!("'{other}' is not a positive integer"),
        )),
    }
}

fn port(config: &Config, key: &str) -> Result<Option<u16>, ConfigError> {
    number(config, key)?
        .map(|n| {
            u16::try_from(n)
                .map_err(|_| ConfigError::invalid_value(key, format!("{n} is not a valid port")))
        })
        .transpose()
}

fn minutes(config: &Config, key: &str) -> Result<Option<u32>, ConfigError> {
    number(config, key)?
        .map(|n| {
            u32::try_from(n)
                .map_err(|_| ConfigError::invalid_value(key, format!("{n} minutes is out of range")))
        })
        .transpose()
}

fn string_list(config: &Config, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    let split = |s: &str| -> Vec<String> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    };
    match config.get_raw(key)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(split(&s))),
        Some(Value::Array(items)) => Ok(Some(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        )),
        Some(other) => Ok(Some(split(&other.to_string()))),
    }
}
