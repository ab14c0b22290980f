// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the configuration module.

use std::fmt;
use std::io;
use thiserror::Error;

/// Errors that can occur while loading or interpreting configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value could not be deserialized into the requested type.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A value was read but is not acceptable for its key.
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// An IO error occurred (e.g., while reading a configuration file).
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// An error related to a specific configuration provider.
    #[error("provider error: {provider}: {message}")]
    ProviderError { provider: String, message: String },
}

impl ConfigError {
    /// Create a new provider error.
    pub fn provider_error<P: fmt::Display, M: fmt::Display>(provider: P, message: M) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value<M: fmt::Display>(key: &str, message: M) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_parse_error_message() {
        let error = ConfigError::ParseError("invalid JSON".to_string());
        assert_eq!(error.to_string(), "failed to parse configuration: invalid JSON");
    }

    #[test]
    fn test_invalid_value_message() {
        let error = ConfigError::invalid_value("org.osgi.service.http.port", "expected a port number");
        assert_eq!(
            error.to_string(),
            "invalid value for 'org.osgi.service.http.port': expected a port number"
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let error: ConfigError = IoError::new(ErrorKind::PermissionDenied, "access denied").into();
        match &error {
            ConfigError::IoError(e) => assert_eq!(e.kind(), ErrorKind::PermissionDenied),
            _ => panic!("Expected IoError variant"),
        }
        assert_eq!(error.source().unwrap().to_string(), "access denied");
    }

    #[test]
    fn test_provider_error_constructor() {
        let error = ConfigError::provider_error("properties", "unterminated line");
        assert_eq!(error.to_string(), "provider error: properties: unterminated line");
        assert!(error.source().is_none());
    }
}
