// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::sync::Arc;

use crate::core::WebError;

use super::{ContextModel, next_id};

/// What an error page handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorPageKey {
    /// An HTTP status code such as 404.
    Code(u16),
    /// A fully qualified exception type name.
    Exception(String),
}

impl ErrorPageKey {
    /// All-digit values are status codes, anything else an exception type.
    pub fn parse(error: &str) -> Result<Self, WebError> {
        let error = error.trim();
        if error.is_empty() {
            return Err(WebError::illegal_argument("error must not be empty"));
        }
        if error.chars().all(|c| c.is_ascii_digit()) {
            let code = error
                .parse::<u16>()
                .ok()
                .filter(|code| (400..600).contains(code))
                .ok_or_else(|| {
                    WebError::illegal_argument(format!("[{error}] is not an error status code"))
                })?;
            return Ok(ErrorPageKey::Code(code));
        }
        Ok(ErrorPageKey::Exception(error.to_string()))
    }
}

impl fmt::Display for ErrorPageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPageKey::Code(code) => write!(f, "{code}"),
            ErrorPageKey::Exception(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorPageModel {
    id: String,
    context: Arc<ContextModel>,
    error: ErrorPageKey,
    location: String,
}

impl ErrorPageModel {
    pub fn new(context: Arc<ContextModel>, error: &str, location: &str) -> Result<Self, WebError> {
        let error = ErrorPageKey::parse(error)?;
        if !location.starts_with('/') {
            return Err(WebError::illegal_argument(format!(
                "error page location [{location}] must start with a slash (/)"
            )));
        }
        Ok(Self {
            id: next_id("error-page"),
            context,
            error,
            location: location.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Arc<ContextModel> {
        &self.context
    }

    pub fn error(&self) -> &ErrorPageKey {
        &self.error
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}
