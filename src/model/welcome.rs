// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::core::WebError;

use super::{ContextModel, next_id};

/// Files tried, in order, for requests ending in `/`.
#[derive(Debug, Clone)]
pub struct WelcomeFileModel {
    id: String,
    context: Arc<ContextModel>,
    files: Vec<String>,
    redirect: bool,
}

impl WelcomeFileModel {
    pub fn new(context: Arc<ContextModel>, files: Vec<String>, redirect: bool) -> Result<Self, WebError> {
        let files: Vec<String> = files
            .into_iter()
            .map(|f| f.trim().trim_start_matches('/').to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if files.is_empty() {
            return Err(WebError::illegal_argument(
                "at least one welcome file is required",
            ));
        }
        Ok(Self {
            id: next_id("welcome-files"),
            context,
            files,
            redirect,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Arc<ContextModel> {
        &self.context
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Redirect the client instead of forwarding internally.
    pub fn redirect(&self) -> bool {
        self.redirect
    }
}
