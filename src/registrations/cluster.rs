// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::path::alias_prefixes;
use crate::core::WebError;
use crate::model::{ContextModel, ServletModel};

use super::{Registration, Registrations};

#[derive(Debug, Default)]
struct ClusterIndex {
    aliases: HashMap<String, Arc<Registration>>,
    patterns: HashMap<String, String>,
    servlets: HashMap<usize, String>,
}

/// Server-wide index over every [`Registrations`].
#[derive(Debug, Default)]
pub struct RegistrationsCluster {
    index: Mutex<ClusterIndex>,
}

fn pattern_key(model: &ServletModel, pattern: &str) -> String {
    format!("{}|{}", model.context().context_path(), pattern)
}

impl RegistrationsCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, empty [`Registrations`] for one context.
    pub fn create_registrations(self: &Arc<Self>, context: Arc<ContextModel>) -> Arc<Registrations> {
        Arc::new(Registrations::new(self.clone(), context))
    }

    /// Release everything a [`Registrations`] still holds.
    pub fn remove_registrations(&self, registrations: &Registrations) {
        registrations.unregister_all();
    }

    /// Reserve alias, patterns and servlet identity, or fail without side effects.
    pub(super) fn claim(&self, registration: &Arc<Registration>) -> Result<(), WebError> {
        let model = registration.model();
        let mut index = self.index.lock();

        let qualified = model.qualified_alias();
        if let Some(alias) = &qualified {
            if index.aliases.contains_key(alias) {
                return Err(WebError::Namespace(format!(
                    "alias [{alias}] is already in use in this or another context"
                )));
            }
        }
        let patterns: Vec<String> = model
            .url_patterns()
            .iter()
            .map(|p| pattern_key(model, p))
            .collect();
        if let Some(taken) = patterns.iter().find(|p| index.patterns.contains_key(*p)) {
            return Err(WebError::Namespace(format!(
                "url pattern [{taken}] is already in use"
            )));
        }
        if index.servlets.contains_key(&model.servlet_key()) {
            return Err(WebError::ServletAlreadyRegistered);
        }

        if let Some(alias) = qualified {
            index.aliases.insert(alias, registration.clone());
        }
        for pattern in patterns {
            index.patterns.insert(pattern, model.id().to_string());
        }
        index
            .servlets
            .insert(model.servlet_key(), model.id().to_string());
        Ok(())
    }

    /// Drop whatever `registration` reserved. Releasing twice is harmless.
    pub(super) fn release(&self, registration: &Registration) {
        let model = registration.model();
        let mut index = self.index.lock();
        if let Some(alias) = model.qualified_alias() {
            let owned = index
                .aliases
                .get(&alias)
                .is_some_and(|r| r.model().id() == model.id());
            if owned {
                index.aliases.remove(&alias);
            }
        }
        for pattern in model.url_patterns() {
            let key = pattern_key(model, pattern);
            if index.patterns.get(&key).is_some_and(|id| id == model.id()) {
                index.patterns.remove(&key);
            }
        }
        let key = model.servlet_key();
        if index.servlets.get(&key).is_some_and(|id| id == model.id()) {
            index.servlets.remove(&key);
        }
    }

    /// Exact lookup of a context-qualified alias.
    pub fn get_by_alias(&self, alias: &str) -> Option<Arc<Registration>> {
        self.index.lock().aliases.get(alias).cloned()
    }

    /// The registration whose qualified alias is the longest prefix of `path`.
    pub fn get_matching_alias(&self, path: &str) -> Option<Arc<Registration>> {
        let index = self.index.lock();
        alias_prefixes(path).find_map(|candidate| index.aliases.get(candidate).cloned())
    }

    pub fn contains_servlet(&self, key: usize) -> bool {
        self.index.lock().servlets.contains_key(&key)
    }
}
