// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Alias bookkeeping.
//!
//! A [`Registrations`] owns the servlet and resource registrations of one
//! context. All of them share a [`RegistrationsCluster`], an index over every
//! registration of the server, which enforces that an alias (qualified with
//! its context path) and a servlet instance are registered at most once.


mod cluster;

pub use cluster::RegistrationsCluster;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use parking_lot::Mutex;

use crate::controller::ServerController;
use crate::core::path::{alias_prefixes, validate_alias};
use crate::core::{InitParams, RegistrationStatus, Servlet, WebError};
use crate::model::{ContextModel, ServletModel};

/// A servlet or resource registration, owned by exactly one [`Registrations`].
#[derive(Debug)]
pub struct Registration {
    model: Arc<ServletModel>,
}

impl Registration {
    fn new(model: Arc<ServletModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<ServletModel> {
        &self.model
    }

    pub fn alias(&self) -> Option<&str> {
        self.model.alias()
    }

    /// Apply the registration to the server (live when started).
    pub fn register(&self, controller: &ServerController) -> Result<RegistrationStatus, WebError> {
        controller.add_servlet(&self.model)
    }

    /// Take the registration out of the server.
    pub fn unregister(&self, controller: &ServerController) -> Result<(), WebError> {
        controller.remove_servlet(&self.model)
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registration{{{}}}", self.model)
    }
}

#[derive(Debug, Default)]
struct LocalIndex {
    by_id: IndexMap<String, Arc<Registration>>,
    by_alias: HashMap<String, Arc<Registration>>,
}

/// The registrations of one context.
#[derive(Debug)]
pub struct Registrations {
    cluster: Arc<RegistrationsCluster>,
    context: Arc<ContextModel>,
    index: Mutex<LocalIndex>,
}

impl Registrations {
    pub(crate) fn new(cluster: Arc<RegistrationsCluster>, context: Arc<ContextModel>) -> Self {
        Self {
            cluster,
            context,
            index: Mutex::new(LocalIndex::default()),
        }
    }

    pub fn context(&self) -> &Arc<ContextModel> {
        &self.context
    }

    /// Register a servlet under an alias.
    pub fn register_servlet(
        &self,
        alias: &str,
        servlet: Arc<dyn Servlet>,
        init_params: InitParams,
    ) -> Result<Arc<Registration>, WebError> {
        validate_alias(alias)?;
        let model = ServletModel::with_alias(self.context.clone(), servlet, alias, init_params)?;
        self.store(model)
    }

    /// Register static resources below `name` under an alias.
    pub fn register_resources(&self, alias: &str, name: &str) -> Result<Arc<Registration>, WebError> {
        validate_alias(alias)?;
        let model = ServletModel::resources(self.context.clone(), alias, name)?;
        self.store(model)
    }

    /// Register a servlet described by a prepared model (URL patterns).
    pub fn register_servlet_model(&self, model: ServletModel) -> Result<Arc<Registration>, WebError> {
        if !Arc::ptr_eq(model.context(), &self.context) {
            return Err(WebError::illegal_argument(
                "servlet model belongs to another context",
            ));
        }
        self.store(model)
    }

    fn store(&self, model: ServletModel) -> Result<Arc<Registration>, WebError> {
        let registration = Arc::new(Registration::new(Arc::new(model)));
        let mut index = self.index.lock();
        // the cluster sees every context, so it is asked first
        self.cluster.claim(&registration)?;
        if let Some(alias) = registration.alias() {
            if index.by_alias.contains_key(alias) {
                self.cluster.release(&registration);
                return Err(WebError::Namespace(format!(
                    "alias [{alias}] is already in use"
                )));
            }
            index
                .by_alias
                .insert(alias.to_string(), registration.clone());
        }
        index
            .by_id
            .insert(registration.model.id().to_string(), registration.clone());
        debug!("Registered {}", registration);
        Ok(registration)
    }

    /// Remove a registration made through this instance.
    pub fn unregister(&self, registration: &Registration) -> Result<(), WebError> {
        let mut index = self.index.lock();
        let removed = index
            .by_id
            .shift_remove(registration.model.id())
            .ok_or_else(|| {
                WebError::illegal_argument(format!(
                    "{registration} was not registered before"
                ))
            })?;
        if let Some(alias) = removed.alias() {
            index.by_alias.remove(alias);
        }
        self.cluster.release(&removed);
        debug!("Unregistered {}", removed);
        Ok(())
    }

    /// Remove everything, returning what was removed in registration order.
    pub fn unregister_all(&self) -> Vec<Arc<Registration>> {
        let mut index = self.index.lock();
        index.by_alias.clear();
        let removed: Vec<Arc<Registration>> = index.by_id.drain(..).map(|(_, r)| r).collect();
        for registration in &removed {
            self.cluster.release(registration);
        }
        removed
    }

    /// Snapshot of all registrations, in registration order.
    pub fn get(&self) -> Vec<Arc<Registration>> {
        self.index.lock().by_id.values().cloned().collect()
    }

    pub fn get_by_alias(&self, alias: &str) -> Option<Arc<Registration>> {
        self.index.lock().by_alias.get(alias).cloned()
    }

    /// The registration whose alias is the longest prefix of `path`.
    pub fn get_matching_alias(&self, path: &str) -> Option<Arc<Registration>> {
        let index = self.index.lock();
        alias_prefixes(path).find_map(|candidate| index.by_alias.get(candidate).cloned())
    }

    pub fn contains_servlet(&self, servlet: &Arc<dyn Servlet>) -> bool {
        let key = crate::core::identity(servlet);
        self.index
            .lock()
            .by_id
            .values()
            .any(|r| r.model.servlet_key() == key)
    }
}
