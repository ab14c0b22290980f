// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::controller::ServerController;
use crate::core::Bundle;
use crate::registrations::RegistrationsCluster;

use super::{HttpServiceProxy, HttpServiceStarted, JspServletFactory};

/// Hands out one [`HttpServiceProxy`] per bundle.
pub struct HttpServiceFactory {
    controller: Arc<ServerController>,
    cluster: Arc<RegistrationsCluster>,
    jsp_factory: Option<JspServletFactory>,
    services: Mutex<HashMap<u64, Arc<HttpServiceProxy>>>,
}

impl fmt::Debug for HttpServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServiceFactory")
            .field("services", &self.services.lock().len())
            .field("jsp_support", &self.jsp_factory.is_some())
            .finish()
    }
}

impl HttpServiceFactory {
    pub fn new(controller: Arc<ServerController>) -> Self {
        Self {
            controller,
            cluster: Arc::new(RegistrationsCluster::new()),
            jsp_factory: None,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Enable `register_jsps` for every bundle.
    pub fn with_jsp_support(mut self, factory: JspServletFactory) -> Self {
        self.jsp_factory = Some(factory);
        self
    }

    pub fn controller(&self) -> &Arc<ServerController> {
        &self.controller
    }

    pub fn cluster(&self) -> &Arc<RegistrationsCluster> {
        &self.cluster
    }

    /// The service of `bundle`, created on first request.
    pub fn get_service(&self, bundle: &Arc<Bundle>) -> Arc<HttpServiceProxy> {
        self.services
            .lock()
            .entry(bundle.id())
            .or_insert_with(|| {
                let started = HttpServiceStarted::new(
                    bundle.clone(),
                    self.controller.clone(),
                    self.cluster.clone(),
                    self.jsp_factory.clone(),
                );
                Arc::new(HttpServiceProxy::new(started))
            })
            .clone()
    }

    /// Stop and forget the service of `bundle`.
    pub fn unget_service(&self, bundle: &Bundle) {
        let removed = self.services.lock().remove(&bundle.id());
        match removed {
            Some(service) => service.stop(),
            None => debug!("Bundle {} has no http service", bundle.symbolic_name()),
        }
    }

    /// Stop every service, e.g. on shutdown.
    pub fn unget_all(&self) {
        let services: Vec<Arc<HttpServiceProxy>> =
            self.services.lock().drain().map(|(_, service)| service).collect();
        for service in services {
            service.stop();
        }
    }
}
