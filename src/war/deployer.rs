// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::core::path::normalize_context_path;
use crate::core::{Bundle, HttpContext, ResourceServlet, WebError};
use crate::service::{FilterOptions, HttpServiceFactory, HttpServiceProxy, ServletOptions};

use super::{ClassSpace, DescriptorParser, WebAppModel, WebAppServlet, scan_class_space};

/// Location of the deployment descriptor inside a web bundle.
pub const WEB_XML: &str = "WEB-INF/web.xml";

/// Manifest header naming the context path of a web bundle.
pub const CONTEXT_PATH_HEADER: &str = "Web-ContextPath";

const DEFAULT_SERVLET_NAME: &str = "default";

/// The http context of a deployed web application.
///
/// Serves resources from the bundle root but never exposes `WEB-INF` or
/// `META-INF`.
#[derive(Debug)]
pub struct WebAppHttpContext {
    bundle: Arc<Bundle>,
}

impl WebAppHttpContext {
    pub fn new(bundle: Arc<Bundle>) -> Self {
        Self { bundle }
    }
}

impl HttpContext for WebAppHttpContext {
    fn get_resource(&self, name: &str) -> Option<PathBuf> {
        let first = Path::new(name).components().find_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })?;
        if first.eq_ignore_ascii_case("WEB-INF") || first.eq_ignore_ascii_case("META-INF") {
            return None;
        }
        self.bundle.resource(name)
    }
}

#[derive(Debug)]
struct DeployedWebApp {
    context_path: String,
    service: Arc<HttpServiceProxy>,
    http_context: Arc<dyn HttpContext>,
}

/// Deploys web bundles through their HttpService, one web app per bundle.
#[derive(Debug)]
pub struct WebAppDeployer {
    services: Arc<HttpServiceFactory>,
    deployed: Mutex<IndexMap<u64, DeployedWebApp>>,
}

impl WebAppDeployer {
    pub fn new(services: Arc<HttpServiceFactory>) -> Self {
        Self {
            services,
            deployed: Mutex::new(IndexMap::new()),
        }
    }

    /// Read `WEB-INF/web.xml` (if any) and merge the annotated classes.
    pub fn load(bundle: &Bundle, classes: &ClassSpace) -> Result<WebAppModel, WebError> {
        let mut web_app = match bundle.resource(WEB_XML) {
            Some(path) => {
                debug!("Parsing {}", path.display());
                let xml = std::fs::read_to_string(&path)?;
                DescriptorParser::parse(&xml)?
            }
            None => {
                debug!("Bundle {} has no {}", bundle, WEB_XML);
                WebAppModel::new()
            }
        };
        if web_app.metadata_complete {
            debug!("Descriptor of {} is metadata complete, skipping annotations", bundle);
        } else {
            let merged = scan_class_space(classes, &mut web_app);
            debug!("Merged {} annotated class(es) of {}", merged, bundle);
        }
        Ok(web_app)
    }

    /// `Web-ContextPath`, or `/` followed by the symbolic name.
    pub fn context_path_of(bundle: &Bundle) -> Result<String, WebError> {
        match bundle.header(CONTEXT_PATH_HEADER) {
            Some(path) => normalize_context_path(path),
            None => normalize_context_path(&format!("/{}", bundle.symbolic_name())),
        }
    }

    /// Deploy the web application of `bundle`; returns its context path.
    ///
    /// Whatever was registered is rolled back when any element fails.
    pub fn deploy(&self, bundle: &Arc<Bundle>, classes: &ClassSpace) -> Result<String, WebError> {
        let mut deployed = self.deployed.lock();
        if deployed.contains_key(&bundle.id()) {
            return Err(WebError::illegal_state(format!(
                "bundle {bundle} is already deployed"
            )));
        }
        let context_path = Self::context_path_of(bundle)?;
        if let Some((owner, _)) = deployed.iter().find(|(_, app)| app.context_path == context_path) {
            return Err(WebError::illegal_state(format!(
                "context path {context_path} is already used by bundle {owner}"
            )));
        }

        let web_app = Self::load(bundle, classes)?;
        let declared = bundle.resource(WEB_XML).is_some() || bundle.header(CONTEXT_PATH_HEADER).is_some();
        if web_app.is_empty() && !declared {
            return Err(WebError::illegal_argument(format!(
                "bundle {bundle} is not a web application"
            )));
        }

        info!("Deploying web application {} at {}", bundle, context_path);
        let service = self.services.get_service(bundle);
        let http_context: Arc<dyn HttpContext> = Arc::new(WebAppHttpContext::new(bundle.clone()));
        if let Err(e) = register(&service, &http_context, &web_app, classes, &context_path) {
            error!("Deployment of {} failed, rolling back: {}", bundle, e);
            if let Err(undo) = service.release_http_context(&http_context) {
                warn!("Could not roll back {}: {}", bundle, undo);
            }
            return Err(e);
        }
        deployed.insert(
            bundle.id(),
            DeployedWebApp {
                context_path: context_path.clone(),
                service,
                http_context,
            },
        );
        info!("Deployed web application {} at {}", bundle, context_path);
        Ok(context_path)
    }

    /// Remove the web application of `bundle` and nothing else.
    pub fn undeploy(&self, bundle: &Bundle) -> Result<(), WebError> {
        let app = self.deployed.lock().shift_remove(&bundle.id()).ok_or_else(|| {
            WebError::illegal_argument(format!("bundle {bundle} is not deployed"))
        })?;
        app.service.release_http_context(&app.http_context)?;
        info!("Undeployed web application {} from {}", bundle, app.context_path);
        Ok(())
    }

    pub fn context_path(&self, bundle_id: u64) -> Option<String> {
        self.deployed.lock().get(&bundle_id).map(|app| app.context_path.clone())
    }

    /// Bundle ids and context paths, in deployment order.
    pub fn deployed(&self) -> Vec<(u64, String)> {
        self.deployed
            .lock()
            .iter()
            .map(|(id, app)| (*id, app.context_path.clone()))
            .collect()
    }
}

fn register(
    service: &HttpServiceProxy,
    http_context: &Arc<dyn HttpContext>,
    web_app: &WebAppModel,
    classes: &ClassSpace,
    context_path: &str,
) -> Result<(), WebError> {
    let context = Some(http_context);

    service.set_context_path(context_path, context)?;
    service.set_context_param(web_app.context_params.clone(), context)?;
    service.set_session_timeout(web_app.session_timeout, context)?;
    if !web_app.mime_mappings.is_empty() {
        service.set_mime_mappings(web_app.mime_mappings.clone(), context)?;
    }

    for class in &web_app.listeners {
        service.register_event_listener(classes.new_listener(class)?, context)?;
    }
    if !web_app.welcome_files.is_empty() {
        service.register_welcome_files(web_app.welcome_files.clone(), false, context)?;
    }

    for mapping in web_app.merged_filter_mappings() {
        let Some(filter) = web_app.find_filter(&mapping.filter_name) else {
            warn!("Ignoring mapping of undeclared filter {}", mapping.filter_name);
            continue;
        };
        let class = filter.class.as_deref().ok_or_else(|| {
            WebError::illegal_argument(format!("filter {} has no filter-class", filter.name))
        })?;
        let options = FilterOptions {
            name: Some(filter.name.clone()),
            url_patterns: mapping.url_patterns,
            servlet_names: mapping.servlet_names,
            aliases: Vec::new(),
            init_params: filter.init_params.clone(),
            dispatcher_types: mapping.dispatcher_types,
        };
        service.register_filter(classes.new_filter(class)?, options, context)?;
    }

    let mut default_mapped = false;
    for servlet in startup_order(web_app) {
        let url_patterns = web_app.servlet_url_patterns(&servlet.name);
        if url_patterns.is_empty() {
            debug!("Servlet {} is not mapped, skipping", servlet.name);
            continue;
        }
        default_mapped |= url_patterns.iter().any(|p| p == "/");
        let class = servlet.class.as_deref().ok_or_else(|| {
            WebError::illegal_argument(format!("servlet {} has no servlet-class", servlet.name))
        })?;
        let options = ServletOptions {
            name: Some(servlet.name.clone()),
            url_patterns,
            init_params: servlet.init_params.clone(),
            load_on_startup: servlet.load_on_startup,
            async_supported: servlet.async_supported,
            multipart: servlet.multipart.clone(),
        };
        service.register_servlet_with_patterns(classes.new_servlet(class)?, options, context)?;
    }
    if !default_mapped {
        // static content of the bundle
        let options = ServletOptions::new(["/"]).with_name(DEFAULT_SERVLET_NAME);
        service.register_servlet_with_patterns(
            Arc::new(ResourceServlet::default_servlet("/")),
            options,
            context,
        )?;
    }

    for page in &web_app.error_pages {
        service.register_error_page(&page.error, &page.location, context)?;
    }
    Ok(())
}

/// Servlets with a non-negative load-on-startup first, lowest value first;
/// declaration order otherwise.
fn startup_order(web_app: &WebAppModel) -> Vec<&WebAppServlet> {
    let mut servlets: Vec<&WebAppServlet> = web_app.servlets().collect();
    servlets.sort_by_key(|servlet| match servlet.load_on_startup {
        Some(order) if order >= 0 => (0, order),
        _ => (1, 0),
    });
    servlets
}
