// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::controller::{ServerController, ServerEvent};
use crate::core::{
    Bundle, DefaultHttpContext, EventListener, Filter, HttpContext, InitParams,
    RegistrationStatus, Servlet, WebError, identity,
};
use crate::model::{
    ContextModel, ErrorPageKey, ErrorPageModel, EventListenerModel, FilterModel, ServerModel,
    ServletModel, WebElement, WelcomeFileModel,
};
use crate::registrations::{Registration, Registrations, RegistrationsCluster};

use super::{FilterOptions, JspServletFactory, ServletOptions};

const JSP_SERVLET_NAME: &str = "jsp";

/// One http context as seen by a bundle.
///
/// The context model may change until the first element is registered with
/// it; from then on `registrations` is set and the model is frozen.
#[derive(Debug)]
struct ContextEntry {
    model: Arc<ContextModel>,
    registrations: Option<Arc<Registrations>>,
    jsp: Option<Arc<ServletModel>>,
    welcome: Option<Arc<WelcomeFileModel>>,
}

#[derive(Debug, Default)]
struct StartedState {
    contexts: IndexMap<usize, ContextEntry>,
    journal: ServerModel,
    default_context: Option<Arc<dyn HttpContext>>,
    stopped: bool,
}

/// The working HttpService of one bundle.
///
/// Every element is journaled in registration order; the journal is
/// replayed to the controller whenever the server (re)starts.
pub struct HttpServiceStarted {
    bundle: Arc<Bundle>,
    controller: Arc<ServerController>,
    cluster: Arc<RegistrationsCluster>,
    jsp_factory: Option<JspServletFactory>,
    listener_id: Mutex<Option<u64>>,
    state: Mutex<StartedState>,
}

impl fmt::Debug for HttpServiceStarted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServiceStarted")
            .field("bundle", &self.bundle.symbolic_name())
            .field("jsp_support", &self.jsp_factory.is_some())
            .finish()
    }
}

impl HttpServiceStarted {
    pub fn new(
        bundle: Arc<Bundle>,
        controller: Arc<ServerController>,
        cluster: Arc<RegistrationsCluster>,
        jsp_factory: Option<JspServletFactory>,
    ) -> Arc<Self> {
        info!("Creating http service for bundle {}", bundle.symbolic_name());
        let started = Arc::new(Self {
            bundle,
            controller: controller.clone(),
            cluster,
            jsp_factory,
            listener_id: Mutex::new(None),
            state: Mutex::new(StartedState::default()),
        });

        let weak: Weak<Self> = Arc::downgrade(&started);
        let id = controller.add_listener(Arc::new(move |event: ServerEvent| {
            if let Some(started) = weak.upgrade() {
                started.server_state_changed(event);
            }
        }));
        *started.listener_id.lock() = Some(id);
        started
    }

    pub fn bundle(&self) -> &Arc<Bundle> {
        &self.bundle
    }

    fn server_state_changed(&self, event: ServerEvent) {
        debug!("Http service of {} handling {:?}", self.bundle.symbolic_name(), event);
        if event == ServerEvent::Started {
            self.replay();
        }
    }

    /// Re-apply every journaled element, in registration order.
    fn replay(&self) {
        let state = self.state.lock();
        if state.stopped {
            return;
        }
        for element in state.journal.elements() {
            let result = match element {
                WebElement::Servlet(m) => self.controller.add_servlet(m),
                WebElement::Filter(m) => self.controller.add_filter(m),
                WebElement::EventListener(m) => self.controller.add_event_listener(m),
                WebElement::ErrorPage(m) => self.controller.add_error_page(m),
                WebElement::WelcomeFiles(m) => self.controller.add_welcome_files(m),
            };
            if let Err(e) = result {
                error!("Failed to replay {} of bundle {}: {}", element.id(), self.bundle.symbolic_name(), e);
            }
        }
    }

    fn lock(&self) -> Result<parking_lot::MutexGuard<'_, StartedState>, WebError> {
        let state = self.state.lock();
        if state.stopped {
            return Err(WebError::illegal_state(format!(
                "http service of bundle {} is stopped",
                self.bundle.symbolic_name()
            )));
        }
        Ok(state)
    }

    pub fn create_default_http_context(&self) -> Arc<dyn HttpContext> {
        Arc::new(DefaultHttpContext::new(self.bundle.clone()))
    }

    fn resolve_http_context(
        &self,
        state: &mut StartedState,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Arc<dyn HttpContext> {
        match http_context {
            Some(context) => context.clone(),
            None => state
                .default_context
                .get_or_insert_with(|| self.create_default_http_context())
                .clone(),
        }
    }

    fn entry<'a>(
        &self,
        state: &'a mut StartedState,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> &'a mut ContextEntry {
        let http_context = self.resolve_http_context(state, http_context);
        state
            .contexts
            .entry(identity(&http_context))
            .or_insert_with(|| {
                let model = ContextModel::new(http_context.clone(), self.bundle.clone());
                debug!("Created {}", model);
                ContextEntry {
                    model: Arc::new(model),
                    registrations: None,
                    jsp: None,
                    welcome: None,
                }
            })
    }

    /// The context, frozen for use, with its registrations.
    fn use_context(
        &self,
        state: &mut StartedState,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> (Arc<ContextModel>, Arc<Registrations>) {
        let cluster = self.cluster.clone();
        let entry = self.entry(state, http_context);
        let registrations = match &entry.registrations {
            Some(registrations) => registrations.clone(),
            None => {
                let registrations = cluster.create_registrations(entry.model.clone());
                entry.registrations = Some(registrations.clone());
                registrations
            }
        };
        (entry.model.clone(), registrations)
    }

    fn find_entry<'a>(
        &self,
        state: &'a mut StartedState,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Option<&'a mut ContextEntry> {
        let key = match http_context {
            Some(context) => identity(context),
            None => identity(state.default_context.as_ref()?),
        };
        state.contexts.get_mut(&key)
    }

    fn configure_context<F>(
        &self,
        http_context: Option<&Arc<dyn HttpContext>>,
        what: &str,
        f: F,
    ) -> Result<(), WebError>
    where
        F: FnOnce(&mut ContextModel) -> Result<(), WebError>,
    {
        let mut state = self.lock()?;
        let entry = self.entry(&mut state, http_context);
        if entry.registrations.is_some() {
            return Err(WebError::illegal_state(format!(
                "http context already used. {what} can be set only before first usage"
            )));
        }
        f(Arc::make_mut(&mut entry.model))
    }

    fn apply_servlet(
        &self,
        state: &mut StartedState,
        registrations: &Registrations,
        registration: Arc<Registration>,
    ) -> Result<RegistrationStatus, WebError> {
        let model = registration.model().clone();
        state.journal.add(WebElement::Servlet(model.clone()));
        match registration.register(&self.controller) {
            Ok(status) => {
                info!("Registered {} ({})", model, status);
                Ok(status)
            }
            Err(e) => {
                state.journal.remove(model.id());
                if let Err(undo) = registrations.unregister(&registration) {
                    warn!("Could not roll back {}: {}", registration, undo);
                }
                Err(e)
            }
        }
    }

    pub fn register_servlet(
        &self,
        alias: &str,
        servlet: Arc<dyn Servlet>,
        init_params: InitParams,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let mut state = self.lock()?;
        let (_, registrations) = self.use_context(&mut state, http_context);
        let registration = registrations.register_servlet(alias, servlet, init_params)?;
        self.apply_servlet(&mut state, &registrations, registration)
    }

    pub fn register_servlet_with_patterns(
        &self,
        servlet: Arc<dyn Servlet>,
        options: ServletOptions,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let mut state = self.lock()?;
        let (context, registrations) = self.use_context(&mut state, http_context);
        let model = ServletModel::with_url_patterns(
            context,
            servlet,
            options.name.as_deref(),
            options.url_patterns,
            options.init_params,
        )?
        .with_load_on_startup(options.load_on_startup)
        .with_async_supported(options.async_supported)
        .with_multipart(options.multipart);
        let registration = registrations.register_servlet_model(model)?;
        self.apply_servlet(&mut state, &registrations, registration)
    }

    pub fn register_resources(
        &self,
        alias: &str,
        name: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let mut state = self.lock()?;
        let (_, registrations) = self.use_context(&mut state, http_context);
        let registration = registrations.register_resources(alias, name)?;
        self.apply_servlet(&mut state, &registrations, registration)
    }

    fn remove_servlet_registration(
        &self,
        state: &mut StartedState,
        registrations: &Registrations,
        registration: &Registration,
    ) -> Result<(), WebError> {
        registrations.unregister(registration)?;
        let model = registration.model();
        state.journal.remove(model.id());
        for entry in state.contexts.values_mut() {
            if entry.jsp.as_ref().is_some_and(|jsp| jsp.id() == model.id()) {
                entry.jsp = None;
            }
        }
        registration.unregister(&self.controller)?;
        info!("Unregistered {}", model);
        Ok(())
    }

    /// Remove the servlet or resources registered under `alias`.
    pub fn unregister(&self, alias: &str) -> Result<(), WebError> {
        let mut state = self.lock()?;
        let found = state.contexts.values().find_map(|entry| {
            let registrations = entry.registrations.as_ref()?;
            registrations
                .get_by_alias(alias)
                .map(|registration| (registrations.clone(), registration))
        });
        let Some((registrations, registration)) = found else {
            return Err(WebError::illegal_argument(format!(
                "alias [{alias}] was never registered"
            )));
        };
        self.remove_servlet_registration(&mut state, &registrations, &registration)
    }

    pub fn unregister_servlet(&self, servlet: &Arc<dyn Servlet>) -> Result<(), WebError> {
        let mut state = self.lock()?;
        let key = identity(servlet);
        let found = state.contexts.values().find_map(|entry| {
            let registrations = entry.registrations.as_ref()?;
            registrations
                .get()
                .into_iter()
                .find(|r| r.model().servlet_key() == key)
                .map(|registration| (registrations.clone(), registration))
        });
        let Some((registrations, registration)) = found else {
            return Err(WebError::illegal_argument(
                "servlet was never registered by this bundle",
            ));
        };
        self.remove_servlet_registration(&mut state, &registrations, &registration)
    }

    pub fn register_filter(
        &self,
        filter: Arc<dyn Filter>,
        options: FilterOptions,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let mut state = self.lock()?;
        if state.journal.filter_by_key(identity(&filter)).is_some() {
            return Err(WebError::illegal_argument("filter is already registered"));
        }
        let (context, registrations) = self.use_context(&mut state, http_context);

        let mut servlet_names = options.servlet_names;
        for alias in &options.aliases {
            let registration = registrations.get_by_alias(alias).ok_or_else(|| {
                WebError::illegal_argument(format!(
                    "alias [{alias}] does not name a registered servlet"
                ))
            })?;
            servlet_names.push(registration.model().name().to_string());
        }

        let model = Arc::new(FilterModel::new(
            context,
            filter,
            options.name.as_deref(),
            options.url_patterns,
            servlet_names,
            options.dispatcher_types,
            options.init_params,
        )?);
        state.journal.add(WebElement::Filter(model.clone()));
        match self.controller.add_filter(&model) {
            Ok(status) => {
                info!("Registered {} ({})", model, status);
                Ok(status)
            }
            Err(e) => {
                state.journal.remove(model.id());
                Err(e)
            }
        }
    }

    pub fn unregister_filter(&self, filter: &Arc<dyn Filter>) -> Result<(), WebError> {
        let mut state = self.lock()?;
        let model = state
            .journal
            .filter_by_key(identity(filter))
            .cloned()
            .ok_or_else(|| WebError::illegal_argument("filter was never registered by this bundle"))?;
        state.journal.remove(model.id());
        self.controller.remove_filter(&model)
    }

    pub fn register_event_listener(
        &self,
        listener: Arc<dyn EventListener>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let mut state = self.lock()?;
        if state.journal.listener_by_key(identity(&listener)).is_some() {
            return Err(WebError::illegal_argument("event listener is already registered"));
        }
        let (context, _) = self.use_context(&mut state, http_context);
        let model = Arc::new(EventListenerModel::new(context, listener));
        state.journal.add(WebElement::EventListener(model.clone()));
        self.controller.add_event_listener(&model).inspect_err(|_| {
            state.journal.remove(model.id());
        })
    }

    pub fn unregister_event_listener(&self, listener: &Arc<dyn EventListener>) -> Result<(), WebError> {
        let mut state = self.lock()?;
        let model = state
            .journal
            .listener_by_key(identity(listener))
            .cloned()
            .ok_or_else(|| {
                WebError::illegal_argument("event listener was never registered by this bundle")
            })?;
        state.journal.remove(model.id());
        self.controller.remove_event_listener(&model)
    }

    pub fn register_error_page(
        &self,
        error: &str,
        location: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let mut state = self.lock()?;
        let (context, _) = self.use_context(&mut state, http_context);
        let model = Arc::new(ErrorPageModel::new(context.clone(), error, location)?);
        if state.journal.error_page(context.id(), model.error()).is_some() {
            return Err(WebError::illegal_argument(format!(
                "an error page for [{error}] is already registered in {context}"
            )));
        }
        state.journal.add(WebElement::ErrorPage(model.clone()));
        self.controller.add_error_page(&model).inspect_err(|_| {
            state.journal.remove(model.id());
        })
    }

    pub fn unregister_error_page(
        &self,
        error: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        let mut state = self.lock()?;
        let key = ErrorPageKey::parse(error)?;
        let context_id = self
            .find_entry(&mut state, http_context)
            .map(|entry| entry.model.id().to_string());
        let model = context_id
            .and_then(|id| state.journal.error_page(&id, &key).cloned())
            .ok_or_else(|| {
                WebError::illegal_argument(format!("no error page registered for [{error}]"))
            })?;
        state.journal.remove(model.id());
        self.controller.remove_error_page(&model)
    }

    pub fn register_welcome_files(
        &self,
        files: Vec<String>,
        redirect: bool,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let mut state = self.lock()?;
        let (context, _) = self.use_context(&mut state, http_context);
        let entry = self.entry(&mut state, http_context);
        if entry.welcome.is_some() {
            return Err(WebError::illegal_state(
                "welcome files already registered for this context",
            ));
        }
        let model = Arc::new(WelcomeFileModel::new(context, files, redirect)?);
        entry.welcome = Some(model.clone());
        state.journal.add(WebElement::WelcomeFiles(model.clone()));
        let result = self.controller.add_welcome_files(&model);
        if result.is_err() {
            state.journal.remove(model.id());
            if let Some(entry) = self.find_entry(&mut state, http_context) {
                entry.welcome = None;
            }
        }
        result
    }

    pub fn unregister_welcome_files(&self, http_context: Option<&Arc<dyn HttpContext>>) -> Result<(), WebError> {
        let mut state = self.lock()?;
        let model = self
            .find_entry(&mut state, http_context)
            .and_then(|entry| entry.welcome.take())
            .ok_or_else(|| {
                WebError::illegal_argument("welcome files are not registered for this http context")
            })?;
        state.journal.remove(model.id());
        self.controller.remove_welcome_files(&model)
    }

    /// Map the JSP servlet of this context, `*.jsp` unless patterns are given.
    pub fn register_jsps(
        &self,
        url_patterns: Option<Vec<String>>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<RegistrationStatus, WebError> {
        let factory = self.jsp_factory.clone().ok_or_else(|| {
            WebError::Unsupported("jsp support is not enabled".to_string())
        })?;
        let mut state = self.lock()?;
        let (context, registrations) = self.use_context(&mut state, http_context);
        if let Some(jsp) = self.entry(&mut state, http_context).jsp.as_ref() {
            debug!("JSP support already enabled for {}", jsp.context());
            return Ok(if self.controller.is_started() {
                RegistrationStatus::Live
            } else {
                RegistrationStatus::Pending
            });
        }

        let servlet = factory(context.as_ref());
        let patterns = url_patterns.unwrap_or_else(|| vec!["*.jsp".to_string()]);
        let model = ServletModel::with_url_patterns(
            context,
            servlet,
            Some(JSP_SERVLET_NAME),
            patterns,
            InitParams::new(),
        )?;
        let registration = registrations.register_servlet_model(model)?;
        let model = registration.model().clone();
        let status = self.apply_servlet(&mut state, &registrations, registration)?;
        self.entry(&mut state, http_context).jsp = Some(model);
        Ok(status)
    }

    pub fn unregister_jsps(&self, http_context: Option<&Arc<dyn HttpContext>>) -> Result<(), WebError> {
        if self.jsp_factory.is_none() {
            return Err(WebError::Unsupported("jsp support is not enabled".to_string()));
        }
        let mut state = self.lock()?;
        let found = self.find_entry(&mut state, http_context).and_then(|entry| {
            let jsp = entry.jsp.clone()?;
            let registrations = entry.registrations.clone()?;
            Some((jsp, registrations))
        });
        let Some((jsp, registrations)) = found else {
            return Err(WebError::illegal_argument(
                "jsp support is not enabled for this http context",
            ));
        };
        let registration = registrations
            .get()
            .into_iter()
            .find(|r| r.model().id() == jsp.id())
            .ok_or_else(|| WebError::illegal_state("jsp servlet registration is gone"))?;
        self.remove_servlet_registration(&mut state, &registrations, &registration)
    }

    pub fn set_context_param(
        &self,
        params: InitParams,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        self.configure_context(http_context, "context params", |model| {
            model.set_context_params(params);
            Ok(())
        })
    }

    pub fn set_session_timeout(
        &self,
        minutes: Option<u32>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        self.configure_context(http_context, "session timeout", |model| {
            model.set_session_timeout(minutes);
            Ok(())
        })
    }

    pub fn set_context_path(
        &self,
        path: &str,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        self.configure_context(http_context, "context path", |model| model.set_context_path(path))
    }

    pub fn set_virtual_hosts(
        &self,
        hosts: Vec<String>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        self.configure_context(http_context, "virtual hosts", |model| {
            model.set_virtual_hosts(hosts);
            Ok(())
        })
    }

    pub fn set_mime_mappings(
        &self,
        mappings: BTreeMap<String, String>,
        http_context: Option<&Arc<dyn HttpContext>>,
    ) -> Result<(), WebError> {
        self.configure_context(http_context, "mime mappings", |model| {
            model.set_mime_mappings(mappings);
            Ok(())
        })
    }

    pub fn status(&self, alias: &str) -> Option<RegistrationStatus> {
        let state = self.state.lock();
        let registered = state
            .contexts
            .values()
            .filter_map(|entry| entry.registrations.as_ref())
            .any(|registrations| registrations.get_by_alias(alias).is_some());
        registered.then(|| {
            if self.controller.is_started() {
                RegistrationStatus::Live
            } else {
                RegistrationStatus::Pending
            }
        })
    }

    /// Number of journaled elements.
    pub fn len(&self) -> usize {
        self.state.lock().journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unregister everything of this bundle, newest first, and release its contexts.
    pub fn stop(&self) {
        if let Some(id) = self.listener_id.lock().take() {
            self.controller.remove_listener(id);
        }
        let mut state = self.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        info!("Stopping http service of bundle {}", self.bundle.symbolic_name());

        for element in state.journal.drain_reversed() {
            self.remove_element(&element);
        }
        for (_, entry) in state.contexts.drain(..) {
            self.release_entry(entry);
        }
        state.default_context = None;
    }

    /// Unregister every element of one http context, newest first, and
    /// release the context. Elements of other contexts are left alone.
    pub fn release_http_context(&self, http_context: &Arc<dyn HttpContext>) -> Result<(), WebError> {
        let mut state = self.lock()?;
        let entry = state.contexts.shift_remove(&identity(http_context)).ok_or_else(|| {
            WebError::illegal_argument("http context is not used by this bundle")
        })?;
        for element in state.journal.drain_context_reversed(entry.model.id()) {
            self.remove_element(&element);
        }
        info!("Released {}", entry.model);
        self.release_entry(entry);
        Ok(())
    }

    fn remove_element(&self, element: &WebElement) {
        let result = match element {
            WebElement::Servlet(m) => self.controller.remove_servlet(m),
            WebElement::Filter(m) => self.controller.remove_filter(m),
            WebElement::EventListener(m) => self.controller.remove_event_listener(m),
            WebElement::ErrorPage(m) => self.controller.remove_error_page(m),
            WebElement::WelcomeFiles(m) => self.controller.remove_welcome_files(m),
        };
        if let Err(e) = result {
            warn!("Failed to remove {}: {}", element.id(), e);
        }
    }

    fn release_entry(&self, entry: ContextEntry) {
        if let Some(registrations) = entry.registrations {
            self.cluster.remove_registrations(&registrations);
            if let Err(e) = self.controller.remove_context(&entry.model) {
                warn!("Failed to remove {}: {}", entry.model, e);
            }
        }
    }
}

impl Drop for HttpServiceStarted {
    fn drop(&mut self) {
        if let Some(id) = self.listener_id.get_mut().take() {
            self.controller.remove_listener(id);
        }
    }
}
