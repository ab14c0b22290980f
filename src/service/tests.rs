// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::config::WebConfiguration;
    use crate::controller::{BackendFactory, ConnectorConfig, ServerBackend, ServerController};
    use crate::core::{
        Bundle, EventListener, Filter, FilterChain, HttpContext, InitParams, RegistrationStatus,
        Servlet, ServletError, WebError, WebRequest, WebResponse,
    };
    use crate::model::{
        ContextModel, ErrorPageModel, EventListenerModel, FilterModel, ServletModel,
        WelcomeFileModel,
    };
    use crate::service::{FilterOptions, HttpServiceFactory, JspServletFactory, ServletOptions};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    type Journal = Arc<Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct RecordingBackend {
        journal: Journal,
    }

    impl RecordingBackend {
        fn record(&self, entry: String) {
            self.journal.lock().push(entry);
        }
    }

    impl ServerBackend for RecordingBackend {
        fn add_connector(&mut self, _connector: ConnectorConfig) -> Result<(), WebError> {
            Ok(())
        }

        fn configure_context(&mut self, _attributes: BTreeMap<String, Value>, _timeout: Option<u32>) -> Result<(), WebError> {
            Ok(())
        }

        fn start(&mut self) -> Result<(), WebError> {
            self.record("start".to_string());
            Ok(())
        }

        fn stop(&mut self) -> Result<(), WebError> {
            self.record("stop".to_string());
            Ok(())
        }

        fn add_servlet(&mut self, model: &Arc<ServletModel>) -> Result<(), WebError> {
            if model.name() == "broken" {
                return Err(WebError::Servlet(ServletError::new("init failed")));
            }
            let params = model.context().context_params().keys().cloned().collect::<Vec<_>>().join(",");
            self.record(format!("+servlet {} [{}] {}", model.name(), params, model.context().context_path()));
            Ok(())
        }

        fn remove_servlet(&mut self, model: &ServletModel) -> Result<(), WebError> {
            self.record(format!("-servlet {}", model.name()));
            Ok(())
        }

        fn add_filter(&mut self, model: &Arc<FilterModel>) -> Result<(), WebError> {
            self.record(format!("+filter {} {:?}", model.name(), model.servlet_names()));
            Ok(())
        }

        fn remove_filter(&mut self, model: &FilterModel) -> Result<(), WebError> {
            self.record(format!("-filter {}", model.name()));
            Ok(())
        }

        fn add_event_listener(&mut self, _model: &Arc<EventListenerModel>) -> Result<(), WebError> {
            self.record("+listener".to_string());
            Ok(())
        }

        fn remove_event_listener(&mut self, _model: &EventListenerModel) -> Result<(), WebError> {
            self.record("-listener".to_string());
            Ok(())
        }

        fn add_error_page(&mut self, model: &Arc<ErrorPageModel>) -> Result<(), WebError> {
            self.record(format!("+error {} {}", model.error(), model.location()));
            Ok(())
        }

        fn remove_error_page(&mut self, model: &ErrorPageModel) -> Result<(), WebError> {
            self.record(format!("-error {}", model.error()));
            Ok(())
        }

        fn add_welcome_files(&mut self, model: &Arc<WelcomeFileModel>) -> Result<(), WebError> {
            self.record(format!("+welcome {:?}", model.files()));
            Ok(())
        }

        fn remove_welcome_files(&mut self, _model: &WelcomeFileModel) -> Result<(), WebError> {
            self.record("-welcome".to_string());
            Ok(())
        }

        fn remove_context(&mut self, context: &ContextModel) -> Result<(), WebError> {
            self.record(format!("-context {}", context.context_path()));
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct RecordingFactory {
        journal: Journal,
    }

    impl BackendFactory for RecordingFactory {
        fn create_server(&self, _configuration: &WebConfiguration) -> Result<Box<dyn ServerBackend>, WebError> {
            Ok(Box::new(RecordingBackend {
                journal: self.journal.clone(),
            }))
        }
    }

    #[derive(Debug)]
    struct TestServlet;

    #[async_trait]
    impl Servlet for TestServlet {
        async fn service(&self, _req: &mut WebRequest, _resp: &mut WebResponse) -> Result<(), ServletError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct TestFilter;

    #[async_trait]
    impl Filter for TestFilter {
        async fn do_filter(
            &self,
            req: &mut WebRequest,
            resp: &mut WebResponse,
            chain: FilterChain<'_>,
        ) -> Result<(), ServletError> {
            chain.do_filter(req, resp).await
        }
    }

    #[derive(Debug)]
    struct TestListener;

    impl EventListener for TestListener {}

    fn setup() -> (HttpServiceFactory, Journal) {
        let backend = RecordingFactory::default();
        let journal = backend.journal.clone();
        let controller = Arc::new(ServerController::new(Arc::new(backend)));
        controller.configure(WebConfiguration::default()).unwrap();
        (HttpServiceFactory::new(controller), journal)
    }

    fn bundle(id: u64) -> Arc<Bundle> {
        Arc::new(Bundle::new(id, &format!("bundle.{id}"), std::env::temp_dir()))
    }

    fn named(name: &str) -> InitParams {
        let mut params = InitParams::new();
        params.insert("servlet-name".to_string(), name.to_string());
        params
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().clone()
    }

    #[test]
    fn test_registrations_are_pending_until_started() {
        let (factory, journal) = setup();
        let http = factory.get_service(&bundle(1));

        let status = http.register_servlet("/hello", Arc::new(TestServlet), named("hello"), None).unwrap();
        assert_eq!(status, RegistrationStatus::Pending);
        assert_eq!(http.status("/hello"), Some(RegistrationStatus::Pending));
        http.register_error_page("404", "/hello", None).unwrap();
        assert!(entries(&journal).is_empty());

        factory.controller().start().unwrap();
        assert_eq!(
            entries(&journal),
            vec!["start", "+servlet hello [] /", "+error 404 /hello"]
        );
        assert_eq!(http.status("/hello"), Some(RegistrationStatus::Live));
        assert_eq!(http.status("/other"), None);
    }

    #[test]
    fn test_restart_replays_in_registration_order() {
        let (factory, journal) = setup();
        factory.controller().start().unwrap();
        let http = factory.get_service(&bundle(1));
        http.register_event_listener(Arc::new(TestListener), None).unwrap();
        http.register_servlet("/a", Arc::new(TestServlet), named("a"), None).unwrap();
        http.register_filter(Arc::new(TestFilter), FilterOptions::new(["/*"]).with_name("f"), None)
            .unwrap();

        journal.lock().clear();
        factory.controller().stop().unwrap();
        factory.controller().start().unwrap();
        assert_eq!(
            entries(&journal),
            vec!["stop", "start", "+listener", "+servlet a [] /", "+filter f []"]
        );
    }

    #[test]
    fn test_alias_uniqueness_across_bundles() {
        let (factory, _journal) = setup();
        let first = factory.get_service(&bundle(1));
        let second = factory.get_service(&bundle(2));

        first.register_servlet("/shared", Arc::new(TestServlet), InitParams::new(), None).unwrap();
        let clash = second.register_servlet("/shared", Arc::new(TestServlet), InitParams::new(), None);
        assert!(matches!(clash, Err(WebError::Namespace(_))));

        first.stop();
        second
            .register_servlet("/shared", Arc::new(TestServlet), InitParams::new(), None)
            .unwrap();
    }

    #[test]
    fn test_same_servlet_instance_twice() {
        let (factory, _journal) = setup();
        let http = factory.get_service(&bundle(1));
        let servlet: Arc<dyn Servlet> = Arc::new(TestServlet);
        http.register_servlet("/one", servlet.clone(), InitParams::new(), None).unwrap();
        let result = http.register_servlet("/two", servlet.clone(), InitParams::new(), None);
        assert!(matches!(result, Err(WebError::ServletAlreadyRegistered)));

        http.unregister_servlet(&servlet).unwrap();
        http.register_servlet("/two", servlet, InitParams::new(), None).unwrap();
    }

    #[test]
    fn test_unregister_unknown_alias() {
        let (factory, _journal) = setup();
        let http = factory.get_service(&bundle(1));
        assert!(matches!(http.unregister("/nothing"), Err(WebError::IllegalArgument(_))));

        let other = factory.get_service(&bundle(2));
        other.register_servlet("/theirs", Arc::new(TestServlet), InitParams::new(), None).unwrap();
        assert!(matches!(http.unregister("/theirs"), Err(WebError::IllegalArgument(_))));
    }

    #[test]
    fn test_unregister_removes_from_backend() {
        let (factory, journal) = setup();
        factory.controller().start().unwrap();
        let http = factory.get_service(&bundle(1));
        http.register_servlet("/hello", Arc::new(TestServlet), named("hello"), None).unwrap();
        http.unregister("/hello").unwrap();

        assert_eq!(entries(&journal).last().map(String::as_str), Some("-servlet hello"));
        assert_eq!(http.status("/hello"), None);
    }

    #[test]
    fn test_backend_failure_rolls_back() {
        let (factory, _journal) = setup();
        factory.controller().start().unwrap();
        let http = factory.get_service(&bundle(1));

        let result = http.register_servlet("/broken", Arc::new(TestServlet), named("broken"), None);
        assert!(matches!(result, Err(WebError::Servlet(_))));
        assert_eq!(http.status("/broken"), None);
        http.register_servlet("/broken", Arc::new(TestServlet), named("fixed"), None).unwrap();
    }

    #[test]
    fn test_filter_aliases_become_servlet_names() {
        let (factory, journal) = setup();
        factory.controller().start().unwrap();
        let http = factory.get_service(&bundle(1));
        http.register_servlet("/hello", Arc::new(TestServlet), named("hello"), None).unwrap();

        http.register_filter(
            Arc::new(TestFilter),
            FilterOptions::default().with_name("by-alias").with_aliases(["/hello"]),
            None,
        )
        .unwrap();
        assert_eq!(
            entries(&journal).last().map(String::as_str),
            Some("+filter by-alias [\"hello\"]")
        );

        let unknown = http.register_filter(
            Arc::new(TestFilter),
            FilterOptions::default().with_aliases(["/missing"]),
            None,
        );
        assert!(matches!(unknown, Err(WebError::IllegalArgument(_))));
    }

    #[test]
    fn test_filter_and_listener_duplicates() {
        let (factory, _journal) = setup();
        let http = factory.get_service(&bundle(1));
        let filter: Arc<dyn Filter> = Arc::new(TestFilter);
        let listener: Arc<dyn EventListener> = Arc::new(TestListener);

        http.register_filter(filter.clone(), FilterOptions::new(["/*"]), None).unwrap();
        let again = http.register_filter(filter.clone(), FilterOptions::new(["/*"]), None);
        assert!(matches!(again, Err(WebError::IllegalArgument(_))));
        http.unregister_filter(&filter).unwrap();
        assert!(matches!(http.unregister_filter(&filter), Err(WebError::IllegalArgument(_))));

        http.register_event_listener(listener.clone(), None).unwrap();
        let again = http.register_event_listener(listener.clone(), None);
        assert!(matches!(again, Err(WebError::IllegalArgument(_))));
        http.unregister_event_listener(&listener).unwrap();
    }

    #[test]
    fn test_context_params_only_before_first_use() {
        let (factory, journal) = setup();
        factory.controller().start().unwrap();
        let http = factory.get_service(&bundle(1));
        let context: Arc<dyn HttpContext> = http.create_default_http_context();

        let mut params = InitParams::new();
        params.insert("mode".to_string(), "test".to_string());
        http.set_context_param(params.clone(), Some(&context)).unwrap();
        http.set_context_path("/app", Some(&context)).unwrap();
        http.register_servlet("/x", Arc::new(TestServlet), named("x"), Some(&context)).unwrap();
        assert_eq!(entries(&journal).last().map(String::as_str), Some("+servlet x [mode] /app"));

        let late = http.set_context_param(params, Some(&context));
        assert!(matches!(late, Err(WebError::IllegalState(_))));
        let late = http.set_session_timeout(Some(5), Some(&context));
        assert!(matches!(late, Err(WebError::IllegalState(_))));
    }

    #[test]
    fn test_distinct_contexts_of_one_bundle() {
        let (factory, _journal) = setup();
        let http = factory.get_service(&bundle(1));
        let first = http.create_default_http_context();
        let second = http.create_default_http_context();

        http.register_servlet("/a", Arc::new(TestServlet), InitParams::new(), Some(&first)).unwrap();
        // both contexts live at the root path, so the alias is still taken
        let clash = http.register_servlet("/a", Arc::new(TestServlet), InitParams::new(), Some(&second));
        assert!(matches!(clash, Err(WebError::Namespace(_))));
        http.register_servlet("/b", Arc::new(TestServlet), InitParams::new(), Some(&second)).unwrap();
    }

    #[test]
    fn test_welcome_files_and_error_pages() {
        let (factory, _journal) = setup();
        let http = factory.get_service(&bundle(1));

        assert!(matches!(http.unregister_welcome_files(None), Err(WebError::IllegalArgument(_))));
        http.register_welcome_files(vec!["index.html".to_string()], false, None).unwrap();
        let again = http.register_welcome_files(vec!["index.html".to_string()], false, None);
        assert!(matches!(again, Err(WebError::IllegalState(_))));
        http.unregister_welcome_files(None).unwrap();
        http.register_welcome_files(vec!["home.html".to_string()], true, None).unwrap();

        let bad = http.register_error_page("404", "error.html", None);
        assert!(matches!(bad, Err(WebError::IllegalArgument(_))));
        http.register_error_page("java.io.IOException", "/error.html", None).unwrap();
        let dup = http.register_error_page("java.io.IOException", "/other.html", None);
        assert!(matches!(dup, Err(WebError::IllegalArgument(_))));
        http.unregister_error_page("java.io.IOException", None).unwrap();
        assert!(matches!(
            http.unregister_error_page("java.io.IOException", None),
            Err(WebError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_jsps_need_support() {
        let (factory, _journal) = setup();
        let http = factory.get_service(&bundle(1));
        assert!(matches!(http.register_jsps(None, None), Err(WebError::Unsupported(_))));
        assert!(matches!(http.unregister_jsps(None), Err(WebError::Unsupported(_))));
    }

    #[test]
    fn test_jsps_with_support() {
        let backend = RecordingFactory::default();
        let journal = backend.journal.clone();
        let controller = Arc::new(ServerController::new(Arc::new(backend)));
        controller.configure(WebConfiguration::default()).unwrap();
        controller.start().unwrap();
        let jsp: JspServletFactory = Arc::new(|_context: &ContextModel| -> Arc<dyn Servlet> { Arc::new(TestServlet) });
        let factory = HttpServiceFactory::new(controller).with_jsp_support(jsp);
        let http = factory.get_service(&bundle(1));

        assert_eq!(http.register_jsps(None, None).unwrap(), RegistrationStatus::Live);
        assert_eq!(entries(&journal).last().map(String::as_str), Some("+servlet jsp [] /"));
        // a second call is a no-op
        http.register_jsps(None, None).unwrap();
        http.unregister_jsps(None).unwrap();
        assert_eq!(entries(&journal).last().map(String::as_str), Some("-servlet jsp"));
        assert!(matches!(http.unregister_jsps(None), Err(WebError::IllegalArgument(_))));
    }

    #[test]
    fn test_servlet_with_patterns() {
        let (factory, journal) = setup();
        factory.controller().start().unwrap();
        let http = factory.get_service(&bundle(1));
        let options = ServletOptions::new(["/api/*", "*.do"])
            .with_name("api")
            .with_load_on_startup(Some(1))
            .with_async_supported(true);
        http.register_servlet_with_patterns(Arc::new(TestServlet), options, None).unwrap();
        assert_eq!(entries(&journal).last().map(String::as_str), Some("+servlet api [] /"));

        let invalid = http.register_servlet_with_patterns(Arc::new(TestServlet), ServletOptions::new(["api"]), None);
        assert!(matches!(invalid, Err(WebError::IllegalArgument(_))));
    }

    #[test]
    fn test_stop_tears_down_only_this_bundle() {
        let (factory, journal) = setup();
        factory.controller().start().unwrap();
        let first = factory.get_service(&bundle(1));
        let second = factory.get_service(&bundle(2));
        first.register_servlet("/one", Arc::new(TestServlet), named("one"), None).unwrap();
        first.register_filter(Arc::new(TestFilter), FilterOptions::new(["/*"]).with_name("f1"), None).unwrap();
        second.register_servlet("/two", Arc::new(TestServlet), named("two"), None).unwrap();

        journal.lock().clear();
        factory.unget_service(first.bundle());
        assert_eq!(entries(&journal), vec!["-filter f1", "-servlet one", "-context /"]);
        assert_eq!(second.status("/two"), Some(RegistrationStatus::Live));

        // stopped proxies discard further calls
        assert!(first.is_stopped());
        let discarded = first.register_servlet("/late", Arc::new(TestServlet), InitParams::new(), None);
        assert_eq!(discarded.unwrap(), RegistrationStatus::Discarded);
        first.stop();

        // no more replay for the stopped bundle
        journal.lock().clear();
        factory.controller().stop().unwrap();
        factory.controller().start().unwrap();
        assert_eq!(entries(&journal), vec!["stop", "start", "+servlet two [] /"]);
    }

    #[test]
    fn test_get_service_returns_same_proxy() {
        let (factory, _journal) = setup();
        let b = bundle(9);
        let first = factory.get_service(&b);
        let second = factory.get_service(&b);
        assert!(Arc::ptr_eq(&first, &second));

        factory.unget_service(&b);
        let fresh = factory.get_service(&b);
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(!fresh.is_stopped());
    }
}
