// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::config::WebConfiguration;
    use crate::controller::ServerController;
    use crate::core::{
        Bundle, DefaultHttpContext, EventListener, Filter, FilterChain, HttpContext,
        RegistrationStatus, Servlet, ServletError, WebRequest, WebResponse,
    };
    use crate::server::EmbeddedBackendFactory;
    use crate::service::HttpServiceFactory;
    use crate::whiteboard::{ServiceReference, ServletMapping, WhiteboardExtender, WhiteboardService};
    use async_trait::async_trait;
    use std::sync::Arc;

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

    /// The server is never started, so every registration stays pending.
    fn setup() -> (WhiteboardExtender, Arc<HttpServiceFactory>) {
        let controller = Arc::new(ServerController::new(Arc::new(EmbeddedBackendFactory::new())));
        controller.configure(WebConfiguration::default()).unwrap();
        let services = Arc::new(HttpServiceFactory::new(controller));
        (WhiteboardExtender::new(services.clone()), services)
    }

    fn bundle(id: u64) -> Arc<Bundle> {
        Arc::new(Bundle::new(id, &format!("whiteboard.{id}"), std::env::temp_dir()))
    }

    fn servlet() -> WhiteboardService {
        WhiteboardService::Servlet(Arc::new(TestServlet))
    }

    fn context_mapping(bundle: &Arc<Bundle>) -> WhiteboardService {
        let context: Arc<dyn HttpContext> = Arc::new(DefaultHttpContext::new(bundle.clone()));
        WhiteboardService::HttpContextMapping(context)
    }

    #[test]
    fn test_reference_properties() {
        let reference = ServiceReference::new(1, bundle(1))
            .with_property("urlPatterns", " /a/* , *.do ,")
            .with_property("init.color", "blue")
            .with_property("init.size", "7")
            .with_property("alias", "  ");

        assert_eq!(reference.list_property("urlPatterns"), vec!["/a/*", "*.do"]);
        assert_eq!(reference.property("alias"), None);
        let params = reference.init_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("color").map(String::as_str), Some("blue"));
    }

    #[test]
    fn test_servlet_with_alias() {
        let (extender, services) = setup();
        let b = bundle(1);
        let reference = ServiceReference::new(10, b.clone()).with_property("alias", "/wb");

        extender.service_added(reference.clone(), servlet());
        assert!(extender.is_registered(10));
        let http = services.get_service(&b);
        assert_eq!(http.status("/wb"), Some(RegistrationStatus::Pending));

        extender.service_removed(&reference);
        assert!(!extender.is_registered(10));
        assert_eq!(http.status("/wb"), None);
    }

    #[test]
    fn test_servlet_with_patterns_and_filter() {
        let (extender, services) = setup();
        let b = bundle(1);
        extender.service_added(
            ServiceReference::new(10, b.clone())
                .with_property("urlPatterns", "/api/*")
                .with_property("servlet-name", "api"),
            servlet(),
        );
        extender.service_added(
            ServiceReference::new(11, b.clone())
                .with_property("servletNames", "api")
                .with_property("dispatcher", "REQUEST,FORWARD"),
            WhiteboardService::Filter(Arc::new(TestFilter)),
        );
        extender.service_added(
            ServiceReference::new(12, b.clone()),
            WhiteboardService::Listener(Arc::new(TestListener)),
        );

        assert!(extender.is_registered(10));
        assert!(extender.is_registered(11));
        assert!(extender.is_registered(12));
        assert_eq!(services.get_service(&b).len(), 3);
    }

    #[test]
    fn test_failures_affect_only_that_service() {
        let (extender, _services) = setup();
        let b = bundle(1);
        // neither alias nor url patterns
        extender.service_added(ServiceReference::new(10, b.clone()), servlet());
        extender.service_added(
            ServiceReference::new(11, b.clone()).with_property("dispatcher", "SOMETIMES"),
            WhiteboardService::Filter(Arc::new(TestFilter)),
        );
        extender.service_added(ServiceReference::new(12, b.clone()).with_property("alias", "/ok"), servlet());

        assert!(!extender.is_registered(10));
        assert!(!extender.is_registered(11));
        assert!(extender.is_registered(12));
        assert!(extender.waiting().is_empty());
    }

    #[test]
    fn test_elements_wait_for_their_context() {
        let (extender, services) = setup();
        let b = bundle(1);
        let element = ServiceReference::new(10, b.clone())
            .with_property("alias", "/late")
            .with_property("httpContext.id", "shop");
        extender.service_added(element, servlet());
        assert_eq!(extender.waiting(), vec![10]);
        let http = services.get_service(&b);
        assert_eq!(http.status("/late"), None);

        let mapping = ServiceReference::new(20, b.clone()).with_property("httpContext.id", "shop");
        extender.service_added(mapping.clone(), context_mapping(&b));
        assert!(extender.waiting().is_empty());
        assert_eq!(http.status("/late"), Some(RegistrationStatus::Pending));

        extender.service_removed(&mapping);
        assert_eq!(extender.waiting(), vec![10]);
        assert_eq!(http.status("/late"), None);
    }

    #[test]
    fn test_private_and_shared_contexts() {
        let (extender, _services) = setup();
        let owner = bundle(1);
        let other = bundle(2);
        extender.service_added(
            ServiceReference::new(20, owner.clone()).with_property("httpContext.id", "private"),
            context_mapping(&owner),
        );
        extender.service_added(
            ServiceReference::new(21, owner.clone())
                .with_property("httpContext.id", "common")
                .with_property("httpContext.shared", "true"),
            context_mapping(&owner),
        );

        extender.service_added(
            ServiceReference::new(10, other.clone())
                .with_property("alias", "/p")
                .with_property("httpContext.id", "private"),
            servlet(),
        );
        extender.service_added(
            ServiceReference::new(11, other.clone())
                .with_property("alias", "/c")
                .with_property("httpContext.id", "common"),
            servlet(),
        );

        assert_eq!(extender.waiting(), vec![10]);
        assert!(extender.is_registered(11));
    }

    #[test]
    fn test_context_path_property() {
        let (extender, services) = setup();
        let b = bundle(1);
        extender.service_added(
            ServiceReference::new(20, b.clone())
                .with_property("httpContext.id", "app")
                .with_property("httpContext.path", "/app"),
            context_mapping(&b),
        );
        let element = ServiceReference::new(10, b.clone())
            .with_property("alias", "/x")
            .with_property("httpContext.id", "app");
        extender.service_added(element, servlet());

        let http = services.get_service(&b);
        assert!(http.status("/x").is_some());
        // the same alias is free at the root context
        let plain: Arc<dyn Servlet> = Arc::new(TestServlet);
        http.register_servlet("/x", plain, Default::default(), None).unwrap();
    }

    #[test]
    fn test_bundle_stopped_removes_everything() {
        let (extender, services) = setup();
        let b = bundle(1);
        extender.service_added(
            ServiceReference::new(20, b.clone()).with_property("httpContext.id", "ctx"),
            context_mapping(&b),
        );
        extender.service_added(
            ServiceReference::new(10, b.clone())
                .with_property("alias", "/one")
                .with_property("httpContext.id", "ctx"),
            servlet(),
        );
        extender.service_added(
            ServiceReference::new(11, b.clone()),
            WhiteboardService::ErrorPage {
                error: "404".to_string(),
                location: "/missing.html".to_string(),
            },
        );
        extender.service_added(
            ServiceReference::new(12, b.clone()),
            WhiteboardService::Resources {
                alias: "/static".to_string(),
                name: "/www".to_string(),
            },
        );
        let http = services.get_service(&b);
        assert_eq!(http.len(), 3);

        extender.bundle_stopped(&b);
        assert!(!extender.is_registered(10));
        assert!(extender.waiting().is_empty());
        assert_eq!(http.len(), 0);
        assert_eq!(http.status("/static"), None);
    }

    #[test]
    fn test_duplicate_service_id_is_ignored() {
        let (extender, services) = setup();
        let b = bundle(1);
        let reference = ServiceReference::new(10, b.clone()).with_property("alias", "/a");
        extender.service_added(reference.clone(), servlet());
        extender.service_added(reference.with_property("alias", "/b"), servlet());

        let http = services.get_service(&b);
        assert!(http.status("/a").is_some());
        assert!(http.status("/b").is_none());
    }

    #[test]
    fn test_servlet_mapping_uses_its_own_fields() {
        let (extender, services) = setup();
        let b = bundle(1);
        // properties of the reference do not apply to a mapping
        let reference = ServiceReference::new(10, b.clone())
            .with_property("alias", "/ignored")
            .with_property("httpContext.id", "ignored");
        let mapping = ServletMapping::new(Arc::new(TestServlet))
            .with_alias("/mapped")
            .with_servlet_name("mapped")
            .with_init_param("color", "blue");
        extender.service_added(reference.clone(), WhiteboardService::ServletMapping(mapping));

        assert!(extender.is_registered(10));
        let http = services.get_service(&b);
        assert_eq!(http.status("/mapped"), Some(RegistrationStatus::Pending));
        assert_eq!(http.status("/ignored"), None);

        extender.service_removed(&reference);
        assert_eq!(http.status("/mapped"), None);
        assert!(http.is_empty());
    }

    #[test]
    fn test_servlet_mapping_with_patterns_waits_for_its_context() {
        let (extender, services) = setup();
        let b = bundle(1);
        let servlet: Arc<dyn Servlet> = Arc::new(TestServlet);
        let mapping = ServletMapping::new(servlet.clone())
            .with_url_patterns(["/api/*", "*.do"])
            .with_http_context_id("api");
        extender.service_added(ServiceReference::new(10, b.clone()), WhiteboardService::ServletMapping(mapping));
        assert_eq!(extender.waiting(), vec![10]);

        extender.service_added(
            ServiceReference::new(20, b.clone()).with_property("httpContext.id", "api"),
            context_mapping(&b),
        );
        assert!(extender.is_registered(10));
        let http = services.get_service(&b);
        assert_eq!(http.len(), 1);
        // registered by instance, so unregistering the instance succeeds
        http.unregister_servlet(&servlet).unwrap();
        assert!(http.is_empty());

        let unmapped = ServletMapping::new(Arc::new(TestServlet));
        extender.service_added(ServiceReference::new(11, b), WhiteboardService::ServletMapping(unmapped));
        assert!(!extender.is_registered(11));
    }
}
