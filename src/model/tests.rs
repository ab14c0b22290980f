// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::core::{
        Bundle, DefaultHttpContext, DispatcherType, Filter, FilterChain, HttpContext, InitParams,
        Servlet, ServletError, WebError, WebRequest, WebResponse,
    };
    use crate::model::{
        ContextModel, ErrorPageKey, ErrorPageModel, FilterModel, ServerModel, ServletModel,
        WebElement, WelcomeFileModel,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Debug)]
    struct NoopServlet;

    #[async_trait]
    impl Servlet for NoopServlet {
        async fn service(&self, _req: &mut WebRequest, _resp: &mut WebResponse) -> Result<(), ServletError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct NoopFilter;

    #[async_trait]
    impl Filter for NoopFilter {
        async fn do_filter(
            &self,
            req: &mut WebRequest,
            resp: &mut WebResponse,
            chain: FilterChain<'_>,
        ) -> Result<(), ServletError> {
            chain.do_filter(req, resp).await
        }
    }

    fn context(path: &str) -> Arc<ContextModel> {
        let bundle = Arc::new(Bundle::new(1, "test.bundle", "/tmp"));
        let http_context: Arc<dyn HttpContext> = Arc::new(DefaultHttpContext::new(bundle.clone()));
        Arc::new(ContextModel::new(http_context, bundle).with_context_path(path).unwrap())
    }

    #[test]
    fn test_alias_maps_to_prefix_pattern() {
        let model = ServletModel::with_alias(context("/"), Arc::new(NoopServlet), "/hello", InitParams::new()).unwrap();
        assert_eq!(model.url_patterns(), ["/hello/*".to_string()]);
        assert_eq!(model.qualified_alias().as_deref(), Some("/hello"));

        let root = ServletModel::with_alias(context("/"), Arc::new(NoopServlet), "/", InitParams::new()).unwrap();
        assert_eq!(root.url_patterns(), ["/*".to_string()]);
    }

    #[test]
    fn test_qualified_alias_includes_context_path() {
        let model = ServletModel::with_alias(context("/war"), Arc::new(NoopServlet), "/wc", InitParams::new()).unwrap();
        assert_eq!(model.qualified_alias().as_deref(), Some("/war/wc"));

        let root = ServletModel::with_alias(context("/war"), Arc::new(NoopServlet), "/", InitParams::new()).unwrap();
        assert_eq!(root.qualified_alias().as_deref(), Some("/war"));
    }

    #[test]
    fn test_servlet_name_defaults() {
        let mut params = InitParams::new();
        params.insert("servlet-name".to_string(), "greeter".to_string());
        let named = ServletModel::with_alias(context("/"), Arc::new(NoopServlet), "/a", params).unwrap();
        assert_eq!(named.name(), "greeter");

        let unnamed = ServletModel::with_alias(context("/"), Arc::new(NoopServlet), "/b", InitParams::new()).unwrap();
        assert_eq!(unnamed.name(), unnamed.id());
    }

    #[test]
    fn test_malformed_alias_is_rejected() {
        for alias in ["", "hello", "/hello/"] {
            let result = ServletModel::with_alias(context("/"), Arc::new(NoopServlet), alias, InitParams::new());
            assert!(matches!(result, Err(WebError::Namespace(_))), "alias {alias:?}");
        }
    }

    #[test]
    fn test_resource_name_must_not_end_with_slash() {
        let result = ServletModel::resources(context("/"), "/static", "/www/");
        assert!(matches!(result, Err(WebError::IllegalArgument(_))));

        let root = ServletModel::resources(context("/"), "/", "/").unwrap();
        assert_eq!(root.resource().map(|r| r.name()), Some("/"));
    }

    #[test]
    fn test_url_patterns_are_validated() {
        let empty = ServletModel::with_url_patterns(context("/"), Arc::new(NoopServlet), None, vec![], InitParams::new());
        assert!(matches!(empty, Err(WebError::IllegalArgument(_))));

        let bad = ServletModel::with_url_patterns(
            context("/"),
            Arc::new(NoopServlet),
            None,
            vec!["no-slash".to_string()],
            InitParams::new(),
        );
        assert!(matches!(bad, Err(WebError::IllegalArgument(_))));
    }

    #[test]
    fn test_filter_matching() {
        let filter = FilterModel::new(
            context("/"),
            Arc::new(NoopFilter),
            Some("audit"),
            vec!["/api/*".to_string(), "*.do".to_string()],
            vec!["reports".to_string()],
            vec![],
            InitParams::new(),
        )
        .unwrap();

        assert_eq!(filter.dispatcher_types(), [DispatcherType::Request]);
        assert!(filter.applies_to(DispatcherType::Request, "/api/users", None));
        assert!(filter.applies_to(DispatcherType::Request, "/api", None));
        assert!(filter.applies_to(DispatcherType::Request, "/x/y.do", None));
        assert!(filter.applies_to(DispatcherType::Request, "/other", Some("reports")));
        assert!(!filter.applies_to(DispatcherType::Request, "/apix", None));
        assert!(!filter.applies_to(DispatcherType::Error, "/api/users", None));
    }

    #[test]
    fn test_filter_needs_a_mapping() {
        let result = FilterModel::new(context("/"), Arc::new(NoopFilter), None, vec![], vec![], vec![], InitParams::new());
        assert!(matches!(result, Err(WebError::IllegalArgument(_))));
    }

    #[test]
    fn test_error_page_keys() {
        assert_eq!(ErrorPageKey::parse("404").unwrap(), ErrorPageKey::Code(404));
        assert_eq!(
            ErrorPageKey::parse("java.lang.IllegalStateException").unwrap(),
            ErrorPageKey::Exception("java.lang.IllegalStateException".to_string())
        );
        assert!(ErrorPageKey::parse("200").is_err());
        assert!(ErrorPageModel::new(context("/"), "404", "error.html").is_err());
    }

    #[test]
    fn test_welcome_files_are_normalized() {
        let model = WelcomeFileModel::new(context("/"), vec!["/index.html".to_string(), " ".to_string()], false).unwrap();
        assert_eq!(model.files(), ["index.html".to_string()]);
        assert!(WelcomeFileModel::new(context("/"), vec![], false).is_err());
    }

    #[test]
    fn test_server_model_keeps_registration_order() {
        let ctx = context("/");
        let servlet = Arc::new(ServletModel::with_alias(ctx.clone(), Arc::new(NoopServlet), "/a", InitParams::new()).unwrap());
        let filter = Arc::new(
            FilterModel::new(ctx.clone(), Arc::new(NoopFilter), None, vec!["/*".to_string()], vec![], vec![], InitParams::new())
                .unwrap(),
        );
        let error_page = Arc::new(ErrorPageModel::new(ctx.clone(), "404", "/404.html").unwrap());

        let mut model = ServerModel::new();
        model.add(WebElement::Servlet(servlet.clone()));
        model.add(WebElement::Filter(filter.clone()));
        model.add(WebElement::ErrorPage(error_page.clone()));

        let ids: Vec<&str> = model.elements().map(|e| e.id()).collect();
        assert_eq!(ids, vec![servlet.id(), filter.id(), error_page.id()]);

        assert!(model.servlet_by_alias("/a").is_some());
        assert!(model.servlet_by_key(servlet.servlet_key()).is_some());
        assert!(model.filter_by_key(filter.filter_key()).is_some());
        assert!(model.error_page(ctx.id(), &ErrorPageKey::Code(404)).is_some());

        model.remove(filter.id());
        let drained: Vec<String> = model.drain_reversed().iter().map(|e| e.id().to_string()).collect();
        assert_eq!(drained, vec![error_page.id().to_string(), servlet.id().to_string()]);
        assert!(model.is_empty());
    }
}
