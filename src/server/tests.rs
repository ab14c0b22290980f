// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::config::WebConfiguration;
    use crate::controller::{BackendFactory, ConnectorConfig};
    use crate::core::{
        Bundle, DefaultHttpContext, DispatcherType, EventListener, Filter, FilterChain,
        HttpContext, InitParams, ServletConfig, ServletContext, ServletError, WebRequest,
        WebResponse, Servlet,
    };
    use crate::model::{ContextModel, ErrorPageModel, EventListenerModel, FilterModel, ServletModel, WelcomeFileModel};
    use crate::server::{Dispatcher, EmbeddedBackendFactory};
    use async_trait::async_trait;
    use hyper::Method;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::io::{Read, Write};
    use std::net::TcpStream;

    /// Writes its name, servlet path and path info.
    #[derive(Debug, Default)]
    struct EchoServlet {
        inits: AtomicUsize,
        destroys: AtomicUsize,
    }

    #[async_trait]
    impl Servlet for EchoServlet {
        fn init(&self, _config: &ServletConfig) -> Result<(), ServletError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn service(&self, req: &mut WebRequest, resp: &mut WebResponse) -> Result<(), ServletError> {
            resp.set_content_type("text/plain");
            resp.write_str(&format!(
                "{}|{}|{}",
                req.scope().and_then(|s| s.servlet_name()).unwrap_or_default(),
                req.servlet_path(),
                req.path_info().unwrap_or("-"),
            ));
            Ok(())
        }

        fn destroy(&self) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct FailingServlet;

    #[async_trait]
    impl Servlet for FailingServlet {
        async fn service(&self, _req: &mut WebRequest, _resp: &mut WebResponse) -> Result<(), ServletError> {
            Err(ServletError::of_type("java.lang.IllegalStateException", "boom"))
        }
    }

    #[derive(Debug)]
    struct NotFoundServlet;

    #[async_trait]
    impl Servlet for NotFoundServlet {
        async fn service(&self, _req: &mut WebRequest, resp: &mut WebResponse) -> Result<(), ServletError> {
            resp.send_error(404, Some("nothing here"));
            Ok(())
        }
    }

    /// Renders the error attributes set by the container.
    #[derive(Debug)]
    struct ErrorPageServlet;

    #[async_trait]
    impl Servlet for ErrorPageServlet {
        async fn service(&self, req: &mut WebRequest, resp: &mut WebResponse) -> Result<(), ServletError> {
            let status = req
                .attribute("javax.servlet.error.status_code")
                .and_then(|v| v.as_u64())
                .unwrap_or_default();
            let uri = req
                .attribute("javax.servlet.error.request_uri")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            resp.write_str(&format!("error page {status} for {uri} ({})", req.dispatcher_type()));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct HeaderFilter;

    #[async_trait]
    impl Filter for HeaderFilter {
        async fn do_filter(
            &self,
            req: &mut WebRequest,
            resp: &mut WebResponse,
            chain: FilterChain<'_>,
        ) -> Result<(), ServletError> {
            resp.set_header("X-Filtered", "yes")?;
            chain.do_filter(req, resp).await
        }
    }

    #[derive(Debug)]
    struct DenyAll;

    impl HttpContext for DenyAll {
        fn handle_security(&self, _req: &mut WebRequest, _resp: &mut WebResponse) -> bool {
            false
        }

        fn get_resource(&self, _name: &str) -> Option<std::path::PathBuf> {
            None
        }
    }

    #[derive(Debug, Default)]
    struct CountingListener {
        contexts: AtomicUsize,
        requests: AtomicUsize,
    }

    impl EventListener for CountingListener {
        fn context_initialized(&self, _context: &ServletContext) {
            self.contexts.fetch_add(1, Ordering::SeqCst);
        }

        fn request_initialized(&self, _request: &WebRequest) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct SessionServlet;

    #[async_trait]
    impl Servlet for SessionServlet {
        async fn service(&self, req: &mut WebRequest, resp: &mut WebResponse) -> Result<(), ServletError> {
            let session = req
                .session(true)
                .ok_or_else(|| ServletError::new("no session support"))?;
            let hits = session.attribute("hits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
            session.set_attribute("hits", serde_json::json!(hits));
            resp.write_str(&hits.to_string());
            Ok(())
        }
    }

    fn context(path: &str) -> Arc<ContextModel> {
        let bundle = Arc::new(Bundle::new(7, "test.bundle", std::env::temp_dir()));
        let http_context: Arc<dyn HttpContext> = Arc::new(DefaultHttpContext::new(bundle.clone()));
        Arc::new(ContextModel::new(http_context, bundle).with_context_path(path).unwrap())
    }

    fn aliased(ctx: &Arc<ContextModel>, alias: &str, servlet: Arc<dyn Servlet>) -> Arc<ServletModel> {
        let mut params = InitParams::new();
        params.insert("servlet-name".to_string(), alias.trim_start_matches('/').to_string());
        Arc::new(ServletModel::with_alias(ctx.clone(), servlet, alias, params).unwrap())
    }

    fn mapped(ctx: &Arc<ContextModel>, name: &str, patterns: &[&str], servlet: Arc<dyn Servlet>) -> Arc<ServletModel> {
        Arc::new(
            ServletModel::with_url_patterns(
                ctx.clone(),
                servlet,
                Some(name),
                patterns.iter().map(|p| p.to_string()).collect(),
                InitParams::new(),
            )
            .unwrap(),
        )
    }

    async fn get(dispatcher: &Dispatcher, path: &str) -> WebResponse {
        dispatcher.dispatch(WebRequest::new(Method::GET, path)).await
    }

    #[tokio::test]
    async fn test_longest_alias_wins() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/");
        dispatcher.add_servlet(&aliased(&ctx, "/a", Arc::new(EchoServlet::default()))).unwrap();
        dispatcher.add_servlet(&aliased(&ctx, "/a/b", Arc::new(EchoServlet::default()))).unwrap();

        assert_eq!(get(&dispatcher, "/a/b/c/d").await.body_string(), "a/b|/a/b|/c/d");
        assert_eq!(get(&dispatcher, "/a/bc").await.body_string(), "a|/a|/bc");
        assert_eq!(get(&dispatcher, "/a").await.body_string(), "a|/a|-");
        assert_eq!(get(&dispatcher, "/x").await.status(), 404);
    }

    #[tokio::test]
    async fn test_mapping_precedence() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/app");
        dispatcher.add_servlet(&mapped(&ctx, "default", &["/"], Arc::new(EchoServlet::default()))).unwrap();
        dispatcher.add_servlet(&mapped(&ctx, "jsp", &["*.jsp"], Arc::new(EchoServlet::default()))).unwrap();
        dispatcher.add_servlet(&mapped(&ctx, "api", &["/api/*"], Arc::new(EchoServlet::default()))).unwrap();
        dispatcher.add_servlet(&mapped(&ctx, "exact", &["/api/status"], Arc::new(EchoServlet::default()))).unwrap();

        assert_eq!(get(&dispatcher, "/app/api/status").await.body_string(), "exact|/api/status|-");
        assert_eq!(get(&dispatcher, "/app/api/x.jsp").await.body_string(), "api|/api|/x.jsp");
        assert_eq!(get(&dispatcher, "/app/page.jsp").await.body_string(), "jsp|/page.jsp|-");
        assert_eq!(get(&dispatcher, "/app/other").await.body_string(), "default|/other|-");
    }

    #[tokio::test]
    async fn test_context_root_redirects_with_slash() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/war");
        dispatcher.add_servlet(&aliased(&ctx, "/wc", Arc::new(EchoServlet::default()))).unwrap();

        let response = get(&dispatcher, "/war").await;
        assert_eq!(response.status(), 302);
        assert_eq!(response.header("location"), Some("/war/"));
    }

    #[tokio::test]
    async fn test_error_page_for_status_code() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/war");
        dispatcher.add_servlet(&mapped(&ctx, "error", &["/error.jsp"], Arc::new(ErrorPageServlet))).unwrap();
        dispatcher.add_error_page(&Arc::new(ErrorPageModel::new(ctx.clone(), "404", "/error.jsp").unwrap()));

        let response = get(&dispatcher, "/war/wrong/").await;
        assert_eq!(response.status(), 404);
        assert_eq!(response.body_string(), "error page 404 for /war/wrong/ (ERROR)");
    }

    #[tokio::test]
    async fn test_send_error_without_error_page() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/");
        dispatcher.add_servlet(&aliased(&ctx, "/missing", Arc::new(NotFoundServlet))).unwrap();

        let response = get(&dispatcher, "/missing").await;
        assert_eq!(response.status(), 404);
        assert!(response.body_string().contains("nothing here"));
    }

    #[tokio::test]
    async fn test_exception_error_page() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/");
        dispatcher.add_servlet(&aliased(&ctx, "/fail", Arc::new(FailingServlet))).unwrap();
        dispatcher.add_servlet(&aliased(&ctx, "/oops", Arc::new(ErrorPageServlet))).unwrap();

        let response = get(&dispatcher, "/fail").await;
        assert_eq!(response.status(), 500);
        assert!(response.body_string().contains("boom"));

        dispatcher.add_error_page(&Arc::new(
            ErrorPageModel::new(ctx.clone(), "java.lang.IllegalStateException", "/oops").unwrap(),
        ));
        let response = get(&dispatcher, "/fail").await;
        assert_eq!(response.status(), 500);
        assert_eq!(response.body_string(), "error page 500 for /fail (ERROR)");
    }

    #[tokio::test]
    async fn test_security_denial_is_401() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let bundle = Arc::new(Bundle::new(3, "secured", std::env::temp_dir()));
        let ctx = Arc::new(ContextModel::new(Arc::new(DenyAll), bundle));
        dispatcher.add_servlet(&aliased(&ctx, "/secret", Arc::new(EchoServlet::default()))).unwrap();

        let response = get(&dispatcher, "/secret").await;
        assert_eq!(response.status(), 401);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn test_filters_of_the_same_context() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/");
        let other = context("/");
        dispatcher.add_servlet(&aliased(&ctx, "/one", Arc::new(EchoServlet::default()))).unwrap();
        dispatcher.add_servlet(&aliased(&other, "/two", Arc::new(EchoServlet::default()))).unwrap();
        let filter = FilterModel::new(
            ctx.clone(),
            Arc::new(HeaderFilter),
            Some("header"),
            vec!["/*".to_string()],
            Vec::new(),
            vec![DispatcherType::Request],
            InitParams::new(),
        )
        .unwrap();
        dispatcher.add_filter(&Arc::new(filter)).unwrap();

        assert_eq!(get(&dispatcher, "/one").await.header("x-filtered"), Some("yes"));
        assert_eq!(get(&dispatcher, "/two").await.header("x-filtered"), None);
    }

    #[tokio::test]
    async fn test_welcome_file_forward_and_redirect() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/site");
        dispatcher.add_servlet(&mapped(&ctx, "index", &["/index.do"], Arc::new(EchoServlet::default()))).unwrap();
        let welcome = Arc::new(WelcomeFileModel::new(ctx.clone(), vec!["index.do".to_string()], false).unwrap());
        dispatcher.add_welcome_files(&welcome);

        assert_eq!(get(&dispatcher, "/site/").await.body_string(), "index|/index.do|-");

        dispatcher.remove_welcome_files(&welcome);
        let redirecting = WelcomeFileModel::new(ctx.clone(), vec!["index.do".to_string()], true).unwrap();
        dispatcher.add_welcome_files(&Arc::new(redirecting));
        let response = get(&dispatcher, "/site/").await;
        assert_eq!(response.status(), 302);
        assert_eq!(response.header("location"), Some("/site/index.do"));
    }

    #[tokio::test]
    async fn test_session_cookie_and_reuse() {
        let dispatcher = Dispatcher::new("SID");
        let ctx = context("/");
        dispatcher.add_servlet(&aliased(&ctx, "/count", Arc::new(SessionServlet))).unwrap();

        let first = get(&dispatcher, "/count").await;
        assert_eq!(first.body_string(), "1");
        let cookie = first.header("set-cookie").unwrap().to_string();
        assert!(cookie.starts_with("SID="));
        assert!(cookie.contains("HttpOnly"));
        let session_id = cookie.split(';').next().unwrap().to_string();

        let mut headers = hyper::HeaderMap::new();
        headers.insert(hyper::header::COOKIE, session_id.parse().unwrap());
        let second = dispatcher
            .dispatch(WebRequest::new(Method::GET, "/count").with_headers(headers))
            .await;
        assert_eq!(second.body_string(), "2");
        assert_eq!(second.header("set-cookie"), None);
    }

    #[tokio::test]
    async fn test_listeners_and_servlet_lifecycle() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let ctx = context("/");
        let listener = Arc::new(CountingListener::default());
        let servlet = Arc::new(EchoServlet::default());
        let model = aliased(&ctx, "/echo", servlet.clone());

        dispatcher.add_event_listener(&Arc::new(EventListenerModel::new(ctx.clone(), listener.clone())));
        dispatcher.add_servlet(&model).unwrap();
        // replaying the same model does not initialise twice
        dispatcher.add_servlet(&model).unwrap();
        assert_eq!(servlet.inits.load(Ordering::SeqCst), 1);
        assert_eq!(listener.contexts.load(Ordering::SeqCst), 1);

        get(&dispatcher, "/echo").await;
        assert_eq!(listener.requests.load(Ordering::SeqCst), 1);

        dispatcher.remove_context(&ctx);
        assert_eq!(servlet.destroys.load(Ordering::SeqCst), 1);
        assert!(dispatcher.context_paths().is_empty());
        assert_eq!(get(&dispatcher, "/echo").await.status(), 404);
    }

    #[tokio::test]
    async fn test_remove_one_of_two_root_contexts() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let first = context("/");
        let second = context("/");
        dispatcher.add_servlet(&aliased(&first, "/one", Arc::new(EchoServlet::default()))).unwrap();
        dispatcher.add_servlet(&aliased(&second, "/two", Arc::new(EchoServlet::default()))).unwrap();

        dispatcher.remove_context(&first);
        assert_eq!(get(&dispatcher, "/one").await.status(), 404);
        assert_eq!(get(&dispatcher, "/two").await.status(), 200);
        assert_eq!(dispatcher.context_paths(), vec!["/".to_string()]);
    }

    async fn get_from(dispatcher: &Dispatcher, host: &str, path: &str) -> WebResponse {
        let mut headers = hyper::HeaderMap::new();
        headers.insert(hyper::header::HOST, host.parse().unwrap());
        dispatcher
            .dispatch(WebRequest::new(Method::GET, path).with_headers(headers))
            .await
    }

    #[tokio::test]
    async fn test_virtual_hosts_select_the_context() {
        let dispatcher = Dispatcher::new("JSESSIONID");
        let bundle = Arc::new(Bundle::new(7, "test.bundle", std::env::temp_dir()));
        let http_context: Arc<dyn HttpContext> = Arc::new(DefaultHttpContext::new(bundle.clone()));
        let shop = Arc::new(
            ContextModel::new(http_context, bundle)
                .with_context_path("/shop")
                .unwrap()
                .with_virtual_hosts(vec!["shop.example.com".to_string(), "*.shop.test".to_string()]),
        );
        let root = context("/");
        dispatcher.add_servlet(&mapped(&shop, "shop", &["/*"], Arc::new(EchoServlet::default()))).unwrap();
        dispatcher.add_servlet(&mapped(&root, "fallback", &["/*"], Arc::new(EchoServlet::default()))).unwrap();

        let response = get_from(&dispatcher, "shop.example.com:8080", "/shop/cart").await;
        assert_eq!(response.body_string(), "shop||/cart");
        let response = get_from(&dispatcher, "SHOP.example.com", "/shop/cart").await;
        assert_eq!(response.body_string(), "shop||/cart");
        let response = get_from(&dispatcher, "eu.shop.test", "/shop/cart").await;
        assert_eq!(response.body_string(), "shop||/cart");

        // other hosts fall through to the root context
        let response = get_from(&dispatcher, "www.example.com", "/shop/cart").await;
        assert_eq!(response.body_string(), "fallback||/shop/cart");
        assert_eq!(get(&dispatcher, "/shop/cart").await.body_string(), "fallback||/shop/cart");
        let response = get_from(&dispatcher, "[::1]:8080", "/other").await;
        assert_eq!(response.body_string(), "fallback||/other");

        dispatcher.remove_context(&root);
        assert_eq!(get_from(&dispatcher, "www.example.com", "/shop/cart").await.status(), 404);
    }

    #[test]
    fn test_embedded_backend_serves_http() {
        let configuration = WebConfiguration::default()
            .with_http_port(0)
            .with_listening_addresses(vec!["127.0.0.1".to_string()]);
        let mut backend = EmbeddedBackendFactory::new().create_server(&configuration).unwrap();
        backend
            .add_connector(ConnectorConfig::Http { address: "127.0.0.1".to_string(), port: 0 })
            .unwrap();
        backend.configure_context(BTreeMap::new(), None).unwrap();
        backend.start().unwrap();

        let ctx = context("/");
        backend.add_servlet(&aliased(&ctx, "/echo", Arc::new(EchoServlet::default()))).unwrap();

        let addr = backend.local_addresses()[0];
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .write_all(b"GET /echo/hello%20world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();

        assert!(raw.starts_with("HTTP/1.1 200"), "{raw}");
        assert!(raw.ends_with("echo|/echo|/hello world"), "{raw}");

        backend.stop().unwrap();
        assert!(backend.local_addresses().is_empty());
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn test_secure_only_backend_fails_to_start() {
        let configuration = WebConfiguration::default();
        let mut backend = EmbeddedBackendFactory::new().create_server(&configuration).unwrap();
        backend
            .add_connector(ConnectorConfig::Secure {
                address: "127.0.0.1".to_string(),
                port: 0,
                ssl: Default::default(),
            })
            .unwrap();
        assert!(backend.start().is_err());
    }
}
