// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HttpService and whiteboard registrations, served over HTTP.

mod common;

use common::{HelloWorldServlet, base_url, bundle_dir, pax_web};
use paxweb::{Bundle, RegistrationStatus, ServiceReference, WhiteboardService};
use std::collections::BTreeMap;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread")]
async fn test_registrations_survive_a_restart() {
    let dir = bundle_dir(&[("www/readme.txt", "read me")]);
    let bundle = Arc::new(Bundle::new(1, "org.example.hello", dir.path()));
    let pax = pax_web();
    let http = pax.http_service(bundle);

    let status = http
        .register_servlet("/hello", Arc::new(HelloWorldServlet), BTreeMap::new(), None)
        .unwrap();
    assert_eq!(status, RegistrationStatus::Pending);
    http.register_resources("/docs", "/www", None).unwrap();

    pax.start().unwrap();
    let base = base_url(&pax);
    let body = reqwest::get(format!("{base}/hello")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "<h1>Hello World</h1>");
    let body = reqwest::get(format!("{base}/docs/readme.txt")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "read me");

    pax.stop().unwrap();
    pax.start().unwrap();
    let base = base_url(&pax);
    let response = reqwest::get(format!("{base}/hello")).await.unwrap();
    assert_eq!(response.status(), 200);

    http.unregister("/hello").unwrap();
    let response = reqwest::get(format!("{base}/hello")).await.unwrap();
    assert_eq!(response.status(), 404);

    pax.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_whiteboard_servlet() {
    let bundle = Arc::new(Bundle::new(7, "org.example.whiteboard", std::env::temp_dir()));
    let pax = pax_web();
    pax.start().unwrap();
    let base = base_url(&pax);

    let reference = ServiceReference::new(100, bundle).with_property("alias", "/wb");
    pax.whiteboard()
        .service_added(reference.clone(), WhiteboardService::Servlet(Arc::new(HelloWorldServlet)));
    let body = reqwest::get(format!("{base}/wb")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "<h1>Hello World</h1>");

    pax.whiteboard().service_removed(&reference);
    let response = reqwest::get(format!("{base}/wb")).await.unwrap();
    assert_eq!(response.status(), 404);

    pax.shutdown().unwrap();
}
