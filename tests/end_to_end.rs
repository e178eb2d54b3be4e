//! Build a site, then serve it through the HTTP layer.

#![cfg(unix)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::Site;
use function_router::build::manifest::read_manifest;
use function_router::{FunctionExecutor, HttpServer, SharedRouteTable, Shutdown};

async fn build(site: &Site) -> (function_router::HostConfig, SharedRouteTable) {
    let config = site.config();
    let orchestrator = site.orchestrator(config.clone());
    let table = orchestrator.discover().await;
    orchestrator.run_once(&table).await.unwrap();
    (config, SharedRouteTable::new(table))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_routes_dispatch_to_functions() {
    let site = Site::standard();
    let (config, routes) = build(&site).await;
    let app = HttpServer::new(&config.server, routes, FunctionExecutor::new(site.root())).router();

    let hello = app
        .clone()
        .oneshot(Request::get("/api/hello").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(hello.status(), StatusCode::OK);
    assert_eq!(hello.headers()["content-type"], "text/plain");
    assert!(hello.headers().contains_key("x-request-id"));
    assert_eq!(body_string(hello).await, "hello");

    let user = app
        .clone()
        .oneshot(Request::get("/api/users/7").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(user.status(), StatusCode::OK);
    let echoed: serde_json::Value = serde_json::from_str(&body_string(user).await).unwrap();
    assert_eq!(echoed["params"], serde_json::json!({"id": "7"}));
    assert_eq!(echoed["path"], "users/7");

    let index = app
        .clone()
        .oneshot(Request::get("/api").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_string(index).await, "index");

    let missing = app
        .clone()
        .oneshot(Request::get("/api/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let outside = app
        .oneshot(Request::get("/elsewhere").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(outside.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failing_function_reports_source() {
    let site = Site::new();
    let source = site.function("broken.sh", "echo nope >&2\nexit 2");
    let (config, routes) = build(&site).await;
    let app = HttpServer::new(&config.server, routes, FunctionExecutor::new(site.root())).router();

    let response = app
        .oneshot(Request::post("/api/broken").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(body.contains(&format!("Error when executing function \"{}\"", source.display())));
    assert!(body.contains("nope"));
}

#[tokio::test]
async fn test_manifest_serves_over_real_listener() {
    let site = Site::standard();
    let (config, _) = build(&site).await;

    let manifest = config.cache_dir().join("functions/manifest.json");
    let routes = SharedRouteTable::new(read_manifest(&manifest).unwrap());
    let server = HttpServer::new(&config.server, routes, FunctionExecutor::new(site.root()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let echoed: serde_json::Value = client
        .post(format!("http://{}/api/users/42?verbose=1", addr))
        .header("cookie", "session=abc; theme=dark")
        .json(&serde_json::json!({"name": "Ada"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["params"]["id"], "42");
    assert_eq!(echoed["query"]["verbose"], "1");
    assert_eq!(echoed["cookies"]["session"], "abc");
    assert_eq!(echoed["body"]["name"], "Ada");
    assert_eq!(echoed["bodyKind"], "json");

    let bad = client
        .post(format!("http://{}/api/users/42", addr))
        .header("content-type", "application/json")
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
