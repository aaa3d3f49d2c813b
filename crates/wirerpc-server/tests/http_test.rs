//! HTTP Listener Tests
//!
//! End-to-end tests against a real `listen_http` instance on an ephemeral
//! port:
//! - JSON-RPC dispatch over POST /api/rpc
//! - The OpenRPC schema document
//! - CORS preflight and origin allow-listing
//! - Header injection into params
//! - Error status mapping

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use wirerpc_common::params::Headers;
use wirerpc_common::rpc_object;
use wirerpc_server::Server;

rpc_object! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct EchoParams {
        pub t: i64,
    }
}

rpc_object! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct TokenParams {
        pub name: String,
        #[serde(skip)]
        pub header: Headers => r#"widget:"hidden""#,
    }
    headers: header
}

/// Start a fully populated server on an ephemeral port and return its base
/// URL.
async fn start_server(configure: impl FnOnce(&Server)) -> (Server, String) {
    let server = Server::new();
    server.set("echo", |p: EchoParams| async move { p });
    server.set("token", |p: TokenParams| async move {
        p.header.get("x-token").unwrap_or("none").to_string()
    });
    configure(&server);

    let listening = server.clone();
    tokio::spawn(async move { listening.listen_http("127.0.0.1:0").await });
    let addr = wait_for_addr(|| server.http_addr()).await;
    (server, format!("http://{}", addr))
}

async fn wait_for_addr(addr: impl Fn() -> Option<SocketAddr>) -> SocketAddr {
    for _ in 0..100 {
        if let Some(addr) = addr() {
            return addr;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("listener did not come up");
}

#[tokio::test]
async fn test_post_single_request() {
    let (_server, base) = start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/rpc"))
        .body(r#"{"method":"echo","params":{"t":1}}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/json; charset=utf-8"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"result": {"t": 1}}));
}

#[tokio::test]
async fn test_post_batch_request() {
    let (_server, base) = start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{base}/api/rpc"))
        .body(r#"[{"id":"1","method":"echo","params":{"t":1}},{"id":"2","method":"missing"}]"#)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body,
        json!([
            {"result": {"t": 1}, "id": "1"},
            {"error": {"message": "method not found"}, "id": "2"}
        ])
    );
}

#[tokio::test]
async fn test_malformed_body_is_500() {
    let (_server, base) = start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/rpc"))
        .body("X")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": {"message": "firstSymbol is not a json part"}})
    );
}

#[tokio::test]
async fn test_unknown_path_is_501() {
    let (_server, base) = start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/other"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 501);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": {"message": "not implemented"}}));
}

#[tokio::test]
async fn test_request_headers_injected_into_params() {
    let (_server, base) = start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{base}/api/rpc"))
        .header("x-token", "sesame")
        .body(r#"{"method":"token","params":{"name":"ali"}}"#)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"result": "sesame"}));
}

#[tokio::test]
async fn test_schema_document() {
    let (server, base) = start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{base}/api/rpc/schema"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["openrpc"], "1.2.6");
    assert_eq!(body["info"]["version"], "1.0.0");
    let methods = body["methods"].as_array().unwrap();
    assert_eq!(methods.len(), server.methods().len());
    assert!(body["$defs"]["EchoParams"].is_object());
    // the hidden header slot stays out of the document
    assert!(body["$defs"]["TokenParams"]["properties"].get("header").is_none());
}

#[tokio::test]
async fn test_cors_preflight_without_allowlist() {
    let (_server, base) = start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{base}/api/rpc"))
        .header("origin", "https://anything.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Authorization, Content-Type"
    );
    assert_eq!(
        headers["access-control-allow-methods"],
        "GET, POST, OPTIONS, PUT, DELETE"
    );
}

#[tokio::test]
async fn test_cors_allowlist_exact_match_only() {
    let (_server, base) = start_server(|server| {
        server.set_allow_origins(vec!["https://app.example".to_string()]);
    })
    .await;
    let client = reqwest::Client::new();

    let allowed = client
        .request(reqwest::Method::OPTIONS, format!("{base}/api/rpc"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "https://app.example"
    );

    let denied = client
        .request(reqwest::Method::OPTIONS, format!("{base}/api/rpc"))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();
    assert!(denied
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
