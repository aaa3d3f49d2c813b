//! Dispatch Engine Tests
//!
//! These tests drive `Server::handle_bytes` directly with raw JSON-RPC
//! bodies and verify:
//! - Single and batched dispatch
//! - Response ordering under parallel handler execution
//! - Per-call isolation of errors and panics
//! - Protocol error handling for malformed bodies
//! - The params hook (header injection path)

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use wirerpc_common::params::{Headers, ParamsMeta};
use wirerpc_common::protocol::{CallError, Output, OutputError, RpcError};
use wirerpc_common::rpc_object;
use wirerpc_server::{ParamsHook, Server};

rpc_object! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct EchoParams {
        pub t: i64,
    }
}

rpc_object! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct SleepParams {
        pub millis: u64,
        pub tag: String,
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

async fn panicking_handler() -> Value {
    panic!("handler exploded")
}

fn test_server() -> Server {
    let server = Server::new();
    server.set("echo", |p: EchoParams| async move { p });
    server.set("add", |p: Vec<i64>| async move { p.iter().sum::<i64>() });
    server.set("sleepy", |p: SleepParams| async move {
        tokio::time::sleep(Duration::from_millis(p.millis)).await;
        p.tag
    });
    server.set("boom", || async {
        Err::<Value, _>(CallError::Rpc(OutputError {
            code: Some(123),
            message: Some("boom".to_string()),
            data: Some(json!({"x": 1})),
        }))
    });
    server.set("textual", || async { Err::<Value, _>(CallError::from("plain failure")) });
    server.set("panics", panicking_handler);
    server
}

async fn dispatch(server: &Server, body: &str) -> Value {
    let bytes = server.handle_bytes(body.as_bytes(), 0, None).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_single_request_echo() {
    let server = test_server();
    let response = dispatch(&server, r#"{"method":"echo","params":{"t":1}}"#).await;
    assert_eq!(response, json!({"result": {"t": 1}}));
}

#[tokio::test]
async fn test_batch_preserves_order_and_isolates_failures() {
    let server = test_server();
    let response = dispatch(
        &server,
        r#"[{"method":"add","params":[1,2]},{"method":"missing"}]"#,
    )
    .await;
    assert_eq!(
        response,
        json!([
            {"result": 3},
            {"error": {"message": "method not found"}}
        ])
    );
}

#[tokio::test]
async fn test_batch_order_under_arbitrary_sleeps() {
    let server = test_server();
    let body = json!([
        {"id": "a", "method": "sleepy", "params": {"millis": 120, "tag": "slow"}},
        {"id": "b", "method": "sleepy", "params": {"millis": 1, "tag": "fast"}},
        {"id": "c", "method": "sleepy", "params": {"millis": 60, "tag": "middle"}},
    ]);
    let response = dispatch(&server, &body.to_string()).await;
    let outputs: Vec<Output> = serde_json::from_value(response).unwrap();
    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[0].id.as_deref(), Some("a"));
    assert_eq!(outputs[0].result, Some(json!("slow")));
    assert_eq!(outputs[1].id.as_deref(), Some("b"));
    assert_eq!(outputs[1].result, Some(json!("fast")));
    assert_eq!(outputs[2].id.as_deref(), Some("c"));
    assert_eq!(outputs[2].result, Some(json!("middle")));
}

#[tokio::test]
async fn test_batch_runs_concurrently() {
    let server = test_server();
    let body = json!([
        {"method": "sleepy", "params": {"millis": 80, "tag": "one"}},
        {"method": "sleepy", "params": {"millis": 80, "tag": "two"}},
        {"method": "sleepy", "params": {"millis": 80, "tag": "three"}},
    ]);
    let started = std::time::Instant::now();
    dispatch(&server, &body.to_string()).await;
    // three 80ms handlers fanned out in parallel finish well under 240ms
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn test_empty_batch_short_circuits() {
    let server = test_server();
    let bytes = server.handle_bytes(b"[]", 0, None).await.unwrap();
    assert_eq!(bytes, b"[]");
}

#[tokio::test]
async fn test_empty_body_rejected() {
    let server = test_server();
    let err = server.handle_bytes(b"", 0, None).await.unwrap_err();
    assert_eq!(err.to_string(), "zero bytes handled");
}

#[tokio::test]
async fn test_non_json_first_byte_rejected() {
    let server = test_server();
    let err = server.handle_bytes(b"XYZ", 0, None).await.unwrap_err();
    assert_eq!(err.to_string(), "firstSymbol is not a json part");
    assert!(matches!(err, RpcError::NotJson));
}

#[tokio::test]
async fn test_leading_whitespace_is_skipped() {
    let server = test_server();
    let response = dispatch(&server, "  \n\t{\"method\":\"echo\",\"params\":{\"t\":7}}").await;
    assert_eq!(response, json!({"result": {"t": 7}}));
}

#[tokio::test]
async fn test_structured_error_passes_through_verbatim() {
    let server = test_server();
    let response = dispatch(&server, r#"{"method":"boom"}"#).await;
    assert_eq!(
        response,
        json!({"error": {"code": 123, "message": "boom", "data": {"x": 1}}})
    );
}

#[tokio::test]
async fn test_textual_error_wrapped_as_message() {
    let server = test_server();
    let response = dispatch(&server, r#"{"method":"textual"}"#).await;
    assert_eq!(response, json!({"error": {"message": "plain failure"}}));
}

#[tokio::test]
async fn test_params_decode_failure_is_per_call() {
    let server = test_server();
    let response = dispatch(
        &server,
        r#"[{"method":"echo","params":{"t":"not a number"}},{"method":"echo","params":{"t":2}}]"#,
    )
    .await;
    let outputs: Vec<Output> = serde_json::from_value(response).unwrap();
    assert!(outputs[0].error.is_some());
    assert_eq!(outputs[1].result, Some(json!({"t": 2})));
}

#[tokio::test]
async fn test_panicking_handler_does_not_poison_siblings() {
    let server = test_server();
    let response = dispatch(
        &server,
        r#"[{"id":"p","method":"panics"},{"id":"ok","method":"echo","params":{"t":5}}]"#,
    )
    .await;
    let outputs: Vec<Output> = serde_json::from_value(response).unwrap();
    assert_eq!(outputs[0].id.as_deref(), Some("p"));
    let message = outputs[0].error.as_ref().unwrap().message.clone().unwrap();
    assert!(message.contains("panicked"));
    assert_eq!(outputs[1].id.as_deref(), Some("ok"));
    assert_eq!(outputs[1].result, Some(json!({"t": 5})));
}

#[tokio::test]
async fn test_missing_params_decode_to_default() {
    let server = test_server();
    let response = dispatch(&server, r#"{"method":"echo"}"#).await;
    assert_eq!(response, json!({"result": {"t": 0}}));
}

#[tokio::test]
async fn test_nullary_method_with_unit_result() {
    let server = test_server();
    server.set("noop", || async {});
    let response = dispatch(&server, r#"{"id":"n","method":"noop"}"#).await;
    assert_eq!(response, json!({"id": "n"}));
}

#[tokio::test]
async fn test_params_hook_runs_before_handler() {
    let server = Server::new();
    server.set("whoami", |p: TokenParams| async move {
        format!(
            "{}:{}",
            p.name,
            p.header.get("x-token").unwrap_or("none")
        )
    });

    let mut injected = http::HeaderMap::new();
    injected.insert("x-token", http::HeaderValue::from_static("sesame"));
    let headers = Headers(injected);
    let hook: ParamsHook = Arc::new(move |params: &mut dyn ParamsMeta| {
        if let Some(slot) = params.header_slot() {
            *slot = headers.clone();
        }
    });

    let bytes = server
        .handle_bytes(
            br#"{"method":"whoami","params":{"name":"ali"}}"#,
            0,
            Some(hook),
        )
        .await
        .unwrap();
    let response: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(response, json!({"result": "ali:sesame"}));
}
