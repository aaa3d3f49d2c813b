//! JSON-RPC 2.0 Protocol Types
//!
//! This module defines the request/response pairs exchanged by every wirerpc
//! transport, following the JSON-RPC 2.0 specification:
//!
//! - Request format: `{"id": ..., "method": "...", "params": ..., "jsonrpc": "2.0"}`
//! - Response format: `{"result": ..., "error": ..., "jsonrpc": "2.0", "id": ...}`
//! - Error format: `{"code": ..., "message": "...", "data": ...}`
//!
//! A batch is a JSON array of requests answered by a same-length JSON array
//! of responses in the same order.
//!
//! # Example
//!
//! ```
//! use wirerpc_common::protocol::{Input, Output};
//! use serde_json::json;
//!
//! let request = Input::new("compute", json!({"n": 100}));
//! let response: Output = serde_json::from_str(r#"{"result": 42}"#).unwrap();
//! assert_eq!(response.result, Some(json!(42)));
//! ```

pub mod error;

pub use error::{Result, RpcError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single JSON-RPC request.
///
/// `method` is required; `params` is arbitrary JSON. `id` correlates the
/// request with its entry in the response batch and is echoed back verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Input {
    /// Request identifier, echoed back in the matching [`Output`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the method to invoke.
    pub method: String,
    /// Parameter value handed to the method (may be `null`).
    pub params: Value,
    /// JSON-RPC version tag, `"2.0"` by convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
}

impl Input {
    /// Create a request for `method` with the given params.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
            jsonrpc: None,
        }
    }

    /// Attach a request identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A single JSON-RPC response.
///
/// Exactly one of `result` or `error` is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Output {
    /// Result value on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OutputError>,
    /// JSON-RPC version tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Identifier of the request this output answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A JSON-RPC error object.
///
/// `code` follows JSON-RPC convention and is caller-defined; `message` is the
/// free-form description; `data` carries arbitrary structured detail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OutputError {
    /// Error carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("{}"),
        }
    }
}

impl std::error::Error for OutputError {}

/// Error produced by a method handler.
///
/// Handlers may fail with a fully structured RPC error, which is passed
/// through verbatim (preserving `code` and `data`), or with anything textual,
/// which is captured into `message` only.
#[derive(Debug)]
pub enum CallError {
    /// Structured RPC error, used verbatim in the response.
    Rpc(OutputError),
    /// Plain text error, wrapped as `{message}`.
    Text(String),
}

impl CallError {
    /// Structured error with a code and message.
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc(OutputError {
            code: Some(code),
            message: Some(message.into()),
            data: None,
        })
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Rpc(err) => err.fmt(f),
            CallError::Text(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for CallError {}

impl From<OutputError> for CallError {
    fn from(err: OutputError) -> Self {
        CallError::Rpc(err)
    }
}

impl From<String> for CallError {
    fn from(msg: String) -> Self {
        CallError::Text(msg)
    }
}

impl From<&str> for CallError {
    fn from(msg: &str) -> Self {
        CallError::Text(msg.to_string())
    }
}

impl From<serde_json::Error> for CallError {
    fn from(err: serde_json::Error) -> Self {
        CallError::Text(err.to_string())
    }
}

impl From<std::io::Error> for CallError {
    fn from(err: std::io::Error) -> Self {
        CallError::Text(err.to_string())
    }
}

impl From<RpcError> for CallError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Call(output_error) => CallError::Rpc(output_error),
            other => CallError::Text(other.to_string()),
        }
    }
}

impl From<CallError> for OutputError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Rpc(output_error) => output_error,
            CallError::Text(msg) => OutputError::message(msg),
        }
    }
}

/// Extract the single typed result out of a one-element response batch.
///
/// Used by the `call_single` helpers: a populated `error` becomes the call
/// error, otherwise the `result` slot is decoded into `R`.
pub fn single_result<R: serde::de::DeserializeOwned>(outputs: Vec<Output>) -> Result<R> {
    let output = outputs
        .into_iter()
        .next()
        .ok_or_else(|| RpcError::Connection("empty response batch".to_string()))?;
    if let Some(err) = output.error {
        return Err(RpcError::Call(err));
    }
    let value = output.result.unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}
