//! wirerpc Clients
//!
//! Client implementations for the two wirerpc transports:
//!
//! - [`TcpClient`] - one-shot framed TCP (dial per call)
//! - [`TcpClientKeepAlive`] - one persistent connection multiplexing
//!   concurrent calls by `messageID`, with automatic reconnection
//! - [`HttpClient`] - JSON-RPC over HTTP POST
//!
//! All three expose the same pair of operations: `call` for a raw
//! request/response batch and `call_single` for an ergonomic typed
//! invocation of one method.

pub mod http;
pub mod tcp;

pub use http::{HttpClient, HttpClientBuilder};
pub use tcp::{TcpClient, TcpClientKeepAlive, DEFAULT_RECONNECT_INTERVAL};
