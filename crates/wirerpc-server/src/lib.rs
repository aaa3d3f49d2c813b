//! wirerpc Server
//!
//! The JSON-RPC dispatch engine and its two transports.
//!
//! Ordinary async functions register as methods; their parameter and result
//! types drive both argument decoding and the served OpenRPC schema:
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use wirerpc_common::rpc_object;
//! use wirerpc_server::Server;
//!
//! rpc_object! {
//!     #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//!     pub struct AddParams {
//!         pub a: i64,
//!         pub b: i64,
//!     }
//! }
//!
//! # async fn run() -> wirerpc_common::protocol::Result<()> {
//! let server = Server::new();
//! server.set("add", |p: AddParams| async move { p.a + p.b });
//! server.listen_tcp("0.0.0.0:8001").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`Server`] - method registry, batch dispatch (`handle_bytes`), and the
//!   `listen_tcp` / `listen_http` transports
//! - [`method`] - handler signature adapters and the params hook type

pub mod dispatch;
pub mod http;
pub mod method;
pub mod registry;
pub mod tcp;

pub use method::{ParamsHook, RpcMethod};
pub use registry::Server;
