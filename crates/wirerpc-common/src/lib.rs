//! wirerpc Common Types, Framing and Schema
//!
//! This crate provides the protocol definitions, the TCP frame codec and the
//! schema deriver shared by the wirerpc server and clients.
//!
//! # Components
//!
//! - [`protocol`] - JSON-RPC request/response types, the engine error enum
//!   and handler error normalization
//! - [`frame`] - length-prefixed binary framing for the TCP transport
//! - [`schema`] - recursive type descriptors and the OpenRPC document model
//! - [`params`] - transport metadata injection into decoded params
//!
//! # Example
//!
//! ```
//! use wirerpc_common::protocol::Input;
//! use wirerpc_common::frame;
//! use serde_json::json;
//!
//! let request = Input::new("compute", json!({"n": 100}));
//! let body = serde_json::to_vec(&vec![request]).unwrap();
//! let wire = frame::encode(&body, 0, 1);
//! assert_eq!(wire.len(), frame::HEADER_SIZE + body.len());
//! ```

pub mod frame;
pub mod macros;
pub mod params;
pub mod protocol;
pub mod schema;

pub use protocol::{CallError, Input, Output, OutputError, Result, RpcError};
