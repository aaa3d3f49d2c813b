use thiserror::Error;

use crate::protocol::OutputError;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("zero bytes handled")]
    EmptyBody,

    #[error("firstSymbol is not a json part")]
    NotJson,

    #[error("method not found")]
    MethodNotFound,

    #[error("client not connected")]
    NotConnected,

    #[error("connection lost")]
    ConnectionLost,

    #[error("not implemented")]
    NotImplemented,

    #[error("forbidden")]
    Forbidden,

    #[error("frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge { size: u64, max: u64 },

    #[error("{0}")]
    Call(OutputError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
