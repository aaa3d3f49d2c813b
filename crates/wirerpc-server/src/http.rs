//! HTTP listener.
//!
//! Serves the dispatch engine over HTTP/1.1 using hyper:
//!
//! - `POST /api/rpc` - dispatch a JSON-RPC body, single or batched
//! - `GET /api/rpc/schema` - the OpenRPC document, pretty-printed
//! - `OPTIONS *` - CORS preflight
//!
//! Before dispatch the request headers are offered to every decoded params
//! value through its header slot (see
//! [`ParamsMeta`](wirerpc_common::params::ParamsMeta)), so methods can opt
//! into reading transport metadata without a separate signature.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use wirerpc_common::params::{Headers, ParamsMeta};
use wirerpc_common::protocol::{Output, OutputError, Result, RpcError};

use crate::method::ParamsHook;
use crate::registry::Server;

/// Maximum accepted request body (10 MB).
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

type HyperRequest = Request<Incoming>;
type HyperResponse = Response<Full<Bytes>>;

impl Server {
    /// Bind `addr` and serve the HTTP API.
    pub async fn listen_http(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "rpc server listening on http");
        *self.inner.http_addr.lock().unwrap() = Some(local_addr);

        loop {
            let (stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::error!(error = %err, "connection accept error");
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle_http(req).await) }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!(error = %err, "error serving connection");
                }
            });
        }
    }

    async fn handle_http(&self, req: HyperRequest) -> HyperResponse {
        let origin = req
            .headers()
            .get(http::header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let allow_origin = self.allowed_origin(&origin);

        if req.method() == Method::OPTIONS {
            return self.preflight_response(allow_origin);
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        if method == Method::POST && path == "/api/rpc" {
            self.handle_rpc_post(req, allow_origin).await
        } else if method == Method::GET && path == "/api/rpc/schema" {
            self.schema_response(allow_origin)
        } else {
            api_error(&RpcError::NotImplemented, allow_origin)
        }
    }

    async fn handle_rpc_post(
        &self,
        req: HyperRequest,
        allow_origin: Option<String>,
    ) -> HyperResponse {
        let headers = Headers(req.headers().clone());
        let hook: ParamsHook = Arc::new(move |params: &mut dyn ParamsMeta| {
            if let Some(slot) = params.header_slot() {
                *slot = headers.clone();
            }
        });

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                tracing::error!(error = %err, "failed to read request body");
                return api_error(
                    &RpcError::Connection("failed to read request body".to_string()),
                    allow_origin,
                );
            }
        };
        if body.len() > MAX_BODY_SIZE {
            return api_error(
                &RpcError::Http(format!(
                    "request body too large: {} bytes (max {} bytes)",
                    body.len(),
                    MAX_BODY_SIZE
                )),
                allow_origin,
            );
        }

        match self.handle_bytes(&body, 0, Some(hook)).await {
            Ok(result) => json_response(StatusCode::OK, result, allow_origin),
            Err(err) => {
                tracing::debug!(error = %err, "dispatch failed");
                api_error(&err, allow_origin)
            }
        }
    }

    fn schema_response(&self, allow_origin: Option<String>) -> HyperResponse {
        match serde_json::to_vec_pretty(&self.schema_root()) {
            Ok(document) => json_response(StatusCode::OK, document, allow_origin),
            Err(err) => api_error(&RpcError::Json(err), allow_origin),
        }
    }

    fn preflight_response(&self, allow_origin: Option<String>) -> HyperResponse {
        response_builder(StatusCode::OK, allow_origin)
            .header("Access-Control-Allow-Headers", "Authorization, Content-Type")
            .header(
                "Access-Control-Allow-Methods",
                "GET, POST, OPTIONS, PUT, DELETE",
            )
            .header(http::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap_or_default()
    }

    /// Resolve the `Access-Control-Allow-Origin` value for a request origin:
    /// exact allow-list match first, then the predicate, with `*` only when
    /// neither is configured.
    fn allowed_origin(&self, origin: &str) -> Option<String> {
        let origins = self.inner.allow_origins.read().unwrap();
        if origins.iter().any(|allowed| allowed == origin) {
            return Some(origin.to_string());
        }
        let predicate = self.inner.allow_origins_fn.read().unwrap();
        if let Some(predicate) = predicate.as_ref() {
            if predicate(origin) {
                return Some(origin.to_string());
            }
        }
        if origins.is_empty() && predicate.is_none() {
            return Some("*".to_string());
        }
        None
    }
}

fn response_builder(
    status: StatusCode,
    allow_origin: Option<String>,
) -> http::response::Builder {
    let mut builder = Response::builder().status(status);
    if let Some(origin) = allow_origin {
        builder = builder.header("Access-Control-Allow-Origin", origin);
    }
    builder
}

fn json_response(
    status: StatusCode,
    body: Vec<u8>,
    allow_origin: Option<String>,
) -> HyperResponse {
    response_builder(status, allow_origin)
        .header(http::header::CONTENT_TYPE, "application/json; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_default()
}

/// Serialize an error as an `Output`-shaped body with the status the message
/// maps to: `"not implemented"` is 501, `"forbidden"` is 403, everything
/// else 500.
fn api_error(err: &RpcError, allow_origin: Option<String>) -> HyperResponse {
    let message = err.to_string();
    let status = match message.as_str() {
        "not implemented" => StatusCode::NOT_IMPLEMENTED,
        "forbidden" => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = serde_json::to_vec(&Output {
        error: Some(OutputError::message(message)),
        ..Default::default()
    })
    .unwrap_or_default();
    json_response(status, body, allow_origin)
}
