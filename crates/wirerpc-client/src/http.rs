//! HTTP client.
//!
//! One-shot JSON-RPC over HTTP: POST the marshaled batch, decode the
//! response batch. Supports basic auth and an outbound proxy.

use serde::de::DeserializeOwned;
use serde::Serialize;

use wirerpc_common::protocol::{single_result, Input, Output, Result, RpcError};

/// JSON-RPC client for the HTTP transport.
///
/// ```no_run
/// use wirerpc_client::HttpClient;
///
/// # async fn run() -> wirerpc_common::protocol::Result<()> {
/// let client = HttpClient::builder("http://127.0.0.1:8080/api/rpc")
///     .basic_auth("user", "secret")
///     .build()?;
/// let sum: i64 = client
///     .call_single("add", serde_json::json!({"a": 1, "b": 2}))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpClient {
    url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::builder(url).build()
    }

    pub fn builder(url: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder {
            url: url.into(),
            username: None,
            password: None,
            proxy: None,
        }
    }

    /// POST a request batch and return the response batch.
    ///
    /// A non-200 status surfaces the response body as the error message.
    pub async fn call(&self, inputs: &[Input]) -> Result<Vec<Output>> {
        let body = serde_json::to_vec(inputs)?;
        let mut request = self
            .client
            .post(&self.url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/json; charset=utf-8",
            )
            .body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|err| RpcError::Connection(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| RpcError::Connection(err.to_string()))?;
        if status != reqwest::StatusCode::OK {
            return Err(RpcError::Http(String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Invoke one method and decode its result.
    pub async fn call_single<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let input = Input::new(method, serde_json::to_value(params)?);
        single_result(self.call(&[input]).await?)
    }
}

pub struct HttpClientBuilder {
    url: String,
    username: Option<String>,
    password: Option<String>,
    proxy: Option<String>,
}

impl HttpClientBuilder {
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Route requests through an HTTP proxy.
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|err| RpcError::Connection(err.to_string()))?,
            );
        }
        let client = builder
            .build()
            .map_err(|err| RpcError::Connection(err.to_string()))?;
        Ok(HttpClient {
            url: self.url,
            username: self.username,
            password: self.password,
            client,
        })
    }
}
