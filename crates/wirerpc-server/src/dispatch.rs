//! The dispatch engine.
//!
//! [`Server::handle_bytes`] takes one raw JSON-RPC body (a single request
//! object or a batch array), fans the requests out to their handlers as
//! parallel tasks, joins them, and serializes the outputs in input order.
//! Per-call failures (unknown method, params decode failure, handler error
//! or panic) land in that call's `error` slot and never poison siblings;
//! only a malformed body fails the dispatch as a whole.

use serde::Deserialize;
use serde_json::value::RawValue;

use wirerpc_common::protocol::{Output, OutputError, Result, RpcError};

use crate::method::ParamsHook;
use crate::registry::Server;

/// Lazily decoded request: `params` stays a raw fragment until the handler's
/// input type is known.
#[derive(Debug, Deserialize)]
struct InputPartial {
    #[serde(default)]
    id: Option<String>,
    method: String,
    #[serde(default)]
    params: Option<Box<RawValue>>,
}

impl Server {
    /// Dispatch one request body and return the serialized response body.
    ///
    /// `message_id` is the transport correlation tag (0 outside the TCP
    /// transport), used for logging only. When `hook` is set it runs on
    /// every decoded params value before its handler is invoked.
    pub async fn handle_bytes(
        &self,
        body: &[u8],
        message_id: u64,
        hook: Option<ParamsHook>,
    ) -> Result<Vec<u8>> {
        if body.is_empty() {
            return Err(RpcError::EmptyBody);
        }

        let first_symbol = body
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace())
            .unwrap_or(0);
        let (inputs, array_input) = match first_symbol {
            b'[' => (serde_json::from_slice::<Vec<InputPartial>>(body)?, true),
            b'{' => (vec![serde_json::from_slice::<InputPartial>(body)?], false),
            _ => return Err(RpcError::NotJson),
        };

        // skip the fan-out and answer an empty batch with the literal `[]`
        if array_input && inputs.is_empty() {
            return Ok(b"[]".to_vec());
        }

        let mut calls = Vec::with_capacity(inputs.len());
        for input in inputs {
            let id = input.id.clone();
            let handler = self.get(&input.method);
            let hook = hook.clone();
            calls.push((
                id,
                tokio::spawn(async move {
                    tracing::debug!(method = %input.method, message_id, "dispatching method");
                    let mut output = Output {
                        id: input.id,
                        ..Default::default()
                    };
                    match handler {
                        Err(err) => {
                            output.error = Some(OutputError::message(err.to_string()));
                        }
                        Ok(handler) => match (handler.adapter)(input.params, hook).await {
                            Ok(result) => output.result = result,
                            Err(err) => {
                                tracing::debug!(
                                    method = %input.method,
                                    message_id,
                                    error = %err,
                                    "method returned error"
                                );
                                output.error = Some(err.into());
                            }
                        },
                    }
                    output
                }),
            ));
        }

        // join in input order, so the response array lines up with the
        // request array no matter how the tasks interleave
        let mut results = Vec::with_capacity(calls.len());
        for (id, call) in calls {
            match call.await {
                Ok(output) => results.push(output),
                Err(join_err) => {
                    tracing::error!(message_id, error = %join_err, "method task aborted");
                    results.push(Output {
                        id,
                        error: Some(OutputError::message(format!(
                            "handler panicked: {join_err}"
                        ))),
                        ..Default::default()
                    });
                }
            }
        }

        if array_input {
            Ok(serde_json::to_vec(&results)?)
        } else {
            Ok(serde_json::to_vec(&results[0])?)
        }
    }
}
