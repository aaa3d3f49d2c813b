//! TCP clients.
//!
//! [`TcpClient`] dials per call and reads a single reply; it is the simple
//! option for infrequent calls. [`TcpClientKeepAlive`] holds one persistent
//! connection and multiplexes any number of concurrent calls over it,
//! correlating replies by `messageID` and reconnecting on its own when the
//! connection drops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

use wirerpc_common::frame;
use wirerpc_common::protocol::{single_result, Input, Output, Result, RpcError};

/// Default pause between reconnect attempts of the keepalive client.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// One-shot TCP client: dial, send one framed body, read one reply.
pub struct TcpClient {
    addr: String,
}

impl TcpClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Send a request batch and return the response batch.
    pub async fn call(&self, inputs: &[Input]) -> Result<Vec<Output>> {
        let body = serde_json::to_vec(inputs)?;
        let mut stream = TcpStream::connect(&self.addr).await?;
        frame::write_frame(&mut stream, &body, 0, 0).await?;
        let reply = frame::read_frame(&mut stream).await?;
        Ok(serde_json::from_slice(&reply.payload)?)
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

struct KeepAliveState {
    writer: Option<Arc<Mutex<OwnedWriteHalf>>>,
    counter: u64,
    waiting: HashMap<u64, oneshot::Sender<Vec<u8>>>,
}

struct KeepAliveShared {
    addr: String,
    reconnect_interval: Duration,
    state: StdMutex<KeepAliveState>,
}

impl KeepAliveShared {
    fn set_writer(&self, writer: OwnedWriteHalf) {
        self.state.lock().unwrap().writer = Some(Arc::new(Mutex::new(writer)));
    }

    /// Hand an inbound payload to the caller waiting on its `messageID`.
    /// A reply with no waiter (cancelled call) is dropped silently.
    fn deliver(&self, message_id: u64, payload: Vec<u8>) {
        let sender = self.state.lock().unwrap().waiting.remove(&message_id);
        if let Some(sender) = sender {
            let _ = sender.send(payload);
        }
    }

    /// Clear the socket handle and unblock every pending caller with a
    /// connection-lost failure (their senders are dropped here).
    fn fail_waiters(&self) {
        let mut state = self.state.lock().unwrap();
        state.writer = None;
        state.waiting.clear();
    }

    fn remove_waiter(&self, message_id: u64) {
        self.state.lock().unwrap().waiting.remove(&message_id);
    }
}

/// Removes the waiting-table entry when a call future goes away before its
/// reply arrives (timeout, drop, write failure).
struct WaiterGuard<'a> {
    shared: &'a KeepAliveShared,
    message_id: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.shared.remove_waiter(self.message_id);
    }
}

/// Persistent multiplexing TCP client.
///
/// Construction spawns a keepalive task that dials the server, feeds inbound
/// frames to waiting callers, and redials after `reconnect_interval`
/// whenever the connection drops. Calls issued while disconnected fail with
/// `"client not connected"`; callers pending across a drop fail with a
/// connection-lost error. Bound an individual call with
/// [`tokio::time::timeout`] - dropping the call future cancels it and a
/// late reply is discarded.
///
/// Must be created inside a tokio runtime.
pub struct TcpClientKeepAlive {
    shared: Arc<KeepAliveShared>,
}

impl TcpClientKeepAlive {
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_reconnect_interval(addr, DEFAULT_RECONNECT_INTERVAL)
    }

    pub fn with_reconnect_interval(addr: impl Into<String>, interval: Duration) -> Self {
        let shared = Arc::new(KeepAliveShared {
            addr: addr.into(),
            reconnect_interval: interval,
            state: StdMutex::new(KeepAliveState {
                writer: None,
                counter: 0,
                waiting: HashMap::new(),
            }),
        });
        tokio::spawn(keep_alive(Arc::downgrade(&shared)));
        Self { shared }
    }

    /// True once the keepalive loop holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().unwrap().writer.is_some()
    }

    /// Send a request batch over the shared connection and await the
    /// correlated reply.
    pub async fn call(&self, inputs: &[Input]) -> Result<Vec<Output>> {
        let body = serde_json::to_vec(inputs)?;

        // register the waiter before the frame goes out so the reply cannot
        // race past us
        let (writer, message_id, receiver) = {
            let mut state = self.shared.state.lock().unwrap();
            let writer = state.writer.clone().ok_or(RpcError::NotConnected)?;
            state.counter += 1;
            let message_id = state.counter;
            let (sender, receiver) = oneshot::channel();
            state.waiting.insert(message_id, sender);
            (writer, message_id, receiver)
        };
        let _guard = WaiterGuard {
            shared: &*self.shared,
            message_id,
        };

        {
            let mut writer = writer.lock().await;
            frame::write_frame(&mut *writer, &body, 0, message_id).await?;
        }

        let payload = receiver.await.map_err(|_| RpcError::ConnectionLost)?;
        Ok(serde_json::from_slice(&payload)?)
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

/// Dial, pump frames, fail waiters on disconnect, retry. Holds only a weak
/// reference so dropping the client ends the task.
async fn keep_alive(shared: Weak<KeepAliveShared>) {
    loop {
        let Some(strong) = shared.upgrade() else { return };
        let addr = strong.addr.clone();
        let interval = strong.reconnect_interval;

        tracing::info!(addr = %addr, "connecting");
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                let (mut reader, writer) = stream.into_split();
                strong.set_writer(writer);
                drop(strong);

                read_loop(&shared, &mut reader).await;

                let Some(strong) = shared.upgrade() else { return };
                strong.fail_waiters();
            }
            Err(err) => {
                tracing::warn!(addr = %addr, error = %err, "tcp connection failed");
                drop(strong);
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn read_loop(shared: &Weak<KeepAliveShared>, reader: &mut OwnedReadHalf) {
    loop {
        match frame::read_frame(reader).await {
            Ok(reply) => {
                let Some(strong) = shared.upgrade() else { return };
                strong.deliver(reply.message_id, reply.payload);
            }
            Err(err) => {
                tracing::warn!(error = %err, "tcp connection disconnected");
                return;
            }
        }
    }
}
