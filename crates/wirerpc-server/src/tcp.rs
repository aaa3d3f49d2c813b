//! Framed TCP listener.
//!
//! Each accepted connection runs a read loop that decodes one frame at a
//! time and spawns a dispatch task per frame, so slow methods never block
//! the connection. Reply frames carry the same `messageType` and
//! `messageID` as the request frame; the write half is shared behind a
//! mutex so concurrent replies cannot interleave their bytes.

use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};

use wirerpc_common::frame::{self, Frame};
use wirerpc_common::protocol::Result;

use crate::registry::Server;

impl Server {
    /// Bind `addr` and serve framed RPC until [`close_tcp`](Self::close_tcp)
    /// is called.
    ///
    /// Accept errors are logged and the loop continues; a read error only
    /// terminates its own connection.
    pub async fn listen_tcp(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "rpc server listening on tcp");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        *self.inner.tcp_shutdown.lock().unwrap() = Some(shutdown_tx);
        *self.inner.tcp_addr.lock().unwrap() = Some(local_addr);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tracing::debug!(%peer, "connection established");
                            let server = self.clone();
                            tokio::spawn(async move {
                                if let Err(err) = server.serve_connection(stream).await {
                                    tracing::debug!(error = %err, "connection closed");
                                }
                            });
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "connection accept error");
                            continue;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }
        *self.inner.tcp_addr.lock().unwrap() = None;
        Ok(())
    }

    /// Stop the TCP accept loop and drop the listener.
    pub fn close_tcp(&self) {
        if let Some(shutdown) = self.inner.tcp_shutdown.lock().unwrap().take() {
            let _ = shutdown.send(true);
        }
    }

    async fn serve_connection(&self, stream: TcpStream) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        loop {
            let frame = frame::read_frame(&mut reader).await?;
            tracing::debug!(
                message_id = frame.message_id,
                length = frame.payload.len(),
                "frame received"
            );
            let server = self.clone();
            let writer = writer.clone();
            tokio::spawn(async move {
                server.answer_frame(&writer, frame).await;
            });
        }
    }

    async fn answer_frame(&self, writer: &Mutex<OwnedWriteHalf>, frame: Frame) {
        let reply = match self
            .handle_bytes(&frame.payload, frame.message_id, None)
            .await
        {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(message_id = frame.message_id, error = %err, "dispatch failed");
                serde_json::to_vec(&serde_json::json!({
                    "error": err.to_string(),
                    "messageID": frame.message_id,
                }))
                .unwrap_or_default()
            }
        };

        let mut writer = writer.lock().await;
        if let Err(err) =
            frame::write_frame(&mut *writer, &reply, frame.message_type, frame.message_id).await
        {
            tracing::error!(message_id = frame.message_id, error = %err, "failed to write reply");
        }
    }
}
