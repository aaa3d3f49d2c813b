//! Binary framing for the TCP transport.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! [length: u64 BE] [messageType: u64 BE] [messageID: u64 BE] [payload: length bytes]
//! ```
//!
//! `messageType` is an opaque user tag transported unchanged from caller to
//! replier; `messageID` correlates a request frame with its reply frame on a
//! multiplexed connection (`0` is reserved for non-correlated frames). The
//! payload is a JSON-RPC body and is never interpreted here.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{Result, RpcError};

/// Size of the three fixed headers in bytes.
pub const HEADER_SIZE: usize = 24;

/// Maximum accepted payload length (100 MB).
///
/// The declared length is validated before the payload buffer is allocated.
pub const MAX_FRAME_SIZE: u64 = 100 * 1024 * 1024;

/// One parsed transport frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub message_type: u64,
    pub message_id: u64,
}

/// Encode a frame: three 8-byte big-endian headers followed by the payload
/// verbatim.
pub fn encode(payload: &[u8], message_type: u64, message_id: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    buf.extend_from_slice(&message_type.to_be_bytes());
    buf.extend_from_slice(&message_id.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Read one frame off the stream.
///
/// Performs three full 8-byte reads for the headers, then one full read of
/// `length` payload bytes. Any short read or I/O error is fatal for the
/// connection and propagates to the caller.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 8];

    reader.read_exact(&mut header).await?;
    let length = u64::from_be_bytes(header);

    reader.read_exact(&mut header).await?;
    let message_type = u64::from_be_bytes(header);

    reader.read_exact(&mut header).await?;
    let message_id = u64::from_be_bytes(header);

    if length > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload).await?;

    Ok(Frame {
        payload,
        message_type,
        message_id,
    })
}

/// Write one frame as a single logical write.
///
/// Callers sharing a socket between tasks must serialize calls to this
/// function so the headers and payload of concurrent frames do not
/// interleave.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    message_type: u64,
    message_id: u64,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(&encode(payload, message_type, message_id))
        .await?;
    writer.flush().await?;
    Ok(())
}
