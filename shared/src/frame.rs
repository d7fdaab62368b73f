//! Length-prefixed frame codec
//!
//! Request:  `[u16 LE len][CSR DER]`
//! Response: `[u16 LE len][leaf DER][u16 LE len][root DER]`
//!
//! There is no status field. A peer that stops before a complete response
//! has failed.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length header in bytes
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload a single frame can describe
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Peer closed before sending any byte of the frame
    #[error("peer closed the connection")]
    Disconnected,

    /// Peer closed mid-header
    #[error("length header truncated")]
    TruncatedHeader,

    /// Peer closed before the declared payload length arrived
    #[error("payload truncated: expected {expected} bytes")]
    TruncatedPayload { expected: usize },

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),

    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the peer simply went away, as opposed to sending something bad
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProtocolError::Disconnected)
    }
}

/// Read one frame.
///
/// Waits as long as the peer keeps the connection open; wrap with
/// [`read_frame_timeout`] to bound the wait.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_SIZE {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                ProtocolError::Disconnected
            } else {
                ProtocolError::TruncatedHeader
            });
        }
        filled += n;
    }

    let len = u16::from_le_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(payload),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::TruncatedPayload { expected: len })
        }
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

/// [`read_frame`] bounded by an optional deadline. `None` waits indefinitely.
pub async fn read_frame_timeout<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, ProtocolError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, read_frame(reader))
            .await
            .map_err(|_| ProtocolError::Timeout(limit))?,
        None => read_frame(reader).await,
    }
}

/// Write one frame. Does not flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let len = u16::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge(payload.len()))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    Ok(())
}
