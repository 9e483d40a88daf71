//! Frame encode/decode and bounded socket I/O for transactions.
//!
//! Frame layout (little-endian):
//! `[signature = 0][magic "IMTX"][payload length][checksum][payload]`.
//!
//! # Security
//! Lengths above [`MAX_FRAME_SIZE`] are rejected before any allocation, and
//! the payload is structurally validated before it is handed out.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::transaction::{Transaction, TransactionError};

/// Maximum allowed payload size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
pub const FRAME_HEADER_LEN: usize = 16;
pub const FRAME_SIGNATURE: u32 = 0;
pub const FRAME_MAGIC: u32 = u32::from_le_bytes(*b"IMTX");

/// Rotating byte-sum checksum over the payload.
pub fn checksum(payload: &[u8]) -> u32 {
    payload
        .iter()
        .fold(0u32, |sum, byte| sum.wrapping_add(u32::from(*byte)).rotate_left(1))
}

/// Run `fut` bounded by `limit`; a zero limit waits indefinitely.
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, TransactionError>
where
    F: Future<Output = Result<T, TransactionError>>,
{
    if limit.is_zero() {
        return fut.await;
    }
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TransactionError::Timeout(limit))?
}

impl Transaction {
    /// Serialize into one framed byte buffer.
    pub fn to_frame(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&FRAME_SIGNATURE.to_le_bytes());
        frame.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&checksum(payload).to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Parse one complete frame held in memory.
    pub fn from_frame(frame: &[u8]) -> Result<Self, TransactionError> {
        if frame.len() < FRAME_HEADER_LEN {
            return Err(TransactionError::Truncated);
        }
        let word = |i: usize| u32::from_le_bytes([frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]);
        if word(0) != FRAME_SIGNATURE {
            return Err(TransactionError::BadSignature);
        }
        let len = check_header(word(4), word(8))?;
        let sum = word(12);
        let payload = &frame[FRAME_HEADER_LEN..];
        if payload.len() != len {
            return Err(TransactionError::Truncated);
        }
        finish_payload(payload.to_vec(), sum)
    }

    /// Write this transaction as one frame.
    pub async fn write_to<W>(&self, writer: &mut W, limit: Duration) -> Result<(), TransactionError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let frame = self.to_frame();
        with_timeout(limit, async {
            writer.write_all(&frame).await?;
            writer.flush().await?;
            Ok(())
        })
        .await
    }

    /// Read exactly one frame; the whole read is bounded by `limit`.
    pub async fn read_from<R>(reader: &mut R, limit: Duration) -> Result<Self, TransactionError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        with_timeout(limit, async {
            let mut signature = [0u8; 4];
            reader.read_exact(&mut signature).await?;
            read_frame_body(reader, signature).await
        })
        .await
    }

    /// Read the rest of a frame whose first word was already consumed.
    ///
    /// Used by connection readers that wait for the first word without a
    /// deadline and then bound the remainder.
    pub async fn read_after_signature<R>(
        reader: &mut R,
        signature: [u8; 4],
        limit: Duration,
    ) -> Result<Self, TransactionError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        with_timeout(limit, read_frame_body(reader, signature)).await
    }
}

fn check_header(magic: u32, len: u32) -> Result<usize, TransactionError> {
    if magic != FRAME_MAGIC {
        return Err(TransactionError::BadMagic(magic));
    }
    let len = len as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransactionError::FrameTooLarge { size: len, max: MAX_FRAME_SIZE });
    }
    Ok(len)
}

async fn read_frame_body<R>(reader: &mut R, signature: [u8; 4]) -> Result<Transaction, TransactionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if u32::from_le_bytes(signature) != FRAME_SIGNATURE {
        return Err(TransactionError::BadSignature);
    }
    let mut header = [0u8; FRAME_HEADER_LEN - 4];
    reader.read_exact(&mut header).await?;
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let sum = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    let len = check_header(magic, len)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    finish_payload(payload, sum)
}

fn finish_payload(payload: Vec<u8>, expected: u32) -> Result<Transaction, TransactionError> {
    if checksum(&payload) != expected {
        return Err(TransactionError::ChecksumMismatch);
    }
    Transaction::from_payload(payload)
}
