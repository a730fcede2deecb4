// File:    framing.rs
// Author:  apezoo
// Date:    2025-08-02
//
// Description: Length-prefixed message framing over a byte stream.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Length-prefixed framing.
//!
//! A frame is a 4-byte big-endian `u32` length followed by exactly that many
//! payload bytes. Reads and writes loop until every byte has moved, so a
//! stream that delivers one byte at a time still round-trips. Running out of
//! stream with bytes outstanding is an error; a short read is not.

use std::io;

use log::trace;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Width of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload accepted by default: 16 MiB.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Errors raised by the framed transport.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream before the first byte of a frame.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// The peer closed the stream part way through a frame.
    #[error("connection closed mid-frame: expected {expected} bytes, received {received}")]
    Truncated {
        /// Bytes the frame needed.
        expected: usize,
        /// Bytes that arrived before the stream ended.
        received: usize,
    },
    /// The frame length exceeds the allowed maximum.
    #[error("frame of {len} bytes exceeds the limit of {max} bytes")]
    TooLarge {
        /// Announced or requested length.
        len: u64,
        /// The limit in force.
        max: u64,
    },
    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Writes `payload` as one frame and flushes the writer.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if the payload does not fit the `u32`
/// prefix, or [`FrameError::Io`] if the stream fails.
pub async fn send_message<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len() as u64,
        max: u64::from(u32::MAX),
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    trace!("sent frame of {len} bytes");
    Ok(())
}

/// Reads one frame and returns its payload.
///
/// The payload buffer is sized from the received prefix. Lengths above
/// `max_len` are rejected before anything is allocated.
///
/// # Errors
///
/// Returns [`FrameError::ConnectionClosed`] if the stream ends before the
/// prefix starts, [`FrameError::Truncated`] if it ends inside the frame,
/// [`FrameError::TooLarge`] for an oversized prefix and [`FrameError::Io`]
/// for other failures.
pub async fn receive_message<R>(reader: &mut R, max_len: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    read_fixed(reader, &mut prefix).await?;

    let len = u32::from_be_bytes(prefix);
    if len > max_len {
        return Err(FrameError::TooLarge {
            len: u64::from(len),
            max: u64::from(max_len),
        });
    }

    let expected = len as usize;
    let mut payload = vec![0u8; expected];
    let received = read_full(reader, &mut payload).await?;
    if received < expected {
        return Err(FrameError::Truncated { expected, received });
    }
    trace!("received frame of {len} bytes");
    Ok(payload)
}

/// Reads exactly `buf.len()` bytes.
///
/// An end of stream before the first byte is [`FrameError::ConnectionClosed`];
/// one after it is [`FrameError::Truncated`].
pub(crate) async fn read_fixed<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match read_full(reader, buf).await? {
        n if n == buf.len() => Ok(()),
        0 => Err(FrameError::ConnectionClosed),
        received => Err(FrameError::Truncated {
            expected: buf.len(),
            received,
        }),
    }
}

/// Fills `buf` unless the stream ends first; returns how many bytes arrived.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
