//! The Framed Channel: line-delimited JSON-object framing over any
//! `AsyncRead`/`AsyncWrite` byte stream. This is the only place in the
//! repository allowed to do byte-level I/O on the wire; every other
//! component speaks [`serde_json::Value`] frames.
//!
//! Backs every hop in the control-flow diagram: UNIX socket halves for the
//! Front Socket and the Dispatcher's admin socket, and child-process
//! stdin/stdout for the Supervisor<->worker pipes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this (including the trailing newline) fail with
/// [`ChannelError::FrameTooLarge`]. 16 KiB comfortably covers the largest
/// frame the grammar allows (an 8 KiB payload plus JSON escaping overhead).
pub const LINE_MAX: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("frame exceeds {LINE_MAX} bytes")]
    FrameTooLarge,
    #[error("frame is not a well-formed JSON object: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    #[error("channel closed: {0}")]
    ChannelClosed(#[from] std::io::Error),
}

/// Reads one frame. Returns `Ok(None)` on a clean EOF, i.e. no bytes were
/// read at all, or the stream ended before a trailing `\n` arrived (per
/// §4.1, such a partial frame is discarded rather than surfaced as an
/// error — the sender simply hung up mid-write).
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<serde_json::Value>, ChannelError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut oversized = false;

    loop {
        let (found_newline, consumed);
        {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                // EOF. Whatever we've accumulated without a trailing \n is
                // discarded per §4.1.
                return Ok(None);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    if !oversized && buf.len() + pos + 1 <= LINE_MAX {
                        buf.extend_from_slice(&available[..=pos]);
                    } else {
                        oversized = true;
                    }
                    found_newline = true;
                    consumed = pos + 1;
                }
                None => {
                    if !oversized && buf.len() + available.len() <= LINE_MAX {
                        buf.extend_from_slice(available);
                    } else {
                        oversized = true;
                    }
                    found_newline = false;
                    consumed = available.len();
                }
            }
        }
        reader.consume(consumed);

        if found_newline {
            if oversized {
                return Err(ChannelError::FrameTooLarge);
            }
            // buf includes the trailing '\n'; strip it before parsing.
            let line = &buf[..buf.len() - 1];
            let value: serde_json::Value = serde_json::from_slice(line)?;
            return Ok(Some(value));
        }
    }
}

/// Reads one frame and deserializes it into `T`. A frame that parses as
/// JSON but doesn't match `T`'s shape becomes [`ChannelError::MalformedFrame`].
pub async fn read_typed<R, T>(reader: &mut R) -> Result<Option<T>, ChannelError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Writes one frame: serializes `value` compactly, appends `\n`, and writes
/// the whole thing with `write_all` (which already loops over partial
/// writes internally).
pub async fn write_frame<W>(writer: &mut W, value: &serde_json::Value) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn write_typed<W, T>(writer: &mut W, value: &T) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let value = serde_json::to_value(value)?;
    write_frame(writer, &value).await
}
