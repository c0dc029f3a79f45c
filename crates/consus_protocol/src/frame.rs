//! Length-prefixed framing.
//!
//! A frame is a big-endian `u32` payload length followed by the payload.

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{Read, Write};

/// Largest payload a single frame may carry (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Wraps a payload in a frame.
pub fn encode_frame(payload: &[u8]) -> ProtocolResult<Bytes> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_SIZE,
        });
    }
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Writes one frame to a blocking stream.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> ProtocolResult<()> {
    let frame = encode_frame(payload)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame from a blocking stream.
pub fn read_frame<R: Read>(reader: &mut R) -> ProtocolResult<Vec<u8>> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Incremental frame decoder for non-blocking readers.
///
/// Feed it whatever bytes arrive and pull complete frames out with
/// [`FrameDecoder::next_frame`].
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    limit: usize,
}

impl FrameDecoder {
    /// Creates a decoder with the default frame limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_FRAME_SIZE)
    }

    /// Creates a decoder that rejects frames above `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            limit: limit.min(MAX_FRAME_SIZE),
        }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Gives direct access to the receive buffer, e.g. for `read_buf`.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Number of buffered bytes not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> ProtocolResult<Option<Bytes>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }
        let len = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]) as usize;
        if len > self.limit {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                limit: self.limit,
            });
        }
        if self.buffer.len() < HEADER_LEN + len {
            self.buffer.reserve(HEADER_LEN + len - self.buffer.len());
            return Ok(None);
        }
        self.buffer.advance(HEADER_LEN);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
