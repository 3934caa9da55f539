//! Varint32 length-prefixed framing.
//!
//! TCP is a *stream* protocol: a single `read()` may return half a message or
//! several messages at once.  Every encoded message is therefore sent as a
//! frame:
//!
//! ```text
//! [length: varint32, 1–5 bytes][payload: exactly `length` bytes]
//! ```
//!
//! [`FrameDecoder`] accumulates bytes across reads and hands out complete
//! payloads only.  Feeding it the same byte stream in any chunking yields the
//! same sequence of payloads.

use crate::protocol::codec::ProtocolError;
use crate::protocol::wire::put_varint;

/// A varint32 prefix is at most five bytes long.
pub const MAX_PREFIX_LEN: usize = 5;

/// Largest payload a frame may announce (the prefix is a signed 32-bit value
/// on the server side).
pub const MAX_FRAME_LEN: u64 = i32::MAX as u64;

/// Prefixes `payload` with its varint-encoded length.
///
/// # Examples
///
/// ```rust
/// use ttt_core::frame;
///
/// assert_eq!(frame(b"hi"), vec![0x02, b'h', b'i']);
/// ```
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_PREFIX_LEN + payload.len());
    put_varint(&mut buf, payload.len() as u64);
    buf.extend_from_slice(payload);
    buf
}

/// Reads the length prefix at the start of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the announced
/// payload length and the size of the prefix itself.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedVarint`] when the prefix runs past five
/// bytes and [`ProtocolError::FrameTooLarge`] when the announced length does
/// not fit a signed 32-bit integer.
pub fn read_length_prefix(buf: &[u8]) -> Result<Option<(usize, usize)>, ProtocolError> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_PREFIX_LEN).enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            if value > MAX_FRAME_LEN {
                return Err(ProtocolError::FrameTooLarge(value));
            }
            return Ok(Some((value as usize, i + 1)));
        }
    }
    if buf.len() >= MAX_PREFIX_LEN {
        return Err(ProtocolError::MalformedVarint("length prefix longer than 5 bytes"));
    }
    Ok(None)
}

/// Streaming frame splitter.
///
/// # Examples
///
/// ```rust
/// use ttt_core::{frame, FrameDecoder};
///
/// let mut bytes = frame(b"one");
/// bytes.extend(frame(b"two"));
///
/// let mut decoder = FrameDecoder::new();
/// decoder.extend(&bytes[..2]);
/// assert_eq!(decoder.next_frame().unwrap(), None);
/// decoder.extend(&bytes[2..]);
/// assert_eq!(decoder.next_frame().unwrap(), Some(b"one".to_vec()));
/// assert_eq!(decoder.next_frame().unwrap(), Some(b"two".to_vec()));
/// assert_eq!(decoder.next_frame().unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Removes and returns the next complete payload, if one is buffered.
    ///
    /// # Errors
    ///
    /// A malformed length prefix is a framing error: the stream cannot be
    /// resynchronised and the connection must be closed.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let Some((len, prefix_len)) = read_length_prefix(&self.buf)? else {
            return Ok(None);
        };
        let total = prefix_len + len;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload = self.buf[prefix_len..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(payload))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
