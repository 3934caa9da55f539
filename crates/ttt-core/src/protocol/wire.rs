//! Low-level protobuf wire-format primitives.
//!
//! Only the subset the game protocol needs is implemented: varints and
//! length-delimited fields on the write side; on the read side every wire
//! type except groups is recognised so unknown fields can be skipped.
//!
//! ```text
//! field  = tag value
//! tag    = varint(field_number << 3 | wire_type)
//! value  = varint                      (wire type 0)
//!        | 8 bytes                     (wire type 1)
//!        | varint(len) len-bytes       (wire type 2)
//!        | 4 bytes                     (wire type 5)
//! ```

use crate::protocol::codec::ProtocolError;

pub(crate) const WIRE_VARINT: u8 = 0;
pub(crate) const WIRE_FIXED64: u8 = 1;
pub(crate) const WIRE_LEN: u8 = 2;
pub(crate) const WIRE_FIXED32: u8 = 5;

/// A varint never needs more than 10 bytes for a 64-bit value.
const MAX_VARINT_LEN: usize = 10;

// ── Writing ───────────────────────────────────────────────────────────────────

pub(crate) fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_tag(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_varint(buf, (u64::from(field) << 3) | u64::from(wire_type));
}

/// Writes an `int32` field.  Zero is the proto3 default and is omitted.
///
/// Negative values are sign-extended to 64 bits, as protobuf requires.
pub(crate) fn write_int32(buf: &mut Vec<u8>, field: u32, value: i32) {
    if value != 0 {
        put_tag(buf, field, WIRE_VARINT);
        put_varint(buf, i64::from(value) as u64);
    }
}

pub(crate) fn write_bool(buf: &mut Vec<u8>, field: u32, value: bool) {
    if value {
        put_tag(buf, field, WIRE_VARINT);
        put_varint(buf, 1);
    }
}

pub(crate) fn write_string(buf: &mut Vec<u8>, field: u32, value: &str) {
    write_bytes(buf, field, value.as_bytes());
}

pub(crate) fn write_bytes(buf: &mut Vec<u8>, field: u32, value: &[u8]) {
    if !value.is_empty() {
        put_tag(buf, field, WIRE_LEN);
        put_varint(buf, value.len() as u64);
        buf.extend_from_slice(value);
    }
}

/// Writes an embedded message.  Always emitted, even when empty, because
/// message presence is meaningful (`hasPlayerB`).
pub(crate) fn write_message(buf: &mut Vec<u8>, field: u32, encoded: &[u8]) {
    put_tag(buf, field, WIRE_LEN);
    put_varint(buf, encoded.len() as u64);
    buf.extend_from_slice(encoded);
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Reads a varint starting at `offset`.
///
/// Returns the value and the offset of the byte after it.
pub(crate) fn read_varint(buf: &[u8], offset: usize) -> Result<(u64, usize), ProtocolError> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = buf.get(offset + i) else {
            return Err(ProtocolError::Truncated {
                context: "varint",
                needed: offset + i + 1,
                available: buf.len(),
            });
        };
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, offset + i + 1));
        }
    }
    Err(ProtocolError::MalformedVarint("more than 10 bytes"))
}

/// One decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Fixed,
}

/// Sequential reader over the fields of one encoded message.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the next `(field_number, value)` pair, or `None` at the end.
    pub(crate) fn next_field(&mut self) -> Result<Option<(u32, FieldValue<'a>)>, ProtocolError> {
        let buf = self.buf;
        if self.pos >= buf.len() {
            return Ok(None);
        }
        let (tag, after_tag) = read_varint(buf, self.pos)?;
        let field = (tag >> 3) as u32;
        let wire_type = (tag & 0x07) as u8;
        if field == 0 {
            return Err(ProtocolError::MalformedPayload(
                "field number 0 is not allowed".to_string(),
            ));
        }

        let (value, next) = match wire_type {
            WIRE_VARINT => {
                let (v, next) = read_varint(buf, after_tag)?;
                (FieldValue::Varint(v), next)
            }
            WIRE_FIXED64 => (FieldValue::Fixed, self.skip(after_tag, 8, "fixed64")?),
            WIRE_LEN => {
                let (len, start) = read_varint(buf, after_tag)?;
                let len = usize::try_from(len).map_err(|_| ProtocolError::Truncated {
                    context: "length-delimited field",
                    needed: usize::MAX,
                    available: buf.len(),
                })?;
                let end = self.skip(start, len, "length-delimited field")?;
                (FieldValue::Bytes(&buf[start..end]), end)
            }
            WIRE_FIXED32 => (FieldValue::Fixed, self.skip(after_tag, 4, "fixed32")?),
            other => {
                return Err(ProtocolError::InvalidWireType {
                    field,
                    wire_type: other,
                })
            }
        };
        self.pos = next;
        Ok(Some((field, value)))
    }

    fn skip(
        &self,
        start: usize,
        len: usize,
        context: &'static str,
    ) -> Result<usize, ProtocolError> {
        let end = start.checked_add(len).filter(|&end| end <= self.buf.len());
        end.ok_or(ProtocolError::Truncated {
            context,
            needed: start.saturating_add(len),
            available: self.buf.len(),
        })
    }
}

// ── Typed field accessors ─────────────────────────────────────────────────────

pub(crate) fn expect_varint(field: u32, value: FieldValue<'_>) -> Result<u64, ProtocolError> {
    match value {
        FieldValue::Varint(v) => Ok(v),
        _ => Err(ProtocolError::InvalidWireType {
            field,
            wire_type: WIRE_VARINT,
        }),
    }
}

pub(crate) fn expect_bytes<'a>(
    field: u32,
    value: FieldValue<'a>,
) -> Result<&'a [u8], ProtocolError> {
    match value {
        FieldValue::Bytes(b) => Ok(b),
        _ => Err(ProtocolError::InvalidWireType {
            field,
            wire_type: WIRE_LEN,
        }),
    }
}

/// `int32` values are truncated from the 64-bit varint, as protobuf does.
pub(crate) fn expect_int32(field: u32, value: FieldValue<'_>) -> Result<i32, ProtocolError> {
    expect_varint(field, value).map(|v| v as i32)
}

pub(crate) fn expect_bool(field: u32, value: FieldValue<'_>) -> Result<bool, ProtocolError> {
    expect_varint(field, value).map(|v| v != 0)
}

pub(crate) fn expect_string(field: u32, value: FieldValue<'_>) -> Result<String, ProtocolError> {
    let bytes = expect_bytes(field, value)?;
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ProtocolError::MalformedPayload(format!("field {field}: invalid UTF-8: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
