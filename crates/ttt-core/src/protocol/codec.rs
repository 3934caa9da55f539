//! Protobuf codec for TTT-Online protocol messages.
//!
//! Field layout (proto3):
//! ```text
//! Any                  { 1: type_url string, 2: value bytes }
//! Request              { 1: body Any }
//! Response             { 1: error string, 2: body Any }
//! AuthInfo             { 1: uuid string }
//! Player               { 1: uuid string }
//! PutChess             { 1: x int32, 2: y int32, 3: myself bool }
//! CompetitionOperation { 1: id int32, 2: operation enum, 3: pos PutChess,
//!                        4: playerA Player, 5: playerB Player }
//! CompetitionFinish    { 1: winner string }
//! Statistics           { 1: myself bool, 2: winTime int32, 3: loseTime int32 }
//! GetStatistics        { 1: myself bool }
//! Sync                 { }
//! ```
//! Unknown fields are skipped on decode; default scalars are omitted on
//! encode.

use thiserror::Error;
use tracing::debug;

use crate::domain::ids::{CompetitionId, PlayerId};
use crate::protocol::framing::frame;
use crate::protocol::messages::{
    AuthInfo, CompetitionFinish, CompetitionOperation, Envelope, GameMessage, GetStatistics,
    MessageKind, Operation, Placement, Request, Response, Statistics, SyncRequest,
};
use crate::protocol::wire::{
    expect_bool, expect_bytes, expect_int32, expect_string, write_bool, write_bytes, write_int32,
    write_message, write_string, FieldReader,
};

/// Errors that can occur during message encoding, decoding, or framing.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// A varint (length prefix or field value) is not well formed.
    #[error("malformed varint: {0}")]
    MalformedVarint(&'static str),

    /// A frame announced a payload longer than the protocol allows.
    #[error("frame length {0} exceeds the maximum of 2147483647 bytes")]
    FrameTooLarge(u64),

    /// The bytes end in the middle of a value.
    #[error("truncated {context}: need {needed} bytes, got {available}")]
    Truncated {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    /// A field arrived with a wire type that does not match its definition.
    #[error("invalid wire type {wire_type} for field {field}")]
    InvalidWireType { field: u32, wire_type: u8 },

    /// The payload could not be parsed (bad UUID, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The operation enum value is not one the client knows.
    #[error("unknown competition operation: {0}")]
    UnknownOperation(i32),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Request`] into its protobuf payload (without frame prefix).
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut buf = Vec::new();
    write_message(&mut buf, 1, &encode_envelope(&request.body));
    buf
}

/// Decodes a [`Request`] payload.  Used by test servers and tooling.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the outer structure is malformed or carries
/// no body.
pub fn decode_request(payload: &[u8]) -> Result<Request, ProtocolError> {
    let mut body = None;
    let mut reader = FieldReader::new(payload);
    while let Some((field, value)) = reader.next_field()? {
        if field == 1 {
            body = Some(decode_envelope(expect_bytes(field, value)?)?);
        }
    }
    let body = body.ok_or_else(|| ProtocolError::MalformedPayload("request has no body".into()))?;
    Ok(Request { body })
}

/// Encodes a [`Response`] into its protobuf payload (without frame prefix).
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut buf = Vec::new();
    match response {
        Response::Error(text) => write_string(&mut buf, 1, text),
        Response::Body(envelope) => write_message(&mut buf, 2, &encode_envelope(envelope)),
    }
    buf
}

/// Decodes a [`Response`] payload.
///
/// A non-empty `error` wins over any body.  A response with neither decodes
/// to an empty body, which is unroutable.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the outer structure is malformed.  Callers
/// treat this as fatal for the connection.
///
/// # Examples
///
/// ```rust
/// use ttt_core::{decode_response, encode_response, Response};
///
/// let bytes = encode_response(&Response::Error("boom".to_string()));
/// assert_eq!(decode_response(&bytes).unwrap(), Response::Error("boom".to_string()));
/// ```
pub fn decode_response(payload: &[u8]) -> Result<Response, ProtocolError> {
    let mut error = String::new();
    let mut body = None;
    let mut reader = FieldReader::new(payload);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => error = expect_string(field, value)?,
            2 => body = Some(decode_envelope(expect_bytes(field, value)?)?),
            _ => {}
        }
    }
    if !error.trim().is_empty() {
        return Ok(Response::Error(error));
    }
    Ok(Response::Body(body.unwrap_or_default()))
}

/// Packs `message` into a [`Request`], encodes it, and frames it.  The
/// result is ready to be written to the socket.
pub fn encode_request_frame(message: &GameMessage) -> Vec<u8> {
    let request = Request {
        body: Envelope::pack(message),
    };
    frame(&encode_request(&request))
}

impl Envelope {
    /// Wraps `message` with its type URL.
    pub fn pack(message: &GameMessage) -> Self {
        Self {
            type_url: message.kind().type_url(),
            value: encode_body(message),
        }
    }

    /// Resolves the type URL and decodes the body.
    ///
    /// Returns `Ok(None)` when the type URL does not name a known kind; such
    /// envelopes are dropped, not treated as errors.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the kind is known but its body is
    /// malformed.
    pub fn open(&self) -> Result<Option<GameMessage>, ProtocolError> {
        let Some(kind) = MessageKind::from_type_url(&self.type_url) else {
            debug!(type_url = %self.type_url, "unroutable envelope");
            return Ok(None);
        };
        decode_body(kind, &self.value).map(Some)
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    let mut buf = Vec::new();
    write_string(&mut buf, 1, &envelope.type_url);
    write_bytes(&mut buf, 2, &envelope.value);
    buf
}

fn decode_envelope(p: &[u8]) -> Result<Envelope, ProtocolError> {
    let mut envelope = Envelope::default();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => envelope.type_url = expect_string(field, value)?,
            2 => envelope.value = expect_bytes(field, value)?.to_vec(),
            _ => {}
        }
    }
    Ok(envelope)
}

// ── Body encoding ─────────────────────────────────────────────────────────────

fn encode_body(message: &GameMessage) -> Vec<u8> {
    let mut buf = Vec::new();
    match message {
        GameMessage::AuthInfo(m) => encode_auth_info(&mut buf, m),
        GameMessage::CompetitionOperation(m) => encode_competition_operation(&mut buf, m),
        GameMessage::CompetitionFinish(m) => write_string(&mut buf, 1, &m.winner),
        GameMessage::PiecePlaced(m) => encode_placement(&mut buf, m),
        GameMessage::Statistics(m) => encode_statistics(&mut buf, m),
        GameMessage::Sync(_) => {} // no fields
        GameMessage::GetStatistics(m) => write_bool(&mut buf, 1, m.myself),
    }
    buf
}

fn encode_auth_info(buf: &mut Vec<u8>, m: &AuthInfo) {
    if let Some(id) = m.player_id {
        write_string(buf, 1, &id.to_string());
    }
}

fn encode_player(player: PlayerId) -> Vec<u8> {
    let mut buf = Vec::new();
    write_string(&mut buf, 1, &player.to_string());
    buf
}

fn encode_placement(buf: &mut Vec<u8>, m: &Placement) {
    write_int32(buf, 1, m.x);
    write_int32(buf, 2, m.y);
    write_bool(buf, 3, m.myself);
}

fn encode_competition_operation(buf: &mut Vec<u8>, m: &CompetitionOperation) {
    write_int32(buf, 1, m.id.0);
    write_int32(buf, 2, m.operation as i32);
    if let Some(pos) = &m.pos {
        let mut pos_buf = Vec::new();
        encode_placement(&mut pos_buf, pos);
        write_message(buf, 3, &pos_buf);
    }
    if let Some(a) = m.player_a {
        write_message(buf, 4, &encode_player(a));
    }
    if let Some(b) = m.player_b {
        write_message(buf, 5, &encode_player(b));
    }
}

fn encode_statistics(buf: &mut Vec<u8>, m: &Statistics) {
    write_bool(buf, 1, m.myself);
    write_int32(buf, 2, m.wins);
    write_int32(buf, 3, m.losses);
}

// ── Body decoding ─────────────────────────────────────────────────────────────

fn decode_body(kind: MessageKind, p: &[u8]) -> Result<GameMessage, ProtocolError> {
    match kind {
        MessageKind::AuthInfo => decode_auth_info(p).map(GameMessage::AuthInfo),
        MessageKind::CompetitionOperation => {
            decode_competition_operation(p).map(GameMessage::CompetitionOperation)
        }
        MessageKind::CompetitionFinish => {
            decode_competition_finish(p).map(GameMessage::CompetitionFinish)
        }
        MessageKind::PiecePlaced => decode_placement(p).map(GameMessage::PiecePlaced),
        MessageKind::Statistics => decode_statistics(p).map(GameMessage::Statistics),
        MessageKind::Sync => skip_all(p).map(|()| GameMessage::Sync(SyncRequest)),
        MessageKind::GetStatistics => decode_get_statistics(p).map(GameMessage::GetStatistics),
    }
}

fn decode_auth_info(p: &[u8]) -> Result<AuthInfo, ProtocolError> {
    let mut uuid = String::new();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        if field == 1 {
            uuid = expect_string(field, value)?;
        }
    }
    let player_id = if uuid.is_empty() {
        None
    } else {
        Some(parse_player_id(&uuid)?)
    };
    Ok(AuthInfo { player_id })
}

fn decode_player(p: &[u8]) -> Result<PlayerId, ProtocolError> {
    let mut uuid = String::new();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        if field == 1 {
            uuid = expect_string(field, value)?;
        }
    }
    parse_player_id(&uuid)
}

fn decode_placement(p: &[u8]) -> Result<Placement, ProtocolError> {
    let mut m = Placement::default();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => m.x = expect_int32(field, value)?,
            2 => m.y = expect_int32(field, value)?,
            3 => m.myself = expect_bool(field, value)?,
            _ => {}
        }
    }
    Ok(m)
}

fn decode_competition_operation(p: &[u8]) -> Result<CompetitionOperation, ProtocolError> {
    let mut m = CompetitionOperation::default();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => m.id = CompetitionId(expect_int32(field, value)?),
            2 => {
                let raw = expect_int32(field, value)?;
                m.operation =
                    Operation::try_from(raw).map_err(|_| ProtocolError::UnknownOperation(raw))?;
            }
            3 => m.pos = Some(decode_placement(expect_bytes(field, value)?)?),
            4 => m.player_a = Some(decode_player(expect_bytes(field, value)?)?),
            5 => m.player_b = Some(decode_player(expect_bytes(field, value)?)?),
            _ => {}
        }
    }
    Ok(m)
}

fn decode_competition_finish(p: &[u8]) -> Result<CompetitionFinish, ProtocolError> {
    let mut m = CompetitionFinish::default();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        if field == 1 {
            m.winner = expect_string(field, value)?;
        }
    }
    Ok(m)
}

fn decode_statistics(p: &[u8]) -> Result<Statistics, ProtocolError> {
    let mut m = Statistics::default();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => m.myself = expect_bool(field, value)?,
            2 => m.wins = expect_int32(field, value)?,
            3 => m.losses = expect_int32(field, value)?,
            _ => {}
        }
    }
    Ok(m)
}

fn decode_get_statistics(p: &[u8]) -> Result<GetStatistics, ProtocolError> {
    let mut m = GetStatistics::default();
    let mut reader = FieldReader::new(p);
    while let Some((field, value)) = reader.next_field()? {
        if field == 1 {
            m.myself = expect_bool(field, value)?;
        }
    }
    Ok(m)
}

/// Walks every field so that a corrupt body is still reported.
fn skip_all(p: &[u8]) -> Result<(), ProtocolError> {
    let mut reader = FieldReader::new(p);
    while reader.next_field()?.is_some() {}
    Ok(())
}

fn parse_player_id(text: &str) -> Result<PlayerId, ProtocolError> {
    text.parse()
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid player uuid {text:?}: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
