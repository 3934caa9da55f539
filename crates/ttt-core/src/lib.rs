//! # ttt-core
//!
//! Shared library for TTT-Online containing the network protocol codec,
//! frame handling, and the identifiers used by the game client.
//!
//! This crate has zero dependencies on sockets, async runtimes, or UI code.
//! It turns typed messages into bytes and bytes back into typed messages.
//!
//! # Architecture overview
//!
//! TTT-Online is a two-player tic-tac-toe game played against a remote,
//! authoritative server.  The client keeps one persistent TCP connection open
//! and exchanges small binary messages with the server over it.
//!
//! - **`protocol`** – How bytes travel over the network.  Every message is a
//!   protobuf-encoded `Request` or `Response` whose body is a self-describing
//!   envelope (type URL + encoded bytes).  Each encoded message is prefixed
//!   with its length as a varint to form a *frame*.
//!
//! - **`domain`** – Identifier newtypes shared by every layer: the player's
//!   UUID and the four-digit competition (match) number.

pub mod domain;
pub mod protocol;

pub use domain::ids::{CompetitionId, InvalidCompetitionId, PlayerId};
pub use protocol::codec::{
    decode_request, decode_response, encode_request, encode_request_frame, encode_response,
    ProtocolError,
};
pub use protocol::framing::{frame, FrameDecoder};
pub use protocol::messages::{Envelope, GameMessage, MessageKind, Request, Response};
