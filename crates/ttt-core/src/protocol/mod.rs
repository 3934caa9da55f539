//! Protocol module containing message types, the protobuf codec, and framing.

pub mod codec;
pub mod framing;
pub mod messages;
mod wire;

pub use codec::{
    decode_request, decode_response, encode_request, encode_request_frame, encode_response,
    ProtocolError,
};
pub use framing::{frame, FrameDecoder};
pub use messages::*;
