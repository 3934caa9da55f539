//! Domain identifiers shared by the protocol and the client.

pub mod ids;
