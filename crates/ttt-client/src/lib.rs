//! ttt-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does ttt-client do?
//!
//! The client holds one TCP connection to the TTT-Online server and keeps a
//! local mirror of the match the player is in.  The server is authoritative:
//! user actions only *send requests*; the mirror changes when the server's
//! answers and events arrive.
//!
//! 1. Connects and, once the connection has settled, authenticates.
//! 2. Sends competition requests (create, join, leave, put, reset) and
//!    sync/statistics requests on behalf of the user.
//! 3. Decodes every server frame and routes it by message kind to one
//!    registered handler.
//! 4. The competition handlers update the mirror and tell the UI observer
//!    what to show.

/// Domain layer: competition mirror state machine and the board model.
pub mod domain;

/// Application layer: dispatch registry, session client, and session loop.
pub mod application;

/// Infrastructure layer: TCP connection management and configuration.
pub mod infrastructure;
