//! Infrastructure layer for the client application.
//!
//! Contains the OS-facing adapters.
//!
//! # Sub-modules
//!
//! - **`network`** – TCP connection to the game server: connect, read loop
//!   (framing and decoding), single writer task, settle signal, close.
//!
//! - **`config`** – TOML configuration file with serde defaults.

pub mod config;
pub mod network;
