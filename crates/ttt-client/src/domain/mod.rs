//! Domain types for the client.
//!
//! - **`competition`** – The client-side mirror of the server's competition
//!   (match) state and the pure transitions applied to it.
//! - **`board`** – The 3×3 board kept by the UI collaborator.

pub mod board;
pub mod competition;
