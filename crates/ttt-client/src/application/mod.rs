//! Application layer use cases for the client.
//!
//! - **`dispatch`** – Routes each decoded server message to the one handler
//!   registered for its kind.
//!
//! - **`session_client`** – Fire-and-forget requests (auth, competition
//!   operations, sync, statistics) queued on the active connection.
//!
//! - **`competition`** – Handlers that apply server messages to the
//!   competition mirror, plus the [`SessionObserver`](competition::SessionObserver)
//!   trait the UI implements.
//!
//! - **`session`** – The session object and its single dispatch loop.

pub mod competition;
pub mod dispatch;
pub mod session;
pub mod session_client;
