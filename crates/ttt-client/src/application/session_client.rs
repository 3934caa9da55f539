//! Typed, fire-and-forget requests to the server.
//!
//! Every call builds a `Request`, encodes and frames it, and hands the frame
//! to the writer of the active connection.  Nothing waits for an answer: the
//! server's reply arrives later as an ordinary message and is routed by the
//! dispatch registry.  There are no correlation ids; the most recent message
//! of a kind is taken as the answer to the most recent request.
//!
//! Calling any method while no connection is active returns
//! [`SessionError::NotConnected`] instead of silently dropping the request.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use ttt_core::protocol::messages::{
    AuthInfo, CompetitionOperation, GetStatistics, Operation, Placement, SyncRequest,
};
use ttt_core::{encode_request_frame, CompetitionId, GameMessage};

/// Errors returned to callers of [`SessionClient`].
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// No connection is active, or it closed before the request was queued.
    #[error("not connected to the server")]
    NotConnected,
}

/// Shared slot holding the frame queue of the active connection.
///
/// The connection manager attaches a queue when a connection is established
/// and detaches it when the connection ends.  Session clients only ever push
/// complete frames into it, so concurrent callers never interleave bytes.
#[derive(Debug, Clone, Default)]
pub struct OutboundLink {
    queue: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl OutboundLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, queue: mpsc::UnboundedSender<Vec<u8>>) {
        *self.queue.lock().unwrap_or_else(PoisonError::into_inner) = Some(queue);
    }

    pub fn detach(&self) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_attached(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|q| !q.is_closed())
    }

    /// Queues one encoded frame for the writer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when no queue is attached or
    /// the writer has already gone away.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        let guard = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = guard.as_ref().ok_or(SessionError::NotConnected)?;
        queue.send(frame).map_err(|_| SessionError::NotConnected)
    }
}

/// Request surface used by the UI and by handlers.
#[derive(Debug, Clone)]
pub struct SessionClient {
    link: OutboundLink,
}

impl SessionClient {
    pub fn new(link: OutboundLink) -> Self {
        Self { link }
    }

    /// Returns `true` while a connection is able to accept requests.
    pub fn is_connected(&self) -> bool {
        self.link.is_attached()
    }

    /// Asks the server for this connection's player identity.
    pub fn auth(&self) -> Result<(), SessionError> {
        self.send(AuthInfo::default().into())
    }

    pub fn create_competition(&self, id: CompetitionId) -> Result<(), SessionError> {
        self.send_operation(id, Operation::Create, None)
    }

    pub fn join_competition(&self, id: CompetitionId) -> Result<(), SessionError> {
        self.send_operation(id, Operation::Join, None)
    }

    /// Leaves `id`.  `CompetitionId::NONE` is accepted and asks the server to
    /// drop any competition it still associates with this connection.
    pub fn leave_competition(&self, id: CompetitionId) -> Result<(), SessionError> {
        self.send_operation(id, Operation::Leave, None)
    }

    /// Places a piece at 1-based `(x, y)`.  The server decides whose turn it
    /// is, so `myself` is left unset.
    pub fn place_piece(&self, id: CompetitionId, x: i32, y: i32) -> Result<(), SessionError> {
        let pos = Placement {
            x,
            y,
            myself: false,
        };
        self.send_operation(id, Operation::Put, Some(pos))
    }

    pub fn reset_competition(&self, id: CompetitionId) -> Result<(), SessionError> {
        self.send_operation(id, Operation::Reset, None)
    }

    /// Asks the server to push fresh [`Statistics`](ttt_core::protocol::messages::Statistics).
    pub fn request_statistics(&self) -> Result<(), SessionError> {
        self.send(GetStatistics { myself: true }.into())
    }

    /// Asks the server to replay the current board.
    pub fn request_sync(&self) -> Result<(), SessionError> {
        self.send(SyncRequest.into())
    }

    fn send_operation(
        &self,
        id: CompetitionId,
        operation: Operation,
        pos: Option<Placement>,
    ) -> Result<(), SessionError> {
        self.send(
            CompetitionOperation {
                id,
                operation,
                pos,
                ..Default::default()
            }
            .into(),
        )
    }

    fn send(&self, message: GameMessage) -> Result<(), SessionError> {
        debug!(kind = ?message.kind(), "queueing request");
        self.link.send_frame(encode_request_frame(&message))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
