//! Message kind → handler routing.
//!
//! The registry holds at most one handler per [`MessageKind`].  Registering
//! again replaces the previous handler; nothing is queued for kinds without
//! a handler.  Handlers are `FnMut` and are only ever called from the single
//! session loop, so they can mutate the context they receive without locks.
//!
//! The registry is generic over that context.  The session passes its
//! [`SessionContext`](crate::application::session::SessionContext); tests can
//! pass anything.

use std::collections::HashMap;

use tracing::debug;
use ttt_core::protocol::messages::KindedMessage;
use ttt_core::{GameMessage, MessageKind};

/// A boxed handler for one message kind.
pub type Handler<C> = Box<dyn FnMut(&mut C, GameMessage) + Send>;

/// Routing table from message kind to a single handler.
pub struct DispatchRegistry<C> {
    handlers: HashMap<MessageKind, Handler<C>>,
}

impl<C> Default for DispatchRegistry<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> DispatchRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, replacing any existing handler.
    ///
    /// Returns `true` when a previous handler was replaced.
    pub fn register<F>(&mut self, kind: MessageKind, handler: F) -> bool
    where
        F: FnMut(&mut C, GameMessage) + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(handler)).is_some()
    }

    /// Registers a handler that receives the concrete payload type `M`.
    pub fn on<M, F>(&mut self, mut handler: F) -> bool
    where
        M: KindedMessage,
        F: FnMut(&mut C, M) + Send + 'static,
    {
        self.register(M::KIND, move |ctx, message| {
            if let Some(payload) = M::from_message(message) {
                handler(ctx, payload);
            }
        })
    }

    /// Removes the handler for `kind`, if any.
    pub fn unregister(&mut self, kind: MessageKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    pub fn is_registered(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Routes `message` to the handler for its kind.
    ///
    /// Returns `true` if a handler ran.  A message without a handler is
    /// dropped with a debug trace.
    pub fn dispatch(&mut self, ctx: &mut C, message: GameMessage) -> bool {
        let kind = message.kind();
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                handler(ctx, message);
                true
            }
            None => {
                debug!(?kind, "no handler registered; message dropped");
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
