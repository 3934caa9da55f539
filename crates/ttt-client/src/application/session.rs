//! The session object and its dispatch loop.
//!
//! A [`Session`] owns everything that changes in response to server traffic:
//! the dispatch registry, the competition mirror, the one-shot post-connect
//! action, and the publisher the UI reads mirror snapshots from.  All of it
//! is driven by [`Session::run`], a single loop over the network events, so
//! handlers never race each other.
//!
//! ```text
//! NetworkEvent::Message     → registry dispatch → mirror → observer / requests
//! NetworkEvent::RemoteError → observer notice (no handler runs)
//! NetworkEvent::Settled     → on_connected (at most once)
//! NetworkEvent::Disconnected / ConnectFailed → mirror reset, loop stops
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::application::competition::{install_competition_handlers, SessionObserver};
use crate::application::dispatch::DispatchRegistry;
use crate::application::session_client::SessionClient;
use crate::domain::competition::{CompetitionMirror, Notice};
use crate::infrastructure::network::{ClientNetworkError, CloseReason, NetworkEvent};

/// State handed to every dispatched handler.
pub struct SessionContext {
    pub client: SessionClient,
    pub mirror: CompetitionMirror,
    pub observer: Arc<dyn SessionObserver>,
}

/// Action run once after a connection has settled.
pub type OnConnected = Box<dyn FnOnce(&SessionClient) + Send>;

/// Why [`Session::run`] returned.
#[derive(Debug)]
pub enum StopReason {
    Disconnected(CloseReason),
    ConnectFailed(ClientNetworkError),
    /// The network layer dropped its event sender.
    EventsClosed,
}

pub struct Session {
    registry: DispatchRegistry<SessionContext>,
    ctx: SessionContext,
    on_connected: Option<OnConnected>,
    mirror_tx: watch::Sender<CompetitionMirror>,
}

impl Session {
    /// Creates a session with the competition handlers installed.
    pub fn new(client: SessionClient, observer: Arc<dyn SessionObserver>) -> Self {
        let mut registry = DispatchRegistry::new();
        install_competition_handlers(&mut registry);
        let (mirror_tx, _) = watch::channel(CompetitionMirror::new());
        Self {
            registry,
            ctx: SessionContext {
                client,
                mirror: CompetitionMirror::new(),
                observer,
            },
            on_connected: None,
            mirror_tx,
        }
    }

    /// Stores the action to run once the next connection has settled.
    /// Replaces any action that has not run yet.
    pub fn set_on_connected<F>(&mut self, action: F)
    where
        F: FnOnce(&SessionClient) + Send + 'static,
    {
        self.on_connected = Some(Box::new(action));
    }

    pub fn registry_mut(&mut self) -> &mut DispatchRegistry<SessionContext> {
        &mut self.registry
    }

    /// Read-only view of the mirror, updated after every handled event.
    pub fn mirror(&self) -> watch::Receiver<CompetitionMirror> {
        self.mirror_tx.subscribe()
    }

    pub fn client(&self) -> &SessionClient {
        &self.ctx.client
    }

    /// Processes events until the connection ends or the sender goes away.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<NetworkEvent>) -> StopReason {
        while let Some(event) = events.recv().await {
            if let Some(reason) = self.handle_event(event) {
                return reason;
            }
        }
        self.ctx.mirror.apply_disconnect();
        self.publish();
        StopReason::EventsClosed
    }

    /// Processes one event.  Returns `Some` when the session should stop.
    pub fn handle_event(&mut self, event: NetworkEvent) -> Option<StopReason> {
        let stop = match event {
            NetworkEvent::Connected { addr } => {
                info!("session connected to {addr}");
                None
            }
            NetworkEvent::Message(message) => {
                self.registry.dispatch(&mut self.ctx, message);
                None
            }
            NetworkEvent::RemoteError(text) => {
                self.ctx.observer.notice(Notice::ServerError(text));
                None
            }
            NetworkEvent::Settled => {
                match self.on_connected.take() {
                    Some(action) => action(&self.ctx.client),
                    None => debug!("connection settled; no post-connect action"),
                }
                None
            }
            NetworkEvent::Disconnected(reason) => {
                warn!(?reason, "session ended");
                self.ctx.mirror.apply_disconnect();
                self.ctx.observer.notice(Notice::ConnectionLost);
                Some(StopReason::Disconnected(reason))
            }
            NetworkEvent::ConnectFailed(e) => {
                self.ctx.mirror.apply_disconnect();
                self.ctx.observer.notice(Notice::ConnectFailed(e.to_string()));
                Some(StopReason::ConnectFailed(e))
            }
        };
        self.publish();
        stop
    }

    fn publish(&self) {
        let current = &self.ctx.mirror;
        self.mirror_tx.send_if_modified(|published| {
            if *published == *current {
                return false;
            }
            *published = current.clone();
            true
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockall::predicate::eq;
    use ttt_core::protocol::messages::{CompetitionOperation, Operation};
    use ttt_core::{CompetitionId, GameMessage, MessageKind, PlayerId};
    use uuid::Uuid;

    use super::*;
    use crate::application::competition::MockSessionObserver;
    use crate::application::session_client::OutboundLink;
    use crate::domain::competition::Phase;

    fn session(observer: MockSessionObserver) -> (Session, mpsc::UnboundedReceiver<Vec<u8>>) {
        let link = OutboundLink::new();
        let (tx, rx) = mpsc::unbounded_channel();
        link.attach(tx);
        (Session::new(SessionClient::new(link), Arc::new(observer)), rx)
    }

    fn relaxed_observer() -> MockSessionObserver {
        let mut observer = MockSessionObserver::new();
        observer.expect_notice().return_const(());
        observer.expect_reset_board().return_const(());
        observer.expect_place_piece().return_const(());
        observer
    }

    fn op(operation: Operation, id: i32) -> NetworkEvent {
        NetworkEvent::Message(GameMessage::CompetitionOperation(CompetitionOperation {
            id: CompetitionId(id),
            operation,
            ..Default::default()
        }))
    }

    #[test]
    fn test_on_connected_runs_once_after_settle() {
        // Arrange
        let (mut session, mut sent) = session(relaxed_observer());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        session.set_on_connected(move |client| {
            counter.fetch_add(1, Ordering::SeqCst);
            client.auth().unwrap();
        });

        // Act
        session.handle_event(NetworkEvent::Settled);
        session.handle_event(NetworkEvent::Settled);

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sent.try_recv().is_ok());
        assert!(sent.try_recv().is_err());
    }

    #[test]
    fn test_remote_error_reaches_observer_not_handlers() {
        // Arrange
        let mut observer = MockSessionObserver::new();
        observer
            .expect_notice()
            .with(eq(Notice::ServerError("boom".to_string())))
            .times(1)
            .return_const(());
        let (mut session, _sent) = session(observer);
        let hits = Arc::new(AtomicUsize::new(0));
        for kind in MessageKind::ALL {
            let hits = Arc::clone(&hits);
            session.registry_mut().register(kind, move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        // Act
        let stop = session.handle_event(NetworkEvent::RemoteError("boom".to_string()));

        // Assert
        assert!(stop.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mirror_receiver_sees_create_result() {
        let (mut session, _sent) = session(relaxed_observer());
        let mirror = session.mirror();

        session.handle_event(op(Operation::Create, 4321));

        assert!(mirror.has_changed().unwrap());
        assert_eq!(mirror.borrow().id(), CompetitionId(4321));
        assert_eq!(mirror.borrow().phase(), Phase::Waiting);
    }

    #[test]
    fn test_disconnect_while_active_resets_mirror_and_stops() {
        // Arrange
        let (mut session, _sent) = session(relaxed_observer());
        let mirror = session.mirror();
        session.handle_event(op(Operation::Create, 4321));
        session.handle_event(NetworkEvent::Message(GameMessage::CompetitionOperation(
            CompetitionOperation {
                id: CompetitionId(4321),
                operation: Operation::Join,
                player_b: Some(PlayerId(Uuid::new_v4())),
                ..Default::default()
            },
        )));
        assert_eq!(mirror.borrow().phase(), Phase::Active);

        // Act
        let stop = session.handle_event(NetworkEvent::Disconnected(CloseReason::RemoteClosed));

        // Assert
        assert!(matches!(
            stop,
            Some(StopReason::Disconnected(CloseReason::RemoteClosed))
        ));
        assert_eq!(mirror.borrow().id(), CompetitionId::NONE);
        assert_eq!(mirror.borrow().phase(), Phase::NoMatch);
    }

    #[test]
    fn test_unchanged_mirror_is_not_republished() {
        let (mut session, _sent) = session(relaxed_observer());
        let mirror = session.mirror();

        session.handle_event(NetworkEvent::Connected {
            addr: "127.0.0.1:5544".to_string(),
        });

        assert!(!mirror.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_run_returns_when_events_end() {
        let (mut session, _sent) = session(relaxed_observer());
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(op(Operation::Create, 1234)).await.unwrap();
        drop(tx);

        let reason = session.run(&mut rx).await;

        assert!(matches!(reason, StopReason::EventsClosed));
        assert_eq!(session.mirror().borrow().id(), CompetitionId::NONE);
    }
}
