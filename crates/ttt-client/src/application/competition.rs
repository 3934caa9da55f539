//! Competition handlers: the glue between dispatched server messages, the
//! competition mirror, and the UI.
//!
//! [`install_competition_handlers`] registers one handler per server message
//! kind.  Each handler applies the message to the mirror and then carries
//! out the returned effects: UI calls go to the [`SessionObserver`], follow-up
//! requests go out through the session client.

use tracing::warn;
use ttt_core::protocol::messages::{
    AuthInfo, CompetitionFinish, CompetitionOperation, Placement, Statistics,
};

use crate::application::dispatch::DispatchRegistry;
use crate::application::session::SessionContext;
use crate::application::session_client::SessionError;
use crate::domain::competition::Effect;
pub use crate::domain::competition::{Notice, Outcome, Side};

/// What the UI collaborator must provide to follow the session.
///
/// Called only from the session loop, one call at a time.
#[cfg_attr(test, mockall::automock)]
pub trait SessionObserver: Send + Sync {
    /// Shows a user-visible notice.
    fn notice(&self, notice: Notice);

    /// Clears the board.
    fn reset_board(&self);

    /// Draws a piece for `side` at 1-based `(x, y)`.
    fn place_piece(&self, side: Side, x: i32, y: i32);
}

/// Registers the competition handlers for every server message kind.
pub fn install_competition_handlers(registry: &mut DispatchRegistry<SessionContext>) {
    registry.on::<AuthInfo, _>(|ctx, msg| {
        let effects = ctx.mirror.apply_auth(&msg);
        carry_out(ctx, effects);
    });
    registry.on::<CompetitionOperation, _>(|ctx, msg| {
        let effects = ctx.mirror.apply_operation(&msg);
        carry_out(ctx, effects);
    });
    registry.on::<CompetitionFinish, _>(|ctx, msg| {
        let effects = ctx.mirror.apply_finish(&msg);
        carry_out(ctx, effects);
    });
    registry.on::<Placement, _>(|ctx, msg| {
        let effects = ctx.mirror.apply_placement(&msg);
        carry_out(ctx, effects);
    });
    registry.on::<Statistics, _>(|ctx, msg| {
        let effects = ctx.mirror.apply_statistics(&msg);
        carry_out(ctx, effects);
    });
}

/// Performs the effects of one mirror transition, in order.
pub fn carry_out(ctx: &SessionContext, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Notify(notice) => ctx.observer.notice(notice),
            Effect::ResetBoard => ctx.observer.reset_board(),
            Effect::PlacePiece { side, x, y } => ctx.observer.place_piece(side, x, y),
            Effect::RequestSync => report("sync", ctx.client.request_sync()),
            Effect::RequestStatistics => report("statistics", ctx.client.request_statistics()),
        }
    }
}

fn report(request: &str, result: Result<(), SessionError>) {
    if let Err(e) = result {
        warn!("could not send {request} request: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::eq;
    use tokio::sync::mpsc;
    use ttt_core::protocol::messages::{GetStatistics, Operation, SyncRequest};
    use ttt_core::{decode_request, CompetitionId, FrameDecoder, GameMessage, PlayerId};
    use uuid::Uuid;

    use super::*;
    use crate::application::session_client::{OutboundLink, SessionClient};
    use crate::domain::competition::{CompetitionMirror, Phase};

    struct Harness {
        registry: DispatchRegistry<SessionContext>,
        ctx: SessionContext,
        sent: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    impl Harness {
        fn new(observer: MockSessionObserver) -> Self {
            let link = OutboundLink::new();
            let (tx, sent) = mpsc::unbounded_channel();
            link.attach(tx);
            let ctx = SessionContext {
                client: SessionClient::new(link),
                mirror: CompetitionMirror::new(),
                observer: Arc::new(observer),
            };
            let mut registry = DispatchRegistry::new();
            install_competition_handlers(&mut registry);
            Self {
                registry,
                ctx,
                sent,
            }
        }

        fn deliver(&mut self, message: impl Into<GameMessage>) -> bool {
            self.registry.dispatch(&mut self.ctx, message.into())
        }

        fn sent_requests(&mut self) -> Vec<GameMessage> {
            let mut out = Vec::new();
            while let Ok(bytes) = self.sent.try_recv() {
                let mut decoder = FrameDecoder::new();
                decoder.extend(&bytes);
                let payload = decoder.next_frame().unwrap().unwrap();
                out.push(decode_request(&payload).unwrap().body.open().unwrap().unwrap());
            }
            out
        }
    }

    fn op(operation: Operation, id: i32) -> CompetitionOperation {
        CompetitionOperation {
            id: CompetitionId(id),
            operation,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_result_notifies_created() {
        // Arrange
        let mut observer = MockSessionObserver::new();
        observer
            .expect_notice()
            .with(eq(Notice::Created(CompetitionId(4321))))
            .times(1)
            .return_const(());
        let mut h = Harness::new(observer);

        // Act
        h.deliver(op(Operation::Create, 4321));

        // Assert
        assert_eq!(h.ctx.mirror.phase(), Phase::Waiting);
        assert!(h.sent_requests().is_empty());
    }

    #[test]
    fn test_join_result_resets_board_and_requests_sync_once() {
        // Arrange
        let mut observer = MockSessionObserver::new();
        observer.expect_reset_board().times(1).return_const(());
        observer
            .expect_notice()
            .with(eq(Notice::Started(CompetitionId(4321))))
            .times(1)
            .return_const(());
        let mut h = Harness::new(observer);
        let opponent = PlayerId(Uuid::new_v4());

        // Act
        h.deliver(CompetitionOperation {
            player_b: Some(opponent),
            ..op(Operation::Join, 4321)
        });

        // Assert
        assert_eq!(h.sent_requests(), vec![GameMessage::Sync(SyncRequest)]);
        assert_eq!(h.ctx.mirror.opponent(), Some(opponent));
    }

    #[test]
    fn test_reset_result_requests_statistics() {
        let mut observer = MockSessionObserver::new();
        observer.expect_reset_board().times(1).return_const(());
        observer
            .expect_notice()
            .with(eq(Notice::BoardReset))
            .times(1)
            .return_const(());
        let mut h = Harness::new(observer);

        h.deliver(op(Operation::Reset, 4321));

        assert_eq!(
            h.sent_requests(),
            vec![GameMessage::GetStatistics(GetStatistics { myself: true })]
        );
    }

    #[test]
    fn test_placement_is_forwarded_to_board() {
        let mut observer = MockSessionObserver::new();
        observer
            .expect_place_piece()
            .with(eq(Side::Myself), eq(2), eq(1))
            .times(1)
            .return_const(());
        let mut h = Harness::new(observer);

        h.deliver(Placement {
            x: 2,
            y: 1,
            myself: true,
        });

        assert_eq!(h.ctx.mirror.last_put(), Some(Side::Myself));
    }

    #[test]
    fn test_finish_with_own_id_is_self_win() {
        // Arrange
        let me = PlayerId(Uuid::new_v4());
        let mut observer = MockSessionObserver::new();
        observer
            .expect_notice()
            .with(eq(Notice::Finished(Outcome::SelfWin)))
            .times(1)
            .return_const(());
        let mut h = Harness::new(observer);
        h.deliver(AuthInfo {
            player_id: Some(me),
        });

        // Act
        h.deliver(CompetitionFinish {
            winner: me.to_string(),
        });

        // Assert
        assert_eq!(h.ctx.mirror.id(), CompetitionId::NONE);
    }

    #[test]
    fn test_statistics_touch_no_observer_method() {
        // No expectations: any observer call panics.
        let mut h = Harness::new(MockSessionObserver::new());

        let handled = h.deliver(Statistics {
            myself: false,
            wins: 1,
            losses: 2,
        });

        assert!(handled);
        assert_eq!(h.ctx.mirror.score(Side::Opponent).losses, 2);
    }

    #[test]
    fn test_follow_up_request_without_connection_is_logged_not_fatal() {
        let mut observer = MockSessionObserver::new();
        observer.expect_reset_board().return_const(());
        observer.expect_notice().return_const(());
        let mut h = Harness::new(observer);
        h.ctx.client = SessionClient::new(OutboundLink::new());

        h.deliver(op(Operation::Join, 1111));

        assert_eq!(h.ctx.mirror.id(), CompetitionId(1111));
    }
}
