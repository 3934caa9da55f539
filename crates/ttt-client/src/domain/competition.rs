//! Client-side mirror of the server's competition (match) state.
//!
//! The server owns the match.  The mirror records what the client has been
//! told: which competition it is in, who it is, who the opponent is, and the
//! win/loss totals for both sides.  It changes only when a server message is
//! applied to it; user actions never touch it directly.
//!
//! Every `apply_*` method is a pure state transition that returns the
//! [`Effect`]s the caller must carry out (notify the UI, send a follow-up
//! request).  Keeping I/O out of the transitions keeps them testable.
//!
//! # Phases
//!
//! ```text
//!            Create / Join (no opponent)           Join (opponent)
//!  NoMatch ───────────────────────────► Waiting ─────────────────► Active
//!     ▲                                    │                         │
//!     └────── Leave (no opponent) ─────────┴─────────────────────────┘
//!     └────── connection closed ───────────┴─────────────────────────┘
//! ```

use ttt_core::protocol::messages::{
    AuthInfo, CompetitionFinish, CompetitionOperation, Operation, Placement, Statistics,
    DRAW_MARKER,
};
use ttt_core::{CompetitionId, PlayerId};
use tracing::{debug, info};

/// Coarse state of the mirrored competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not in a competition (id 0).
    #[default]
    NoMatch,
    /// In a competition, no opponent has joined yet.
    Waiting,
    /// Both players are present.
    Active,
}

/// One of the two players, seen from this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Myself,
    Opponent,
}

impl Side {
    pub fn from_myself(myself: bool) -> Self {
        if myself {
            Side::Myself
        } else {
            Side::Opponent
        }
    }
}

/// Win/loss totals for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub wins: i32,
    pub losses: i32,
}

/// How a finished match is reported to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    SelfWin,
    OpponentWin,
    Draw,
    /// The winner named by the server is neither player.
    NoWinner,
}

/// User-visible notices produced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Created(CompetitionId),
    Joined(CompetitionId),
    Started(CompetitionId),
    Left,
    BoardReset,
    Finished(Outcome),
    ServerError(String),
    ConnectionLost,
    ConnectFailed(String),
}

/// Work a transition asks the session to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify(Notice),
    ResetBoard,
    PlacePiece { side: Side, x: i32, y: i32 },
    RequestSync,
    RequestStatistics,
}

/// Snapshot of everything the client knows about its competition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompetitionMirror {
    id: CompetitionId,
    phase: Phase,
    myself: Option<PlayerId>,
    opponent: Option<PlayerId>,
    my_score: Score,
    opponent_score: Score,
    last_put: Option<Side>,
}

impl CompetitionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Read access ──────────────────────────────────────────────────────────

    pub fn id(&self) -> CompetitionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// This client's identity, known after authentication.
    pub fn myself(&self) -> Option<PlayerId> {
        self.myself
    }

    pub fn opponent(&self) -> Option<PlayerId> {
        self.opponent
    }

    pub fn score(&self, side: Side) -> Score {
        match side {
            Side::Myself => self.my_score,
            Side::Opponent => self.opponent_score,
        }
    }

    /// The side whose piece was placed most recently.
    pub fn last_put(&self) -> Option<Side> {
        self.last_put
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Records the identity the server assigned to this connection.
    pub fn apply_auth(&mut self, info: &AuthInfo) -> Vec<Effect> {
        if let Some(id) = info.player_id {
            info!(player = %id, "authenticated");
            self.myself = Some(id);
        }
        Vec::new()
    }

    /// Applies the result of a competition operation.
    pub fn apply_operation(&mut self, result: &CompetitionOperation) -> Vec<Effect> {
        match result.operation {
            Operation::Create => {
                self.adopt(result.id);
                self.opponent = None;
                vec![Effect::Notify(Notice::Created(result.id))]
            }
            Operation::Join => self.apply_join(result),
            Operation::Leave => {
                if result.player_b.is_none() {
                    self.leave();
                }
                vec![Effect::Notify(Notice::Left)]
            }
            Operation::Reset => {
                self.last_put = None;
                vec![
                    Effect::ResetBoard,
                    Effect::Notify(Notice::BoardReset),
                    Effect::RequestStatistics,
                ]
            }
            Operation::Put => {
                debug!(id = %result.id, "ignoring put result");
                Vec::new()
            }
        }
    }

    fn apply_join(&mut self, result: &CompetitionOperation) -> Vec<Effect> {
        let mut effects = vec![Effect::ResetBoard, Effect::RequestSync];
        self.last_put = None;
        self.adopt(result.id);

        // Whichever reported player is not this client is the opponent.
        let me = self.myself;
        let not_me = |p: Option<PlayerId>| p.filter(|p| Some(*p) != me);

        if result.player_b.is_some() {
            self.opponent = not_me(result.player_b).or(not_me(result.player_a));
        } else {
            // Nobody else has joined yet: playerA, when present, is the
            // creator waiting in this competition.
            self.opponent = not_me(result.player_a);
        }

        // A match is only under way with two known players.
        if result.player_b.is_some() && self.opponent.is_some() && !self.id.is_none() {
            self.phase = Phase::Active;
            effects.push(Effect::Notify(Notice::Started(result.id)));
        } else {
            effects.push(Effect::Notify(Notice::Joined(result.id)));
        }
        effects
    }

    /// Classifies the winner of a finished match.  The competition id is
    /// left untouched.
    pub fn apply_finish(&self, finish: &CompetitionFinish) -> Vec<Effect> {
        vec![Effect::Notify(Notice::Finished(self.classify(&finish.winner)))]
    }

    /// Records which side placed a piece and forwards it to the board.
    pub fn apply_placement(&mut self, placed: &Placement) -> Vec<Effect> {
        let side = Side::from_myself(placed.myself);
        self.last_put = Some(side);
        vec![Effect::PlacePiece {
            side,
            x: placed.x,
            y: placed.y,
        }]
    }

    /// Updates one side's win/loss totals.
    pub fn apply_statistics(&mut self, stats: &Statistics) -> Vec<Effect> {
        let score = Score {
            wins: stats.wins,
            losses: stats.losses,
        };
        match Side::from_myself(stats.myself) {
            Side::Myself => self.my_score = score,
            Side::Opponent => self.opponent_score = score,
        }
        Vec::new()
    }

    /// Drops the competition after the connection is gone.  The player's own
    /// identity and scores are kept for display.
    pub fn apply_disconnect(&mut self) {
        self.leave();
    }

    /// Maps a winner string from the server to an [`Outcome`].
    pub fn classify(&self, winner: &str) -> Outcome {
        if winner == DRAW_MARKER {
            return Outcome::Draw;
        }
        let Ok(winner) = winner.parse::<PlayerId>() else {
            return Outcome::NoWinner;
        };
        if Some(winner) == self.myself {
            Outcome::SelfWin
        } else if Some(winner) == self.opponent {
            Outcome::OpponentWin
        } else {
            Outcome::NoWinner
        }
    }

    fn adopt(&mut self, id: CompetitionId) {
        self.id = id;
        self.phase = if id.is_none() {
            Phase::NoMatch
        } else {
            Phase::Waiting
        };
    }

    fn leave(&mut self) {
        self.id = CompetitionId::NONE;
        self.phase = Phase::NoMatch;
        self.opponent = None;
        self.last_put = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn player() -> PlayerId {
        PlayerId(Uuid::new_v4())
    }

    fn result(operation: Operation, id: i32) -> CompetitionOperation {
        CompetitionOperation {
            id: CompetitionId(id),
            operation,
            ..Default::default()
        }
    }

    fn authenticated(me: PlayerId) -> CompetitionMirror {
        let mut mirror = CompetitionMirror::new();
        mirror.apply_auth(&AuthInfo {
            player_id: Some(me),
        });
        mirror
    }

    fn active(me: PlayerId, opponent: PlayerId, id: i32) -> CompetitionMirror {
        let mut mirror = authenticated(me);
        mirror.apply_operation(&result(Operation::Create, id));
        mirror.apply_operation(&CompetitionOperation {
            player_b: Some(opponent),
            ..result(Operation::Join, id)
        });
        mirror
    }

    // ── Auth ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_auth_records_identity_without_changing_competition() {
        let me = player();
        let mirror = authenticated(me);

        assert_eq!(mirror.myself(), Some(me));
        assert_eq!(mirror.id(), CompetitionId::NONE);
        assert_eq!(mirror.phase(), Phase::NoMatch);
    }

    // ── Create / Join ────────────────────────────────────────────────────────

    #[test]
    fn test_create_result_moves_to_waiting_with_assigned_id() {
        // Arrange
        let mut mirror = authenticated(player());

        // Act
        let effects = mirror.apply_operation(&result(Operation::Create, 4321));

        // Assert
        assert_eq!(mirror.id(), CompetitionId(4321));
        assert_eq!(mirror.phase(), Phase::Waiting);
        assert_eq!(
            effects,
            vec![Effect::Notify(Notice::Created(CompetitionId(4321)))]
        );
    }

    #[test]
    fn test_join_with_player_b_starts_match_and_syncs_once() {
        // Arrange
        let me = player();
        let opponent = player();
        let mut mirror = authenticated(me);
        mirror.apply_operation(&result(Operation::Create, 4321));

        // Act
        let effects = mirror.apply_operation(&CompetitionOperation {
            player_b: Some(opponent),
            ..result(Operation::Join, 4321)
        });

        // Assert
        assert_eq!(mirror.phase(), Phase::Active);
        assert_eq!(mirror.opponent(), Some(opponent));
        assert_eq!(
            effects
                .iter()
                .filter(|e| **e == Effect::RequestSync)
                .count(),
            1
        );
        assert!(effects.contains(&Effect::ResetBoard));
        assert!(effects.contains(&Effect::Notify(Notice::Started(CompetitionId(4321)))));
    }

    #[test]
    fn test_join_reporting_self_as_player_b_uses_player_a_as_opponent() {
        let me = player();
        let creator = player();
        let mut mirror = authenticated(me);

        mirror.apply_operation(&CompetitionOperation {
            player_a: Some(creator),
            player_b: Some(me),
            ..result(Operation::Join, 1111)
        });

        assert_eq!(mirror.phase(), Phase::Active);
        assert_eq!(mirror.opponent(), Some(creator));
        assert_eq!(mirror.id(), CompetitionId(1111));
    }

    #[test]
    fn test_join_without_player_b_waits_with_placeholder_opponent() {
        // Arrange
        let me = player();
        let creator = player();
        let mut mirror = authenticated(me);

        // Act
        let effects = mirror.apply_operation(&CompetitionOperation {
            player_a: Some(creator),
            ..result(Operation::Join, 2468)
        });

        // Assert
        assert_eq!(mirror.phase(), Phase::Waiting);
        assert_eq!(mirror.id(), CompetitionId(2468));
        assert_eq!(mirror.opponent(), Some(creator));
        assert!(effects.contains(&Effect::Notify(Notice::Joined(CompetitionId(2468)))));
    }

    #[test]
    fn test_join_echoing_own_record_does_not_become_opponent() {
        let me = player();
        let mut mirror = active(me, player(), 1357);

        mirror.apply_operation(&CompetitionOperation {
            player_a: Some(me),
            ..result(Operation::Join, 2468)
        });

        assert_eq!(mirror.id(), CompetitionId(2468));
        assert_eq!(mirror.opponent(), None);
        assert_eq!(mirror.phase(), Phase::Waiting);
    }

    #[test]
    fn test_join_naming_only_self_does_not_start_match() {
        // Arrange
        let me = player();
        let mut mirror = authenticated(me);

        // Act
        let effects = mirror.apply_operation(&CompetitionOperation {
            player_b: Some(me),
            ..result(Operation::Join, 3141)
        });

        // Assert
        assert_eq!(mirror.id(), CompetitionId(3141));
        assert_eq!(mirror.opponent(), None);
        assert_eq!(mirror.phase(), Phase::Waiting);
        assert!(effects.contains(&Effect::Notify(Notice::Joined(CompetitionId(3141)))));
    }

    #[test]
    fn test_join_with_neither_player_still_adopts_id() {
        let mut mirror = CompetitionMirror::new();

        let effects = mirror.apply_operation(&result(Operation::Join, 9876));

        assert_eq!(mirror.id(), CompetitionId(9876));
        assert_eq!(mirror.phase(), Phase::Waiting);
        assert_eq!(effects[..2], [Effect::ResetBoard, Effect::RequestSync]);
    }

    #[test]
    fn test_only_create_and_join_leave_no_match() {
        for operation in [Operation::Leave, Operation::Put, Operation::Reset] {
            let mut mirror = CompetitionMirror::new();
            mirror.apply_operation(&result(operation, 5555));
            assert_eq!(mirror.id(), CompetitionId::NONE, "{operation:?}");
            assert_eq!(mirror.phase(), Phase::NoMatch, "{operation:?}");
        }
        let mut mirror = CompetitionMirror::new();
        mirror.apply_placement(&Placement {
            x: 1,
            y: 1,
            myself: true,
        });
        mirror.apply_statistics(&Statistics {
            myself: true,
            wins: 1,
            losses: 0,
        });
        assert_eq!(mirror.id(), CompetitionId::NONE);
    }

    // ── Leave ────────────────────────────────────────────────────────────────

    #[test]
    fn test_leave_without_opponent_returns_to_no_match_from_any_phase() {
        let me = player();
        let mut waiting = authenticated(me);
        waiting.apply_operation(&result(Operation::Create, 1234));
        let mut playing = active(me, player(), 1234);

        for mirror in [&mut waiting, &mut playing] {
            mirror.apply_operation(&result(Operation::Leave, 1234));
            assert_eq!(mirror.id(), CompetitionId::NONE);
            assert_eq!(mirror.phase(), Phase::NoMatch);
            assert_eq!(mirror.opponent(), None);
            assert_eq!(mirror.myself(), Some(me));
        }
    }

    #[test]
    fn test_leave_with_opponent_keeps_competition() {
        let me = player();
        let opponent = player();
        let mut mirror = active(me, opponent, 1234);

        let effects = mirror.apply_operation(&CompetitionOperation {
            player_b: Some(opponent),
            ..result(Operation::Leave, 1234)
        });

        assert_eq!(mirror.id(), CompetitionId(1234));
        assert_eq!(effects, vec![Effect::Notify(Notice::Left)]);
    }

    // ── Reset ────────────────────────────────────────────────────────────────

    #[test]
    fn test_reset_keeps_id_and_clears_board_regardless_of_scores() {
        // Arrange
        let mut mirror = active(player(), player(), 4321);
        mirror.apply_statistics(&Statistics {
            myself: true,
            wins: 5,
            losses: 2,
        });
        mirror.apply_placement(&Placement {
            x: 2,
            y: 2,
            myself: false,
        });

        // Act
        let first = mirror.apply_operation(&result(Operation::Reset, 4321));
        let snapshot = mirror.clone();
        let second = mirror.apply_operation(&result(Operation::Reset, 4321));

        // Assert
        assert_eq!(mirror.id(), CompetitionId(4321));
        assert_eq!(mirror.last_put(), None);
        assert_eq!(first, second);
        assert_eq!(mirror, snapshot);
        assert!(first.contains(&Effect::ResetBoard));
        assert!(first.contains(&Effect::RequestStatistics));
    }

    // ── Finish ───────────────────────────────────────────────────────────────

    #[test]
    fn test_finish_classifies_every_outcome() {
        let me = player();
        let opponent = player();
        let mirror = active(me, opponent, 4321);

        assert_eq!(mirror.classify(&me.to_string()), Outcome::SelfWin);
        assert_eq!(mirror.classify(&opponent.to_string()), Outcome::OpponentWin);
        assert_eq!(mirror.classify("N"), Outcome::Draw);
        assert_eq!(mirror.classify(&player().to_string()), Outcome::NoWinner);
        assert_eq!(mirror.classify(""), Outcome::NoWinner);
    }

    #[test]
    fn test_finish_does_not_change_competition_id() {
        let me = player();
        let mirror = active(me, player(), 4321);
        let before = mirror.clone();

        let effects = mirror.apply_finish(&CompetitionFinish {
            winner: me.to_string(),
        });

        assert_eq!(mirror, before);
        assert_eq!(effects, vec![Effect::Notify(Notice::Finished(Outcome::SelfWin))]);
    }

    // ── Placement / statistics ───────────────────────────────────────────────

    #[test]
    fn test_placement_records_last_side() {
        let mut mirror = active(player(), player(), 1000);

        let effects = mirror.apply_placement(&Placement {
            x: 1,
            y: 3,
            myself: false,
        });

        assert_eq!(mirror.last_put(), Some(Side::Opponent));
        assert_eq!(
            effects,
            vec![Effect::PlacePiece {
                side: Side::Opponent,
                x: 1,
                y: 3
            }]
        );
    }

    #[test]
    fn test_opponent_statistics_update_opponent_losses_only() {
        // Arrange
        let mut mirror = CompetitionMirror::new();
        mirror.apply_statistics(&Statistics {
            myself: true,
            wins: 3,
            losses: 1,
        });

        // Act
        mirror.apply_statistics(&Statistics {
            myself: false,
            wins: 4,
            losses: 6,
        });

        // Assert
        assert_eq!(mirror.score(Side::Myself), Score { wins: 3, losses: 1 });
        assert_eq!(mirror.score(Side::Opponent), Score { wins: 4, losses: 6 });
    }

    // ── Disconnect ───────────────────────────────────────────────────────────

    #[test]
    fn test_disconnect_while_active_resets_to_no_match() {
        let me = player();
        let mut mirror = active(me, player(), 4321);

        mirror.apply_disconnect();

        assert_eq!(mirror.id(), CompetitionId::NONE);
        assert_eq!(mirror.phase(), Phase::NoMatch);
        assert_eq!(mirror.opponent(), None);
        assert_eq!(mirror.myself(), Some(me));
    }
}
