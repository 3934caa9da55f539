//! Player and competition identifiers.
//!
//! The server identifies players by UUID (sent on the wire as the canonical
//! hyphenated string) and competitions by a four-digit number chosen by the
//! player who creates the match.  The number `0` is reserved and means
//! "not in a competition".

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Opaque identity of a player, assigned by the server on authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Returns the first eight hex digits, the form shown next to scores.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(PlayerId)
    }
}

impl From<Uuid> for PlayerId {
    fn from(value: Uuid) -> Self {
        PlayerId(value)
    }
}

/// Error returned when a user-typed competition number is not acceptable.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidCompetitionId {
    /// The text is not exactly four ASCII digits.
    #[error("competition number must be exactly four digits, got {0:?}")]
    NotFourDigits(String),

    /// `0000` names the reserved "no competition" value.
    #[error("competition number 0000 is reserved")]
    Reserved,
}

/// Number identifying a single two-player match on the server.
///
/// Carried as a protobuf `int32`, so every value survives a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct CompetitionId(pub i32);

impl CompetitionId {
    /// The reserved "no competition" value.
    pub const NONE: CompetitionId = CompetitionId(0);

    /// Returns `true` for the reserved "no competition" value.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Parses a competition number as typed by a user.
    ///
    /// Exactly four ASCII digits are accepted; leading zeros are allowed
    /// (`"0042"` is competition 42) but `"0000"` is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCompetitionId`] when the text is not four digits or
    /// names the reserved value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ttt_core::CompetitionId;
    ///
    /// assert_eq!(CompetitionId::parse_code("4321").unwrap(), CompetitionId(4321));
    /// assert!(CompetitionId::parse_code("123").is_err());
    /// ```
    pub fn parse_code(text: &str) -> Result<Self, InvalidCompetitionId> {
        if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidCompetitionId::NotFourDigits(text.to_string()));
        }
        let value: i32 = text
            .parse()
            .map_err(|_| InvalidCompetitionId::NotFourDigits(text.to_string()))?;
        if value == 0 {
            return Err(InvalidCompetitionId::Reserved);
        }
        Ok(CompetitionId(value))
    }
}

impl fmt::Display for CompetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
