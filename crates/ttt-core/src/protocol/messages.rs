//! All TTT-Online protocol message types.
//!
//! The server speaks protobuf.  Every frame carries either a `Request`
//! (client → server) or a `Response` (server → client).  Both wrap their
//! payload in an [`Envelope`] (protobuf `Any`): a type URL naming the message
//! kind plus the encoded bytes of that message.

use crate::domain::ids::{CompetitionId, PlayerId};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Prefix of every type URL produced by the client.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Fully-qualified protobuf package of the game messages.
pub const PROTO_PACKAGE: &str = "top.gardel.chess.proto";

/// Marker the server puts in [`CompetitionFinish::winner`] for a draw.
pub const DRAW_MARKER: &str = "N";

// ── Message kinds ─────────────────────────────────────────────────────────────

/// Every message kind that can travel inside an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    AuthInfo,
    CompetitionOperation,
    CompetitionFinish,
    PiecePlaced,
    Statistics,
    Sync,
    GetStatistics,
}

impl MessageKind {
    /// All kinds, in declaration order.
    pub const ALL: [MessageKind; 7] = [
        MessageKind::AuthInfo,
        MessageKind::CompetitionOperation,
        MessageKind::CompetitionFinish,
        MessageKind::PiecePlaced,
        MessageKind::Statistics,
        MessageKind::Sync,
        MessageKind::GetStatistics,
    ];

    /// Unqualified protobuf message name.
    pub fn proto_name(self) -> &'static str {
        match self {
            MessageKind::AuthInfo => "AuthInfo",
            MessageKind::CompetitionOperation => "CompetitionOperation",
            MessageKind::CompetitionFinish => "CompetitionFinish",
            MessageKind::PiecePlaced => "PutChess",
            MessageKind::Statistics => "Statistics",
            MessageKind::Sync => "Sync",
            MessageKind::GetStatistics => "GetStatistics",
        }
    }

    /// Full type URL, e.g. `type.googleapis.com/top.gardel.chess.proto.Sync`.
    pub fn type_url(self) -> String {
        format!("{TYPE_URL_PREFIX}{PROTO_PACKAGE}.{}", self.proto_name())
    }

    /// Resolves a type URL to a kind.
    ///
    /// Only the part after the last `/` is significant.  URLs without a `/`
    /// and unknown names resolve to `None` (the message is unroutable).
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        let (_, type_name) = type_url.rsplit_once('/')?;
        let proto_name = type_name
            .strip_prefix(PROTO_PACKAGE)
            .and_then(|rest| rest.strip_prefix('.'))?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.proto_name() == proto_name)
    }
}

// ── Envelope / top-level messages ─────────────────────────────────────────────

/// Self-describing wrapper: a type URL plus the encoded message bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub type_url: String,
    pub value: Vec<u8>,
}

/// Client → server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub body: Envelope,
}

/// Server → client message: an error string or a body, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Error(String),
    Body(Envelope),
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// AuthInfo: sent empty as the authentication request; the server answers
/// with the UUID it assigned to this connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthInfo {
    pub player_id: Option<PlayerId>,
}

/// The operation carried by a [`CompetitionOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Operation {
    #[default]
    Create = 0,
    Join = 1,
    Leave = 2,
    Put = 3,
    Reset = 4,
}

impl TryFrom<i32> for Operation {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Create),
            1 => Ok(Operation::Join),
            2 => Ok(Operation::Leave),
            3 => Ok(Operation::Put),
            4 => Ok(Operation::Reset),
            _ => Err(()),
        }
    }
}

/// A piece placement.  Used as the position of a `Put` request and as the
/// server's "a piece was placed" event (`myself` tells whose piece it was).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    /// 1-based column.
    pub x: i32,
    /// 1-based row.
    pub y: i32,
    /// `true` when the piece belongs to the receiving player.
    pub myself: bool,
}

/// CompetitionOperation: a request when sent by the client, a result when
/// sent by the server (which then fills in the players it knows about).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompetitionOperation {
    pub id: CompetitionId,
    pub operation: Operation,
    /// Only meaningful for [`Operation::Put`].
    pub pos: Option<Placement>,
    pub player_a: Option<PlayerId>,
    pub player_b: Option<PlayerId>,
}

/// CompetitionFinish: the match ended.  `winner` is a player UUID or
/// [`DRAW_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompetitionFinish {
    pub winner: String,
}

/// Statistics: win/loss totals for one side of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statistics {
    pub myself: bool,
    pub wins: i32,
    pub losses: i32,
}

/// GetStatistics: asks the server to push [`Statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetStatistics {
    pub myself: bool,
}

/// Sync request: asks the server to replay the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncRequest;

// ── Typed message ─────────────────────────────────────────────────────────────

/// Any message that can be packed into an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMessage {
    AuthInfo(AuthInfo),
    CompetitionOperation(CompetitionOperation),
    CompetitionFinish(CompetitionFinish),
    PiecePlaced(Placement),
    Statistics(Statistics),
    Sync(SyncRequest),
    GetStatistics(GetStatistics),
}

impl GameMessage {
    /// Returns the kind used to route this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            GameMessage::AuthInfo(_) => MessageKind::AuthInfo,
            GameMessage::CompetitionOperation(_) => MessageKind::CompetitionOperation,
            GameMessage::CompetitionFinish(_) => MessageKind::CompetitionFinish,
            GameMessage::PiecePlaced(_) => MessageKind::PiecePlaced,
            GameMessage::Statistics(_) => MessageKind::Statistics,
            GameMessage::Sync(_) => MessageKind::Sync,
            GameMessage::GetStatistics(_) => MessageKind::GetStatistics,
        }
    }
}

/// A concrete payload type that corresponds to exactly one [`MessageKind`].
///
/// Lets handlers be registered per Rust type instead of per kind value.
pub trait KindedMessage: Sized {
    /// The kind this type is carried as.
    const KIND: MessageKind;

    /// Extracts the payload when `message` is of this kind.
    fn from_message(message: GameMessage) -> Option<Self>;
}

macro_rules! kinded {
    ($ty:ty, $variant:ident) => {
        impl KindedMessage for $ty {
            const KIND: MessageKind = MessageKind::$variant;

            fn from_message(message: GameMessage) -> Option<Self> {
                match message {
                    GameMessage::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for GameMessage {
            fn from(value: $ty) -> Self {
                GameMessage::$variant(value)
            }
        }
    };
}

kinded!(AuthInfo, AuthInfo);
kinded!(CompetitionOperation, CompetitionOperation);
kinded!(CompetitionFinish, CompetitionFinish);
kinded!(Placement, PiecePlaced);
kinded!(Statistics, Statistics);
kinded!(SyncRequest, Sync);
kinded!(GetStatistics, GetStatistics);

// ── Tests ─────────────────────────────────────────────────────────────────────
