//! Message types for the bingo relay's wire format.
//!
//! Every frame is a JSON object with a `type` discriminator in snake_case;
//! field names are camelCase, which is what the browser client sends.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bingo_relay_transport::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque, caller-supplied player identifier.
///
/// The server never mints these; clients generate them and the relay
/// assumes they are unique for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Human-shareable room key, chosen by the client that creates the room.
///
/// Matching is exact; the server does not normalize case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Milliseconds since the Unix epoch, used for every `...At` field.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Room-level value types
// ---------------------------------------------------------------------------

/// How many completed lines (rows, columns, diagonals) make a win.
///
/// Only the client checks cards; the server stores the criterion so that
/// late joiners learn it from `room_joined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinningCriteria {
    /// One line.
    #[default]
    Standard,
    /// N + 1 lines.
    Multiple,
    /// Every row, column and both diagonals: 2N + 2 lines.
    AllLines,
}

impl WinningCriteria {
    /// Number of completed lines needed on an `n`×`n` card.
    pub fn required_lines(self, n: usize) -> usize {
        match self {
            Self::Standard => 1,
            Self::Multiple => n + 1,
            Self::AllLines => 2 * n + 2,
        }
    }
}

/// A room member as the clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    /// Display name, unique within its room.
    pub name: String,
    pub is_host: bool,
    /// Join time (ms since epoch). Informational only.
    pub joined_at: u64,
    /// The player's card, row-major. Never broadcast to other members.
    #[serde(skip)]
    pub bingo_card: Vec<u32>,
}

/// Immutable room settings echoed to a joining client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub matrix_size: usize,
    pub winning_criteria: WinningCriteria,
    /// Per-turn limit in whole seconds.
    pub turn_time_limit: u64,
    pub created_at: u64,
}

/// Why a turn was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The turn timer ran out.
    Timeout,
    /// The caller passed with `skip_turn`.
    Manual,
}

/// Why the current caller changed outside the normal call rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerChangeReason {
    /// The caller left or disconnected mid-turn.
    PlayerLeft,
}

/// Machine-readable error category carried by every `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RoomNotFound,
    DuplicateRoom,
    DuplicateName,
    NumberAlreadyCalled,
    BadRequest,
    UnknownMessageType,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client may send.
///
/// `type` selects the variant. Client-computed game state
/// (`calledNumbers`, `availableNumbers`, `nextCaller`) must be present and
/// well-typed, but the server keeps its own copy authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        room_code: RoomCode,
        player_name: String,
        player_id: PlayerId,
        matrix_size: usize,
        bingo_card: Vec<u32>,
        winning_criteria: WinningCriteria,
        /// Seconds per turn. Missing means the server default.
        #[serde(default)]
        turn_time_limit: Option<u64>,
    },

    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: RoomCode,
        player_name: String,
        player_id: PlayerId,
        /// Missing means the server deals a card.
        #[serde(default)]
        bingo_card: Option<Vec<u32>>,
    },

    #[serde(rename_all = "camelCase")]
    StartGame {
        room_code: RoomCode,
        available_numbers: Vec<u32>,
        current_caller: PlayerId,
    },

    #[serde(rename_all = "camelCase")]
    CallNumber {
        room_code: RoomCode,
        number: u32,
        called_numbers: Vec<u32>,
        available_numbers: Vec<u32>,
        next_caller: PlayerId,
    },

    #[serde(rename_all = "camelCase")]
    SkipTurn {
        room_code: RoomCode,
        next_caller: PlayerId,
    },

    #[serde(rename_all = "camelCase")]
    ClaimBingo {
        room_code: RoomCode,
        /// Display text, e.g. `"Alice (Diagonal (\\))"`.
        winner: String,
        player_id: PlayerId,
        winning_pattern: String,
        completed_lines: u32,
    },

    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        room_code: RoomCode,
        player_id: PlayerId,
    },

    Ping,
}

impl ClientMessage {
    /// Every `type` tag a client may send.
    pub const TYPES: &'static [&'static str] = &[
        "create_room",
        "join_room",
        "start_game",
        "call_number",
        "skip_turn",
        "claim_bingo",
        "leave_room",
        "ping",
    ];

    /// The wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::StartGame { .. } => "start_game",
            Self::CallNumber { .. } => "call_number",
            Self::SkipTurn { .. } => "skip_turn",
            Self::ClaimBingo { .. } => "claim_bingo",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Ping => "ping",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent once per connection.
    Connected { message: String },

    /// Unicast to a creator or joiner with the full room snapshot.
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_code: RoomCode,
        players: Vec<Player>,
        game_started: bool,
        current_caller: Option<PlayerId>,
        called_numbers: Vec<u32>,
        available_numbers: Vec<u32>,
        bingo_card: Vec<u32>,
        room_info: RoomInfo,
    },

    /// To everyone in the room except the joiner.
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        players: Vec<Player>,
        new_player: Player,
    },

    /// To the remaining members.
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        players: Vec<Player>,
        new_host: Option<PlayerId>,
        left_player: Player,
    },

    #[serde(rename_all = "camelCase")]
    GameStarted {
        current_caller: PlayerId,
        available_numbers: Vec<u32>,
        game_started_at: u64,
    },

    #[serde(rename_all = "camelCase")]
    NumberCalled {
        number: u32,
        called_by: PlayerId,
        called_numbers: Vec<u32>,
        available_numbers: Vec<u32>,
        next_caller: PlayerId,
        called_at: u64,
    },

    #[serde(rename_all = "camelCase")]
    TurnSkipped {
        skipped: PlayerId,
        next_caller: PlayerId,
        reason: SkipReason,
        skipped_at: u64,
    },

    #[serde(rename_all = "camelCase")]
    GameWon {
        winner: String,
        player_id: PlayerId,
        winning_pattern: String,
        completed_lines: u32,
        won_at: u64,
    },

    #[serde(rename_all = "camelCase")]
    CallerChanged {
        previous_caller: PlayerId,
        current_caller: PlayerId,
        reason: CallerChangeReason,
    },

    /// Sent only to the connection whose request failed.
    Error { code: ErrorCode, message: String },

    Pong,
}

impl ServerMessage {
    /// The wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::RoomJoined { .. } => "room_joined",
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::GameStarted { .. } => "game_started",
            Self::NumberCalled { .. } => "number_called",
            Self::TurnSkipped { .. } => "turn_skipped",
            Self::GameWon { .. } => "game_won",
            Self::CallerChanged { .. } => "caller_changed",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a server message?
// ---------------------------------------------------------------------------

/// Where an outbound message goes. Not serialized; routing only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// One connection, registered to a room or not.
    Connection(ConnectionId),
    /// Every member currently registered for the room.
    Room(RoomCode),
    /// Every registered member except one player.
    RoomExcept(RoomCode, PlayerId),
}
