// Wire protocol and internal message types.
//
// The authority speaks JSON over two transports: one-shot HTTP calls for
// game actions and a persistent WebSocket channel for server-pushed events.
// Both deliver snapshots with the same field vocabulary. Every snapshot
// carries a `seq` assigned by the authority; the fold step rejects snapshots
// older than the one already applied, so a late push and a late response
// cannot clobber newer state no matter which arrives first.
//
// The second half of this file is the in-process vocabulary: commands into
// the channel task, events out of it, user commands from the TUI, and
// updates pushed back to the TUI.

use serde::{Deserialize, Serialize};

use crate::board::Square;

// ---------------------------------------------------------------------------
// Game status
// ---------------------------------------------------------------------------

/// Authoritative game status. The client never computes this; it only
/// displays what the authority reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate,
    Stalemate,
    Draw,
}

impl GameStatus {
    pub fn label(&self) -> &'static str {
        match self {
            GameStatus::Ongoing => "ongoing",
            GameStatus::Check => "check",
            GameStatus::Checkmate => "checkmate",
            GameStatus::Stalemate => "stalemate",
            GameStatus::Draw => "draw",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

/// The board object embedded in action responses and channel events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardPayload {
    pub fen: String,
    #[serde(default)]
    pub turn: Option<String>,
}

/// Successful response body for the four game actions.
///
/// `move_history` is always present on new-game and undo responses (history
/// resets or shrinks, so the full list is authoritative); move and
/// engine-move responses may omit it and carry only the applied move.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActionSnapshot {
    pub seq: u64,
    pub board: BoardPayload,
    pub game_status: GameStatus,
    #[serde(rename = "move", default)]
    pub applied_move: Option<String>,
    #[serde(default)]
    pub move_history: Option<Vec<String>>,
}

/// Response body of `GET /api/board`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoardSnapshot {
    pub seq: u64,
    pub fen: String,
    #[serde(default)]
    pub turn: Option<String>,
}

/// Response body of `GET /api/game-status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusSnapshot {
    pub seq: u64,
    pub status: GameStatus,
    pub move_history: Vec<String>,
    #[serde(default)]
    pub last_move: Option<String>,
}

/// Error response body (`{"error": "..."}` with a non-2xx status).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Events pushed by the authority over the persistent channel.
///
/// `connected` delivers the complete current state right after the handshake
/// so a reconnecting client resynchronizes without a separate fetch. The
/// other events mirror the corresponding action responses and are also sent
/// when another session mutates the shared game.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        seq: u64,
        board: BoardPayload,
        game_status: GameStatus,
        move_history: Vec<String>,
        #[serde(default)]
        last_move: Option<String>,
    },
    MoveMade {
        seq: u64,
        board: BoardPayload,
        game_status: GameStatus,
        #[serde(rename = "move")]
        san: String,
        #[serde(default)]
        move_history: Option<Vec<String>>,
    },
    EngineMove {
        seq: u64,
        board: BoardPayload,
        game_status: GameStatus,
        #[serde(rename = "move")]
        san: String,
        #[serde(default)]
        move_history: Option<Vec<String>>,
    },
    MoveUndone {
        seq: u64,
        board: BoardPayload,
        game_status: GameStatus,
        move_history: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Channel task interface
// ---------------------------------------------------------------------------

/// Commands into the channel task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCommand {
    /// Open the channel (or retry immediately, resetting the attempt count).
    Connect,
    /// Tear the channel down and stay down until the next `Connect`.
    Disconnect,
    /// Stop the task entirely.
    Shutdown,
}

/// Why the channel went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The user asked for it; auto-retry is suppressed.
    Manual,
    /// The peer closed the connection or the stream ended.
    TransportClosed,
    /// A read error on the live connection.
    TransportError(String),
    /// The connection attempt itself failed.
    ConnectFailed(String),
}

/// Events emitted by the channel task to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A connection attempt is starting. `attempt` is 0 for a fresh connect.
    Connecting { attempt: u32 },
    /// The channel is up.
    Connected,
    /// A server-pushed event arrived.
    Push(ServerEvent),
    /// The channel went down.
    Disconnected { reason: DisconnectReason },
    /// All automatic retries failed; only a manual `Connect` resumes.
    RetriesExhausted,
}

/// Connection state exposed to the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
    /// Retries exhausted; a persistent banner until the user reconnects.
    Lost,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The kinds of dispatcher-managed requests, for busy flags and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Move,
    EngineMove,
    NewGame,
    Undo,
    Sync,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::EngineMove => "engine move",
            ActionKind::NewGame => "new game",
            ActionKind::Undo => "undo",
            ActionKind::Sync => "sync",
        }
    }
}

/// A game-action request as issued by the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRequest {
    Move {
        from: Square,
        to: Square,
        promotion: Option<char>,
    },
    EngineMove {
        difficulty: u8,
    },
    NewGame,
    Undo,
    /// Re-fetch board and game status over the read-only endpoints.
    Sync,
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Move { .. } => ActionKind::Move,
            ActionRequest::EngineMove { .. } => ActionKind::EngineMove,
            ActionRequest::NewGame => ActionKind::NewGame,
            ActionRequest::Undo => ActionKind::Undo,
            ActionRequest::Sync => ActionKind::Sync,
        }
    }
}

// ---------------------------------------------------------------------------
// TUI interface
// ---------------------------------------------------------------------------

/// Commands from the TUI to the app event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Move { from: Square, to: Square },
    EngineMove,
    NewGame,
    Undo,
    Sync,
    SetDifficulty(u8),
    Connect,
    Disconnect,
    Quit,
}

/// Updates pushed from the app event loop to the TUI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// A new shared-state snapshot to render.
    Game(crate::state::GameState),
    Connection(ConnectionStatus),
    /// The dispatcher's busy flag; `Some` while a request is in flight.
    Busy(Option<ActionKind>),
    /// A transient, user-visible message (rejected action, failed request).
    Notice(String),
    Difficulty(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_snapshot_deserializes_with_optional_fields() {
        let body = r#"{
            "seq": 7,
            "board": { "fen": "8/8/8/8/8/8/8/8", "turn": "black" },
            "game_status": "check",
            "move": "e4"
        }"#;
        let snap: ActionSnapshot = serde_json::from_str(body).unwrap();
        assert_eq!(snap.seq, 7);
        assert_eq!(snap.game_status, GameStatus::Check);
        assert_eq!(snap.applied_move.as_deref(), Some("e4"));
        assert_eq!(snap.move_history, None);
        assert_eq!(snap.board.turn.as_deref(), Some("black"));
    }

    #[test]
    fn server_event_move_made_parses() {
        let json = r#"{
            "type": "move_made",
            "seq": 3,
            "board": { "fen": "8/8/8/8/8/8/8/8" },
            "game_status": "ongoing",
            "move": "Nf3"
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::MoveMade { seq, san, move_history, .. } => {
                assert_eq!(seq, 3);
                assert_eq!(san, "Nf3");
                assert_eq!(move_history, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_event_connected_parses_full_state() {
        let json = r#"{
            "type": "connected",
            "seq": 12,
            "board": { "fen": "8/8/8/8/8/8/8/8" },
            "game_status": "stalemate",
            "move_history": ["e4", "e5"],
            "last_move": "e5"
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Connected { seq, game_status, move_history, last_move, .. } => {
                assert_eq!(seq, 12);
                assert_eq!(game_status, GameStatus::Stalemate);
                assert_eq!(move_history, vec!["e4".to_string(), "e5".to_string()]);
                assert_eq!(last_move.as_deref(), Some("e5"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_fails_to_parse() {
        let json = r#"{ "type": "player_waved", "seq": 1 }"#;
        assert!(serde_json::from_str::<ServerEvent>(json).is_err());
    }

    #[test]
    fn game_status_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::from_str::<GameStatus>("\"checkmate\"").unwrap(),
            GameStatus::Checkmate
        );
        assert_eq!(serde_json::to_string(&GameStatus::Ongoing).unwrap(), "\"ongoing\"");
    }
}
