//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Control messages are JSON; moves may also arrive as a flat bincode
//! [`MoveInput`] in a binary frame.

use serde::{Serialize, Deserialize};

use crate::core::grid::GridPoint;
use crate::game::cycle::PhaseTimer;
use crate::game::engine::GameSnapshot;
use crate::game::events::EngineEvent;
use crate::game::player::PlayerId;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the grid with the chosen avatar.
    Join {
        /// Laureate/avatar data, opaque to the server.
        #[serde(default)]
        avatar: serde_json::Value,
    },

    /// Step by a grid delta.
    Move {
        /// Column delta.
        dx: i32,
        /// Row delta.
        dy: i32,
    },

    /// Leave the grid but keep the connection.
    Leave,

    /// Show an emoji over the player's avatar.
    Emote {
        /// Emoji to show, at most [`MAX_EMOJI_CHARS`] characters.
        emoji: String,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client clock, echoed back.
        timestamp: u64,
    },
}

/// Longest accepted emote, in characters.
pub const MAX_EMOJI_CHARS: usize = 16;

/// Compact move for binary frames.
///
/// Tagged enums don't survive bincode, so binary frames carry only this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Column delta.
    pub dx: i8,
    /// Row delta.
    pub dy: i8,
}

impl MoveInput {
    /// Create a move.
    pub fn new(dx: i8, dy: i8) -> Self {
        Self { dx, dy }
    }

    /// Grid delta.
    pub fn to_delta(self) -> GridPoint {
        GridPoint::new(self.dx as i32, self.dy as i32)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

impl From<MoveInput> for ClientMessage {
    fn from(input: MoveInput) -> Self {
        let delta = input.to_delta();
        ClientMessage::Move { dx: delta.x, dy: delta.y }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a join: the assigned id and the full game state.
    Welcome {
        /// Id of the joined player.
        player_id: PlayerId,
        /// Game state right after the join.
        snapshot: GameSnapshot,
        /// Avatar catalogue.
        laureates: Vec<serde_json::Value>,
        /// Phase in progress and its end.
        timer: PhaseTimer,
    },

    /// Engine event, relayed verbatim.
    Event(EngineEvent),

    /// The question cycle entered a new phase.
    Phase(PhaseTimer),

    /// A player's emote, relayed to every connection.
    Emote {
        /// Player who sent it.
        player_id: PlayerId,
        /// The emoji.
        emoji: String,
    },

    /// Pong response.
    Pong {
        /// Client timestamp from the ping.
        timestamp: u64,
        /// Server clock, Unix milliseconds.
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why the connection is ending.
        reason: String,
    },
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Create an error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidInput,
    /// Command needs a joined player.
    NotJoined,
    /// Join sent twice.
    AlreadyJoined,
    /// Player cap reached.
    SessionFull,
    /// No free cell on the grid.
    NoFreeCell,
    /// Internal error.
    InternalError,
}

/// Wall-clock milliseconds for pong replies.
pub fn server_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cycle::CyclePhase;
    use crate::game::question::Answer;
    use serde_json::json;

    #[test]
    fn test_client_message_parsing() {
        let join = ClientMessage::from_json(r#"{"type":"join","avatar":{"name":"Curie"}}"#).unwrap();
        assert_eq!(join, ClientMessage::Join { avatar: json!({ "name": "Curie" }) });

        let bare = ClientMessage::from_json(r#"{"type":"join"}"#).unwrap();
        assert_eq!(bare, ClientMessage::Join { avatar: serde_json::Value::Null });

        let mv = ClientMessage::from_json(r#"{"type":"move","dx":-1,"dy":0}"#).unwrap();
        assert_eq!(mv, ClientMessage::Move { dx: -1, dy: 0 });

        assert_eq!(ClientMessage::from_json(r#"{"type":"leave"}"#).unwrap(), ClientMessage::Leave);
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn test_event_message_carries_both_tags() {
        let msg = ServerMessage::Event(EngineEvent::Answer { answer: Answer::new("42", true) });

        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"], "answer");
        assert_eq!(value["answer"]["isCorrect"], true);

        assert_eq!(ServerMessage::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_emote_and_phase_shapes() {
        let emote = ClientMessage::from_json(r#"{"type":"emote","emoji":"🎉"}"#).unwrap();
        assert_eq!(emote, ClientMessage::Emote { emoji: "🎉".into() });

        let timer = PhaseTimer { phase: CyclePhase::Collecting, ends_at: 1_000 };
        let value: serde_json::Value =
            serde_json::from_str(&ServerMessage::Phase(timer).to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "type": "phase", "phase": "collecting", "endsAt": 1_000 }));
    }

    #[test]
    fn test_error_message_shape() {
        let msg = ServerMessage::Error(ServerError::new(ErrorCode::SessionFull, "full"));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "type": "error", "code": "session_full", "message": "full" }));
    }

    #[test]
    fn test_binary_move_input() {
        // Binary serialization only works for flat structs; tagged enums stay JSON
        let bytes = MoveInput::new(1, -1).to_bytes().unwrap();
        assert_eq!(bytes.len(), 2);

        let parsed = MoveInput::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.to_delta(), GridPoint::new(1, -1));
        assert_eq!(ClientMessage::from(parsed), ClientMessage::Move { dx: 1, dy: -1 });
        assert!(MoveInput::from_bytes(&[1]).is_err());
    }
}
