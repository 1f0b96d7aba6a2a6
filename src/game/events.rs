//! Engine Events
//!
//! Every state change the engine makes is announced as one of these. The
//! transport relays them to clients verbatim.

use serde::{Serialize, Deserialize};

use crate::game::layout::Layout;
use crate::game::player::{PlayerId, PlayerSnapshot};
use crate::game::question::{Answer, Question};

/// Outbound engine event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A player joined and was placed on the grid.
    NewPlayer {
        /// The new player.
        player: PlayerSnapshot,
    },

    /// A player left.
    PlayerLeave {
        /// Player that left.
        id: PlayerId,
    },

    /// A player moved, or bumped into something (status `hit`).
    PlayerMove {
        /// Player after the move.
        player: PlayerSnapshot,
    },

    /// A player stepped into an answer zone.
    EnterAnswer {
        /// Answer of the zone entered.
        answer: Answer,
        /// Player after the move.
        player: PlayerSnapshot,
    },

    /// A player stepped out of an answer zone.
    ExitAnswer {
        /// Always `null`; the player is outside every zone.
        answer: Option<Answer>,
        /// Player after the move.
        player: PlayerSnapshot,
    },

    /// A player's choice was locked in when the question closed.
    UserAnswer {
        /// Answer the player stood on.
        answer: Answer,
        /// Player who answered.
        player: PlayerSnapshot,
    },

    /// The correct answer of the question that just closed.
    Answer {
        /// The correct answer.
        answer: Answer,
    },

    /// The current question changed.
    NewQuestion {
        /// The new question.
        question: Question,
    },

    /// The layout changed.
    State {
        /// The new layout.
        layout: Layout,
    },
}

impl EngineEvent {
    /// Event name as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::NewPlayer { .. } => "newPlayer",
            EngineEvent::PlayerLeave { .. } => "playerLeave",
            EngineEvent::PlayerMove { .. } => "playerMove",
            EngineEvent::EnterAnswer { .. } => "enterAnswer",
            EngineEvent::ExitAnswer { .. } => "exitAnswer",
            EngineEvent::UserAnswer { .. } => "userAnswer",
            EngineEvent::Answer { .. } => "answer",
            EngineEvent::NewQuestion { .. } => "newQuestion",
            EngineEvent::State { .. } => "state",
        }
    }

    /// Player the event concerns, if any.
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            EngineEvent::NewPlayer { player }
            | EngineEvent::PlayerMove { player }
            | EngineEvent::EnterAnswer { player, .. }
            | EngineEvent::ExitAnswer { player, .. }
            | EngineEvent::UserAnswer { player, .. } => Some(player.id),
            EngineEvent::PlayerLeave { id } => Some(*id),
            EngineEvent::Answer { .. }
            | EngineEvent::NewQuestion { .. }
            | EngineEvent::State { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_tag_matches_kind() {
        let events = vec![
            EngineEvent::PlayerLeave { id: PlayerId::new([1; 16]) },
            EngineEvent::Answer { answer: Answer::new("42", true) },
            EngineEvent::NewQuestion {
                question: Question::new("Why?", vec![Answer::new("because", true)]),
            },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.kind());
        }
    }

    #[test]
    fn test_player_leave_payload() {
        let id = PlayerId::new([9; 16]);
        let value = serde_json::to_value(EngineEvent::PlayerLeave { id }).unwrap();
        assert_eq!(value, json!({ "event": "playerLeave", "id": id.to_uuid_string() }));
    }

    #[test]
    fn test_player_id_extraction() {
        let id = PlayerId::new([3; 16]);
        assert_eq!(EngineEvent::PlayerLeave { id }.player_id(), Some(id));
        assert_eq!(
            EngineEvent::Answer { answer: Answer::new("x", true) }.player_id(),
            None
        );
    }
}
