//! Player Entity
//!
//! A connected player's grid position, trail and facing status. The player
//! has no behaviour of its own; the engine drives every change.

use std::collections::VecDeque;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::grid::GridPoint;

/// Number of previous cells kept for trail rendering.
pub const POSITION_HISTORY_LEN: usize = 4;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Serialized as the hyphenated UUID string. Implements Ord so the engine's
/// BTreeMap iterates players in a stable order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random id (one per connection).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.short())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uuid_string())
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_uuid_string()
    }
}

impl TryFrom<String> for PlayerId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_uuid_str(&s).ok_or_else(|| format!("invalid player id: {s}"))
    }
}

// =============================================================================
// PLAYER STATUS
// =============================================================================

/// Facing/feedback status shown by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// Moved towards negative x
    Left,
    /// Reserved for renderers; the engine never sets it
    Up,
    /// Reserved for renderers; the engine never sets it
    Down,
    /// Moved towards positive x
    Right,
    /// Last move was blocked
    Hit,
    /// Answered correctly
    Win,
    /// Answered incorrectly
    Lose,
    /// No horizontal movement
    #[default]
    Idle,
}

// =============================================================================
// PLAYER
// =============================================================================

/// A player on the grid.
#[derive(Clone, Debug)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,

    /// Current cell
    pub position: GridPoint,

    /// Previous cells, oldest first
    previous_positions: VecDeque<GridPoint>,

    /// Current status
    pub status: PlayerStatus,

    /// Standing in one of the current question's answer zones?
    pub in_answer: bool,

    /// Opaque laureate/avatar data supplied at join
    pub avatar: serde_json::Value,
}

impl Player {
    /// Create a new player at `position`.
    pub fn new(id: PlayerId, position: GridPoint, avatar: serde_json::Value) -> Self {
        Self {
            id,
            position,
            previous_positions: VecDeque::with_capacity(POSITION_HISTORY_LEN + 1),
            status: PlayerStatus::Idle,
            in_answer: false,
            avatar,
        }
    }

    /// Push the current cell onto the history, evicting the oldest entry
    /// once more than [`POSITION_HISTORY_LEN`] are held.
    pub fn record_position(&mut self) {
        self.previous_positions.push_back(self.position);
        while self.previous_positions.len() > POSITION_HISTORY_LEN {
            self.previous_positions.pop_front();
        }
    }

    /// Drop the oldest history entry, if any.
    pub fn forget_oldest_position(&mut self) -> Option<GridPoint> {
        self.previous_positions.pop_front()
    }

    /// Put the player on `position` with an empty trail, facing idle.
    pub fn relocate(&mut self, position: GridPoint) {
        self.position = position;
        self.previous_positions.clear();
        self.status = PlayerStatus::Idle;
    }

    /// Previous cells, oldest first.
    pub fn previous_positions(&self) -> impl Iterator<Item = &GridPoint> {
        self.previous_positions.iter()
    }

    /// Number of cells in the history.
    pub fn history_len(&self) -> usize {
        self.previous_positions.len()
    }

    /// Set the status.
    #[inline]
    pub fn set_status(&mut self, status: PlayerStatus) {
        self.status = status;
    }

    /// Serializable view broadcast to clients.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            previous_positions: self.previous_positions.iter().copied().collect(),
            status: self.status,
            in_answer: self.in_answer,
            laureate: self.avatar.clone(),
        }
    }
}

/// Player state as sent to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Player identifier
    pub id: PlayerId,
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
    /// Trail, oldest first
    pub previous_positions: Vec<GridPoint>,
    /// Status
    pub status: PlayerStatus,
    /// In an answer zone?
    pub in_answer: bool,
    /// Avatar data as supplied at join
    pub laureate: serde_json::Value,
}

impl PlayerSnapshot {
    /// Current cell.
    pub fn position(&self) -> GridPoint {
        GridPoint::new(self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_id_ordering() {
        let id1 = PlayerId::new([0; 16]);
        let id2 = PlayerId::new([1; 16]);
        let id3 = PlayerId::new([0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        assert!(id1 < id2);
        assert!(id1 < id3);
        assert!(id3 < id2);
    }

    #[test]
    fn test_player_id_string_roundtrip() {
        let id = PlayerId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_uuid_string()));
        assert_eq!(serde_json::from_str::<PlayerId>(&json).unwrap(), id);

        assert!(serde_json::from_str::<PlayerId>("\"not-a-uuid\"").is_err());
    }

    #[test]
    fn test_history_is_fifo_and_bounded() {
        let mut player = Player::new(PlayerId::new([1; 16]), GridPoint::ZERO, json!(null));

        for step in 0..6 {
            player.position = GridPoint::new(step, 0);
            player.record_position();
        }

        let history: Vec<_> = player.previous_positions().copied().collect();
        assert_eq!(history, vec![
            GridPoint::new(2, 0),
            GridPoint::new(3, 0),
            GridPoint::new(4, 0),
            GridPoint::new(5, 0),
        ]);
    }

    #[test]
    fn test_forget_oldest() {
        let mut player = Player::new(PlayerId::new([1; 16]), GridPoint::ZERO, json!(null));
        assert_eq!(player.forget_oldest_position(), None);

        player.record_position();
        player.position = GridPoint::new(1, 1);
        player.record_position();

        assert_eq!(player.forget_oldest_position(), Some(GridPoint::ZERO));
        assert_eq!(player.history_len(), 1);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut player = Player::new(
            PlayerId::new([7; 16]),
            GridPoint::new(3, 4),
            json!({ "name": "Marie Curie" }),
        );
        player.set_status(PlayerStatus::Hit);

        let value = serde_json::to_value(player.snapshot()).unwrap();
        assert_eq!(value["x"], 3);
        assert_eq!(value["y"], 4);
        assert_eq!(value["status"], "hit");
        assert_eq!(value["inAnswer"], false);
        assert_eq!(value["previousPositions"], json!([]));
        assert_eq!(value["laureate"]["name"], "Marie Curie");
    }
}
