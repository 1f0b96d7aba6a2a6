//! Game Logic Module
//!
//! The trivia grid itself. No I/O and no clocks; the session drives it.
//!
//! ## Module Structure
//!
//! - `engine`: Authoritative state, joins, moves, question steps
//! - `cycle`: Collecting/reveal phase state machine
//! - `player`: Player entity, ids, trail
//! - `question`: Questions, answers, pool validation
//! - `layout`: Grid geometry (question zone, answer zones, walls)
//! - `collision`: Cell hit tests
//! - `events`: Outbound engine events

pub mod engine;
pub mod cycle;
pub mod player;
pub mod question;
pub mod layout;
pub mod collision;
pub mod events;

// Re-export key types
pub use engine::{GameEngine, EngineConfig, EngineError, GameSnapshot, MoveOutcome};
pub use cycle::{QuestionCycle, CyclePhase, PhaseTimer};
pub use player::{Player, PlayerId, PlayerSnapshot, PlayerStatus, POSITION_HISTORY_LEN};
pub use question::{Answer, Question};
pub use layout::Layout;
pub use events::EngineEvent;
