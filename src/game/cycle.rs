//! Question Cycle
//!
//! Two alternating phases drive the quiz:
//!
//! ```text
//!   Collecting ──(question_interval)──► close_question ──► Reveal
//!   Reveal     ──(answer_duration)────► advance_question ──► Collecting
//! ```
//!
//! The cycle owns no timer. The session sleeps for [`QuestionCycle::remaining`]
//! and calls [`QuestionCycle::fire`] when the deadline passes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::engine::{EngineConfig, EngineError, GameEngine};

/// Current phase of the question cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// Players walk into answer zones.
    Collecting,
    /// Correct answer is shown; the next question is pending.
    Reveal,
}

impl CyclePhase {
    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            CyclePhase::Collecting => CyclePhase::Reveal,
            CyclePhase::Reveal => CyclePhase::Collecting,
        }
    }
}

/// Current phase and when it ends, for client countdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimer {
    /// Phase in progress.
    pub phase: CyclePhase,
    /// Wall-clock end of the phase, Unix milliseconds.
    pub ends_at: u64,
}

impl PhaseTimer {
    /// Timer for `phase` ending `remaining` from now.
    pub fn new(phase: CyclePhase, remaining: Duration) -> Self {
        let ends_at = SystemTime::now()
            .checked_add(remaining)
            .and_then(|end| end.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();

        Self {
            phase,
            ends_at: ends_at.as_millis() as u64,
        }
    }
}

/// Question cycle state machine.
#[derive(Debug, Clone)]
pub struct QuestionCycle {
    phase: CyclePhase,
    question_interval: Duration,
    answer_duration: Duration,
    /// Completed collecting+reveal rounds
    rounds: u64,
}

impl QuestionCycle {
    /// Start in the collecting phase.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            phase: CyclePhase::Collecting,
            question_interval: config.question_interval,
            answer_duration: config.answer_duration,
            rounds: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Completed rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Length of the current phase.
    pub fn remaining(&self) -> Duration {
        match self.phase {
            CyclePhase::Collecting => self.question_interval,
            CyclePhase::Reveal => self.answer_duration,
        }
    }

    /// End the current phase on `engine` and move to the next one.
    ///
    /// Returns the length of the phase just entered. On a failed question
    /// draw the cycle stays in `Reveal` so the next firing retries.
    pub fn fire(&mut self, engine: &mut GameEngine) -> Result<Duration, EngineError> {
        match self.phase {
            CyclePhase::Collecting => {
                engine.close_question();
            }
            CyclePhase::Reveal => {
                engine.advance_question()?;
                self.rounds += 1;
            }
        }

        self.phase = self.phase.next();
        debug!(phase = ?self.phase, rounds = self.rounds, "Cycle phase changed");
        Ok(self.remaining())
    }
}
