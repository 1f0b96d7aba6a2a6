//! Game Engine
//!
//! Authoritative state of one trivia session: the layout, the current
//! question and every connected player. All mutation goes through here and
//! every change queues an [`EngineEvent`], drained by the session with
//! [`GameEngine::take_events`].
//!
//! The engine is single-writer. It holds no locks and never blocks; the
//! session actor serializes calls into it.

use std::collections::BTreeMap;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::core::grid::GridPoint;
use crate::core::rng::DeterministicRng;
use crate::game::collision::collides;
use crate::game::events::EngineEvent;
use crate::game::layout::Layout;
use crate::game::player::{Player, PlayerId, PlayerSnapshot, PlayerStatus};
use crate::game::question::{validate_pool, Answer, Question};

// =============================================================================
// ERRORS & CONFIG
// =============================================================================

/// Engine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No question to start the session with.
    #[error("Question pool is empty")]
    EmptyQuestionPool,

    /// A question's answers don't line up with the answer zones.
    #[error("Question {question:?} has {answers} answers but the layout has {zones} answer zones")]
    AnswerZoneMismatch {
        /// Offending question text.
        question: String,
        /// Answers on the question.
        answers: usize,
        /// Answer zones on the layout.
        zones: usize,
    },

    /// A question doesn't have exactly one correct answer.
    #[error("Question {question:?} has {correct} correct answers, expected exactly one")]
    InvalidCorrectAnswerCount {
        /// Offending question text.
        question: String,
        /// Answers marked correct.
        correct: usize,
    },

    /// Grid has no cells.
    #[error("Invalid grid size {width}x{height}")]
    InvalidGrid {
        /// Grid width.
        width: i32,
        /// Grid height.
        height: i32,
    },

    /// Cycle durations are unusable.
    #[error("Invalid cycle timing: {0}")]
    InvalidTiming(String),

    /// Spawn sampling found no free cell.
    #[error("No free cell found after {attempts} attempts")]
    PlacementExhausted {
        /// Cells sampled.
        attempts: u32,
    },

    /// Question sampling kept drawing the current question.
    #[error("No different question drawn after {attempts} attempts")]
    QuestionDrawExhausted {
        /// Questions sampled.
        attempts: u32,
    },

    /// Join with an id that is already on the grid.
    #[error("Player {0} already joined")]
    PlayerAlreadyJoined(PlayerId),
}

impl EngineError {
    /// Errors that mean the session data itself is unusable.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::EmptyQuestionPool
                | EngineError::AnswerZoneMismatch { .. }
                | EngineError::InvalidCorrectAnswerCount { .. }
                | EngineError::InvalidGrid { .. }
                | EngineError::InvalidTiming(_)
        )
    }
}

/// Engine timing and sampling limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Length of the collecting phase (`QUESTION_INTERVAL`).
    pub question_interval: Duration,
    /// Length of the reveal phase (`ANSWER_DURATION`).
    pub answer_duration: Duration,
    /// Cells sampled before a join fails.
    pub spawn_attempts: u32,
    /// Questions sampled before a draw fails.
    pub question_draw_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            question_interval: Duration::from_secs(10),
            answer_duration: Duration::from_secs(5),
            spawn_attempts: 10_000,
            question_draw_attempts: 1_000,
        }
    }
}

impl EngineConfig {
    /// Load from environment, falling back to defaults for unset values.
    ///
    /// `QUESTION_INTERVAL` and `ANSWER_DURATION` are in seconds and may be
    /// fractional.
    pub fn from_env() -> Result<Self, EngineError> {
        let defaults = Self::default();
        let config = Self {
            question_interval: env_seconds("QUESTION_INTERVAL")?
                .unwrap_or(defaults.question_interval),
            answer_duration: env_seconds("ANSWER_DURATION")?
                .unwrap_or(defaults.answer_duration),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Both phases must last at least [`MIN_PHASE`].
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.question_interval < MIN_PHASE {
            return Err(EngineError::InvalidTiming(format!(
                "QUESTION_INTERVAL must be at least {MIN_PHASE:?}"
            )));
        }
        if self.answer_duration < MIN_PHASE {
            return Err(EngineError::InvalidTiming(format!(
                "ANSWER_DURATION must be at least {MIN_PHASE:?}"
            )));
        }
        Ok(())
    }
}

/// Shortest accepted phase.
pub const MIN_PHASE: Duration = Duration::from_millis(100);

/// Longest accepted phase, one day.
const MAX_PHASE_SECS: f64 = 86_400.0;

fn env_seconds(key: &str) -> Result<Option<Duration>, EngineError> {
    let raw = match std::env::var(key) {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };

    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && (MIN_PHASE.as_secs_f64()..=MAX_PHASE_SECS).contains(secs))
        .map(|secs| Some(Duration::from_secs_f64(secs)))
        .ok_or_else(|| EngineError::InvalidTiming(format!("{key}={raw:?} is not a number of seconds")))
}

// =============================================================================
// RESULTS
// =============================================================================

/// Result of a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The player now stands on `to`.
    Moved {
        /// Cell before the move.
        from: GridPoint,
        /// Cell after the move.
        to: GridPoint,
    },
    /// The target cell was rejected; the player stays on `at`.
    Blocked {
        /// Unchanged cell.
        at: GridPoint,
        /// Rejected target.
        target: GridPoint,
    },
}

/// Full engine state as sent to a newly connected client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// All players, in id order.
    pub players: Vec<PlayerSnapshot>,
    /// Current question.
    pub question: Question,
    /// Current layout.
    pub layout: Layout,
}

// =============================================================================
// ENGINE
// =============================================================================

/// The authoritative game engine for one session.
#[derive(Debug)]
pub struct GameEngine {
    config: EngineConfig,
    questions: Vec<Question>,
    current_question: Question,
    layout: Layout,
    /// BTreeMap so event order across players is stable
    players: BTreeMap<PlayerId, Player>,
    rng: DeterministicRng,
    pending_events: Vec<EngineEvent>,
}

impl GameEngine {
    /// Validate the session data and pick the first question.
    ///
    /// Fails on an empty pool, a grid without cells, or any question whose
    /// answers don't line up with the layout's answer zones.
    pub fn init(
        questions: Vec<Question>,
        layout: Layout,
        config: EngineConfig,
        seed: u64,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        layout.validate()?;
        validate_pool(&questions, layout.answer_zones.len())?;

        let mut rng = DeterministicRng::new(seed);
        let current_question = rng
            .choose(&questions)
            .cloned()
            .ok_or(EngineError::EmptyQuestionPool)?;

        info!(
            questions = questions.len(),
            width = layout.width,
            height = layout.height,
            "Engine initialized with question {:?}",
            current_question.text
        );

        Ok(Self {
            config,
            questions,
            current_question,
            layout,
            players: BTreeMap::new(),
            rng,
            pending_events: Vec::new(),
        })
    }

    // -------------------------------------------------------------------------
    // Questions
    // -------------------------------------------------------------------------

    /// Draw a question uniformly, rejecting ones whose text matches the
    /// current question.
    ///
    /// When no question in the pool has a different text the repeat check is
    /// skipped, so a single-question pool keeps cycling that question.
    pub fn choose_question_randomly(&mut self) -> Result<Question, EngineError> {
        let current = self.current_question.text.as_str();

        if !self.questions.iter().any(|q| q.text != current) {
            let idx = self.rng.next_index(self.questions.len());
            return self
                .questions
                .get(idx)
                .cloned()
                .ok_or(EngineError::EmptyQuestionPool);
        }

        for _ in 0..self.config.question_draw_attempts {
            let idx = self.rng.next_index(self.questions.len());
            if let Some(candidate) = self.questions.get(idx) {
                if candidate.text != current {
                    return Ok(candidate.clone());
                }
            }
        }

        Err(EngineError::QuestionDrawExhausted {
            attempts: self.config.question_draw_attempts,
        })
    }

    /// Replace the current question. Always emits `newQuestion`.
    pub fn set_current_question(&mut self, question: Question) {
        if question.answers.len() != self.layout.answer_zones.len() {
            warn!(
                "Question {:?} has {} answers for {} answer zones",
                question.text,
                question.answers.len(),
                self.layout.answer_zones.len()
            );
        }
        self.current_question = question.clone();
        self.push_event(EngineEvent::NewQuestion { question });
    }

    /// Replace the layout. Emits `state`, then `playerMove` for every
    /// player that had to be moved.
    ///
    /// The new layout must have one answer zone per answer slot of every
    /// question in the pool. Players left out of bounds, on a wall or on the
    /// question zone are moved to a free cell with an empty trail. If any of
    /// them can't be placed the old layout stays and nothing is emitted.
    pub fn set_layout(&mut self, layout: Layout) -> Result<(), EngineError> {
        layout.validate()?;
        validate_pool(&self.questions, layout.answer_zones.len())?;

        let previous = std::mem::replace(&mut self.layout, layout);
        let relocations = match self.plan_relocations() {
            Ok(relocations) => relocations,
            Err(err) => {
                self.layout = previous;
                return Err(err);
            }
        };

        for (id, cell) in &relocations {
            if let Some(player) = self.players.get_mut(id) {
                player.relocate(*cell);
            }
        }
        for player in self.players.values_mut() {
            player.in_answer =
                answer_for(&self.layout, &self.current_question, player.position).is_some();
        }

        info!(
            width = self.layout.width,
            height = self.layout.height,
            relocated = relocations.len(),
            "Layout replaced"
        );
        let layout = self.layout.clone();
        self.push_event(EngineEvent::State { layout });
        for (id, _) in relocations {
            if let Some(player) = self.players.get(&id) {
                let player = player.snapshot();
                self.push_event(EngineEvent::PlayerMove { player });
            }
        }
        Ok(())
    }

    /// New cells for every player standing on an invalid cell of the
    /// current layout, in id order.
    fn plan_relocations(&mut self) -> Result<Vec<(PlayerId, GridPoint)>, EngineError> {
        let stranded: Vec<PlayerId> = self
            .players
            .values()
            .filter(|player| !self.is_valid_position(player.position, Some(&player.id)))
            .map(|player| player.id)
            .collect();

        let mut claimed = Vec::with_capacity(stranded.len());
        let mut relocations = Vec::with_capacity(stranded.len());
        for id in stranded {
            let cell = self.find_free_cell(&id, &claimed)?;
            claimed.push(cell);
            relocations.push((id, cell));
        }
        Ok(relocations)
    }

    /// End of the collecting phase.
    ///
    /// Emits `userAnswer` for every player standing in an answer zone, then
    /// `answer` with the correct answer of the closing question. Returns the
    /// number of players whose answer was recorded.
    pub fn close_question(&mut self) -> usize {
        let mut events = Vec::new();

        for player in self.players.values() {
            if let Some(answer) = answer_for(&self.layout, &self.current_question, player.position) {
                events.push(EngineEvent::UserAnswer {
                    answer: answer.clone(),
                    player: player.snapshot(),
                });
            }
        }
        let answered = events.len();

        match self.current_question.correct_answer() {
            Some(correct) => events.push(EngineEvent::Answer { answer: correct.clone() }),
            None => warn!("Question {:?} has no correct answer", self.current_question.text),
        }

        info!(answered, "Question {:?} closed", self.current_question.text);
        self.pending_events.extend(events);
        answered
    }

    /// End of the reveal phase.
    ///
    /// Draws and installs the next question (emitting `newQuestion`), then
    /// re-sends `enterAnswer` for every player still in an answer zone so
    /// clients pick up the new answer texts.
    pub fn advance_question(&mut self) -> Result<&Question, EngineError> {
        let next = self.choose_question_randomly()?;
        self.set_current_question(next);

        let mut events = Vec::new();
        for player in self.players.values_mut() {
            if !player.in_answer {
                continue;
            }
            match answer_for(&self.layout, &self.current_question, player.position) {
                Some(answer) => events.push(EngineEvent::EnterAnswer {
                    answer: answer.clone(),
                    player: player.snapshot(),
                }),
                None => player.in_answer = false,
            }
        }
        self.pending_events.extend(events);

        Ok(&self.current_question)
    }

    // -------------------------------------------------------------------------
    // Players
    // -------------------------------------------------------------------------

    /// Place a new player on a random free cell. Emits `newPlayer`.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        avatar: serde_json::Value,
    ) -> Result<PlayerSnapshot, EngineError> {
        if self.players.contains_key(&id) {
            return Err(EngineError::PlayerAlreadyJoined(id));
        }

        let position = self.find_free_cell(&id, &[])?;
        Ok(self.insert_player(Player::new(id, position, avatar)))
    }

    /// Rejection-sample a free cell for `id`, also avoiding `claimed`.
    fn find_free_cell(
        &mut self,
        id: &PlayerId,
        claimed: &[GridPoint],
    ) -> Result<GridPoint, EngineError> {
        let (width, height) = (self.layout.width, self.layout.height);

        for _ in 0..self.config.spawn_attempts {
            let cell = self.rng.random_cell(width, height);
            if !claimed.contains(&cell) && self.is_valid_position(cell, Some(id)) {
                return Ok(cell);
            }
        }

        warn!(
            players = self.players.len(),
            "No free cell for player {} after {} attempts",
            id.short(),
            self.config.spawn_attempts
        );
        Err(EngineError::PlacementExhausted {
            attempts: self.config.spawn_attempts,
        })
    }

    fn insert_player(&mut self, mut player: Player) -> PlayerSnapshot {
        player.in_answer =
            answer_for(&self.layout, &self.current_question, player.position).is_some();

        let snapshot = player.snapshot();
        info!("Player {} joined at {}", player.id.short(), player.position);
        self.players.insert(player.id, player);
        self.push_event(EngineEvent::NewPlayer { player: snapshot.clone() });
        snapshot
    }

    /// Remove a player. Emits `playerLeave`; unknown ids are ignored.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        if self.players.remove(id).is_some() {
            info!("Player {} left", id.short());
            self.push_event(EngineEvent::PlayerLeave { id: *id });
            true
        } else {
            debug!("Ignoring leave for unknown player {}", id.short());
            false
        }
    }

    /// Can a player stand on `position`?
    ///
    /// Rejects cells outside the grid, on the question zone, on a wall, or
    /// on another player. `exclude` is left out of the player check. Spawn
    /// and move both go through this predicate.
    pub fn is_valid_position(&self, position: GridPoint, exclude: Option<&PlayerId>) -> bool {
        if !self.layout.in_bounds(position) {
            return false;
        }

        if self.layout.is_blocked(position) {
            return false;
        }

        !self
            .players
            .values()
            .any(|other| Some(&other.id) != exclude && collides(position, &other.position))
    }

    /// Move a player by `delta`.
    ///
    /// On success the old cell enters the trail, the status follows the
    /// sign of `delta.x` (y-only moves read as idle), the answer-zone flag is
    /// recomputed, and `enterAnswer`/`exitAnswer` is emitted on a flag
    /// change, followed by `playerMove`. On a rejected target the status
    /// becomes `hit`, the oldest trail cell is dropped and `playerMove` is
    /// emitted with the position unchanged.
    ///
    /// Returns `None` for an unknown player.
    pub fn move_player(&mut self, id: &PlayerId, delta: GridPoint) -> Option<MoveOutcome> {
        let from = match self.players.get(id) {
            Some(player) => player.position,
            None => {
                debug!("Ignoring move for unknown player {}", id.short());
                return None;
            }
        };

        let target = from.offset(delta);
        let valid = self.is_valid_position(target, Some(id));
        let answer = if valid {
            answer_for(&self.layout, &self.current_question, target).cloned()
        } else {
            None
        };

        let player = self.players.get_mut(id)?;
        let mut events = Vec::with_capacity(2);

        let outcome = if valid {
            player.record_position();
            player.set_status(match delta.x.signum() {
                1 => PlayerStatus::Right,
                -1 => PlayerStatus::Left,
                _ => PlayerStatus::Idle,
            });
            player.position = target;

            let was_in_answer = player.in_answer;
            player.in_answer = answer.is_some();

            match (was_in_answer, answer) {
                (false, Some(answer)) => events.push(EngineEvent::EnterAnswer {
                    answer,
                    player: player.snapshot(),
                }),
                (true, None) => events.push(EngineEvent::ExitAnswer {
                    answer: None,
                    player: player.snapshot(),
                }),
                _ => {}
            }

            MoveOutcome::Moved { from, to: target }
        } else {
            player.set_status(PlayerStatus::Hit);
            player.forget_oldest_position();
            MoveOutcome::Blocked { at: from, target }
        };

        events.push(EngineEvent::PlayerMove { player: player.snapshot() });

        #[cfg(feature = "debug-tracing")]
        tracing::trace!("Player {} move {:?}", id.short(), outcome);

        self.pending_events.extend(events);
        Some(outcome)
    }

    /// The answer whose zone contains `player`, if any.
    pub fn is_in_answer(&self, player: &Player) -> Option<&Answer> {
        answer_for(&self.layout, &self.current_question, player.position)
    }

    // -------------------------------------------------------------------------
    // Lifecycle & accessors
    // -------------------------------------------------------------------------

    /// Drop every player and pending event without emitting anything.
    pub fn teardown(&mut self) {
        info!(players = self.players.len(), "Engine torn down");
        self.players.clear();
        self.pending_events.clear();
    }

    /// Full state for a newly connected client.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            players: self.players.values().map(Player::snapshot).collect(),
            question: self.current_question.clone(),
            layout: self.layout.clone(),
        }
    }

    /// Get a player by ID.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// All players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of players on the grid.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Current question.
    pub fn current_question(&self) -> &Question {
        &self.current_question
    }

    /// Question pool.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn push_event(&mut self, event: EngineEvent) {
        self.pending_events.push(event);
    }

    /// Place a player on a specific cell, bypassing spawn sampling.
    #[cfg(test)]
    pub(crate) fn add_player_at(
        &mut self,
        id: PlayerId,
        position: GridPoint,
    ) -> Result<PlayerSnapshot, EngineError> {
        if self.players.contains_key(&id) {
            return Err(EngineError::PlayerAlreadyJoined(id));
        }
        assert!(self.is_valid_position(position, Some(&id)), "test placement on invalid cell");
        Ok(self.insert_player(Player::new(id, position, serde_json::Value::Null)))
    }
}

/// Answer of the first zone (in index order) containing `position`.
fn answer_for<'a>(layout: &Layout, question: &'a Question, position: GridPoint) -> Option<&'a Answer> {
    layout
        .answer_zone_at(position)
        .and_then(|idx| question.answers.get(idx))
}

// =============================================================================
// TESTS
// =============================================================================
