//! Game Session
//!
//! One task owns the [`GameEngine`] and serializes every mutation into it:
//! client commands arrive over an mpsc channel, the question cycle runs off a
//! single resettable deadline, and engine events are fanned out on a
//! broadcast channel after each step. Every cycle step is followed by a
//! [`PhaseTimer`] so clients can show a countdown.
//!
//! ```text
//!  SessionHandle ──cmd──► GameSession task ──SessionEvent──► subscribers
//!                              │  ▲
//!                              ▼  │ deadline
//!                          QuestionCycle
//! ```

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::core::grid::GridPoint;
use crate::game::cycle::{PhaseTimer, QuestionCycle};
use crate::game::engine::{EngineError, GameEngine, GameSnapshot};
use crate::game::events::EngineEvent;
use crate::game::player::PlayerId;

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum players on the grid.
    pub max_players: usize,
    /// Broadcast buffer per subscriber.
    pub event_capacity: usize,
    /// Pending command buffer.
    pub command_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 64,
            event_capacity: 1024,
            command_capacity: 256,
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Player cap reached.
    #[error("Session is full")]
    SessionFull,

    /// The session task has stopped.
    #[error("Session closed")]
    Closed,

    /// Engine rejected the command.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Reply to a successful join.
#[derive(Debug, Clone)]
pub struct Joined {
    /// Game state right after the join.
    pub snapshot: GameSnapshot,
    /// Phase in progress at join time.
    pub timer: PhaseTimer,
}

/// Broadcast from the session to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// State change made by the engine.
    Engine(EngineEvent),
    /// The question cycle entered a new phase.
    Phase(PhaseTimer),
}

enum SessionCommand {
    Join {
        id: PlayerId,
        avatar: serde_json::Value,
        reply: oneshot::Sender<Result<Joined, SessionError>>,
    },
    Move {
        id: PlayerId,
        delta: GridPoint,
    },
    Leave {
        id: PlayerId,
    },
    Snapshot {
        reply: oneshot::Sender<GameSnapshot>,
    },
    Shutdown,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Place a player on the grid.
    pub async fn join(&self, id: PlayerId, avatar: serde_json::Value) -> Result<Joined, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Join { id, avatar, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Move a player. Unknown ids are ignored by the engine.
    pub async fn move_player(&self, id: PlayerId, delta: GridPoint) -> Result<(), SessionError> {
        self.send(SessionCommand::Move { id, delta }).await
    }

    /// Remove a player.
    pub async fn leave(&self, id: PlayerId) -> Result<(), SessionError> {
        self.send(SessionCommand::Leave { id }).await
    }

    /// Current game state.
    pub async fn snapshot(&self) -> Result<GameSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Receive every session event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the session. Pending timers are dropped and nothing is emitted.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }

    /// Has the session task stopped?
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }
}

// =============================================================================
// SESSION TASK
// =============================================================================

/// The session actor.
pub struct GameSession {
    engine: GameEngine,
    cycle: QuestionCycle,
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
}

impl GameSession {
    /// Start the session task. The question cycle starts immediately.
    pub fn spawn(engine: GameEngine, config: SessionConfig) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        let session = Self {
            cycle: QuestionCycle::new(engine.config()),
            engine,
            config,
            events: event_tx.clone(),
        };

        let task = tokio::spawn(session.run(command_rx));
        let handle = SessionHandle {
            commands: command_tx,
            events: event_tx,
        };
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!(
            max_players = self.config.max_players,
            "Session started with question {:?}",
            self.engine.current_question().text
        );

        let deadline = sleep_until(Instant::now() + self.cycle.remaining());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command, deadline.deadline()),
                    }
                    self.flush_events();
                }
                () = &mut deadline => {
                    let next = match self.cycle.fire(&mut self.engine) {
                        Ok(next) => next,
                        Err(e) => {
                            warn!("Question cycle step failed: {}", e);
                            self.cycle.remaining()
                        }
                    };
                    let at = deadline.deadline() + next;
                    deadline.as_mut().reset(at);

                    self.flush_events();
                    let timer = PhaseTimer::new(self.cycle.phase(), next);
                    let _ = self.events.send(SessionEvent::Phase(timer));
                }
            }
        }

        self.engine.teardown();
        info!("Session stopped");
    }

    fn handle_command(&mut self, command: SessionCommand, phase_ends: Instant) {
        match command {
            SessionCommand::Join { id, avatar, reply } => {
                let result = self.join(id, avatar, phase_ends);
                if let Err(e) = &result {
                    debug!("Join for {} rejected: {}", id.short(), e);
                }
                let _ = reply.send(result);
            }
            SessionCommand::Move { id, delta } => {
                self.engine.move_player(&id, delta);
            }
            SessionCommand::Leave { id } => {
                self.engine.remove_player(&id);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn join(
        &mut self,
        id: PlayerId,
        avatar: serde_json::Value,
        phase_ends: Instant,
    ) -> Result<Joined, SessionError> {
        if self.engine.player(&id).is_none()
            && self.engine.player_count() >= self.config.max_players
        {
            return Err(SessionError::SessionFull);
        }

        self.engine.add_player(id, avatar)?;
        let remaining = phase_ends.saturating_duration_since(Instant::now());
        Ok(Joined {
            snapshot: self.engine.snapshot(),
            timer: PhaseTimer::new(self.cycle.phase(), remaining),
        })
    }

    fn flush_events(&mut self) {
        for event in self.engine.take_events() {
            // No subscribers is fine
            let _ = self.events.send(SessionEvent::Engine(event));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
