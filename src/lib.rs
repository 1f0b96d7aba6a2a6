//! # Trivia Grid Server
//!
//! Authoritative server for a projected trivia grid: players walk avatars
//! into answer zones while a question cycle collects and reveals answers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TRIVIA GRID SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── grid.rs     - Integer cells and inclusive boxes         │
//! │  └── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │                                                              │
//! │  game/           - Game rules (no I/O, no clocks)            │
//! │  ├── engine.rs   - Authoritative state and operations        │
//! │  ├── cycle.rs    - Collecting/reveal phase machine           │
//! │  ├── player.rs   - Player entity and trail                   │
//! │  ├── question.rs - Questions and pool validation             │
//! │  ├── layout.rs   - Question zone, answer zones, walls        │
//! │  ├── collision.rs- Cell hit tests                            │
//! │  └── events.rs   - Outbound engine events                    │
//! │                                                              │
//! │  data.rs         - JSON data directory loading               │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── session.rs  - Session actor owning the engine           │
//! │  ├── server.rs   - WebSocket server                          │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! The engine is single-writer. One session task owns it and applies
//! commands and cycle deadlines in arrival order, so no engine operation
//! ever observes a half-applied move or join.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod data;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::grid::{GridPoint, GridBox};
pub use core::rng::DeterministicRng;
pub use game::engine::{GameEngine, EngineConfig, EngineError, GameSnapshot};
pub use game::events::EngineEvent;
pub use game::player::PlayerId;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
