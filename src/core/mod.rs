//! Core primitives.
//!
//! Grid coordinates and the seeded RNG. Nothing in here knows about
//! players or questions.

pub mod grid;
pub mod rng;

// Re-export core types
pub use grid::{GridPoint, GridBox};
pub use rng::DeterministicRng;
