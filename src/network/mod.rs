//! Network Layer
//!
//! WebSocket transport and the session actor that owns the engine.
//! Everything here is clock- and I/O-driven; game rules live in `game/`.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, MoveInput, ErrorCode};
pub use session::{GameSession, SessionHandle, SessionConfig, SessionError, SessionEvent, Joined};
pub use server::{GameServer, ServerConfig, GameServerError};
