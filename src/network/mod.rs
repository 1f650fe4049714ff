//! Network Layer
//!
//! WebSocket server, wire messages and match rooms.
//! All game rules live in `game/`; this layer only seats players and routes.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, JoinRequest, ServerError, ServerMessage};
pub use session::{ConnectionId, MatchRegistry, MatchRoom, SessionError};
pub use server::{GameServer, GameServerError, ServerConfig};
