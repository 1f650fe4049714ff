//! Game Logic Module
//!
//! The per-match engine. Everything here is synchronous and deterministic
//! given the match's random source.
//!
//! ## Module Structure
//!
//! - `board`: Hex tiles, adjacency, BFS distance, area and line queries
//! - `state`: Match state, units, statuses, per-seat turn data
//! - `hero`: Hero catalog, ability kits, card costs, external max HP table
//! - `status`: Start-of-turn ticking and end-of-turn tile healing
//! - `turn`: Turn ends, energy, match start
//! - `movement`: Walking units
//! - `ability`: Primaries and specials
//! - `cards`: Status, movement and board cards
//! - `combat`: Damage, healing, death and the win condition
//! - `intent`: Player commands and rejection reasons
//! - `events`: Events broadcast to the room
//! - `snapshot`: Full-state view for clients

pub mod ability;
pub mod board;
pub mod cards;
pub mod combat;
pub mod events;
pub mod hero;
pub mod intent;
pub mod movement;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod turn;

// Re-export key types
pub use board::{Board, TileId};
pub use events::{GameEvent, GameEventData};
pub use hero::{HeroStatsTable, TeamPick};
pub use intent::{apply_intent, ActionError, Intent};
pub use snapshot::MatchSnapshot;
pub use state::{MatchPhase, MatchState, PerSeat, Seat, UnitId};
