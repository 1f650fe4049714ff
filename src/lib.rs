//! # Chaotic Neutral Match Server
//!
//! Authoritative server for a turn-based, two-player hex tactics game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  CHAOTIC NEUTRAL SERVER                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── rng.rs      - Seedable Xorshift128+ and scripted rolls  │
//! │  ├── hash.rs     - State hashing                             │
//! │  └── vec2.rs     - Board geometry                            │
//! │                                                              │
//! │  game/           - Rules (synchronous, one match at a time)  │
//! │  ├── board.rs    - 52-tile hex board                         │
//! │  ├── state.rs    - Units, statuses, turn and energy          │
//! │  ├── hero.rs     - Hero catalog and card costs               │
//! │  ├── intent.rs   - Player commands and dispatch              │
//! │  ├── movement.rs / ability.rs / cards.rs                     │
//! │  ├── combat.rs   - Damage, healing, death, win               │
//! │  ├── status.rs / turn.rs                                     │
//! │  └── snapshot.rs - Full-state view                           │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Match rooms and registry                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rejected intents
//!
//! Every intent is validated in full before anything changes. A rejected
//! intent leaves the match state hash untouched and produces no events.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::{DeterministicRng, RandomSource};
pub use game::intent::{apply_intent, ActionError, Intent};
pub use game::state::{MatchState, Seat, UnitId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
