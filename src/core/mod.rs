//! Core primitives.
//!
//! Seedable randomness, state hashing and screen-space geometry shared by
//! every match.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::{DeterministicRng, RandomSource};
pub use hash::compute_state_hash;
