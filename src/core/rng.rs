//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, deterministic randomness.
//! Every die roll in a match (seat coin flip, 1D6 primary, saving throw)
//! goes through [`RandomSource`], so tests can substitute scripted outcomes.

use std::collections::VecDeque;
use std::fmt::Debug;

use sha2::{Digest, Sha256};

/// Source of randomness for a match.
///
/// The engine only ever asks for small uniform die rolls, so implementors
/// provide a raw 64-bit stream and get `roll`/`coin_flip` for free.
pub trait RandomSource: Debug + Send + Sync {
    /// Generate the next 64-bit random value.
    fn next_u64(&mut self) -> u64;

    /// Roll a die with `sides` faces, returning a value in `1..=sides`.
    fn roll(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        1 + (self.next_u64() % sides as u64) as u32
    }

    /// Fair coin flip.
    fn coin_flip(&mut self) -> bool {
        self.roll(2) == 1
    }
}

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use chaotic_neutral::core::rng::{DeterministicRng, RandomSource};
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.roll(6), b.roll(6));
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Get current state (for debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

impl RandomSource for DeterministicRng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }
}

/// Replays a fixed list of die results, then falls back to a seeded stream.
///
/// Scripted values are returned verbatim from `roll`, so a test can force
/// a saving throw of 3 or a 1D6 of 6 without searching for a seed.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRolls {
    rolls: VecDeque<u32>,
    fallback: DeterministicRng,
}

impl ScriptedRolls {
    /// Create from the die results to return, in order.
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            fallback: DeterministicRng::new(0),
        }
    }

    /// Number of scripted rolls not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rolls.len()
    }
}

impl RandomSource for ScriptedRolls {
    fn next_u64(&mut self) -> u64 {
        self.fallback.next_u64()
    }

    fn roll(&mut self, sides: u32) -> u32 {
        match self.rolls.pop_front() {
            Some(value) => value.min(sides).max(1),
            None => {
                if sides == 0 {
                    return 0;
                }
                1 + (self.fallback.next_u64() % sides as u64) as u32
            }
        }
    }
}

/// SplitMix64 for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a match seed from the match id and caller-supplied entropy.
///
/// The server passes wall-clock nanoseconds as entropy; tests pass a constant.
pub fn derive_match_seed(match_id: &str, entropy: u64) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"CHAOTIC_NEUTRAL_SEED_V1");
    hasher.update(match_id.as_bytes());
    hasher.update(entropy.to_le_bytes());

    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(bytes)
}

// =============================================================================
// TESTS
// =============================================================================
