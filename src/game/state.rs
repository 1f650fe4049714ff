//! Game State Definitions
//!
//! All state types for match simulation.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::hash::{compute_state_hash, StateHash, StateHasher};
use crate::core::rng::RandomSource;
use crate::game::board::{Board, TileId};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::hero::Role;

/// Maximum energy a seat can bank.
pub const ENERGY_MAX: u32 = 10;

/// Energy gained by a seat when its turn ends.
pub const ENERGY_GAIN_PER_TURN: u32 = 1;

/// Hard wall lifetime in turn ends.
pub const WALL_TTL: u32 = 8;

/// Blossom wall and ring lifetime in owner turn ends.
pub const BLOSSOM_TTL: u32 = 2;

// =============================================================================
// SEAT
// =============================================================================

/// One of the two competing sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    Player1,
    Player2,
}

impl Seat {
    /// Both seats, seat 1 first.
    pub const ALL: [Seat; 2] = [Seat::Player1, Seat::Player2];

    /// The opposing seat.
    #[inline]
    pub fn other(self) -> Seat {
        match self {
            Seat::Player1 => Seat::Player2,
            Seat::Player2 => Seat::Player1,
        }
    }

    /// Unit id prefix for this seat (`P` or `E`).
    pub fn unit_prefix(self) -> char {
        match self {
            Seat::Player1 => 'P',
            Seat::Player2 => 'E',
        }
    }

    /// Home row for this seat's starting units.
    fn home_row(self) -> char {
        match self {
            Seat::Player1 => 'I',
            Seat::Player2 => 'A',
        }
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::Player1 => write!(f, "player1"),
            Seat::Player2 => write!(f, "player2"),
        }
    }
}

/// A value held once per seat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSeat<T> {
    pub player1: T,
    pub player2: T,
}

impl<T> PerSeat<T> {
    pub fn new(player1: T, player2: T) -> Self {
        Self { player1, player2 }
    }

    /// Build from a function of the seat.
    pub fn from_fn(mut f: impl FnMut(Seat) -> T) -> Self {
        Self {
            player1: f(Seat::Player1),
            player2: f(Seat::Player2),
        }
    }
}

impl<T> Index<Seat> for PerSeat<T> {
    type Output = T;

    fn index(&self, seat: Seat) -> &T {
        match seat {
            Seat::Player1 => &self.player1,
            Seat::Player2 => &self.player2,
        }
    }
}

impl<T> IndexMut<Seat> for PerSeat<T> {
    fn index_mut(&mut self, seat: Seat) -> &mut T {
        match seat {
            Seat::Player1 => &mut self.player1,
            Seat::Player2 => &mut self.player2,
        }
    }
}

// =============================================================================
// UNIT ID
// =============================================================================

/// Unit identifier: seat prefix plus slot (`P1`..`P4`, `E1`..`E4`).
///
/// Implements Ord (seat 1 units first) for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId {
    pub seat: Seat,
    pub slot: u8,
}

impl UnitId {
    pub const fn new(seat: Seat, slot: u8) -> Self {
        Self { seat, slot }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.seat.unit_prefix(), self.slot)
    }
}

/// Error returned when a unit id string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed unit id: {0:?}")]
pub struct ParseUnitIdError(pub String);

impl FromStr for UnitId {
    type Err = ParseUnitIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseUnitIdError(s.to_string());
        let mut chars = s.chars();
        let seat = match chars.next() {
            Some('P') => Seat::Player1,
            Some('E') => Seat::Player2,
            _ => return Err(err()),
        };
        let slot: u8 = chars.as_str().parse().map_err(|_| err())?;
        if slot == 0 {
            return Err(err());
        }
        Ok(UnitId::new(seat, slot))
    }
}

impl Serialize for UnitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// STATUS EFFECTS
// =============================================================================

/// A timed status slot: turns remaining plus the effect's magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimer {
    pub remaining: u32,
    pub magnitude: u32,
}

impl StatusTimer {
    pub const fn new(remaining: u32, magnitude: u32) -> Self {
        Self { remaining, magnitude }
    }
}

/// Decrement a timed slot, clearing it once it reaches zero.
pub(crate) fn tick_slot(slot: &mut Option<StatusTimer>) {
    if let Some(timer) = slot {
        timer.remaining = timer.remaining.saturating_sub(1);
        if timer.remaining == 0 {
            *slot = None;
        }
    }
}

/// Bonus queued by Skill Check, promoted at the start of the holder's turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBonus {
    pub attack: u32,
    pub movement: u32,
}

/// Per-character status bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffects {
    /// Damage per tick, applied at the start of the holder's turn
    pub fire_dot: Option<StatusTimer>,
    /// Root: the unit cannot move or teleport
    pub entangle: Option<StatusTimer>,
    /// Flat incoming damage reduction
    pub iron_skin: Option<StatusTimer>,
    /// Damage aimed at living teammates lands on this unit instead
    pub redirect: Option<StatusTimer>,
    /// Transform: halved damage taken, +1 move, +2 damage
    pub bear: Option<StatusTimer>,
    pub skill_check_next: Option<PendingBonus>,
    pub attack_bonus_this_turn: u32,
    pub move_bonus_this_turn: u32,
}

impl StatusEffects {
    #[inline]
    pub fn is_rooted(&self) -> bool {
        self.entangle.is_some_and(|t| t.remaining > 0)
    }

    #[inline]
    pub fn is_redirecting(&self) -> bool {
        self.redirect.is_some_and(|t| t.remaining > 0)
    }

    #[inline]
    pub fn is_transformed(&self) -> bool {
        self.bear.is_some_and(|t| t.remaining > 0)
    }

    /// Flat reduction from Iron Skin, zero if inactive.
    pub fn iron_skin_reduction(&self) -> u32 {
        self.iron_skin
            .filter(|t| t.remaining > 0)
            .map_or(0, |t| t.magnitude)
    }

    /// Does the bucket hold anything worth reporting?
    pub fn is_empty(&self) -> bool {
        *self == StatusEffects::default()
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        for slot in [
            &self.fire_dot,
            &self.entangle,
            &self.iron_skin,
            &self.redirect,
            &self.bear,
        ] {
            match slot {
                Some(t) => {
                    hasher.update_u8(1);
                    hasher.update_u32(t.remaining);
                    hasher.update_u32(t.magnitude);
                }
                None => hasher.update_u8(0),
            }
        }
        match self.skill_check_next {
            Some(b) => {
                hasher.update_u8(1);
                hasher.update_u32(b.attack);
                hasher.update_u32(b.movement);
            }
            None => hasher.update_u8(0),
        }
        hasher.update_u32(self.attack_bonus_this_turn);
        hasher.update_u32(self.move_bonus_this_turn);
    }
}

// =============================================================================
// TOKEN / CHARACTER
// =============================================================================

/// Board presence of a living unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub owner: Seat,
    pub tile: TileId,
    pub has_moved_ever: bool,
    pub role: Role,
    pub name: String,
}

/// Combat record of a unit. Outlives its token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub owner: Seat,
    pub role: Role,
    pub hp: u32,
    pub max_hp: u32,
    pub special_cooldown: u32,
    pub dead: bool,
    pub fx: StatusEffects,
    pub name: String,
}

// =============================================================================
// TURN STATE
// =============================================================================

/// Movement modifiers granted by cards this turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveBuff {
    pub steps_bonus: u32,
    pub min_steps: u32,
}

/// Per-seat, per-turn resource flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub card_played: bool,
    pub used_movement: bool,
    pub used_action: bool,
    pub move_buff: MoveBuff,
}

// =============================================================================
// AURAS
// =============================================================================

/// Healing Petal aura placed by a Death Blossom special.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetalAura {
    pub owner: Seat,
    pub center: TileId,
    pub tiles: Vec<TileId>,
    pub remaining: u32,
    pub center_heal: u32,
    pub ring_heal: u32,
}

/// Per-seat timers on a passable tile layer (zero = no layer).
pub type LayerTimers = PerSeat<u32>;

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting for both seats
    #[default]
    Waiting,
    /// Active gameplay
    Playing,
    /// Game over
    Ended,
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug)]
pub struct MatchState {
    /// Match identifier (room code)
    pub match_id: String,

    /// Shared board topology
    pub board: Arc<Board>,

    /// Die rolls for this match
    pub rng: Box<dyn RandomSource>,

    pub phase: MatchPhase,
    pub winner: Option<Seat>,

    /// Number of turn ends so far
    pub turn_number: u32,
    pub current_turn: Seat,
    pub turn_state: PerSeat<TurnState>,
    pub energy: PerSeat<u32>,
    pub last_discard: PerSeat<Option<String>>,
    pub player_names: PerSeat<String>,

    /// Living units on the board
    pub tokens: BTreeMap<UnitId, Token>,
    /// Every unit, dead or alive
    pub characters: BTreeMap<UnitId, Character>,

    /// Hard walls: tile -> turns remaining
    pub walls: BTreeMap<TileId, u32>,
    pub blossom_walls: BTreeMap<TileId, LayerTimers>,
    pub blossom_ring: BTreeMap<TileId, LayerTimers>,
    pub petal_auras: Vec<PetalAura>,

    /// Events generated by the intent being applied
    pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a match with the eight default units on their home rows.
    pub fn new(match_id: impl Into<String>, rng: Box<dyn RandomSource>) -> Self {
        let mut state = Self {
            match_id: match_id.into(),
            board: Board::shared(),
            rng,
            phase: MatchPhase::Waiting,
            winner: None,
            turn_number: 0,
            current_turn: Seat::Player1,
            turn_state: PerSeat::default(),
            energy: PerSeat::default(),
            last_discard: PerSeat::default(),
            player_names: PerSeat::new("Player 1".to_string(), "Player 2".to_string()),
            tokens: BTreeMap::new(),
            characters: BTreeMap::new(),
            walls: BTreeMap::new(),
            blossom_walls: BTreeMap::new(),
            blossom_ring: BTreeMap::new(),
            petal_auras: Vec::new(),
            pending_events: Vec::new(),
        };

        for seat in Seat::ALL {
            for role in Role::ALL {
                state.add_unit(seat, role);
            }
        }
        state
    }

    fn add_unit(&mut self, seat: Seat, role: Role) {
        let slot = role.slot();
        let id = UnitId::new(seat, slot);
        let Some(tile) = TileId::new(seat.home_row(), slot) else {
            return;
        };
        let name = role.default_name().to_string();
        let max_hp = role.base_max_hp();

        self.tokens.insert(
            id,
            Token {
                owner: seat,
                tile,
                has_moved_ever: false,
                role,
                name: name.clone(),
            },
        );
        self.characters.insert(
            id,
            Character {
                owner: seat,
                role,
                hp: max_hp,
                max_hp,
                special_cooldown: 0,
                dead: false,
                fx: StatusEffects::default(),
                name,
            },
        );
    }

    /// Is the match over?
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.phase == MatchPhase::Ended
    }

    /// Unit standing on a tile, if any.
    pub fn unit_at(&self, tile: TileId) -> Option<UnitId> {
        self.tokens
            .iter()
            .find(|(_, token)| token.tile == tile)
            .map(|(id, _)| *id)
    }

    #[inline]
    pub fn is_occupied(&self, tile: TileId) -> bool {
        self.unit_at(tile).is_some()
    }

    /// Hard-walled tiles, as a BFS blocking set.
    pub fn wall_set(&self) -> BTreeSet<TileId> {
        self.walls.keys().copied().collect()
    }

    /// Step distance between two living units, optionally around walls.
    pub fn unit_distance(&self, a: UnitId, b: UnitId, around_walls: bool) -> Option<u32> {
        let from = self.tokens.get(&a)?.tile;
        let to = self.tokens.get(&b)?.tile;
        if around_walls {
            self.board.shortest_distance(from, to, Some(&self.wall_set()))
        } else {
            self.board.shortest_distance(from, to, None)
        }
    }

    /// Living units of a seat, in id order.
    pub fn units_of(&self, seat: Seat) -> impl Iterator<Item = UnitId> + '_ {
        self.tokens
            .iter()
            .filter(move |(_, t)| t.owner == seat)
            .map(|(id, _)| *id)
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.turn_number, |hasher| {
            hasher.update_u8(self.phase as u8);
            hasher.update_u8(self.winner.map_or(0, |s| s.as_u8() + 1));
            hasher.update_u8(self.current_turn.as_u8());

            for seat in Seat::ALL {
                let ts = &self.turn_state[seat];
                hasher.update_bool(ts.card_played);
                hasher.update_bool(ts.used_movement);
                hasher.update_bool(ts.used_action);
                hasher.update_u32(ts.move_buff.steps_bonus);
                hasher.update_u32(ts.move_buff.min_steps);
                hasher.update_u32(self.energy[seat]);
                hasher.update_str(self.last_discard[seat].as_deref().unwrap_or(""));
                hasher.update_str(&self.player_names[seat]);
            }

            // BTreeMap guarantees sorted order
            for (id, token) in &self.tokens {
                hasher.update_str(&id.to_string());
                hasher.update_u8(token.owner.as_u8());
                hasher.update_u8(token.role.slot());
                hasher.update_str(&token.tile.to_string());
                hasher.update_bool(token.has_moved_ever);
                hasher.update_str(&token.name);
            }
            for (id, ch) in &self.characters {
                hasher.update_str(&id.to_string());
                hasher.update_u8(ch.owner.as_u8());
                hasher.update_u8(ch.role.slot());
                hasher.update_u32(ch.hp);
                hasher.update_u32(ch.max_hp);
                hasher.update_u32(ch.special_cooldown);
                hasher.update_bool(ch.dead);
                hasher.update_str(&ch.name);
                ch.fx.hash_into(hasher);
            }

            for (tile, ttl) in &self.walls {
                hasher.update_str(&tile.to_string());
                hasher.update_u32(*ttl);
            }
            for layer in [&self.blossom_walls, &self.blossom_ring] {
                hasher.update_u32(layer.len() as u32);
                for (tile, timers) in layer {
                    hasher.update_str(&tile.to_string());
                    hasher.update_u32(timers.player1);
                    hasher.update_u32(timers.player2);
                }
            }
            hasher.update_u32(self.petal_auras.len() as u32);
            for aura in &self.petal_auras {
                hasher.update_u8(aura.owner.as_u8());
                hasher.update_str(&aura.center.to_string());
                hasher.update_u32(aura.tiles.len() as u32);
                for tile in &aura.tiles {
                    hasher.update_str(&tile.to_string());
                }
                hasher.update_u32(aura.remaining);
                hasher.update_u32(aura.center_heal);
                hasher.update_u32(aura.ring_heal);
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, data: GameEventData) {
        self.pending_events.push(GameEvent::new(self.turn_number, data));
    }
}

// =============================================================================
// TESTS
// =============================================================================
