//! Game Events
//!
//! Events generated while applying an intent. Every event is broadcast to
//! the whole room, in the order it was produced.

use serde::{Deserialize, Serialize};

use crate::game::board::TileId;
use crate::game::state::{Seat, UnitId};

/// Whether a health change came from damage or healing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCause {
    Damage,
    Heal,
}

/// Which ability slot was used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    Primary,
    Special,
}

/// Extra outcome data attached to an ability-used event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDetail {
    /// Units damaged by an area or line ability
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hits: Vec<UnitId>,

    /// Tiles covered by a line or aura
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiles: Vec<TileId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_tile: Option<TileId>,

    /// Damage rolled by a random-damage primary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_bonus: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_bonus: Option<u32>,
}

/// Extra outcome data attached to a card-played event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<UnitId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<UnitId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile: Option<TileId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_tile: Option<TileId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_bonus: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_steps: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steal: Option<u32>,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEventData {
    /// Active seat changed
    TurnChanged { seat: Seat },

    /// Unit changed tiles (walk, teleport, swap, pull)
    UnitMoved {
        unit_id: UnitId,
        seat: Seat,
        to_tile: TileId,
    },

    /// Unit HP changed
    HealthChanged {
        unit_id: UnitId,
        hp: u32,
        previous: u32,
        cause: HealthCause,
    },

    /// Unit died and left the board
    UnitDied { unit_id: UnitId },

    /// Dungeon Master saving throw
    SavingThrowRolled {
        unit_id: UnitId,
        roll: u32,
        success: bool,
    },

    /// Primary or special resolved
    AbilityUsed {
        ability: AbilityKind,
        source_id: UnitId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<UnitId>,
        name: String,
        #[serde(default)]
        detail: AbilityDetail,
    },

    /// A card (or an ability's discard) was played
    CardPlayed {
        card: String,
        seat: Seat,
        #[serde(default)]
        detail: CardDetail,
    },

    /// A card was revealed without being played
    CardRevealed { card: String, seat: Seat },

    /// Match ended
    GameOver { winner: Seat },
}

/// A game event stamped with the turn it happened on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Number of turn ends before this event
    pub turn: u32,

    /// Event data
    #[serde(flatten)]
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(turn: u32, data: GameEventData) -> Self {
        Self { turn, data }
    }

    /// Create turn changed event.
    pub fn turn_changed(turn: u32, seat: Seat) -> Self {
        Self::new(turn, GameEventData::TurnChanged { seat })
    }

    /// Create game over event.
    pub fn game_over(turn: u32, winner: Seat) -> Self {
        Self::new(turn, GameEventData::GameOver { winner })
    }

    /// Is this the terminal event of a match?
    pub fn is_game_over(&self) -> bool {
        matches!(self.data, GameEventData::GameOver { .. })
    }
}
