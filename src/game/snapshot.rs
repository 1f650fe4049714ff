//! Match Snapshots
//!
//! Full-state view of a room sent on join and after every applied intent.
//! Everyone in the room, spectators included, receives the same snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::hash::to_hex;
use crate::game::board::TileId;
use crate::game::hero::Role;
use crate::game::state::{
    LayerTimers, MatchPhase, MatchState, PerSeat, PetalAura, Seat, StatusTimer, TurnState, UnitId,
    ENERGY_MAX,
};

/// Hard wall entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallView {
    pub tile: TileId,
    pub ttl: u32,
}

/// One seat's timer on a blossom layer tile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerView {
    pub tile: TileId,
    pub ttl: u32,
    pub owner: Seat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenView {
    pub owner: Seat,
    pub tile: TileId,
    pub role: Role,
    pub name: String,
    pub has_moved_ever: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterView {
    pub owner: Seat,
    pub role: Role,
    pub name: String,
    pub hp: u32,
    pub max_hp: u32,
    pub special_cooldown: u32,
    pub dead: bool,
}

/// Active statuses of one unit, as remaining turns (zero = inactive).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub fire_dot: u32,
    pub iron_skin: u32,
    pub entangle: u32,
    pub redirect: u32,
    pub bear: u32,
    pub move_bonus: u32,
    pub skill_check: bool,
}

/// Everything a client needs to render the match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: String,
    pub phase: MatchPhase,
    pub winner: Option<Seat>,
    pub turn_number: u32,
    pub current_turn: Seat,
    /// Usage flags of the seat whose turn it is
    pub turn: TurnState,
    pub player_names: PerSeat<String>,
    pub energy: PerSeat<u32>,
    pub energy_max: u32,
    pub last_discard: PerSeat<Option<String>>,
    pub walls: Vec<WallView>,
    pub blossom_walls: Vec<LayerView>,
    pub blossom_ring: Vec<LayerView>,
    pub petal_auras: Vec<PetalAura>,
    pub tokens: BTreeMap<UnitId, TokenView>,
    pub characters: BTreeMap<UnitId, CharacterView>,
    /// Only units with something active are listed
    pub fx: BTreeMap<UnitId, StatusSummary>,
    pub state_hash: String,
}

fn layer_views(layer: &BTreeMap<TileId, LayerTimers>) -> Vec<LayerView> {
    let mut views = Vec::new();
    for (tile, timers) in layer {
        for seat in Seat::ALL {
            if timers[seat] > 0 {
                views.push(LayerView {
                    tile: *tile,
                    ttl: timers[seat],
                    owner: seat,
                });
            }
        }
    }
    views
}

impl MatchSnapshot {
    /// Build a snapshot of the current state.
    pub fn capture(state: &MatchState) -> Self {
        let tokens = state
            .tokens
            .iter()
            .map(|(id, t)| {
                (
                    *id,
                    TokenView {
                        owner: t.owner,
                        tile: t.tile,
                        role: t.role,
                        name: t.name.clone(),
                        has_moved_ever: t.has_moved_ever,
                    },
                )
            })
            .collect();

        let characters = state
            .characters
            .iter()
            .map(|(id, c)| {
                (
                    *id,
                    CharacterView {
                        owner: c.owner,
                        role: c.role,
                        name: c.name.clone(),
                        hp: c.hp.min(c.max_hp),
                        max_hp: c.max_hp,
                        special_cooldown: c.special_cooldown,
                        dead: c.dead,
                    },
                )
            })
            .collect();

        let fx = state
            .characters
            .iter()
            .filter(|(_, c)| !c.fx.is_empty())
            .map(|(id, c)| {
                let left = |slot: &Option<StatusTimer>| slot.map_or(0, |t| t.remaining);
                (
                    *id,
                    StatusSummary {
                        fire_dot: left(&c.fx.fire_dot),
                        iron_skin: left(&c.fx.iron_skin),
                        entangle: left(&c.fx.entangle),
                        redirect: left(&c.fx.redirect),
                        bear: left(&c.fx.bear),
                        move_bonus: c.fx.move_bonus_this_turn,
                        skill_check: c.fx.skill_check_next.is_some() || c.fx.attack_bonus_this_turn > 0,
                    },
                )
            })
            .collect();

        Self {
            match_id: state.match_id.clone(),
            phase: state.phase,
            winner: state.winner,
            turn_number: state.turn_number,
            current_turn: state.current_turn,
            turn: state.turn_state[state.current_turn],
            player_names: state.player_names.clone(),
            energy: state.energy.clone(),
            energy_max: ENERGY_MAX,
            last_discard: state.last_discard.clone(),
            walls: state
                .walls
                .iter()
                .map(|(tile, ttl)| WallView { tile: *tile, ttl: *ttl })
                .collect(),
            blossom_walls: layer_views(&state.blossom_walls),
            blossom_ring: layer_views(&state.blossom_ring),
            petal_auras: state.petal_auras.clone(),
            tokens,
            characters,
            fx,
            state_hash: to_hex(&state.compute_hash()),
        }
    }
}
