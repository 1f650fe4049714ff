//! Status Effects and Tile Hazards
//!
//! Turn-boundary processing: start-of-turn promotion and ticking for the
//! seat about to act, and end-of-turn healing and expiry for tile layers.

use std::collections::{BTreeMap, BTreeSet};

use crate::game::board::TileId;
use crate::game::combat::{apply_damage, apply_heal};
use crate::game::state::{tick_slot, LayerTimers, MatchState, Seat, UnitId};

/// Heal for a unit standing on its seat's blossom wall.
pub const BLOSSOM_WALL_HEAL: u32 = 2;

/// Heal for a unit standing on its seat's blossom ring.
pub const BLOSSOM_RING_HEAL: u32 = 1;

/// Units of `seat` still on the board, in id order.
fn seat_units(state: &MatchState, seat: Seat) -> Vec<UnitId> {
    state.units_of(seat).collect()
}

/// Start-of-turn processing for the seat about to act.
///
/// Pending Skill Check bonuses become this turn's bonuses, burning units take
/// their damage, and every timed status on the seat's units ticks down.
pub fn process_start_of_turn(state: &mut MatchState, seat: Seat) {
    for id in seat_units(state, seat) {
        let burn = {
            let Some(ch) = state.characters.get_mut(&id) else {
                continue;
            };
            if let Some(bonus) = ch.fx.skill_check_next.take() {
                ch.fx.attack_bonus_this_turn += bonus.attack;
                ch.fx.move_bonus_this_turn += bonus.movement;
            }
            ch.fx.fire_dot.filter(|t| t.remaining > 0).map(|t| t.magnitude)
        };

        if let Some(per_tick) = burn {
            apply_damage(state, id, per_tick);
        }

        if let Some(ch) = state.characters.get_mut(&id) {
            let fx = &mut ch.fx;
            if burn.is_some() {
                tick_slot(&mut fx.fire_dot);
            }
            tick_slot(&mut fx.entangle);
            tick_slot(&mut fx.iron_skin);
            tick_slot(&mut fx.bear);
            tick_slot(&mut fx.redirect);
        }
    }
}

/// Tick every hard wall, removing expired ones.
pub fn tick_walls(state: &mut MatchState) {
    state.walls.retain(|_, ttl| {
        *ttl = ttl.saturating_sub(1);
        *ttl > 0
    });
}

/// Heal `seat`'s units standing on that seat's blossom walls and ring.
///
/// A unit is healed at most once, wall taking precedence over ring.
pub fn heal_blossoms_at_end(state: &mut MatchState, seat: Seat) {
    let layers = [
        (active_tiles(&state.blossom_walls, seat), BLOSSOM_WALL_HEAL),
        (active_tiles(&state.blossom_ring, seat), BLOSSOM_RING_HEAL),
    ];
    let mut healed: BTreeSet<UnitId> = BTreeSet::new();

    for (tiles, amount) in layers {
        let targets: Vec<UnitId> = state
            .tokens
            .iter()
            .filter(|(id, tok)| tok.owner == seat && tiles.contains(&tok.tile) && !healed.contains(*id))
            .map(|(id, _)| *id)
            .collect();

        for id in targets {
            apply_heal(state, id, amount);
            healed.insert(id);
        }
    }
}

fn active_tiles(layer: &BTreeMap<TileId, LayerTimers>, seat: Seat) -> BTreeSet<TileId> {
    layer
        .iter()
        .filter(|(_, timers)| timers[seat] > 0)
        .map(|(tile, _)| *tile)
        .collect()
}

/// Heal through `seat`'s petal auras, then tick and prune them.
pub fn tick_petal_auras(state: &mut MatchState, seat: Seat) {
    let mut auras = std::mem::take(&mut state.petal_auras);

    for aura in auras.iter_mut().filter(|a| a.owner == seat) {
        let heals: Vec<(UnitId, u32)> = state
            .tokens
            .iter()
            .filter(|(_, tok)| tok.owner == seat && aura.tiles.contains(&tok.tile))
            .map(|(id, tok)| {
                let amount = if tok.tile == aura.center {
                    aura.center_heal
                } else {
                    aura.ring_heal
                };
                (*id, amount)
            })
            .collect();

        for (id, amount) in heals {
            apply_heal(state, id, amount);
        }
        aura.remaining = aura.remaining.saturating_sub(1);
    }

    auras.retain(|a| a.remaining > 0);
    state.petal_auras = auras;
}

/// Tick `seat`'s blossom wall and ring layers, leaving the other seat's alone.
pub fn tick_blossom_layers(state: &mut MatchState, seat: Seat) {
    for layer in [&mut state.blossom_walls, &mut state.blossom_ring] {
        layer.retain(|_, timers| {
            timers[seat] = timers[seat].saturating_sub(1);
            timers.player1 > 0 || timers.player2 > 0
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================
