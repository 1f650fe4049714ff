//! Ability Resolution
//!
//! Primaries and specials. Each use is fully validated into a plan before
//! anything is mutated; energy is charged only once every check passes.

use tracing::debug;

use crate::core::vec2::angle_difference;
use crate::game::board::TileId;
use crate::game::combat::{apply_damage, apply_heal};
use crate::game::events::{AbilityDetail, AbilityKind, CardDetail, GameEventData};
use crate::game::hero::{kit_for, AbilityDef, AbilityEffect, CardKind};
use crate::game::intent::ActionError;
use crate::game::state::{MatchState, PendingBonus, PetalAura, Seat, StatusTimer, UnitId};
use crate::game::turn::maybe_end_turn;

/// Flat damage bonus while transformed.
pub const TRANSFORM_DAMAGE_BONUS: u32 = 2;

/// Discard label of a transformed unit's primary.
pub const BEAR_CLAW: &str = "Bear Claw";

/// Radius of a Healing Petal aura around its centre.
pub const PETAL_RADIUS: u32 = 1;

// =============================================================================
// SHARED VALIDATION
// =============================================================================

/// Tile of a living unit owned by `seat`.
pub(crate) fn owned_unit(state: &MatchState, seat: Seat, id: UnitId) -> Result<TileId, ActionError> {
    let token = state.tokens.get(&id).ok_or(ActionError::UnknownUnit(id))?;
    if token.owner != seat {
        return Err(ActionError::NotOwner(id));
    }
    Ok(token.tile)
}

/// A living target and its owner.
pub(crate) fn living_target(
    state: &MatchState,
    id: Option<UnitId>,
) -> Result<(UnitId, Seat), ActionError> {
    let id = id.ok_or(ActionError::InvalidTarget("target required"))?;
    let token = state.tokens.get(&id).ok_or(ActionError::UnknownUnit(id))?;
    Ok((id, token.owner))
}

pub(crate) fn require_enemy(
    state: &MatchState,
    seat: Seat,
    id: Option<UnitId>,
) -> Result<UnitId, ActionError> {
    match living_target(state, id)? {
        (id, owner) if owner != seat => Ok(id),
        _ => Err(ActionError::InvalidTarget("target must be an enemy")),
    }
}

pub(crate) fn require_ally(
    state: &MatchState,
    seat: Seat,
    id: Option<UnitId>,
) -> Result<UnitId, ActionError> {
    match living_target(state, id)? {
        (id, owner) if owner == seat => Ok(id),
        _ => Err(ActionError::InvalidTarget("target must be an ally")),
    }
}

/// Can `seat` afford `card`?
pub(crate) fn check_energy(state: &MatchState, seat: Seat, card: CardKind) -> Result<(), ActionError> {
    let have = state.energy[seat];
    let required = card.cost();
    if have < required {
        return Err(ActionError::InsufficientEnergy {
            card: card.as_str().to_string(),
            have,
            required,
        });
    }
    Ok(())
}

pub(crate) fn spend_energy(state: &mut MatchState, seat: Seat, card: CardKind) {
    state.energy[seat] = state.energy[seat].saturating_sub(card.cost());
}

/// Range rule of an ability: at most `range`, or exactly `range`.
fn check_range(distance: Option<u32>, def: &AbilityDef) -> Result<(), ActionError> {
    let range = def.range;
    if def.exact_range {
        if distance != Some(range) {
            return Err(ActionError::NotExactRange { distance, range });
        }
    } else if !distance.is_some_and(|d| d <= range) {
        return Err(ActionError::OutOfRange { distance, range });
    }
    Ok(())
}

/// Record the discard and broadcast the ability and its card.
#[allow(clippy::too_many_arguments)]
fn finish(
    state: &mut MatchState,
    seat: Seat,
    ability: AbilityKind,
    source_id: UnitId,
    target_id: Option<UnitId>,
    def: &AbilityDef,
    detail: AbilityDetail,
    label: String,
) {
    debug!(unit = %source_id, ability = def.name, %label, "ability used");
    state.last_discard[seat] = Some(label.clone());
    state.push_event(GameEventData::AbilityUsed {
        ability,
        source_id,
        target_id,
        name: def.name.to_string(),
        detail,
    });
    state.push_event(GameEventData::CardPlayed {
        card: label,
        seat,
        detail: CardDetail {
            source_id: Some(source_id),
            target_id,
            ..CardDetail::default()
        },
    });
    maybe_end_turn(state, seat);
}

// =============================================================================
// PRIMARY
// =============================================================================

/// Use a unit's primary. Consumes the action.
pub fn use_primary(
    state: &mut MatchState,
    seat: Seat,
    source_id: UnitId,
    target_id: Option<UnitId>,
) -> Result<(), ActionError> {
    let source_tile = owned_unit(state, seat, source_id)?;
    if state.turn_state[seat].used_action {
        return Err(ActionError::ActionUsed);
    }

    let ch = state
        .characters
        .get(&source_id)
        .ok_or(ActionError::UnknownUnit(source_id))?;
    let def = kit_for(ch.role, &ch.name).primary;
    let transformed = ch.fx.is_transformed();
    let attack_bonus = ch.fx.attack_bonus_this_turn;
    let skill_check_pending = ch.fx.skill_check_next.is_some();

    let mut detail = AbilityDetail::default();
    let mut label = if transformed {
        BEAR_CLAW.to_string()
    } else {
        def.name.to_string()
    };
    let mut target = None;

    match def.effect {
        AbilityEffect::Aoe { amount, radius } => {
            let walls = state.wall_set();
            let victims: Vec<UnitId> = state
                .tokens
                .iter()
                .filter(|(_, t)| t.owner != seat)
                .filter(|(_, t)| {
                    state
                        .board
                        .shortest_distance(source_tile, t.tile, Some(&walls))
                        .is_some_and(|d| d <= radius)
                })
                .map(|(id, _)| *id)
                .collect();

            for id in victims {
                if state.is_ended() {
                    break;
                }
                apply_damage(state, id, amount + attack_bonus);
                detail.hits.push(id);
            }
        }
        AbilityEffect::Damage { amount } => {
            let id = require_enemy(state, seat, target_id)?;
            check_range(state.unit_distance(source_id, id, true), &def)?;
            let bear = if transformed { TRANSFORM_DAMAGE_BONUS } else { 0 };
            apply_damage(state, id, amount + attack_bonus + bear);
            target = Some(id);
        }
        AbilityEffect::RandomDamage { sides } => {
            let id = require_enemy(state, seat, target_id)?;
            check_range(state.unit_distance(source_id, id, true), &def)?;
            let rolled = state.rng.roll(sides);
            let damage = rolled + u32::from(attack_bonus > 0 || skill_check_pending);
            label = if attack_bonus > 0 {
                format!("{}SC-{}", def.name, damage.clamp(2, sides + 1))
            } else {
                format!("{}-{}", def.name, damage.clamp(1, sides))
            };
            apply_damage(state, id, damage);
            detail.rolled = Some(rolled);
            target = Some(id);
        }
        AbilityEffect::Heal { amount } => {
            let id = require_ally(state, seat, target_id)?;
            check_range(state.unit_distance(source_id, id, true), &def)?;
            apply_heal(state, id, amount);
            target = Some(id);
        }
        _ => return Err(ActionError::InvalidTarget("not usable as a primary")),
    }

    state.turn_state[seat].used_action = true;
    finish(
        state,
        seat,
        AbilityKind::Primary,
        source_id,
        target,
        &def,
        detail,
        label,
    );
    Ok(())
}

// =============================================================================
// SPECIAL
// =============================================================================

/// A validated special, ready to apply.
#[derive(Debug)]
enum SpecialPlan {
    Damage { target: UnitId, amount: u32 },
    Heal { target: UnitId, amount: u32 },
    Buff { target: UnitId, bonus: PendingBonus },
    Transform { turns: u32 },
    Redirect { turns: u32 },
    Fmj {
        target: UnitId,
        amount: u32,
        tiles: Vec<TileId>,
        victims: Vec<UnitId>,
    },
    Polar { pulls: Vec<(UnitId, TileId)> },
    Swap { target: UnitId },
    Petal { aura: PetalAura },
}

/// Use a unit's special.
///
/// Swap consumes movement; everything else consumes the action.
pub fn use_special(
    state: &mut MatchState,
    seat: Seat,
    source_id: UnitId,
    target_id: Option<UnitId>,
    tile: Option<TileId>,
) -> Result<(), ActionError> {
    let source_tile = owned_unit(state, seat, source_id)?;
    let ch = state
        .characters
        .get(&source_id)
        .ok_or(ActionError::UnknownUnit(source_id))?;
    let def = kit_for(ch.role, &ch.name).special;
    let cooldown_left = ch.special_cooldown;
    let ts = state.turn_state[seat];

    let uses_movement = matches!(def.effect, AbilityEffect::Swap);
    if uses_movement {
        if ts.used_movement {
            return Err(ActionError::MovementUsed);
        }
    } else if ts.used_action {
        return Err(ActionError::ActionUsed);
    }
    if cooldown_left > 0 {
        return Err(ActionError::OnCooldown(cooldown_left));
    }
    if def.requires_moved && !ts.used_movement {
        return Err(ActionError::MustMoveFirst);
    }
    if let Some(card) = def.cost {
        check_energy(state, seat, card)?;
    }

    let plan = plan_special(state, seat, source_id, source_tile, &def, target_id, tile)?;

    // Apply
    if let Some(card) = def.cost {
        spend_energy(state, seat, card);
    }
    if let Some(ch) = state.characters.get_mut(&source_id) {
        ch.special_cooldown = def.cooldown;
    }
    if matches!(plan, SpecialPlan::Buff { .. } | SpecialPlan::Transform { .. }) {
        state.turn_state[seat].card_played = true;
    }
    let (target, detail) = apply_special(state, seat, source_id, plan);

    if uses_movement {
        state.turn_state[seat].used_movement = true;
    } else {
        state.turn_state[seat].used_action = true;
    }
    finish(
        state,
        seat,
        AbilityKind::Special,
        source_id,
        target,
        &def,
        detail,
        def.name.to_string(),
    );
    Ok(())
}

fn plan_special(
    state: &MatchState,
    seat: Seat,
    source_id: UnitId,
    source_tile: TileId,
    def: &AbilityDef,
    target_id: Option<UnitId>,
    tile: Option<TileId>,
) -> Result<SpecialPlan, ActionError> {
    let fx = state.characters.get(&source_id).map(|c| c.fx.clone()).unwrap_or_default();

    let plan = match def.effect {
        AbilityEffect::Damage { amount } => {
            let target = require_enemy(state, seat, target_id)?;
            check_range(state.unit_distance(source_id, target, true), def)?;
            let bear = if fx.is_transformed() {
                TRANSFORM_DAMAGE_BONUS
            } else {
                0
            };
            SpecialPlan::Damage {
                target,
                amount: amount + fx.attack_bonus_this_turn + bear,
            }
        }
        AbilityEffect::Heal { amount } => {
            let target = require_ally(state, seat, target_id)?;
            check_range(state.unit_distance(source_id, target, true), def)?;
            SpecialPlan::Heal { target, amount }
        }
        AbilityEffect::Buff { attack, movement } => {
            let target = require_ally(state, seat, target_id)?;
            check_range(state.unit_distance(source_id, target, true), def)?;
            SpecialPlan::Buff {
                target,
                bonus: PendingBonus { attack, movement },
            }
        }
        AbilityEffect::Transform { turns } => SpecialPlan::Transform { turns },
        AbilityEffect::Redirect { turns } => SpecialPlan::Redirect { turns },
        AbilityEffect::Fmj { amount } => {
            let target = require_enemy(state, seat, target_id)?;
            check_range(state.unit_distance(source_id, target, false), def)?;
            let target_tile = state.tokens.get(&target).map(|t| t.tile).unwrap_or(source_tile);
            let tiles = state.board.tiles_on_segment(source_tile, target_tile);
            let victims = tiles
                .iter()
                .filter_map(|t| state.unit_at(*t))
                .filter(|id| id.seat != seat)
                .collect();
            SpecialPlan::Fmj {
                target,
                amount,
                tiles,
                victims,
            }
        }
        AbilityEffect::Polar { radius } => SpecialPlan::Polar {
            pulls: plan_polar(state, seat, source_tile, radius),
        },
        AbilityEffect::Swap => {
            let (target, _) = living_target(state, target_id)?;
            if target == source_id {
                return Err(ActionError::InvalidTarget("cannot swap with itself"));
            }
            SpecialPlan::Swap { target }
        }
        AbilityEffect::Petal {
            center_heal,
            ring_heal,
            turns,
        } => {
            let center = match (tile, target_id) {
                (Some(tile), _) => tile,
                (None, Some(_)) => {
                    let (target, _) = living_target(state, target_id)?;
                    state
                        .tokens
                        .get(&target)
                        .map(|t| t.tile)
                        .ok_or(ActionError::UnknownUnit(target))?
                }
                (None, None) => return Err(ActionError::InvalidTarget("tile required")),
            };
            if !state.board.contains(center) {
                return Err(ActionError::UnknownTile(center));
            }
            SpecialPlan::Petal {
                aura: PetalAura {
                    owner: seat,
                    center,
                    tiles: state.board.tiles_within(center, PETAL_RADIUS),
                    remaining: turns,
                    center_heal,
                    ring_heal,
                },
            }
        }
        AbilityEffect::RandomDamage { .. } | AbilityEffect::Aoe { .. } => {
            return Err(ActionError::InvalidTarget("not usable as a special"));
        }
    };
    Ok(plan)
}

/// Pull assignment for Polar Attraction.
///
/// Open slots are the source's unwalled, unoccupied neighbours; eligible
/// enemies are within `radius` (around walls), not adjacent and not rooted.
/// Both lists are sorted by angle around the source and matched by the
/// cyclic rotation with the least total angular displacement.
fn plan_polar(state: &MatchState, seat: Seat, source_tile: TileId, radius: u32) -> Vec<(UnitId, TileId)> {
    let board = &state.board;
    let Some(origin) = board.position(source_tile) else {
        return Vec::new();
    };
    let angle_of = |tile: TileId| board.position(tile).map_or(0.0, |p| p.angle_from(origin));

    let mut slots: Vec<(f64, TileId)> = board
        .neighbors(source_tile)
        .iter()
        .copied()
        .filter(|t| !state.walls.contains_key(t) && !state.is_occupied(*t))
        .map(|t| (angle_of(t), t))
        .collect();
    slots.sort_by(|a, b| a.0.total_cmp(&b.0));

    let walls = state.wall_set();
    let mut eligible: Vec<(f64, UnitId)> = state
        .tokens
        .iter()
        .filter(|(_, t)| t.owner != seat)
        .filter(|(id, _)| !state.characters.get(*id).is_some_and(|c| c.fx.is_rooted()))
        .filter(|(_, t)| {
            board
                .shortest_distance(source_tile, t.tile, Some(&walls))
                .is_some_and(|d| d > 1 && d <= radius)
        })
        .map(|(id, t)| (angle_of(t.tile), *id))
        .collect();
    eligible.sort_by(|a, b| a.0.total_cmp(&b.0));

    if slots.is_empty() || eligible.is_empty() {
        return Vec::new();
    }
    eligible.truncate(slots.len());

    let m = slots.len();
    let enemy_angles: Vec<f64> = eligible.iter().map(|(a, _)| *a).collect();
    let slot_angles: Vec<f64> = slots.iter().map(|(a, _)| *a).collect();
    let best = best_rotation(&enemy_angles, &slot_angles);

    eligible
        .iter()
        .enumerate()
        .map(|(i, (_, id))| (*id, slots[(i + best) % m].1))
        .collect()
}

/// Cyclic offset into `slots` that minimises the summed angular distance
/// when `enemies[i]` takes `slots[(i + r) % len]`. Ties keep the smallest
/// offset.
fn best_rotation(enemies: &[f64], slots: &[f64]) -> usize {
    let m = slots.len();
    if m == 0 {
        return 0;
    }
    let displacement = |r: usize| -> f64 {
        enemies
            .iter()
            .enumerate()
            .map(|(i, angle)| angle_difference(*angle, slots[(i + r) % m]))
            .sum()
    };
    (0..m)
        .min_by(|a, b| displacement(*a).total_cmp(&displacement(*b)))
        .unwrap_or(0)
}

fn apply_special(
    state: &mut MatchState,
    seat: Seat,
    source_id: UnitId,
    plan: SpecialPlan,
) -> (Option<UnitId>, AbilityDetail) {
    let mut detail = AbilityDetail::default();

    let target = match plan {
        SpecialPlan::Damage { target, amount } => {
            apply_damage(state, target, amount);
            Some(target)
        }
        SpecialPlan::Heal { target, amount } => {
            apply_heal(state, target, amount);
            Some(target)
        }
        SpecialPlan::Buff { target, bonus } => {
            if let Some(ch) = state.characters.get_mut(&target) {
                ch.fx.skill_check_next = Some(bonus);
            }
            detail.attack_bonus = Some(bonus.attack);
            detail.move_bonus = Some(bonus.movement);
            Some(target)
        }
        SpecialPlan::Transform { turns } => {
            if let Some(ch) = state.characters.get_mut(&source_id) {
                ch.fx.bear = Some(StatusTimer::new(turns, 0));
            }
            Some(source_id)
        }
        SpecialPlan::Redirect { turns } => {
            if let Some(ch) = state.characters.get_mut(&source_id) {
                ch.fx.redirect = Some(StatusTimer::new(turns, 0));
            }
            Some(source_id)
        }
        SpecialPlan::Fmj {
            target,
            amount,
            tiles,
            victims,
        } => {
            for id in victims {
                if state.is_ended() {
                    break;
                }
                apply_damage(state, id, amount);
                detail.hits.push(id);
            }
            detail.tiles = tiles;
            Some(target)
        }
        SpecialPlan::Polar { pulls } => {
            for (id, to_tile) in pulls {
                let Some(token) = state.tokens.get_mut(&id) else {
                    continue;
                };
                token.tile = to_tile;
                let owner = token.owner;
                state.push_event(GameEventData::UnitMoved {
                    unit_id: id,
                    seat: owner,
                    to_tile,
                });
                detail.hits.push(id);
            }
            None
        }
        SpecialPlan::Swap { target } => {
            swap_units(state, source_id, target);
            Some(target)
        }
        SpecialPlan::Petal { aura } => {
            detail.center_tile = Some(aura.center);
            detail.tiles = aura.tiles.clone();
            debug!(%seat, center = %aura.center, "petal aura placed");
            state.petal_auras.push(aura);
            None
        }
    };
    (target, detail)
}

/// Exchange tiles; the source's root moves to the unit it swapped with.
fn swap_units(state: &mut MatchState, source_id: UnitId, target_id: UnitId) {
    let (Some(source), Some(target)) = (
        state.tokens.get(&source_id).map(|t| (t.tile, t.owner)),
        state.tokens.get(&target_id).map(|t| (t.tile, t.owner)),
    ) else {
        return;
    };

    if let Some(t) = state.tokens.get_mut(&source_id) {
        t.tile = target.0;
    }
    if let Some(t) = state.tokens.get_mut(&target_id) {
        t.tile = source.0;
    }

    let root = state
        .characters
        .get_mut(&source_id)
        .and_then(|c| c.fx.entangle.take());
    if let Some(root) = root {
        if let Some(c) = state.characters.get_mut(&target_id) {
            c.fx.entangle = Some(root);
        }
    }

    state.push_event(GameEventData::UnitMoved {
        unit_id: source_id,
        seat: source.1,
        to_tile: target.0,
    });
    state.push_event(GameEventData::UnitMoved {
        unit_id: target_id,
        seat: target.1,
        to_tile: source.0,
    });
}

// =============================================================================
// TESTS
// =============================================================================
