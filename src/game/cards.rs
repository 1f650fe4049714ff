//! Cards
//!
//! Status, movement and board cards. One card per turn; each card also
//! checks the per-turn resource it consumes and its energy cost before
//! anything changes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::ability::{
    check_energy, living_target, owned_unit, require_ally, require_enemy, spend_energy,
};
use crate::game::board::TileId;
use crate::game::events::{CardDetail, GameEventData};
use crate::game::hero::CardKind;
use crate::game::intent::ActionError;
use crate::game::state::{
    MatchState, PerSeat, Seat, StatusEffects, StatusTimer, UnitId, BLOSSOM_TTL, ENERGY_MAX, WALL_TTL,
};
use crate::game::turn::maybe_end_turn;

/// Fireball: damage per tick and ticks.
pub const FIREBALL_DOT: StatusTimer = StatusTimer::new(3, 2);

/// Entangle: ticks of root.
pub const ENTANGLE_ROOT: StatusTimer = StatusTimer::new(3, 0);

/// Iron Skin: ticks and flat reduction.
pub const IRON_SKIN: StatusTimer = StatusTimer::new(2, 2);

/// Energy Siphon: gained by the caster.
pub const SIPHON_GAIN: u32 = 1;

/// Energy Siphon: drained from the opponent.
pub const SIPHON_STEAL: u32 = 3;

/// Teleport: maximum unblocked distance.
pub const TELEPORT_RANGE: u32 = 3;

/// A play-card request with every optional argument a card may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRequest {
    pub card: CardKind,
    #[serde(default)]
    pub tile: Option<TileId>,
    #[serde(default)]
    pub source_id: Option<UnitId>,
    #[serde(default)]
    pub to_tile: Option<TileId>,
    #[serde(default)]
    pub target_id: Option<UnitId>,
}

impl CardRequest {
    pub fn new(card: CardKind) -> Self {
        Self {
            card,
            tile: None,
            source_id: None,
            to_tile: None,
            target_id: None,
        }
    }
}

/// Per-turn resource a card consumes besides the card slot itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Consumes {
    Action,
    Movement,
    Nothing,
}

/// A validated card, ready to apply.
#[derive(Debug)]
enum CardPlan {
    Status { target: UnitId, fx: StatusEdit },
    Siphon,
    MoveBuff { steps_bonus: u32, min_steps: u32 },
    Scout,
    Wall { tile: TileId },
    BlossomWall { tile: TileId, ring: Vec<TileId> },
    Shatter { tile: TileId },
    Teleport { unit_id: UnitId, to_tile: TileId },
}

#[derive(Debug, Clone, Copy)]
enum StatusEdit {
    Burn,
    Root,
    IronSkin,
    Cleanse,
}

fn consumes(card: CardKind) -> Option<Consumes> {
    let kind = match card {
        CardKind::Fireball
        | CardKind::Entangle
        | CardKind::Cleanse
        | CardKind::IronSkin
        | CardKind::Scout
        | CardKind::Wall
        | CardKind::BlossomWall
        | CardKind::Shatter => Consumes::Action,
        CardKind::Sprint | CardKind::Dash | CardKind::Blink | CardKind::Teleport => Consumes::Movement,
        CardKind::Siphon => Consumes::Nothing,
        // Paid through a hero special, never played from hand
        CardKind::SkillCheck
        | CardKind::Swap
        | CardKind::Fmj
        | CardKind::VoodooDoll
        | CardKind::PolarAttraction
        | CardKind::HealingPetal
        | CardKind::Transform => return None,
    };
    Some(kind)
}

/// Play a card for `seat`.
pub fn play_card(state: &mut MatchState, seat: Seat, request: &CardRequest) -> Result<(), ActionError> {
    let card = request.card;
    if state.turn_state[seat].card_played {
        return Err(ActionError::CardAlreadyPlayed);
    }
    let uses = consumes(card).ok_or(ActionError::NotPlayable(card))?;
    let ts = state.turn_state[seat];
    match uses {
        Consumes::Action if ts.used_action => return Err(ActionError::ActionUsed),
        Consumes::Movement if ts.used_movement => return Err(ActionError::MovementUsed),
        _ => {}
    }
    check_energy(state, seat, card)?;

    let plan = plan_card(state, seat, request)?;

    // Apply
    if card != CardKind::Siphon {
        spend_energy(state, seat, card);
    }
    let ts = &mut state.turn_state[seat];
    ts.card_played = true;
    match uses {
        Consumes::Action => ts.used_action = true,
        // Movement cards only modify the upcoming move; teleport is the move
        Consumes::Movement if card == CardKind::Teleport => ts.used_movement = true,
        _ => {}
    }
    state.last_discard[seat] = Some(card.as_str().to_string());

    apply_card(state, seat, request, plan);
    debug!(%seat, %card, "card played");
    maybe_end_turn(state, seat);
    Ok(())
}

fn plan_card(state: &MatchState, seat: Seat, request: &CardRequest) -> Result<CardPlan, ActionError> {
    let required_tile = || -> Result<TileId, ActionError> {
        let tile = request.tile.ok_or(ActionError::InvalidTarget("tile required"))?;
        if !state.board.contains(tile) {
            return Err(ActionError::UnknownTile(tile));
        }
        Ok(tile)
    };

    let plan = match request.card {
        CardKind::Fireball => CardPlan::Status {
            target: require_enemy(state, seat, request.target_id)?,
            fx: StatusEdit::Burn,
        },
        CardKind::Entangle => CardPlan::Status {
            target: require_enemy(state, seat, request.target_id)?,
            fx: StatusEdit::Root,
        },
        CardKind::IronSkin => CardPlan::Status {
            target: require_ally(state, seat, request.target_id)?,
            fx: StatusEdit::IronSkin,
        },
        CardKind::Cleanse => CardPlan::Status {
            target: living_target(state, request.target_id)?.0,
            fx: StatusEdit::Cleanse,
        },
        CardKind::Siphon => CardPlan::Siphon,
        CardKind::Sprint => CardPlan::MoveBuff {
            steps_bonus: 1,
            min_steps: 0,
        },
        CardKind::Dash => CardPlan::MoveBuff {
            steps_bonus: 2,
            min_steps: 0,
        },
        CardKind::Blink => CardPlan::MoveBuff {
            steps_bonus: 0,
            min_steps: 2,
        },
        CardKind::Scout => CardPlan::Scout,
        CardKind::Wall => {
            let tile = required_tile()?;
            if state.walls.contains_key(&tile) {
                return Err(ActionError::TileWalled(tile));
            }
            if state.is_occupied(tile) {
                return Err(ActionError::TileOccupied(tile));
            }
            CardPlan::Wall { tile }
        }
        CardKind::BlossomWall => {
            let tile = required_tile()?;
            if state.walls.contains_key(&tile) {
                return Err(ActionError::TileWalled(tile));
            }
            let ring = state
                .board
                .neighbors(tile)
                .iter()
                .copied()
                .filter(|n| !state.walls.contains_key(n))
                .collect();
            CardPlan::BlossomWall { tile, ring }
        }
        CardKind::Shatter => {
            let tile = required_tile()?;
            if !state.walls.contains_key(&tile) {
                return Err(ActionError::NoWall(tile));
            }
            CardPlan::Shatter { tile }
        }
        CardKind::Teleport => {
            let unit_id = request
                .source_id
                .ok_or(ActionError::InvalidTarget("unit required"))?;
            let from = owned_unit(state, seat, unit_id)?;
            if state.characters.get(&unit_id).is_some_and(|c| c.fx.is_rooted()) {
                return Err(ActionError::InvalidMove {
                    unit_id,
                    reason: "rooted".to_string(),
                });
            }
            let to_tile = request
                .to_tile
                .ok_or(ActionError::InvalidTarget("destination required"))?;
            if !state.board.contains(to_tile) {
                return Err(ActionError::UnknownTile(to_tile));
            }
            let distance = state.board.shortest_distance(from, to_tile, None);
            if !distance.is_some_and(|d| d <= TELEPORT_RANGE) {
                return Err(ActionError::OutOfRange {
                    distance,
                    range: TELEPORT_RANGE,
                });
            }
            if state.is_occupied(to_tile) {
                return Err(ActionError::TileOccupied(to_tile));
            }
            CardPlan::Teleport { unit_id, to_tile }
        }
        other => return Err(ActionError::NotPlayable(other)),
    };
    Ok(plan)
}

fn apply_card(state: &mut MatchState, seat: Seat, request: &CardRequest, plan: CardPlan) {
    let card = request.card.as_str().to_string();
    let mut detail = CardDetail::default();
    let mut moved = None;

    match plan {
        CardPlan::Status { target, fx } => {
            if let Some(ch) = state.characters.get_mut(&target) {
                match fx {
                    StatusEdit::Burn => ch.fx.fire_dot = Some(FIREBALL_DOT),
                    StatusEdit::Root => ch.fx.entangle = Some(ENTANGLE_ROOT),
                    StatusEdit::IronSkin => ch.fx.iron_skin = Some(IRON_SKIN),
                    StatusEdit::Cleanse => ch.fx = StatusEffects::default(),
                }
            }
            detail.target_id = Some(target);
        }
        CardPlan::Siphon => {
            let mine = state.energy[seat];
            let theirs = state.energy[seat.other()];
            state.energy[seat] = (mine + SIPHON_GAIN).min(ENERGY_MAX);
            state.energy[seat.other()] = theirs.saturating_sub(SIPHON_STEAL);
            detail.gain = Some(state.energy[seat] - mine);
            detail.steal = Some(theirs - state.energy[seat.other()]);
        }
        CardPlan::MoveBuff {
            steps_bonus,
            min_steps,
        } => {
            let buff = &mut state.turn_state[seat].move_buff;
            buff.steps_bonus += steps_bonus;
            buff.min_steps = buff.min_steps.max(min_steps);
            if steps_bonus > 0 {
                detail.steps_bonus = Some(steps_bonus);
            }
            if min_steps > 0 {
                detail.min_steps = Some(min_steps);
            }
        }
        CardPlan::Scout => {}
        CardPlan::Wall { tile } => {
            state.walls.insert(tile, WALL_TTL);
            detail.tile = Some(tile);
        }
        CardPlan::BlossomWall { tile, ring } => {
            state.blossom_walls.entry(tile).or_insert_with(PerSeat::default)[seat] = BLOSSOM_TTL;
            for n in ring {
                state.blossom_ring.entry(n).or_insert_with(PerSeat::default)[seat] = BLOSSOM_TTL;
            }
            detail.tile = Some(tile);
        }
        CardPlan::Shatter { tile } => {
            state.walls.remove(&tile);
            detail.tile = Some(tile);
        }
        CardPlan::Teleport { unit_id, to_tile } => {
            if let Some(token) = state.tokens.get_mut(&unit_id) {
                token.tile = to_tile;
                token.has_moved_ever = true;
            }
            detail.source_id = Some(unit_id);
            detail.to_tile = Some(to_tile);
            moved = Some((unit_id, to_tile));
        }
    }

    state.push_event(GameEventData::CardPlayed { card, seat, detail });
    if let Some((unit_id, to_tile)) = moved {
        state.push_event(GameEventData::UnitMoved {
            unit_id,
            seat,
            to_tile,
        });
    }
}

/// Show a card without playing it. Only checks that it is affordable.
pub fn reveal_card(state: &mut MatchState, seat: Seat, card: CardKind) -> Result<(), ActionError> {
    check_energy(state, seat, card)?;
    state.last_discard[seat] = Some(card.as_str().to_string());
    state.push_event(GameEventData::CardRevealed {
        card: card.as_str().to_string(),
        seat,
    });
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
