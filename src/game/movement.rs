//! Movement
//!
//! Walking a unit across the board. Paths go around hard walls; blossom
//! layers and petal auras are passable.

use tracing::debug;

use crate::game::board::TileId;
use crate::game::events::GameEventData;
use crate::game::intent::ActionError;
use crate::game::state::{MatchState, Seat, UnitId};
use crate::game::turn::maybe_end_turn;

/// Steps for a unit's first move of the match.
pub const FIRST_MOVE_STEPS: u32 = 2;

/// Steps for every later move.
pub const MOVE_STEPS: u32 = 1;

/// Step allowance for a unit this turn.
pub fn step_allowance(state: &MatchState, seat: Seat, unit_id: UnitId) -> u32 {
    let Some(token) = state.tokens.get(&unit_id) else {
        return 0;
    };
    let mut steps = if token.has_moved_ever {
        MOVE_STEPS
    } else {
        FIRST_MOVE_STEPS
    };
    steps += state.turn_state[seat].move_buff.steps_bonus;
    if let Some(ch) = state.characters.get(&unit_id) {
        steps += ch.fx.move_bonus_this_turn;
        if ch.fx.is_transformed() {
            steps += 1;
        }
    }
    steps
}

/// Move one of `seat`'s units to `to_tile`. Consumes the movement resource.
pub fn request_move(
    state: &mut MatchState,
    seat: Seat,
    unit_id: UnitId,
    to_tile: TileId,
) -> Result<(), ActionError> {
    let token = state.tokens.get(&unit_id).ok_or(ActionError::UnknownUnit(unit_id))?;
    if !state.board.contains(to_tile) {
        return Err(ActionError::UnknownTile(to_tile));
    }
    if token.owner != seat {
        return Err(ActionError::NotOwner(unit_id));
    }

    let invalid = |reason: &str| ActionError::InvalidMove {
        unit_id,
        reason: reason.to_string(),
    };

    if state.turn_state[seat].used_movement {
        return Err(invalid("movement already used"));
    }
    if state
        .characters
        .get(&unit_id)
        .is_some_and(|ch| ch.fx.is_rooted())
    {
        return Err(invalid("rooted"));
    }
    if state.walls.contains_key(&to_tile) {
        return Err(invalid("tile walled"));
    }
    if state.is_occupied(to_tile) {
        return Err(invalid("tile occupied"));
    }

    let from = token.tile;
    let steps = step_allowance(state, seat, unit_id);
    let buff = state.turn_state[seat].move_buff;
    let distance = state
        .board
        .shortest_distance(from, to_tile, Some(&state.wall_set()))
        .ok_or_else(|| invalid("unreachable"))?;

    if distance > steps {
        return Err(invalid("too far"));
    }
    if distance < buff.min_steps {
        return Err(invalid("too close"));
    }

    // Apply
    if let Some(token) = state.tokens.get_mut(&unit_id) {
        token.tile = to_tile;
        token.has_moved_ever = true;
    }
    state.turn_state[seat].used_movement = true;

    debug!(unit = %unit_id, %from, to = %to_tile, distance, "unit moved");
    state.push_event(GameEventData::UnitMoved {
        unit_id,
        seat,
        to_tile,
    });
    maybe_end_turn(state, seat);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
