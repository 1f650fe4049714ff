//! Damage, Healing and Win Condition
//!
//! Shared by abilities, cards and start-of-turn damage over time. Damage
//! resolves in a fixed order: redirect, transform halving (rounded up),
//! flat Iron Skin reduction, then death or the Dungeon Master saving throw.

use tracing::{debug, info};

use crate::game::events::{CardDetail, GameEventData, HealthCause};
use crate::game::hero::DUNGEON_MASTER;
use crate::game::state::{MatchPhase, MatchState, Seat, UnitId};

/// HP restored by a successful saving throw (capped by max HP).
pub const SAVING_THROW_HP: u32 = 3;

/// Die size for the saving throw; only the top face succeeds.
pub const SAVING_THROW_SIDES: u32 = 3;

/// Discard label recorded when a saving throw succeeds.
pub const SAVING_THROW_CARD: &str = "Saving Throw";

/// First living teammate of `target` with an active redirect, in id order.
fn find_redirector(state: &MatchState, target: UnitId) -> Option<UnitId> {
    let owner = state.tokens.get(&target)?.owner;
    state
        .characters
        .iter()
        .filter(|(id, _)| **id != target)
        .filter(|(id, _)| state.tokens.get(*id).is_some_and(|t| t.owner == owner))
        .find(|(_, ch)| !ch.dead && ch.fx.is_redirecting())
        .map(|(id, _)| *id)
}

/// Apply damage to a unit. No effect once the match is over.
///
/// Returns the unit that actually took the damage.
pub fn apply_damage(state: &mut MatchState, target: UnitId, amount: u32) -> Option<UnitId> {
    if state.is_ended() {
        return None;
    }

    let target = find_redirector(state, target).unwrap_or(target);

    let ch = state.characters.get_mut(&target)?;
    if ch.dead {
        return None;
    }

    let mut effective = amount;
    if ch.fx.is_transformed() {
        effective = effective.div_ceil(2);
    }
    effective = effective.saturating_sub(ch.fx.iron_skin_reduction());

    let previous = ch.hp;
    ch.hp = ch.hp.saturating_sub(effective);
    let hp = ch.hp;
    let is_dungeon_master = ch.name == DUNGEON_MASTER;
    let owner = ch.owner;

    debug!(unit = %target, amount, effective, hp, "damage");
    state.push_event(GameEventData::HealthChanged {
        unit_id: target,
        hp,
        previous,
        cause: HealthCause::Damage,
    });

    if hp > 0 {
        return Some(target);
    }

    if is_dungeon_master && saving_throw(state, target, owner) {
        return Some(target);
    }

    if let Some(ch) = state.characters.get_mut(&target) {
        ch.dead = true;
    }
    state.tokens.remove(&target);
    debug!(unit = %target, "unit died");
    state.push_event(GameEventData::UnitDied { unit_id: target });
    check_game_over(state);

    Some(target)
}

/// Roll the saving throw for a downed Dungeon Master. Returns true if revived.
fn saving_throw(state: &mut MatchState, target: UnitId, owner: Seat) -> bool {
    let roll = state.rng.roll(SAVING_THROW_SIDES);
    let success = roll == SAVING_THROW_SIDES;

    state.push_event(GameEventData::SavingThrowRolled {
        unit_id: target,
        roll,
        success,
    });
    if !success {
        return false;
    }

    let Some(ch) = state.characters.get_mut(&target) else {
        return false;
    };
    ch.hp = SAVING_THROW_HP.min(ch.max_hp);
    ch.dead = false;
    let hp = ch.hp;

    debug!(unit = %target, hp, "saving throw succeeded");
    state.push_event(GameEventData::HealthChanged {
        unit_id: target,
        hp,
        previous: 0,
        cause: HealthCause::Heal,
    });

    state.last_discard[owner] = Some(SAVING_THROW_CARD.to_string());
    state.push_event(GameEventData::CardRevealed {
        card: SAVING_THROW_CARD.to_string(),
        seat: owner,
    });
    state.push_event(GameEventData::CardPlayed {
        card: SAVING_THROW_CARD.to_string(),
        seat: owner,
        detail: CardDetail::default(),
    });
    true
}

/// Heal a living unit, clamped to its max HP.
pub fn apply_heal(state: &mut MatchState, target: UnitId, amount: u32) {
    let Some(ch) = state.characters.get_mut(&target) else {
        return;
    };
    if ch.dead {
        return;
    }

    let previous = ch.hp;
    ch.hp = ch.hp.saturating_add(amount).min(ch.max_hp);
    let hp = ch.hp;

    debug!(unit = %target, amount, hp, "heal");
    state.push_event(GameEventData::HealthChanged {
        unit_id: target,
        hp,
        previous,
        cause: HealthCause::Heal,
    });
}

/// End the match if exactly one seat still has units on the board.
pub fn check_game_over(state: &mut MatchState) {
    if state.is_ended() {
        return;
    }

    let alive_1 = state.units_of(Seat::Player1).count();
    let alive_2 = state.units_of(Seat::Player2).count();

    let winner = match (alive_1, alive_2) {
        (0, n) if n > 0 => Seat::Player2,
        (n, 0) if n > 0 => Seat::Player1,
        _ => return,
    };
    declare_winner(state, winner);
}

/// Freeze the match with `winner` as victor. Idempotent.
pub fn declare_winner(state: &mut MatchState, winner: Seat) {
    if state.is_ended() {
        return;
    }
    state.phase = MatchPhase::Ended;
    state.winner = Some(winner);
    info!(match_id = %state.match_id, %winner, "game over");
    state.push_event(GameEventData::GameOver { winner });
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{DeterministicRng, ScriptedRolls};
    use crate::game::state::StatusTimer;

    fn unit(s: &str) -> UnitId {
        s.parse().unwrap()
    }

    fn playing_state() -> MatchState {
        let mut state = MatchState::new("combat", Box::new(DeterministicRng::new(5)));
        state.phase = MatchPhase::Playing;
        state
    }

    fn scripted_state(rolls: &[u32]) -> MatchState {
        let mut state = MatchState::new("combat", Box::new(ScriptedRolls::new(rolls.to_vec())));
        state.phase = MatchPhase::Playing;
        state
    }

    #[test]
    fn test_plain_damage_emits_health_change() {
        let mut state = playing_state();
        let hit = apply_damage(&mut state, unit("E1"), 3);
        assert_eq!(hit, Some(unit("E1")));
        assert_eq!(state.characters[&unit("E1")].hp, 15);

        let events = state.take_events();
        assert_eq!(
            events[0].data,
            GameEventData::HealthChanged {
                unit_id: unit("E1"),
                hp: 15,
                previous: 18,
                cause: HealthCause::Damage,
            }
        );
    }

    #[test]
    fn test_transform_then_iron_skin_order() {
        let mut state = playing_state();
        {
            let fx = &mut state.characters.get_mut(&unit("E1")).unwrap().fx;
            fx.bear = Some(StatusTimer::new(3, 0));
            fx.iron_skin = Some(StatusTimer::new(2, 2));
        }
        apply_damage(&mut state, unit("E1"), 5);
        // ceil(5 / 2) - 2 = 1
        assert_eq!(state.characters[&unit("E1")].hp, 17);
    }

    #[test]
    fn test_iron_skin_floors_at_zero() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("E2")).unwrap().fx.iron_skin = Some(StatusTimer::new(2, 2));
        apply_damage(&mut state, unit("E2"), 1);
        assert_eq!(state.characters[&unit("E2")].hp, 8);
    }

    #[test]
    fn test_redirect_moves_damage_to_holder() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("E1")).unwrap().fx.redirect = Some(StatusTimer::new(2, 0));

        let hit = apply_damage(&mut state, unit("E2"), 4);
        assert_eq!(hit, Some(unit("E1")));
        assert_eq!(state.characters[&unit("E2")].hp, 8);
        assert_eq!(state.characters[&unit("E1")].hp, 14);
    }

    #[test]
    fn test_redirect_holder_takes_own_damage() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("E1")).unwrap().fx.redirect = Some(StatusTimer::new(2, 0));
        apply_damage(&mut state, unit("E1"), 4);
        assert_eq!(state.characters[&unit("E1")].hp, 14);
    }

    #[test]
    fn test_first_redirector_in_id_order_wins() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("E3")).unwrap().fx.redirect = Some(StatusTimer::new(2, 0));
        state.characters.get_mut(&unit("E1")).unwrap().fx.redirect = Some(StatusTimer::new(2, 0));
        let hit = apply_damage(&mut state, unit("E4"), 2);
        assert_eq!(hit, Some(unit("E1")));
    }

    #[test]
    fn test_redirect_ignores_enemies() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("P1")).unwrap().fx.redirect = Some(StatusTimer::new(2, 0));
        assert_eq!(apply_damage(&mut state, unit("E2"), 2), Some(unit("E2")));
    }

    #[test]
    fn test_death_removes_token_keeps_character() {
        let mut state = playing_state();
        apply_damage(&mut state, unit("E2"), 20);

        let ch = &state.characters[&unit("E2")];
        assert!(ch.dead);
        assert_eq!(ch.hp, 0);
        assert!(!state.tokens.contains_key(&unit("E2")));

        let events = state.take_events();
        assert!(events
            .iter()
            .any(|e| e.data == GameEventData::UnitDied { unit_id: unit("E2") }));
        assert!(!state.is_ended());
    }

    #[test]
    fn test_saving_throw_success_revives() {
        let mut state = scripted_state(&[3]);
        state.characters.get_mut(&unit("E2")).unwrap().name = DUNGEON_MASTER.to_string();

        apply_damage(&mut state, unit("E2"), 50);

        let ch = &state.characters[&unit("E2")];
        assert_eq!(ch.hp, 3);
        assert!(!ch.dead);
        assert!(state.tokens.contains_key(&unit("E2")));
        assert_eq!(state.last_discard[Seat::Player2].as_deref(), Some(SAVING_THROW_CARD));

        let events = state.take_events();
        assert!(events.iter().any(|e| e.data
            == GameEventData::SavingThrowRolled {
                unit_id: unit("E2"),
                roll: 3,
                success: true
            }));
        assert!(events
            .iter()
            .any(|e| matches!(&e.data, GameEventData::CardPlayed { card, .. } if card == SAVING_THROW_CARD)));
    }

    #[test]
    fn test_saving_throw_failure_kills() {
        for roll in [1, 2] {
            let mut state = scripted_state(&[roll]);
            state.characters.get_mut(&unit("E2")).unwrap().name = DUNGEON_MASTER.to_string();

            apply_damage(&mut state, unit("E2"), 50);

            assert!(state.characters[&unit("E2")].dead);
            assert!(!state.tokens.contains_key(&unit("E2")));
            assert_eq!(state.last_discard[Seat::Player2], None);
        }
    }

    #[test]
    fn test_saving_throw_capped_by_max_hp() {
        let mut state = scripted_state(&[3]);
        {
            let ch = state.characters.get_mut(&unit("E2")).unwrap();
            ch.name = DUNGEON_MASTER.to_string();
            ch.max_hp = 2;
            ch.hp = 2;
        }
        apply_damage(&mut state, unit("E2"), 5);
        assert_eq!(state.characters[&unit("E2")].hp, 2);
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("P4")).unwrap().hp = 9;
        apply_heal(&mut state, unit("P4"), 4);
        assert_eq!(state.characters[&unit("P4")].hp, 10);

        let events = state.take_events();
        assert_eq!(
            events[0].data,
            GameEventData::HealthChanged {
                unit_id: unit("P4"),
                hp: 10,
                previous: 9,
                cause: HealthCause::Heal,
            }
        );
    }

    #[test]
    fn test_heal_ignores_dead() {
        let mut state = playing_state();
        apply_damage(&mut state, unit("P2"), 99);
        state.take_events();
        apply_heal(&mut state, unit("P2"), 4);
        assert_eq!(state.characters[&unit("P2")].hp, 0);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_last_unit_death_ends_match() {
        let mut state = playing_state();
        for id in ["E1", "E2", "E3"] {
            apply_damage(&mut state, unit(id), 99);
        }
        assert!(!state.is_ended());

        apply_damage(&mut state, unit("E4"), 99);
        assert!(state.is_ended());
        assert_eq!(state.winner, Some(Seat::Player1));

        let game_overs = state.take_events().into_iter().filter(|e| e.is_game_over()).count();
        assert_eq!(game_overs, 1);

        // Frozen afterwards
        assert_eq!(apply_damage(&mut state, unit("P1"), 5), None);
        assert_eq!(state.characters[&unit("P1")].hp, 18);
    }

    #[test]
    fn test_declare_winner_idempotent() {
        let mut state = playing_state();
        declare_winner(&mut state, Seat::Player2);
        declare_winner(&mut state, Seat::Player1);
        assert_eq!(state.winner, Some(Seat::Player2));
        assert_eq!(state.take_events().len(), 1);
    }
}
