//! Turn & Resource State Machine
//!
//! Turn ends (explicit or automatic), energy regeneration, cooldowns, and the
//! one-time match start that applies hero picks.

use tracing::{debug, info};

use crate::game::events::GameEventData;
use crate::game::hero::{HeroStatsTable, TeamPick};
use crate::game::state::{
    MatchPhase, MatchState, PerSeat, Seat, StatusEffects, TurnState, ENERGY_GAIN_PER_TURN, ENERGY_MAX,
};
use crate::game::status::{
    heal_blossoms_at_end, process_start_of_turn, tick_blossom_layers, tick_petal_auras, tick_walls,
};

/// End the current seat's turn and hand control to `next`.
///
/// Order: energy for the ending seat, board hazards, blossom and aura
/// healing, ending seat's cooldowns and one-turn bonuses, then the new
/// seat's start-of-turn processing. No-op once the match has ended.
pub fn end_turn_to(state: &mut MatchState, next: Seat) {
    if state.is_ended() {
        return;
    }
    let prev = state.current_turn;

    state.energy[prev] = (state.energy[prev] + ENERGY_GAIN_PER_TURN).min(ENERGY_MAX);

    tick_walls(state);
    heal_blossoms_at_end(state, prev);
    tick_petal_auras(state, prev);
    tick_blossom_layers(state, prev);

    for ch in state.characters.values_mut().filter(|c| c.owner == prev) {
        ch.special_cooldown = ch.special_cooldown.saturating_sub(1);
        ch.fx.attack_bonus_this_turn = 0;
        ch.fx.move_bonus_this_turn = 0;
    }

    state.turn_number += 1;
    state.current_turn = next;

    process_start_of_turn(state, next);

    // Start-of-turn burn may have ended the match; the turn still passes
    state.turn_state = PerSeat::default();

    debug!(match_id = %state.match_id, turn = state.turn_number, seat = %next, "turn changed");
    state.push_event(GameEventData::TurnChanged { seat: next });
}

/// End the turn for `seat` if both movement and action are spent.
pub fn maybe_end_turn(state: &mut MatchState, seat: Seat) {
    if state.is_ended() || state.current_turn != seat {
        return;
    }
    let ts = state.turn_state[seat];
    if ts.used_movement && ts.used_action {
        end_turn_to(state, seat.other());
    }
}

/// Start play once both seats are in.
///
/// Valid team picks rename that seat's units by slot. Every character is then
/// reset to full health with cleared status, whatever happened before.
pub fn start_match(
    state: &mut MatchState,
    picks: &PerSeat<Option<TeamPick>>,
    names: PerSeat<String>,
    stats: &HeroStatsTable,
) {
    for seat in Seat::ALL {
        let Some(pick) = &picks[seat] else {
            continue;
        };
        let ids: Vec<_> = state.characters.keys().copied().filter(|id| id.seat == seat).collect();
        for id in ids {
            let Some(ch) = state.characters.get_mut(&id) else {
                continue;
            };
            let hero_name = pick.hero_for(ch.role).name().to_string();
            ch.name = hero_name.clone();
            if let Some(token) = state.tokens.get_mut(&id) {
                token.name = hero_name;
            }
        }
    }

    for ch in state.characters.values_mut() {
        ch.max_hp = stats.resolve_max_hp(ch.role, &ch.name);
        ch.hp = ch.max_hp;
        ch.dead = false;
        ch.special_cooldown = 0;
        ch.fx = StatusEffects::default();
    }

    state.player_names = names;
    state.turn_state = PerSeat::<TurnState>::default();
    state.phase = MatchPhase::Playing;
    state.current_turn = Seat::Player1;

    info!(match_id = %state.match_id, "match started");
    process_start_of_turn(state, Seat::Player1);
    state.push_event(GameEventData::TurnChanged { seat: Seat::Player1 });
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::game::board::TileId;
    use crate::game::hero::{HeroId, DUNGEON_MASTER, LITTLE_BEAR};
    use crate::game::state::{PendingBonus, StatusTimer, UnitId, WALL_TTL};

    fn unit(s: &str) -> UnitId {
        s.parse().unwrap()
    }

    fn tile(s: &str) -> TileId {
        s.parse().unwrap()
    }

    fn playing_state() -> MatchState {
        let mut state = MatchState::new("turn", Box::new(DeterministicRng::new(3)));
        state.phase = MatchPhase::Playing;
        state
    }

    #[test]
    fn test_energy_gain_only_for_ending_seat() {
        let mut state = playing_state();
        end_turn_to(&mut state, Seat::Player2);
        assert_eq!(state.energy, PerSeat::new(1, 0));
        assert_eq!(state.current_turn, Seat::Player2);
        assert_eq!(state.turn_number, 1);

        end_turn_to(&mut state, Seat::Player1);
        assert_eq!(state.energy, PerSeat::new(1, 1));
    }

    #[test]
    fn test_energy_capped() {
        let mut state = playing_state();
        state.energy[Seat::Player1] = ENERGY_MAX;
        end_turn_to(&mut state, Seat::Player2);
        assert_eq!(state.energy[Seat::Player1], ENERGY_MAX);
    }

    #[test]
    fn test_turn_flags_reset_and_event() {
        let mut state = playing_state();
        state.turn_state[Seat::Player1].used_action = true;
        state.turn_state[Seat::Player1].card_played = true;
        state.turn_state[Seat::Player1].move_buff.steps_bonus = 2;

        end_turn_to(&mut state, Seat::Player2);
        assert_eq!(state.turn_state, PerSeat::default());

        let events = state.take_events();
        assert_eq!(
            events.last().map(|e| &e.data),
            Some(&GameEventData::TurnChanged { seat: Seat::Player2 })
        );
    }

    #[test]
    fn test_cooldowns_tick_for_ending_seat() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("P1")).unwrap().special_cooldown = 3;
        state.characters.get_mut(&unit("E1")).unwrap().special_cooldown = 3;

        end_turn_to(&mut state, Seat::Player2);
        assert_eq!(state.characters[&unit("P1")].special_cooldown, 2);
        assert_eq!(state.characters[&unit("E1")].special_cooldown, 3);
    }

    #[test]
    fn test_one_turn_bonuses_cleared_and_promoted() {
        let mut state = playing_state();
        state.characters.get_mut(&unit("P2")).unwrap().fx.attack_bonus_this_turn = 1;
        state.characters.get_mut(&unit("E2")).unwrap().fx.skill_check_next =
            Some(PendingBonus { attack: 1, movement: 1 });

        end_turn_to(&mut state, Seat::Player2);
        assert_eq!(state.characters[&unit("P2")].fx.attack_bonus_this_turn, 0);
        assert_eq!(state.characters[&unit("E2")].fx.attack_bonus_this_turn, 1);
        assert_eq!(state.characters[&unit("E2")].fx.move_bonus_this_turn, 1);
    }

    #[test]
    fn test_walls_tick_every_turn_end() {
        let mut state = playing_state();
        state.walls.insert(tile("E4"), WALL_TTL);
        for n in 0..WALL_TTL {
            assert!(state.walls.contains_key(&tile("E4")), "expired early at {n}");
            let next = state.current_turn.other();
            end_turn_to(&mut state, next);
        }
        assert!(state.walls.is_empty());
    }

    #[test]
    fn test_maybe_end_turn_requires_both() {
        let mut state = playing_state();
        state.turn_state[Seat::Player1].used_movement = true;
        maybe_end_turn(&mut state, Seat::Player1);
        assert_eq!(state.current_turn, Seat::Player1);

        state.turn_state[Seat::Player1].used_action = true;
        maybe_end_turn(&mut state, Seat::Player1);
        assert_eq!(state.current_turn, Seat::Player2);
        assert!(!state.turn_state[Seat::Player2].used_movement);
    }

    #[test]
    fn test_no_transition_after_game_over() {
        let mut state = playing_state();
        state.phase = MatchPhase::Ended;
        end_turn_to(&mut state, Seat::Player2);
        assert_eq!(state.current_turn, Seat::Player1);
        assert_eq!(state.energy, PerSeat::new(0, 0));
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_start_match_applies_heroes_and_resets() {
        let mut state = MatchState::new("start", Box::new(DeterministicRng::new(3)));
        // Leftover damage and status from before the start
        {
            let ch = state.characters.get_mut(&unit("P1")).unwrap();
            ch.hp = 2;
            ch.fx.entangle = Some(StatusTimer::new(2, 0));
            ch.special_cooldown = 2;
        }

        let pick = TeamPick::resolve(&["little_bear", "aimbot", "dungeon_master", "death_blossom"]);
        assert!(pick.is_some());
        let picks = PerSeat::new(pick, None);
        let stats = HeroStatsTable::from_json(r#"[{"name": "Aimbot", "hpMax": 9}]"#).unwrap();

        start_match(
            &mut state,
            &picks,
            PerSeat::new("Ana".to_string(), "Bo".to_string()),
            &stats,
        );

        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.current_turn, Seat::Player1);
        assert_eq!(state.player_names.player2, "Bo");

        let tank = &state.characters[&unit("P1")];
        assert_eq!(tank.name, LITTLE_BEAR);
        assert_eq!(tank.max_hp, 13);
        assert_eq!(tank.hp, 13);
        assert!(tank.fx.is_empty());
        assert_eq!(tank.special_cooldown, 0);
        assert_eq!(state.tokens[&unit("P1")].name, LITTLE_BEAR);

        assert_eq!(state.characters[&unit("P2")].max_hp, 9);
        assert_eq!(state.characters[&unit("P3")].name, DUNGEON_MASTER);
        assert_eq!(state.characters[&unit("P4")].name, HeroId::DeathBlossom.name());

        // Seat without a valid pick keeps role defaults
        assert_eq!(state.characters[&unit("E1")].name, "Tank");
        assert_eq!(state.characters[&unit("E1")].max_hp, 18);
    }
}
