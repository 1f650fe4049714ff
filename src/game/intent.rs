//! Player Intents
//!
//! The closed set of seat-scoped commands and the single dispatch that
//! validates and applies them. A rejected intent leaves the match state
//! untouched and produces no events.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::game::ability::{use_primary, use_special};
use crate::game::board::TileId;
use crate::game::cards::{play_card, reveal_card, CardRequest};
use crate::game::events::GameEvent;
use crate::game::hero::CardKind;
use crate::game::movement::request_move;
use crate::game::state::{MatchPhase, MatchState, Seat, UnitId};
use crate::game::turn::end_turn_to;

/// A command from a seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Move {
        unit_id: UnitId,
        to_tile: TileId,
    },
    UsePrimary {
        source_id: UnitId,
        #[serde(default)]
        target_id: Option<UnitId>,
    },
    UseSpecial {
        source_id: UnitId,
        #[serde(default)]
        target_id: Option<UnitId>,
        /// Aura centre for tile-targeted specials
        #[serde(default)]
        tile: Option<TileId>,
    },
    PlayCard(CardRequest),
    RevealCard {
        card: CardKind,
    },
    EndTurn,
}

/// Why an intent was rejected.
///
/// Structural errors (stale or malformed references) are dropped silently;
/// everything else is reported back to the acting seat.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    // Structural
    #[error("match is not in play")]
    NotInPlay,

    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    #[error("unknown tile {0}")]
    UnknownTile(TileId),

    // Validation
    #[error("not your turn")]
    NotYourTurn,

    #[error("unit {0} belongs to the other seat")]
    NotOwner(UnitId),

    #[error("{card} needs {required} energy, have {have}")]
    InsufficientEnergy { card: String, have: u32, required: u32 },

    #[error("{unit_id} cannot move: {reason}")]
    InvalidMove { unit_id: UnitId, reason: String },

    #[error("target out of range ({distance:?} > {range})")]
    OutOfRange { distance: Option<u32>, range: u32 },

    #[error("target must be exactly {range} away (is {distance:?})")]
    NotExactRange { distance: Option<u32>, range: u32 },

    #[error("invalid target: {0}")]
    InvalidTarget(&'static str),

    #[error("action already used this turn")]
    ActionUsed,

    #[error("movement already used this turn")]
    MovementUsed,

    #[error("a card was already played this turn")]
    CardAlreadyPlayed,

    #[error("special on cooldown for {0} more turns")]
    OnCooldown(u32),

    #[error("must move before using this ability")]
    MustMoveFirst,

    #[error("{0} cannot be played as a card")]
    NotPlayable(CardKind),

    #[error("tile {0} is walled")]
    TileWalled(TileId),

    #[error("tile {0} is occupied")]
    TileOccupied(TileId),

    #[error("no wall on tile {0}")]
    NoWall(TileId),
}

impl ActionError {
    /// Should this rejection be dropped without telling the client?
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ActionError::NotInPlay | ActionError::UnknownUnit(_) | ActionError::UnknownTile(_)
        )
    }

    /// Stable machine-readable code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::NotInPlay => "not_in_play",
            ActionError::UnknownUnit(_) => "unknown_unit",
            ActionError::UnknownTile(_) => "unknown_tile",
            ActionError::NotYourTurn => "not_your_turn",
            ActionError::NotOwner(_) => "not_owner",
            ActionError::InsufficientEnergy { .. } => "insufficient_energy",
            ActionError::InvalidMove { .. } => "invalid_move",
            ActionError::OutOfRange { .. } => "out_of_range",
            ActionError::NotExactRange { .. } => "not_exact_range",
            ActionError::InvalidTarget(_) => "invalid_target",
            ActionError::ActionUsed => "action_used",
            ActionError::MovementUsed => "movement_used",
            ActionError::CardAlreadyPlayed => "card_already_played",
            ActionError::OnCooldown(_) => "on_cooldown",
            ActionError::MustMoveFirst => "must_move_first",
            ActionError::NotPlayable(_) => "not_playable",
            ActionError::TileWalled(_) => "tile_walled",
            ActionError::TileOccupied(_) => "tile_occupied",
            ActionError::NoWall(_) => "no_wall",
        }
    }
}

/// Validate and apply one intent for `seat`.
///
/// Returns the events produced, in order. On error nothing was mutated.
pub fn apply_intent(
    state: &mut MatchState,
    seat: Seat,
    intent: Intent,
) -> Result<Vec<GameEvent>, ActionError> {
    if state.phase != MatchPhase::Playing {
        return Err(ActionError::NotInPlay);
    }
    if state.current_turn != seat {
        return Err(ActionError::NotYourTurn);
    }

    debug!(match_id = %state.match_id, %seat, ?intent, "applying intent");

    match intent {
        Intent::Move { unit_id, to_tile } => request_move(state, seat, unit_id, to_tile)?,
        Intent::UsePrimary { source_id, target_id } => {
            use_primary(state, seat, source_id, target_id)?
        }
        Intent::UseSpecial {
            source_id,
            target_id,
            tile,
        } => use_special(state, seat, source_id, target_id, tile)?,
        Intent::PlayCard(request) => play_card(state, seat, &request)?,
        Intent::RevealCard { card } => reveal_card(state, seat, card)?,
        Intent::EndTurn => end_turn_to(state, seat.other()),
    }

    Ok(state.take_events())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::game::events::{GameEventData, HealthCause};
    use crate::game::state::PerSeat;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit(s: &str) -> UnitId {
        s.parse().unwrap()
    }

    fn tile(s: &str) -> TileId {
        s.parse().unwrap()
    }

    fn playing_state() -> MatchState {
        let mut state = MatchState::new("intent", Box::new(DeterministicRng::new(11)));
        state.phase = MatchPhase::Playing;
        state
    }

    fn place(state: &mut MatchState, id: &str, at: &str) {
        state.tokens.get_mut(&unit(id)).unwrap().tile = tile(at);
    }

    #[test]
    fn test_tanks_trade_primary() {
        let mut state = playing_state();
        place(&mut state, "P1", "E4");
        place(&mut state, "E1", "E5");

        let events = apply_intent(
            &mut state,
            Seat::Player1,
            Intent::UsePrimary {
                source_id: unit("P1"),
                target_id: Some(unit("E1")),
            },
        )
        .unwrap();

        assert_eq!(state.characters[&unit("E1")].hp, 15);
        assert!(events.iter().any(|e| e.data
            == GameEventData::HealthChanged {
                unit_id: unit("E1"),
                hp: 15,
                previous: 18,
                cause: HealthCause::Damage,
            }));
        assert!(state.turn_state[Seat::Player1].used_action);
        assert!(!state.turn_state[Seat::Player1].used_movement);
        assert_eq!(state.current_turn, Seat::Player1);
    }

    #[test]
    fn test_insufficient_energy_leaves_state_untouched() {
        let mut state = playing_state();
        state.energy[Seat::Player1] = 2;
        let before = state.compute_hash();

        let err = apply_intent(
            &mut state,
            Seat::Player1,
            Intent::PlayCard(CardRequest {
                card: CardKind::Cleanse,
                target_id: Some(unit("P1")),
                ..CardRequest::new(CardKind::Cleanse)
            }),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ActionError::InsufficientEnergy {
                card: "Cleanse".to_string(),
                have: 2,
                required: 3,
            }
        );
        assert_eq!(state.compute_hash(), before);
        assert_eq!(state.energy[Seat::Player1], 2);
    }

    #[test]
    fn test_wall_on_occupied_tile_rejected() {
        let mut state = playing_state();
        state.energy[Seat::Player1] = 5;

        let err = apply_intent(
            &mut state,
            Seat::Player1,
            Intent::PlayCard(CardRequest {
                tile: Some(tile("A1")),
                ..CardRequest::new(CardKind::Wall)
            }),
        )
        .unwrap_err();

        assert_eq!(err, ActionError::TileOccupied(tile("A1")));
        assert!(state.walls.is_empty());
        assert_eq!(state.energy[Seat::Player1], 5);
        assert!(!state.turn_state[Seat::Player1].card_played);
        assert!(!state.turn_state[Seat::Player1].used_action);
    }

    #[test]
    fn test_move_then_act_advances_turn() {
        let mut state = playing_state();
        place(&mut state, "E1", "G2");

        apply_intent(
            &mut state,
            Seat::Player1,
            Intent::Move {
                unit_id: unit("P1"),
                to_tile: tile("H2"),
            },
        )
        .unwrap();
        assert_eq!(state.current_turn, Seat::Player1);

        let events = apply_intent(
            &mut state,
            Seat::Player1,
            Intent::UsePrimary {
                source_id: unit("P1"),
                target_id: Some(unit("E1")),
            },
        )
        .unwrap();

        assert_eq!(state.current_turn, Seat::Player2);
        assert_eq!(state.turn_state, PerSeat::default());
        assert!(events
            .iter()
            .any(|e| e.data == GameEventData::TurnChanged { seat: Seat::Player2 }));
    }

    #[test]
    fn test_wrong_seat_rejected() {
        let mut state = playing_state();
        let err = apply_intent(&mut state, Seat::Player2, Intent::EndTurn).unwrap_err();
        assert_eq!(err, ActionError::NotYourTurn);
        assert!(!err.is_structural());
    }

    #[test]
    fn test_not_in_play_is_structural() {
        let mut state = MatchState::new("waiting", Box::new(DeterministicRng::new(1)));
        let err = apply_intent(&mut state, Seat::Player1, Intent::EndTurn).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_game_over_freezes_match() {
        let mut state = playing_state();
        place(&mut state, "P1", "E4");
        place(&mut state, "E1", "E5");
        for id in ["E2", "E3", "E4"] {
            state.tokens.remove(&unit(id));
            state.characters.get_mut(&unit(id)).unwrap().dead = true;
        }
        state.characters.get_mut(&unit("E1")).unwrap().hp = 2;

        let events = apply_intent(
            &mut state,
            Seat::Player1,
            Intent::UsePrimary {
                source_id: unit("P1"),
                target_id: Some(unit("E1")),
            },
        )
        .unwrap();
        assert!(events
            .iter()
            .any(|e| e.data == GameEventData::GameOver { winner: Seat::Player1 }));
        assert_eq!(state.phase, MatchPhase::Ended);

        let before = state.compute_hash();
        let err = apply_intent(
            &mut state,
            Seat::Player1,
            Intent::Move {
                unit_id: unit("P1"),
                to_tile: tile("D4"),
            },
        )
        .unwrap_err();

        assert_eq!(err, ActionError::NotInPlay);
        assert!(err.is_structural());
        assert!(state.take_events().is_empty());
        assert_eq!(state.compute_hash(), before);
        assert_eq!(state.tokens[&unit("P1")].tile, tile("E4"));
    }

    #[test]
    fn test_explicit_end_turn() {
        let mut state = playing_state();
        let events = apply_intent(&mut state, Seat::Player1, Intent::EndTurn).unwrap();
        assert_eq!(state.current_turn, Seat::Player2);
        assert_eq!(state.energy[Seat::Player1], 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_intent_wire_shape() {
        let intent: Intent = serde_json::from_str(
            r#"{"intent": "use_special", "source_id": "P4", "tile": "E5"}"#,
        )
        .unwrap();
        assert_eq!(
            intent,
            Intent::UseSpecial {
                source_id: unit("P4"),
                target_id: None,
                tile: Some(tile("E5")),
            }
        );
        let malformed = r#"{"intent": "move", "unit_id": "Z9", "to_tile": "E5"}"#;
        assert!(serde_json::from_str::<Intent>(malformed).is_err());
    }

    fn random_intent(rng: &mut StdRng, tiles: &[TileId]) -> Intent {
        let seat = if rng.gen_bool(0.5) { Seat::Player1 } else { Seat::Player2 };
        let any_unit = |rng: &mut StdRng| {
            let owner = if rng.gen_bool(0.5) { seat } else { seat.other() };
            UnitId::new(owner, rng.gen_range(1..=4))
        };
        let any_tile = |rng: &mut StdRng| tiles[rng.gen_range(0..tiles.len())];
        let cards = [
            CardKind::Fireball,
            CardKind::Entangle,
            CardKind::Cleanse,
            CardKind::IronSkin,
            CardKind::Siphon,
            CardKind::Sprint,
            CardKind::Dash,
            CardKind::Blink,
            CardKind::Scout,
            CardKind::Wall,
            CardKind::BlossomWall,
            CardKind::Shatter,
            CardKind::Teleport,
            CardKind::Fmj,
        ];

        match rng.gen_range(0..7) {
            0 => Intent::Move {
                unit_id: any_unit(rng),
                to_tile: any_tile(rng),
            },
            1 => Intent::UsePrimary {
                source_id: any_unit(rng),
                target_id: Some(any_unit(rng)),
            },
            2 => Intent::UseSpecial {
                source_id: any_unit(rng),
                target_id: Some(any_unit(rng)),
                tile: Some(any_tile(rng)),
            },
            3 | 4 => {
                let card = cards[rng.gen_range(0..cards.len())];
                Intent::PlayCard(CardRequest {
                    card,
                    tile: Some(any_tile(rng)),
                    source_id: Some(any_unit(rng)),
                    to_tile: Some(any_tile(rng)),
                    target_id: Some(any_unit(rng)),
                })
            }
            5 => Intent::RevealCard {
                card: cards[rng.gen_range(0..cards.len())],
            },
            _ => Intent::EndTurn,
        }
    }

    #[test]
    fn test_rejected_intents_never_mutate() {
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let tiles: Vec<TileId> = crate::game::board::Board::shared().tiles().collect();

        for round in 0..20 {
            let mut state = MatchState::new(format!("fuzz-{round}"), Box::new(DeterministicRng::new(round)));
            state.phase = MatchPhase::Playing;
            state.energy = PerSeat::new(4, 4);

            for _ in 0..300 {
                if state.is_ended() {
                    break;
                }
                let seat = if rng.gen_bool(0.5) { Seat::Player1 } else { Seat::Player2 };
                let intent = random_intent(&mut rng, &tiles);
                let before = state.compute_hash();

                match apply_intent(&mut state, seat, intent) {
                    Ok(_) => {
                        for ch in state.characters.values() {
                            assert!(ch.hp <= ch.max_hp);
                        }
                        for (id, ch) in &state.characters {
                            assert_eq!(ch.dead, !state.tokens.contains_key(id));
                        }
                    }
                    Err(_) => {
                        assert_eq!(state.compute_hash(), before);
                        assert!(state.take_events().is_empty());
                    }
                }
            }
        }
    }
}
