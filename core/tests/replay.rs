//! The event log is the battle. Folding it must rebuild the state and
//! refuse anything that could not have come from a live battle.

use mechcombat_core::{
    config::BattleConfig,
    declaration::{Declaration, MoveStep, MovementOrder},
    engine::Battle,
    hex::{Facing, HexCoord},
    replay,
    rng::ScriptedDice,
    unit::{Location, UnitSpec},
    SimError,
};

fn forces() -> Vec<UnitSpec> {
    vec![
        UnitSpec::biped("a", 0, 50, 5)
            .at(HexCoord::new(0, 0), Facing::NORTH)
            .with_weapon("medium_laser", Location::RightArm),
        UnitSpec::biped("b", 1, 50, 5)
            .at(HexCoord::new(0, -6), Facing::SOUTH)
            .with_weapon("medium_laser", Location::RightArm),
    ]
}

/// One full turn: both units walk one hex and nobody fires.
fn one_turn() -> Battle {
    let dice = ScriptedDice::from_2d6([4, 9]);
    let mut battle = Battle::with_dice("replay", 1, BattleConfig::default_test(), &forces(), Box::new(dice))
        .expect("battle");
    battle.advance_phase().expect("initiative");
    for unit in ["a", "b"] {
        battle
            .apply_declaration(Declaration::Move {
                unit:  unit.into(),
                order: MovementOrder::Walk { steps: vec![MoveStep::Forward] },
            })
            .expect("walk");
    }
    // Movement, weapons, physical, heat, end.
    for _ in 0..5 {
        battle.advance_phase().expect("advance");
    }
    battle
}

#[test]
fn replay_rebuilds_positions_and_clock() {
    let battle = one_turn();
    let state = replay(battle.events()).expect("replay");
    assert_eq!(&state, battle.state());
    assert_eq!(state.unit("a").unwrap().position, HexCoord::new(0, -1));
    assert_eq!(state.unit("b").unwrap().position, HexCoord::new(0, -5));
    assert_eq!(state.clock.turn, 2);
}

#[test]
fn log_without_a_start_is_refused() {
    let battle = one_turn();
    let err = replay(&battle.events()[1..]).unwrap_err();
    assert!(err.is_invariant_violation(), "expected an invariant violation, got {err}");
}

#[test]
fn out_of_sequence_events_are_refused() {
    let battle = one_turn();
    let mut events = battle.events().to_vec();
    events.swap(2, 3);
    match replay(&events) {
        Err(SimError::StateInvariantViolation { seq, log, .. }) => {
            assert_eq!(seq, events[2].seq);
            assert_eq!(log.len(), events.len(), "the violation carries the full log");
        }
        other => panic!("expected an invariant violation, got {other:?}"),
    }
}

#[test]
fn replaying_a_prefix_stops_mid_battle() {
    let battle = one_turn();
    let events = battle.events();
    let partial = replay(&events[..events.len() / 2]).expect("prefix replays");
    assert!(!partial.is_over());
    assert!(partial.last_seq < battle.state().last_seq);
}
