//! Damage, transfer and critical hits against a 50-ton biped.
//!
//! Default armour on a 50-tonner: head 9, centre torso 24 front / 8 rear,
//! side torsos 18 / 6, arms 16, legs 24. Structure 3 / 16 / 12 / 8 / 12.

use mechcombat_core::{
    ammo,
    arc::FiringArc,
    config::{BattleConfig, WeaponCatalog},
    context::BattleContext,
    critical,
    damage::{apply_damage, apply_hit},
    declaration::MovementOrder,
    error::IllegalAction,
    event::{DamageKind, EventKind, GameEvent},
    hex::Facing,
    hit_location::standard_location,
    movement,
    phase::Phase,
    rng::ScriptedDice,
    state::BattleState,
    unit::{CaseKind, DestructionCause, Location, SlotContent, UnitSpec},
};

fn started(units: &[UnitSpec]) -> BattleState {
    let catalog = WeaponCatalog::builtin();
    let units = units.iter().map(|s| s.build(&catalog).expect("build unit")).collect();
    let mut state = BattleState::default();
    state
        .apply(&GameEvent {
            seq:   0,
            turn:  1,
            phase: Phase::Initiative,
            kind:  EventKind::BattleStarted {
                battle_id:  "damage-test".into(),
                seed:       0,
                turn_limit: 10,
                units,
            },
        })
        .expect("start");
    state
}

fn fifty() -> UnitSpec {
    UnitSpec::biped("a", 0, 50, 5)
}

#[test]
fn head_cap_applies_to_standard_hits_only() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    let capped = apply_damage(&mut ctx, "a", Location::Head, false, 15, DamageKind::Standard).unwrap();
    assert_eq!(capped.capped, 12);
    assert_eq!(capped.armor, 3);
    assert_eq!(capped.accounted(), 15);
    assert!(!capped.unit_destroyed);

    let uncapped = apply_damage(&mut ctx, "a", Location::Head, false, 15, DamageKind::Cluster).unwrap();
    assert_eq!(uncapped.capped, 0);
    assert_eq!(uncapped.armor, 6);
    assert_eq!(uncapped.structure, 3);
    assert_eq!(uncapped.lost, 6);
    assert_eq!(uncapped.accounted(), 15);
    assert!(uncapped.unit_destroyed);
    assert_eq!(state.unit("a").unwrap().destroyed, Some(DestructionCause::HeadDestroyed));
}

#[test]
fn excess_damage_transfers_inward() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    // 16 armour and 8 structure take the arm; 6 carry into the torso.
    let out = apply_damage(&mut ctx, "a", Location::RightArm, false, 30, DamageKind::Standard).unwrap();
    assert_eq!(out.armor, 22);
    assert_eq!(out.structure, 8);
    assert_eq!(out.locations_destroyed, vec![Location::RightArm]);
    assert!(out.exposed.is_empty());
    assert_eq!(out.accounted(), 30);

    let unit = state.unit("a").unwrap();
    assert!(unit.location_destroyed(Location::RightArm));
    assert_eq!(unit.location(Location::RightTorso).armor, 12);
}

#[test]
fn losing_a_side_torso_takes_the_arm_with_it() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    let out = apply_damage(&mut ctx, "a", Location::LeftTorso, false, 40, DamageKind::Standard).unwrap();
    assert_eq!(out.locations_destroyed, vec![Location::LeftTorso]);
    assert_eq!(out.accounted(), 40);

    let unit = state.unit("a").unwrap();
    assert!(unit.location_destroyed(Location::LeftArm));
    assert!(!log.iter().any(|e| matches!(
        e.kind,
        EventKind::DamageApplied { location: Location::LeftArm, .. }
    )), "the arm was never hit");
    assert_eq!(unit.location(Location::CenterTorso).armor, 14);
    assert!(!unit.is_destroyed(), "a standard engine survives a side torso");
}

#[test]
fn damage_to_a_destroyed_unit_is_lost() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    let killing = apply_damage(&mut ctx, "a", Location::CenterTorso, true, 60, DamageKind::Standard).unwrap();
    assert!(killing.unit_destroyed);
    assert_eq!(killing.armor, 8);
    assert_eq!(killing.structure, 16);
    assert_eq!(killing.lost, 36);

    let after = apply_damage(&mut ctx, "a", Location::LeftLeg, false, 10, DamageKind::Standard).unwrap();
    assert_eq!(after.lost, 10);
    assert_eq!(after.accounted(), 10);
    assert_eq!(state.unit("a").unwrap().destroyed, Some(DestructionCause::CenterTorsoDestroyed));
}

#[test]
fn structure_damage_rolls_for_criticals() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    // Critical determination roll of 8: one critical, on the first live slot.
    let mut dice = ScriptedDice::from_2d6([8]).with_picks([0]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    let out = apply_damage(&mut ctx, "a", Location::RightLeg, false, 26, DamageKind::Standard).unwrap();
    assert_eq!(out.structure, 2);
    assert_eq!(out.exposed, vec![Location::RightLeg]);

    assert!(log.iter().any(|e| matches!(
        e.kind,
        EventKind::CriticalHitRolled { location: Location::RightLeg, roll: 8, criticals: 1, .. }
    )));
    assert!(log.iter().any(|e| matches!(
        e.kind,
        EventKind::ComponentDamaged { location: Location::RightLeg, slot: 0, .. }
    )));
}

#[test]
fn third_engine_hit_destroys_the_unit() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    // Centre torso of a standard engine: three engine slots, then the gyro.
    for slot in 0..2 {
        let hit = critical::apply_critical(&mut ctx, "a", Location::CenterTorso, slot).unwrap();
        assert_eq!(hit, SlotContent::Engine);
        assert!(!ctx.unit("a").unwrap().is_destroyed());
    }
    critical::apply_critical(&mut ctx, "a", Location::CenterTorso, 2).unwrap();

    let unit = state.unit("a").unwrap();
    assert_eq!(unit.damage.engine_hits, 3);
    assert_eq!(unit.destroyed, Some(DestructionCause::EngineDestroyed));
}

#[test]
fn a_slot_cannot_be_hit_twice() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    critical::apply_critical(&mut ctx, "a", Location::Head, 1).unwrap();
    let err = critical::apply_critical(&mut ctx, "a", Location::Head, 1).unwrap_err();
    assert!(err.is_invariant_violation());
}

#[test]
fn ammunition_explosion_goes_straight_to_structure() {
    let unit = fifty()
        .with_weapon("ac10", Location::RightTorso)
        .with_ammo("ac10_ammo", Location::RightTorso);
    let mut state = started(&[unit]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    // Ten rounds of ten: through 12 torso and 16 centre structure, the rest lost.
    let out = ammo::explode_bin(&mut ctx, "a", 0).unwrap();
    assert_eq!(out.armor, 0);
    assert_eq!(out.structure, 28);
    assert_eq!(out.lost, 72);
    assert_eq!(out.accounted(), 100);
    assert!(out.unit_destroyed);

    assert!(
        log.iter().all(|e| !matches!(e.kind, EventKind::DamageApplied { armor, .. } if armor > 0)),
        "explosions skip armour"
    );
    assert!(state.unit("a").unwrap().ammo[0].destroyed);
}

#[test]
fn case_vents_what_the_location_cannot_hold() {
    let unit = fifty()
        .with_weapon("ac10", Location::RightTorso)
        .with_ammo("ac10_ammo", Location::RightTorso)
        .with_case(Location::RightTorso, CaseKind::Case);
    let mut state = started(&[unit]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    let out = ammo::explode_bin(&mut ctx, "a", 0).unwrap();
    assert_eq!(out.structure, 12);
    assert_eq!(out.vented, 88);
    assert_eq!(out.accounted(), 100);
    assert!(!out.unit_destroyed);

    let unit = state.unit("a").unwrap();
    assert!(unit.location_destroyed(Location::RightTorso));
    assert_eq!(unit.pilot.wounds, 0, "CASE spares the pilot");
}

#[test]
fn small_explosion_transfers_like_any_other_damage() {
    let unit = fifty()
        .with_weapon("machine_gun", Location::LeftArm)
        .with_partial_ammo("machine_gun_ammo", Location::LeftArm, 5);
    let mut state = started(&[unit]);
    let mut log = Vec::new();
    // No torso criticals on 7; the pilot stays awake on 9.
    let mut dice = ScriptedDice::from_2d6([7, 9]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    // Five rounds of two: the arm's 8 structure, then 2 into the torso.
    let out = ammo::explode_bin(&mut ctx, "a", 0).unwrap();
    assert_eq!(out.armor, 0);
    assert_eq!(out.structure, 10);
    assert_eq!(out.lost, 0);
    assert_eq!(out.accounted(), 10);
    assert_eq!(out.locations_destroyed, vec![Location::LeftArm]);
    assert_eq!(out.exposed, vec![Location::LeftTorso]);
    drop(ctx);

    assert!(log.iter().any(|e| matches!(e.kind, EventKind::AmmoExploded { damage: 10, .. })));
    let unit = state.unit("a").unwrap();
    assert!(unit.location_destroyed(Location::LeftArm));
    assert_eq!(unit.location(Location::LeftTorso).armor, 18);
    assert_eq!(unit.location(Location::LeftTorso).structure, 10);
    assert_eq!(unit.pilot.wounds, 2);
    assert!(unit.pilot.conscious);
    assert_eq!(dice.remaining(), 0);
}

#[test]
fn case_two_holds_the_blast_to_one_point() {
    let unit = fifty()
        .with_weapon("ac10", Location::RightTorso)
        .with_ammo("ac10_ammo", Location::RightTorso)
        .with_case(Location::RightTorso, CaseKind::CaseII);
    let mut state = started(&[unit]);
    let mut log = Vec::new();
    // The exposed torso rolls 5 for criticals: none.
    let mut dice = ScriptedDice::from_2d6([5]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    let out = ammo::explode_bin(&mut ctx, "a", 0).unwrap();
    assert_eq!(out.structure, 1);
    assert_eq!(out.vented, 99);
    assert_eq!(out.accounted(), 100);
    assert!(!out.unit_destroyed);
    drop(ctx);

    let unit = state.unit("a").unwrap();
    assert!(!unit.location_destroyed(Location::RightTorso));
    assert_eq!(unit.location(Location::RightTorso).structure, 11);
    assert_eq!(unit.pilot.wounds, 0);
}

#[test]
fn third_engine_hit_lands_in_one_pass_whatever_came_before() {
    // Prior engine hits, and the determination roll that brings the total to three.
    for (prior, roll) in [(0_usize, 12_u8), (1, 10), (2, 8)] {
        let mut state = started(&[fifty()]);
        let mut log = Vec::new();
        let mut dice = ScriptedDice::from_2d6([roll]).with_picks([0, 0, 0]);
        let config = BattleConfig::default_test();
        let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

        for slot in 0..prior {
            critical::apply_critical(&mut ctx, "a", Location::CenterTorso, slot).unwrap();
        }
        let out = critical::resolve_criticals(&mut ctx, "a", Location::CenterTorso, false).unwrap();
        assert_eq!(out.components, vec![SlotContent::Engine; 3 - prior], "{prior} prior hits");
        drop(ctx);

        let unit = state.unit("a").unwrap();
        assert_eq!(unit.damage.engine_hits, 3);
        assert_eq!(unit.destroyed, Some(DestructionCause::EngineDestroyed));
        assert_eq!(unit.ensure_can_act(), Err(IllegalAction::UnitDestroyed));
        assert_eq!(state.active_units(0).count(), 0);
        let destroyed = log.iter().filter(|e| matches!(e.kind, EventKind::UnitDestroyed { .. })).count();
        assert_eq!(destroyed, 1);
    }
}

#[test]
fn through_armour_roll_checks_behind_full_armour() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::from_2d6([8]).with_picks([0]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    let hit = standard_location(FiringArc::Front, 2);
    let out = apply_hit(&mut ctx, "a", &hit, 5, DamageKind::Standard).unwrap();
    assert_eq!((out.armor, out.structure), (5, 0));
    drop(ctx);

    assert!(log.iter().any(|e| matches!(
        e.kind,
        EventKind::CriticalHitRolled { location: Location::CenterTorso, roll: 8, criticals: 1, through_armor: true, .. }
    )));
    let unit = state.unit("a").unwrap();
    assert_eq!(unit.location(Location::CenterTorso).armor, 19);
    assert_eq!(unit.location(Location::CenterTorso).structure, 16);
    assert_eq!(unit.damage.engine_hits, 1);
}

#[test]
fn losing_the_gyro_drops_the_unit_for_good() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    // Fall face 1, fall damage on location 7, consciousness 9.
    let mut dice = ScriptedDice::new([1]).then_2d6([7, 9]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    // Centre torso slots 3 to 6 hold the gyro.
    critical::apply_critical(&mut ctx, "a", Location::CenterTorso, 3).unwrap();
    assert!(!ctx.unit("a").unwrap().prone);
    critical::apply_critical(&mut ctx, "a", Location::CenterTorso, 4).unwrap();
    drop(ctx);

    assert!(log.iter().any(|e| matches!(
        e.kind,
        EventKind::PsrResolved { roll: None, passed: false, automatic: true, .. }
    )));
    assert!(log.iter().any(|e| matches!(e.kind, EventKind::UnitFell { damage: 5, .. })));
    let unit = state.unit("a").unwrap();
    assert!(unit.prone);
    assert!(unit.gyro_destroyed());
    assert_eq!(dice.remaining(), 0);

    let stand = MovementOrder::StandUp { facing: Facing::NORTH };
    assert!(matches!(
        movement::plan(unit, &stand, &state, &config.terrain),
        Err(IllegalAction::Forbidden(_))
    ));
}

#[test]
fn cockpit_hit_kills_the_pilot() {
    let mut state = started(&[fifty()]);
    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);

    // Head slots: life support, sensors, cockpit, sensors, life support.
    let hit = critical::apply_critical(&mut ctx, "a", Location::Head, 2).unwrap();
    assert_eq!(hit, SlotContent::Cockpit);
    drop(ctx);

    let unit = state.unit("a").unwrap();
    assert_eq!(unit.destroyed, Some(DestructionCause::CockpitDestroyed));
    assert!(!unit.is_active());
}
