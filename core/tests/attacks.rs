//! Weapon and physical attacks resolved through a live battle, with
//! every roll scripted.

use mechcombat_core::{
    config::{BattleConfig, WeaponCatalog},
    context::BattleContext,
    declaration::{AttackDeclaration, Declaration, MovementOrder, PhysicalDeclaration, PhysicalKind},
    engine::Battle,
    error::IllegalAction,
    event::{AttackRef, DamageKind, EventKind, GameEvent},
    hex::{Facing, HexCoord},
    phase::Phase,
    rng::ScriptedDice,
    state::BattleState,
    unit::{Location, MeleeWeapon, UnitSpec},
    weapon_attack::{self, PendingAttack, WeaponDeclarations},
};

/// Side 0 rolls 4 and side 1 rolls 9 for initiative, then `rolls`.
fn battle(forces: &[UnitSpec], rolls: ScriptedDice) -> Battle {
    let mut battle =
        Battle::with_dice("attacks", 1, BattleConfig::default_test(), forces, Box::new(rolls)).expect("battle");
    battle.advance_phase().expect("initiative");
    for unit in ["a", "b"] {
        battle
            .apply_declaration(Declaration::Move { unit: unit.into(), order: MovementOrder::Stationary })
            .expect("hold");
    }
    battle.advance_phase().expect("movement");
    assert_eq!(battle.phase(), Phase::WeaponAttack);
    battle
}

fn duel(distance: i32, shooter: UnitSpec) -> Vec<UnitSpec> {
    vec![
        shooter.at(HexCoord::new(0, 0), Facing::NORTH),
        UnitSpec::biped("b", 1, 50, 5).at(HexCoord::new(0, -distance), Facing::SOUTH),
    ]
}

#[test]
fn medium_laser_hits_the_centre_torso() {
    let shooter = UnitSpec::biped("a", 0, 50, 5).with_weapon("medium_laser", Location::RightArm);
    // To-hit 8, location 7.
    let mut battle = battle(&duel(6, shooter), ScriptedDice::from_2d6([4, 9, 8, 7]));

    battle
        .apply_declaration(Declaration::WeaponAttack(AttackDeclaration::new("a", "b", 0)))
        .expect("declare");
    let events = battle.advance_phase().expect("resolve");

    let (to_hit, roll, hit) = events
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::AttackResolved { to_hit, roll, hit, attack: AttackRef::Weapon { weapon: 0 }, .. } => {
                Some((to_hit.clone(), *roll, *hit))
            }
            _ => None,
        })
        .expect("attack resolved");
    assert_eq!(to_hit.term("gunnery"), Some(4));
    assert_eq!(to_hit.term("range"), Some(2));
    assert_eq!(to_hit.total, 6);
    assert_eq!(roll, 8);
    assert!(hit);

    assert!(events.iter().any(|e| matches!(
        &e.kind,
        EventKind::DamageApplied { unit, location: Location::CenterTorso, rear: false, armor: 5, structure: 0, kind: DamageKind::Standard }
            if unit == "b"
    )));
    assert_eq!(battle.state().unit("b").unwrap().location(Location::CenterTorso).armor, 19);
    assert_eq!(battle.state().unit("a").unwrap().activity.weapon_heat, 3);
}

#[test]
fn a_miss_leaves_the_target_untouched() {
    let shooter = UnitSpec::biped("a", 0, 50, 5).with_weapon("medium_laser", Location::RightArm);
    let mut battle = battle(&duel(6, shooter), ScriptedDice::from_2d6([4, 9, 5]));
    let armor_before = battle.state().unit("b").unwrap().total_armor();

    battle
        .apply_declaration(Declaration::WeaponAttack(AttackDeclaration::new("a", "b", 0)))
        .expect("declare");
    let events = battle.advance_phase().expect("resolve");

    assert!(events.iter().any(|e| matches!(e.kind, EventKind::AttackResolved { hit: false, roll: 5, .. })));
    assert!(!events.iter().any(|e| matches!(e.kind, EventKind::DamageApplied { .. })));
    assert_eq!(battle.state().unit("b").unwrap().total_armor(), armor_before);
}

#[test]
fn empty_bins_are_refused_before_any_roll() {
    let shooter = UnitSpec::biped("a", 0, 50, 5)
        .with_weapon("ac10", Location::RightTorso)
        .with_partial_ammo("ac10_ammo", Location::RightTorso, 0);
    let mut battle = battle(&duel(6, shooter), ScriptedDice::from_2d6([4, 9]));
    let logged = battle.events().len();

    let err = battle
        .apply_declaration(Declaration::WeaponAttack(AttackDeclaration::new("a", "b", 0)))
        .unwrap_err();
    assert_eq!(err.illegal_reason(), Some(&IllegalAction::NoAmmo { weapon: 0 }));
    assert_eq!(battle.events().len(), logged);
}

#[test]
fn firing_spends_a_round() {
    let shooter = UnitSpec::biped("a", 0, 50, 5)
        .with_weapon("ac10", Location::RightTorso)
        .with_partial_ammo("ac10_ammo", Location::RightTorso, 2);
    let mut battle = battle(&duel(6, shooter), ScriptedDice::from_2d6([4, 9, 3]));

    battle
        .apply_declaration(Declaration::WeaponAttack(AttackDeclaration::new("a", "b", 0)))
        .expect("declare");
    battle.advance_phase().expect("resolve");
    assert_eq!(battle.state().unit("a").unwrap().ammo[0].rounds, 1);
}

#[test]
fn friendly_fire_is_refused() {
    let forces = vec![
        UnitSpec::biped("a", 0, 50, 5)
            .at(HexCoord::new(0, 0), Facing::NORTH)
            .with_weapon("medium_laser", Location::RightArm),
        UnitSpec::biped("b", 1, 50, 5).at(HexCoord::new(0, -8), Facing::SOUTH),
        UnitSpec::biped("c", 0, 50, 5).at(HexCoord::new(0, -3), Facing::NORTH),
    ];
    let dice = ScriptedDice::from_2d6([4, 9]);
    let mut battle = Battle::with_dice("ff", 1, BattleConfig::default_test(), &forces, Box::new(dice)).expect("battle");
    for _ in 0..2 {
        battle.advance_phase().expect("advance");
    }
    let err = battle
        .apply_declaration(Declaration::WeaponAttack(AttackDeclaration::new("a", "c", 0)))
        .unwrap_err();
    assert_eq!(err.illegal_reason(), Some(&IllegalAction::FriendlyTarget("c".into())));
}

#[test]
fn kick_lands_on_a_leg_and_forces_a_roll() {
    let kicker = UnitSpec::biped("a", 0, 50, 5);
    // Kick roll 9, kick table face 2 (right leg), target's PSR 8.
    let dice = ScriptedDice::from_2d6([4, 9, 9]).then_d6([2]).then_2d6([8]);
    let mut battle = battle(&duel(1, kicker), dice);
    battle.advance_phase().expect("weapon phase");
    assert_eq!(battle.phase(), Phase::PhysicalAttack);

    battle
        .apply_declaration(Declaration::PhysicalAttack(PhysicalDeclaration::new(
            "a",
            "b",
            PhysicalKind::Kick,
            Some(Location::RightLeg),
        )))
        .expect("declare kick");
    let events = battle.advance_phase().expect("resolve");

    let to_hit = events
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::AttackResolved { to_hit, hit: true, .. } => Some(to_hit.clone()),
            _ => None,
        })
        .expect("kick hits");
    assert_eq!(to_hit.term("piloting"), Some(5));
    assert_eq!(to_hit.term("attack_type"), Some(-2));
    assert_eq!(to_hit.total, 3);

    // Fifty tons kicks for ten.
    let target = battle.state().unit("b").unwrap();
    assert_eq!(target.location(Location::RightLeg).armor, 14);
    assert!(!target.prone);
    assert!(events.iter().any(|e| matches!(
        &e.kind,
        EventKind::PsrResolved { unit, roll: Some(8), passed: true, .. } if unit == "b"
    )));
}

#[test]
fn kicks_need_an_adjacent_target() {
    let kicker = UnitSpec::biped("a", 0, 50, 5);
    let mut battle = battle(&duel(2, kicker), ScriptedDice::from_2d6([4, 9]));
    battle.advance_phase().expect("weapon phase");

    let err = battle
        .apply_declaration(Declaration::PhysicalAttack(PhysicalDeclaration::new(
            "a",
            "b",
            PhysicalKind::Kick,
            Some(Location::RightLeg),
        )))
        .unwrap_err();
    assert_eq!(err.illegal_reason(), Some(&IllegalAction::NotAdjacent));
}

#[test]
fn weapons_and_physicals_are_refused_in_the_wrong_phase() {
    let shooter = UnitSpec::biped("a", 0, 50, 5).with_weapon("medium_laser", Location::RightArm);
    let mut battle = battle(&duel(1, shooter), ScriptedDice::from_2d6([4, 9]));

    let err = battle
        .apply_declaration(Declaration::PhysicalAttack(PhysicalDeclaration::new(
            "a",
            "b",
            PhysicalKind::Punch,
            Some(Location::LeftArm),
        )))
        .unwrap_err();
    assert!(matches!(err.illegal_reason(), Some(IllegalAction::WrongPhase { .. })));

    battle.advance_phase().expect("weapon phase");
    let err = battle
        .apply_declaration(Declaration::WeaponAttack(AttackDeclaration::new("a", "b", 0)))
        .unwrap_err();
    assert!(matches!(err.illegal_reason(), Some(IllegalAction::WrongPhase { .. })));
}

/// Declares one physical attack from "a" on "b" and resolves the phase.
fn physical_blow(attacker: UnitSpec, kind: PhysicalKind, limb: Location, dice: ScriptedDice) -> (Battle, Vec<GameEvent>) {
    let mut battle = battle(&duel(1, attacker), dice);
    battle.advance_phase().expect("weapon phase");
    battle
        .apply_declaration(Declaration::PhysicalAttack(PhysicalDeclaration::new("a", "b", kind, Some(limb))))
        .expect("declare");
    let events = battle.advance_phase().expect("resolve");
    (battle, events)
}

#[test]
fn punches_to_the_head_are_capped() {
    // Punch roll 12, punch table face 6 (head).
    let dice = ScriptedDice::from_2d6([4, 9, 12]).then_d6([6]);
    let (battle, events) = physical_blow(UnitSpec::biped("a", 0, 70, 4), PhysicalKind::Punch, Location::RightArm, dice);

    // Seventy tons punches for seven; only three reach the head.
    assert!(events.iter().any(|e| matches!(
        &e.kind,
        EventKind::DamageApplied { unit, location: Location::Head, armor: 3, structure: 0, kind: DamageKind::Physical, .. }
            if unit == "b"
    )));
    let target = battle.state().unit("b").unwrap();
    assert_eq!(target.location(Location::Head).armor, 6);
    assert_eq!(target.location(Location::Head).structure, 3);
}

#[test]
fn hatchet_lands_in_one_piece() {
    let attacker = UnitSpec::biped("a", 0, 70, 4).with_melee(MeleeWeapon::Hatchet, Location::RightArm);
    // Hatchet roll 12, punch table face 3 (centre torso).
    let dice = ScriptedDice::from_2d6([4, 9, 12]).then_d6([3]);
    let (battle, events) = physical_blow(attacker, PhysicalKind::Hatchet, Location::RightArm, dice);

    assert!(events.iter().any(|e| matches!(
        &e.kind,
        EventKind::AttackResolved { attack: AttackRef::Physical { kind: PhysicalKind::Hatchet }, hit: true, .. }
    )));
    let blows: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::DamageApplied { unit, location, armor, structure, .. } if unit == "b" => {
                Some((*location, *armor, *structure))
            }
            _ => None,
        })
        .collect();
    assert_eq!(blows, vec![(Location::CenterTorso, 14, 0)]);
    assert_eq!(battle.state().unit("b").unwrap().location(Location::CenterTorso).armor, 10);
}

#[test]
fn attack_whose_feed_is_gone_is_cancelled_in_the_log() {
    let catalog = WeaponCatalog::builtin();
    let units = duel(
        6,
        UnitSpec::biped("a", 0, 50, 5)
            .with_weapon("ac10", Location::RightTorso)
            .with_partial_ammo("ac10_ammo", Location::RightTorso, 1),
    )
    .iter()
    .map(|s| s.build(&catalog).expect("build unit"))
    .collect();
    let mut state = BattleState::default();
    state
        .apply(&GameEvent {
            seq:   0,
            turn:  1,
            phase: Phase::Initiative,
            kind:  EventKind::BattleStarted {
                battle_id:  "cancelled".into(),
                seed:       0,
                turn_limit: 10,
                units,
            },
        })
        .expect("start");
    state.clock.phase = Phase::WeaponAttack;
    // Declared with a round in the bin; the round is gone by resolution.
    state.units.get_mut("a").unwrap().ammo[0].rounds = 0;

    let mut log = Vec::new();
    let mut dice = ScriptedDice::new([]);
    let config = BattleConfig::default_test();
    let mut ctx = BattleContext::new(&mut state, &mut log, &mut dice, &config);
    let declarations = WeaponDeclarations {
        attacks: vec![PendingAttack { declaration: AttackDeclaration::new("a", "b", 0), primary: true }],
        ..Default::default()
    };
    weapon_attack::resolve_phase(&mut ctx, declarations).expect("resolve");
    drop(ctx);

    let names: Vec<_> = log.iter().map(|e| e.kind.name()).collect();
    assert_eq!(names, vec!["attack_declared", "attack_cancelled"]);
    assert!(matches!(
        &log[1].kind,
        EventKind::AttackCancelled { attacker, weapon: 0, reason, .. }
            if attacker == "a" && *reason == IllegalAction::NoAmmo { weapon: 0 }.to_string()
    ));
    assert_eq!(dice.remaining(), 0);
}
