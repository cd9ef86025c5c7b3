//! Physical attack phase: punches, kicks, charges, death from above,
//! pushes and melee weapons.
//!
//! Declarations are secret until the phase resolves, exactly like
//! weapon attacks. Every attack shares the hit-location and damage
//! machinery; only the table, the damage formula and the follow-up
//! piloting rolls differ by kind.

use crate::{
    abilities::{sum_hooks, TraitHook},
    arc::{arc_of_target, compute_arc, FiringArc},
    cluster::damage_groups,
    config::BattleConfig,
    context::BattleContext,
    damage,
    declaration::{MovementMode, PhysicalDeclaration, PhysicalKind},
    error::{IllegalAction, SimResult},
    event::{AttackRef, DamageKind, EventKind},
    hex::Twist,
    hit_location::{resolve_hit_location, HitTable},
    phase::Phase,
    psr::{self, PsrReason, PsrTrigger},
    state::BattleState,
    to_hit::{compute_to_hit, AttackProfile, BattlefieldContext, ToHitBreakdown},
    unit::{ActuatorKind, Location, MeleeWeapon, UnitCombatState},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalDeclarations {
    pub attacks: Vec<PhysicalDeclaration>,
}

impl PhysicalDeclarations {
    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }
}

fn melee_weapon(kind: PhysicalKind) -> Option<MeleeWeapon> {
    match kind {
        PhysicalKind::Hatchet => Some(MeleeWeapon::Hatchet),
        PhysicalKind::Sword => Some(MeleeWeapon::Sword),
        PhysicalKind::Mace => Some(MeleeWeapon::Mace),
        _ => None,
    }
}

/// Attacks that use the whole body and exclude every other attack.
fn is_body_attack(kind: PhysicalKind) -> bool {
    matches!(kind, PhysicalKind::Charge | PhysicalKind::DeathFromAbove | PhysicalKind::Push)
}

/// Halve once per destroyed upper or lower actuator in the limb.
fn actuator_halving(attacker: &UnitCombatState, limb: Location, damage: u32) -> u32 {
    let (upper, lower) = if limb.is_leg() {
        (ActuatorKind::UpperLeg, ActuatorKind::LowerLeg)
    } else {
        (ActuatorKind::UpperArm, ActuatorKind::LowerArm)
    };
    let mut d = damage;
    for kind in [upper, lower] {
        if attacker.actuator_destroyed(limb, kind) {
            d /= 2;
        }
    }
    d.max(1)
}

/// Damage dealt to the target by a successful attack.
pub fn attack_damage(
    attacker: &UnitCombatState,
    kind: PhysicalKind,
    limb: Option<Location>,
    hexes_moved: u32,
) -> u32 {
    let t = attacker.tonnage;
    let base = match kind {
        PhysicalKind::Punch => t.div_ceil(10),
        PhysicalKind::Kick => t / 5,
        PhysicalKind::Hatchet => t / 5,
        PhysicalKind::Sword => t.div_ceil(10) + 1,
        PhysicalKind::Mace => t / 4,
        PhysicalKind::Push => return 0,
        PhysicalKind::Charge => t.div_ceil(10) * hexes_moved.saturating_sub(1).max(1),
        PhysicalKind::DeathFromAbove => (3 * t).div_ceil(10),
    };
    let base = match limb {
        Some(l) if !is_body_attack(kind) => actuator_halving(attacker, l, base),
        _ => base,
    };
    let bonus = sum_hooks(&attacker.traits(), |h| match h {
        TraitHook::PhysicalDamage(d) => Some(*d),
        _ => None,
    });
    (base as i32 + bonus).max(0) as u32
}

/// Damage the attacker takes from its own charge or death from above.
pub fn self_damage(attacker: &UnitCombatState, target: &UnitCombatState, kind: PhysicalKind) -> u32 {
    match kind {
        PhysicalKind::Charge => target.tonnage.div_ceil(10),
        PhysicalKind::DeathFromAbove => attacker.tonnage.div_ceil(5),
        _ => 0,
    }
}

pub fn hit_table(kind: PhysicalKind) -> HitTable {
    match kind {
        PhysicalKind::Kick => HitTable::Kick,
        PhysicalKind::Charge => HitTable::Standard,
        _ => HitTable::Punch,
    }
}

fn require_actuator(unit: &UnitCombatState, location: Location, actuator: ActuatorKind) -> Result<(), IllegalAction> {
    if unit.actuator_working(location, actuator) {
        Ok(())
    } else {
        Err(IllegalAction::ActuatorDestroyed { location, actuator })
    }
}

fn check_arm(unit: &UnitCombatState, arm: Location) -> Result<(), IllegalAction> {
    if unit.location_destroyed(arm) {
        return Err(IllegalAction::LocationDestroyed { location: arm });
    }
    require_actuator(unit, arm, ActuatorKind::Shoulder)?;
    if unit.activity.fired_locations.contains(&arm) {
        return Err(IllegalAction::LimbFiredThisTurn { location: arm });
    }
    Ok(())
}

/// Check a physical attack without changing anything.
pub fn validate(
    state: &BattleState,
    config: &BattleConfig,
    pending: &PhysicalDeclarations,
    decl: &PhysicalDeclaration,
) -> Result<(), IllegalAction> {
    if state.clock.phase != Phase::PhysicalAttack {
        return Err(IllegalAction::WrongPhase { action: "physical attack", phase: state.clock.phase });
    }
    let attacker = state
        .unit(&decl.attacker)
        .ok_or_else(|| IllegalAction::UnknownUnit(decl.attacker.clone()))?;
    attacker.ensure_can_act()?;
    let target = state
        .unit(&decl.target)
        .ok_or_else(|| IllegalAction::UnknownUnit(decl.target.clone()))?;
    if !target.is_active() {
        return Err(if target.withdrawn { IllegalAction::Withdrawn } else { IllegalAction::UnitDestroyed });
    }
    if target.side == attacker.side {
        return Err(IllegalAction::FriendlyTarget(target.id.clone()));
    }
    if attacker.prone {
        return Err(IllegalAction::Prone);
    }
    if attacker.position.distance(target.position) != 1 {
        return Err(IllegalAction::NotAdjacent);
    }

    let mine: Vec<&PhysicalDeclaration> = pending.attacks.iter().filter(|p| p.attacker == decl.attacker).collect();
    let body_used = attacker.activity.physical_body || mine.iter().any(|p| is_body_attack(p.kind));
    let kick_used = mine.iter().any(|p| p.kind == PhysicalKind::Kick)
        || attacker.activity.physical_limbs.iter().any(|l| l.is_leg());
    let any_used = !mine.is_empty() || body_used || !attacker.activity.physical_limbs.is_empty();

    let arc = arc_of_target(attacker.position, attacker.facing, attacker.twist, target.position);
    let leg_arc = arc_of_target(attacker.position, attacker.facing, Twist::None, target.position);

    match decl.kind {
        PhysicalKind::Punch | PhysicalKind::Hatchet | PhysicalKind::Sword | PhysicalKind::Mace => {
            let arm = decl
                .limb
                .filter(|l| l.is_arm())
                .ok_or(IllegalAction::Forbidden("arm attacks must name an arm"))?;
            if body_used || kick_used {
                return Err(IllegalAction::Forbidden("arm attacks cannot follow a kick or body attack"));
            }
            let used = mine.iter().any(|p| p.limb == Some(arm)) || attacker.activity.physical_limbs.contains(&arm);
            if used {
                return Err(IllegalAction::LimbAlreadyAttacked { location: arm });
            }
            check_arm(attacker, arm)?;
            let own_side = if arm == Location::LeftArm { FiringArc::Left } else { FiringArc::Right };
            if arc != FiringArc::Front && arc != own_side {
                return Err(IllegalAction::OutOfArc);
            }
            if let Some(weapon) = melee_weapon(decl.kind) {
                if !attacker.melee_working(arm, weapon) {
                    return Err(IllegalAction::Forbidden("no working melee weapon in that arm"));
                }
                require_actuator(attacker, arm, ActuatorKind::Hand)?;
            }
        }
        PhysicalKind::Kick => {
            let leg = decl
                .limb
                .filter(|l| l.is_leg())
                .ok_or(IllegalAction::Forbidden("kicks must name a leg"))?;
            if any_used {
                return Err(IllegalAction::Forbidden("a kick cannot be combined with other attacks"));
            }
            for l in [Location::LeftLeg, Location::RightLeg] {
                if attacker.location_destroyed(l) {
                    return Err(IllegalAction::LocationDestroyed { location: l });
                }
            }
            require_actuator(attacker, leg, ActuatorKind::Hip)?;
            if leg_arc != FiringArc::Front {
                return Err(IllegalAction::OutOfArc);
            }
        }
        PhysicalKind::Push => {
            if any_used {
                return Err(IllegalAction::Forbidden("a push cannot be combined with other attacks"));
            }
            for arm in [Location::LeftArm, Location::RightArm] {
                check_arm(attacker, arm)?;
            }
            if arc != FiringArc::Front {
                return Err(IllegalAction::OutOfArc);
            }
        }
        PhysicalKind::Charge | PhysicalKind::DeathFromAbove => {
            if any_used {
                return Err(IllegalAction::Forbidden("a body attack cannot be combined with other attacks"));
            }
            let mode = attacker.activity.movement.as_ref().map(|m| m.mode);
            let moved_right = match decl.kind {
                PhysicalKind::Charge => matches!(mode, Some(MovementMode::Walk | MovementMode::Run)),
                _ => mode == Some(MovementMode::Jump),
            };
            if !moved_right {
                return Err(IllegalAction::Forbidden(if decl.kind == PhysicalKind::Charge {
                    "charging requires walking or running this turn"
                } else {
                    "death from above requires jumping this turn"
                }));
            }
            if leg_arc != FiringArc::Front {
                return Err(IllegalAction::OutOfArc);
            }
        }
    }

    let profile = AttackProfile::Physical { kind: decl.kind, limb: decl.limb };
    let breakdown = compute_to_hit(attacker, target, &profile, &BattlefieldContext::new(state, config));
    if breakdown.is_impossible() {
        return Err(IllegalAction::ImpossibleShot { target: breakdown.total });
    }
    Ok(())
}

struct PhysicalSnapshot {
    to_hit:      ToHitBreakdown,
    arc:         FiringArc,
    damage:      u32,
    self_damage: u32,
}

/// Reveal and resolve every physical attack of the phase.
pub fn resolve_phase(ctx: &mut BattleContext, declarations: PhysicalDeclarations) -> SimResult<()> {
    let mut attacks = declarations.attacks;
    attacks.sort_by(|a, b| a.attacker.cmp(&b.attacker));
    for d in &attacks {
        ctx.emit(EventKind::PhysicalAttackDeclared {
            attacker: d.attacker.clone(),
            target:   d.target.clone(),
            kind:     d.kind,
            limb:     d.limb,
        })?;
    }
    log::info!("physical phase: {} attacks revealed", attacks.len());

    let mut snapshots = Vec::with_capacity(attacks.len());
    {
        let view = BattlefieldContext::new(&*ctx.state, ctx.config);
        for d in &attacks {
            let attacker = ctx.unit(&d.attacker)?;
            let target = ctx.unit(&d.target)?;
            let hexes = attacker.activity.movement.as_ref().map_or(0, |m| m.hexes);
            let profile = AttackProfile::Physical { kind: d.kind, limb: d.limb };
            snapshots.push(PhysicalSnapshot {
                to_hit:      compute_to_hit(attacker, target, &profile, &view),
                arc:         compute_arc(attacker.position, target.position, target.facing, target.twist),
                damage:      attack_damage(attacker, d.kind, d.limb, hexes),
                self_damage: self_damage(attacker, target, d.kind),
            });
        }
    }

    for (d, snapshot) in attacks.iter().zip(snapshots) {
        resolve_attack(ctx, d, snapshot)?;
    }

    psr::queue_damage_threshold(ctx);
    psr::drain_queue(ctx)
}

fn resolve_attack(ctx: &mut BattleContext, decl: &PhysicalDeclaration, snapshot: PhysicalSnapshot) -> SimResult<()> {
    let roll = ctx.roll_2d6();
    let hit = !snapshot.to_hit.is_impossible() && i32::from(roll) >= snapshot.to_hit.total;
    ctx.emit(EventKind::AttackResolved {
        attacker: decl.attacker.clone(),
        target:   decl.target.clone(),
        attack:   AttackRef::Physical { kind: decl.kind },
        to_hit:   snapshot.to_hit.clone(),
        roll,
        hit,
        cluster:  None,
    })?;
    log::debug!(
        "{} {:?} {}: need {}, rolled {roll}",
        decl.attacker,
        decl.kind,
        decl.target,
        snapshot.to_hit.total
    );

    if hit {
        let grouped = matches!(decl.kind, PhysicalKind::Charge | PhysicalKind::DeathFromAbove);
        strike(ctx, &decl.target, snapshot.arc, hit_table(decl.kind), snapshot.damage, grouped)?;
        if snapshot.self_damage > 0 {
            let table = if decl.kind == PhysicalKind::DeathFromAbove { HitTable::Kick } else { HitTable::Standard };
            strike(ctx, &decl.attacker, FiringArc::Front, table, snapshot.self_damage, true)?;
        }
    }

    match (decl.kind, hit) {
        (PhysicalKind::Kick, true) => ctx.queue_psr(&decl.target, PsrTrigger::new(PsrReason::Kicked)),
        (PhysicalKind::Kick, false) => ctx.queue_psr(&decl.attacker, PsrTrigger::new(PsrReason::KickMissed)),
        (PhysicalKind::Charge, true) => {
            ctx.queue_psr(&decl.target, PsrTrigger::new(PsrReason::Charged));
            ctx.queue_psr(&decl.attacker, PsrTrigger::new(PsrReason::Charging));
        }
        (PhysicalKind::DeathFromAbove, true) => {
            ctx.queue_psr(&decl.target, PsrTrigger::new(PsrReason::DfaTarget));
            ctx.queue_psr(&decl.attacker, PsrTrigger::new(PsrReason::DfaAttacker));
        }
        (PhysicalKind::DeathFromAbove, false) => ctx.queue_psr(
            &decl.attacker,
            PsrTrigger::new(PsrReason::DfaMissed).automatic().from_height(1),
        ),
        (PhysicalKind::Push, true) => push(ctx, decl)?,
        _ => {}
    }
    Ok(())
}

/// Land a blow. Charges and death from above arrive in five-point
/// groups, everything else in one piece.
fn strike(
    ctx: &mut BattleContext,
    unit: &str,
    arc: FiringArc,
    table: HitTable,
    amount: u32,
    grouped: bool,
) -> SimResult<()> {
    let (groups, kind) = if grouped {
        (damage_groups(amount, 1, 5), DamageKind::Cluster)
    } else {
        (vec![amount], DamageKind::Physical)
    };
    for group in groups {
        if group == 0 || ctx.unit(unit)?.is_destroyed() {
            break;
        }
        let hit = resolve_hit_location(arc, table, &mut *ctx.dice);
        damage::apply_hit(ctx, unit, &hit, group, kind)?;
    }
    Ok(())
}

/// Shove the target one hex straight away from the attacker.
fn push(ctx: &mut BattleContext, decl: &PhysicalDeclaration) -> SimResult<()> {
    let attacker = ctx.unit(&decl.attacker)?;
    let target = ctx.unit(&decl.target)?;
    let from = target.position;
    if let Some(dir) = attacker.position.direction_to_adjacent(from) {
        let to = from.neighbor(dir);
        if ctx.state.unit_at(to).is_none() && target.is_active() {
            ctx.emit(EventKind::UnitDisplaced {
                unit: decl.target.clone(),
                from,
                to,
            })?;
            log::info!("{} pushed from {from} to {to}", decl.target);
        }
    }
    ctx.queue_psr(&decl.target, PsrTrigger::new(PsrReason::Pushed));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abilities::TraitId,
        config::WeaponCatalog,
        hex::{Facing, HexCoord},
        unit::UnitSpec,
    };

    fn seventy() -> UnitCombatState {
        UnitSpec::biped("a", 0, 70, 4).build(&WeaponCatalog::builtin()).unwrap()
    }

    #[test]
    fn seventy_ton_damage_by_kind() {
        let unit = seventy();
        assert_eq!(attack_damage(&unit, PhysicalKind::Punch, Some(Location::RightArm), 0), 7);
        assert_eq!(attack_damage(&unit, PhysicalKind::Hatchet, Some(Location::RightArm), 0), 14);
        assert_eq!(attack_damage(&unit, PhysicalKind::Kick, Some(Location::RightLeg), 0), 14);
        assert_eq!(attack_damage(&unit, PhysicalKind::Sword, Some(Location::RightArm), 0), 8);
        assert_eq!(attack_damage(&unit, PhysicalKind::Mace, Some(Location::RightArm), 0), 17);
        assert_eq!(attack_damage(&unit, PhysicalKind::Charge, None, 5), 28);
        assert_eq!(attack_damage(&unit, PhysicalKind::DeathFromAbove, None, 3), 21);
        assert_eq!(attack_damage(&unit, PhysicalKind::Push, None, 0), 0);
    }

    #[test]
    fn broken_arm_actuators_halve_punches() {
        let mut unit = seventy();
        unit.damage.actuators.insert((Location::RightArm, ActuatorKind::LowerArm));
        assert_eq!(attack_damage(&unit, PhysicalKind::Punch, Some(Location::RightArm), 0), 3);
        unit.damage.actuators.insert((Location::RightArm, ActuatorKind::UpperArm));
        assert_eq!(attack_damage(&unit, PhysicalKind::Punch, Some(Location::RightArm), 0), 1);
    }

    #[test]
    fn melee_specialist_hits_harder() {
        let unit = UnitSpec::biped("a", 0, 70, 4)
            .with_ability(TraitId::MeleeSpecialist)
            .build(&WeaponCatalog::builtin())
            .unwrap();
        assert_eq!(attack_damage(&unit, PhysicalKind::Punch, Some(Location::LeftArm), 0), 8);
    }

    fn brawl(target_at: HexCoord) -> BattleState {
        let catalog = WeaponCatalog::builtin();
        let a = UnitSpec::biped("a", 0, 70, 4).build(&catalog).unwrap();
        let b = UnitSpec::biped("b", 1, 50, 4).at(target_at, Facing::SOUTH).build(&catalog).unwrap();
        let mut state = BattleState::default();
        state.clock.phase = Phase::PhysicalAttack;
        state.units.insert(a.id.clone(), a);
        state.units.insert(b.id.clone(), b);
        state
    }

    #[test]
    fn punches_need_an_adjacent_target() {
        let state = brawl(HexCoord::new(0, -2));
        let decl = PhysicalDeclaration::new("a", "b", PhysicalKind::Punch, Some(Location::RightArm));
        assert_eq!(
            validate(&state, &BattleConfig::default_test(), &PhysicalDeclarations::default(), &decl),
            Err(IllegalAction::NotAdjacent)
        );
    }

    #[test]
    fn an_arm_that_fired_cannot_punch() {
        let mut state = brawl(HexCoord::new(0, -1));
        if let Some(a) = state.units.get_mut("a") {
            a.activity.fired_locations.insert(Location::RightArm);
        }
        let config = BattleConfig::default_test();
        let pending = PhysicalDeclarations::default();
        let right = PhysicalDeclaration::new("a", "b", PhysicalKind::Punch, Some(Location::RightArm));
        let left = PhysicalDeclaration::new("a", "b", PhysicalKind::Punch, Some(Location::LeftArm));
        assert_eq!(
            validate(&state, &config, &pending, &right),
            Err(IllegalAction::LimbFiredThisTurn { location: Location::RightArm })
        );
        assert_eq!(validate(&state, &config, &pending, &left), Ok(()));
    }

    #[test]
    fn kicks_exclude_punches() {
        let state = brawl(HexCoord::new(0, -1));
        let pending = PhysicalDeclarations {
            attacks: vec![PhysicalDeclaration::new("a", "b", PhysicalKind::Kick, Some(Location::LeftLeg))],
        };
        let punch = PhysicalDeclaration::new("a", "b", PhysicalKind::Punch, Some(Location::RightArm));
        assert!(matches!(
            validate(&state, &BattleConfig::default_test(), &pending, &punch),
            Err(IllegalAction::Forbidden(_))
        ));
    }

    #[test]
    fn destroyed_shoulder_forbids_the_punch() {
        let mut state = brawl(HexCoord::new(0, -1));
        if let Some(a) = state.units.get_mut("a") {
            a.damage.actuators.insert((Location::LeftArm, ActuatorKind::Shoulder));
        }
        let decl = PhysicalDeclaration::new("a", "b", PhysicalKind::Punch, Some(Location::LeftArm));
        assert_eq!(
            validate(&state, &BattleConfig::default_test(), &PhysicalDeclarations::default(), &decl),
            Err(IllegalAction::ActuatorDestroyed {
                location: Location::LeftArm,
                actuator: ActuatorKind::Shoulder,
            })
        );
    }
}
