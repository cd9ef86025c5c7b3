//! Weapon attack phase: declaration checks and simultaneous resolution.
//!
//! RESOLUTION ORDER:
//!   1. Reveal: torso twists, then every declaration sorted by attacker.
//!   2. Snapshot to-hit and struck arc for every attack before any roll.
//!   3. Per attack: ammo, heat, to-hit roll, jam check, cluster roll,
//!      hit locations and damage.
//!   4. Damage-threshold PSRs are queued, then the PSR queue is drained.
//!
//! Units destroyed during step 3 still fire what they declared.

use crate::{
    abilities::{sum_hooks, TraitHook},
    ammo,
    arc::{arc_of_target, compute_arc, FiringArc},
    cluster::{damage_groups, roll_cluster},
    config::{BattleConfig, FireMode, WeaponSpec},
    context::BattleContext,
    damage,
    declaration::{AttackDeclaration, CalledShot},
    error::{IllegalAction, SimResult},
    event::{AttackRef, ClusterRoll, DamageKind, EventKind},
    hex::Twist,
    hit_location::{resolve_hit_location, HitTable},
    phase::Phase,
    psr,
    state::BattleState,
    to_hit::{compute_to_hit, ew_state, AttackProfile, BattlefieldContext, ToHitBreakdown},
    types::UnitId,
    unit::{Location, MountedWeapon, UnitCombatState},
};
use std::collections::BTreeMap;

/// An accepted declaration waiting for the reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttack {
    pub declaration: AttackDeclaration,
    pub primary:     bool,
}

/// Everything declared so far this weapon phase. Nothing here is visible
/// in the event log until the phase resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaponDeclarations {
    pub attacks: Vec<PendingAttack>,
    pub twists:  BTreeMap<UnitId, Twist>,
}

impl WeaponDeclarations {
    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty() && self.twists.is_empty()
    }

    /// Twist the unit will have once the phase is revealed.
    pub fn twist_for(&self, unit: &UnitCombatState) -> Twist {
        self.twists.get(&unit.id).copied().unwrap_or(unit.twist)
    }

    fn declared_by<'a>(&'a self, attacker: &'a str) -> impl Iterator<Item = &'a PendingAttack> + 'a {
        self.attacks.iter().filter(move |p| p.declaration.attacker == attacker)
    }
}

/// May a weapon in this mount reach a target lying in `arc`?
/// `leg_arc` is the arc measured without torso twist.
pub fn mount_covers(mount: &MountedWeapon, arc: FiringArc, leg_arc: FiringArc) -> bool {
    if mount.rear {
        return arc == FiringArc::Rear;
    }
    match mount.location {
        Location::LeftArm => matches!(arc, FiringArc::Front | FiringArc::Left),
        Location::RightArm => matches!(arc, FiringArc::Front | FiringArc::Right),
        Location::LeftLeg | Location::RightLeg => leg_arc == FiringArc::Front,
        _ => arc == FiringArc::Front,
    }
}

/// Highest natural to-hit roll on which the weapon jams, if it can.
pub fn jam_threshold(mode: FireMode, rate: u8, mount: &MountedWeapon) -> Option<u8> {
    if rate <= 1 {
        return None;
    }
    let base = match mode {
        FireMode::Standard => return None,
        FireMode::Ultra => 2,
        FireMode::Rotary if rate >= 5 => 3,
        FireMode::Rotary => 2,
    };
    Some(base + mount.quirks.iter().map(|q| q.jam_threshold()).sum::<u8>())
}

/// Heat for one firing: weapon heat per shot plus cooling quirks.
pub fn firing_heat(spec: &WeaponSpec, mount: &MountedWeapon, rate: u8) -> u32 {
    let quirks: i32 = mount.quirks.iter().map(|q| q.heat()).sum();
    (spec.heat as i32 * i32::from(rate.max(1)) + quirks).max(0) as u32
}

fn validate_phase(state: &BattleState, action: &'static str) -> Result<(), IllegalAction> {
    if state.clock.phase != Phase::WeaponAttack {
        return Err(IllegalAction::WrongPhase { action, phase: state.clock.phase });
    }
    Ok(())
}

/// Check a torso twist without changing anything.
pub fn validate_twist(
    state: &BattleState,
    pending: &WeaponDeclarations,
    unit_id: &str,
    twist: Twist,
) -> Result<(), IllegalAction> {
    validate_phase(state, "torso twist")?;
    let unit = state
        .unit(unit_id)
        .ok_or_else(|| IllegalAction::UnknownUnit(unit_id.to_string()))?;
    unit.ensure_can_act()?;
    if unit.prone {
        return Err(IllegalAction::Prone);
    }
    if pending.declared_by(unit_id).next().is_some() {
        return Err(IllegalAction::Forbidden("torso twist must come before the unit's first attack"));
    }
    if pending.twists.contains_key(unit_id) || unit.twist != Twist::None {
        return Err(IllegalAction::Forbidden("torso already twisted this turn"));
    }
    if twist == Twist::None {
        return Err(IllegalAction::Forbidden("twist must be left or right"));
    }
    Ok(())
}

/// Check a weapon attack without changing anything. Returns whether the
/// target would be the attacker's primary target.
pub fn validate(
    state: &BattleState,
    config: &BattleConfig,
    pending: &WeaponDeclarations,
    decl: &AttackDeclaration,
) -> Result<bool, IllegalAction> {
    validate_phase(state, "weapon attack")?;
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

    let weapon = decl.weapon;
    let mount = attacker.weapons.get(weapon).ok_or(IllegalAction::UnknownWeapon { weapon })?;
    let spec = config
        .catalog
        .weapon(&mount.weapon_id)
        .ok_or(IllegalAction::UnknownWeapon { weapon })?;
    if !attacker.weapon_working(weapon) {
        return Err(IllegalAction::WeaponDestroyed { weapon });
    }
    if mount.jammed {
        return Err(IllegalAction::WeaponJammed { weapon });
    }
    if pending.declared_by(&decl.attacker).any(|p| p.declaration.weapon == weapon) {
        return Err(IllegalAction::WeaponAlreadyDeclared { weapon });
    }
    if decl.rate == 0 || decl.rate > spec.fire_mode.max_rate() {
        return Err(IllegalAction::InvalidRate { weapon, rate: decl.rate });
    }

    let twist = pending.twist_for(attacker);
    let arc = arc_of_target(attacker.position, attacker.facing, twist, target.position);
    let leg_arc = arc_of_target(attacker.position, attacker.facing, Twist::None, target.position);
    if !mount_covers(mount, arc, leg_arc) {
        return Err(IllegalAction::OutOfArc);
    }

    let distance = attacker.position.distance(target.position);
    if distance > spec.long {
        return Err(IllegalAction::OutOfRange { distance });
    }
    if config.terrain.line_of_sight_blocked(attacker.position, target.position) {
        return Err(IllegalAction::NoLineOfSight);
    }

    let reserved: u32 = match &spec.ammo_type {
        Some(ammo_type) => pending
            .declared_by(&decl.attacker)
            .filter(|p| {
                attacker
                    .weapons
                    .get(p.declaration.weapon)
                    .and_then(|m| config.catalog.weapon(&m.weapon_id))
                    .is_some_and(|s| s.ammo_type.as_ref() == Some(ammo_type))
            })
            .map(|p| ammo::rounds_needed(p.declaration.rate))
            .sum(),
        None => 0,
    };
    ammo::check_available(attacker, &config.catalog, weapon, decl.rate, reserved)?;

    if decl.called_shot.is_some() && !config.rules.called_shots {
        return Err(IllegalAction::Forbidden("called shots are disabled"));
    }

    let primary = pending
        .declared_by(&decl.attacker)
        .next()
        .map_or(true, |first| first.declaration.target == decl.target);

    let mut shooter = attacker.clone();
    shooter.twist = twist;
    let profile = AttackProfile::Weapon {
        index:       weapon,
        spec,
        secondary:   !primary,
        called_shot: decl.called_shot,
    };
    let breakdown = compute_to_hit(&shooter, target, &profile, &BattlefieldContext::new(state, config));
    if breakdown.is_impossible() {
        return Err(IllegalAction::ImpossibleShot { target: breakdown.total });
    }
    Ok(primary)
}

/// Frozen at the start of resolution.
struct AttackSnapshot {
    to_hit:            ToHitBreakdown,
    arc:               FiringArc,
    partial_cover:     bool,
    artemis_nullified: bool,
}

/// Reveal and resolve every declaration of the phase.
pub fn resolve_phase(ctx: &mut BattleContext, declarations: WeaponDeclarations) -> SimResult<()> {
    for (unit, twist) in &declarations.twists {
        ctx.emit(EventKind::TorsoTwisted {
            unit:  unit.clone(),
            twist: *twist,
        })?;
    }

    let mut attacks = declarations.attacks;
    attacks.sort_by(|a, b| a.declaration.attacker.cmp(&b.declaration.attacker));
    for p in &attacks {
        let d = &p.declaration;
        ctx.emit(EventKind::AttackDeclared {
            attacker:    d.attacker.clone(),
            target:      d.target.clone(),
            weapon:      d.weapon,
            rate:        d.rate,
            primary:     p.primary,
            called_shot: d.called_shot,
        })?;
    }
    log::info!("weapon phase: {} attacks revealed", attacks.len());

    let mut snapshots = Vec::with_capacity(attacks.len());
    {
        let view = BattlefieldContext::new(&*ctx.state, ctx.config);
        for p in &attacks {
            let d = &p.declaration;
            let attacker = ctx.unit(&d.attacker)?;
            let target = ctx.unit(&d.target)?;
            let mount = &attacker.weapons[d.weapon];
            let spec = weapon_spec(ctx, mount)?;
            let profile = AttackProfile::Weapon {
                index:       d.weapon,
                spec,
                secondary:   !p.primary,
                called_shot: d.called_shot,
            };
            snapshots.push(AttackSnapshot {
                to_hit:            compute_to_hit(attacker, target, &profile, &view),
                arc:               compute_arc(attacker.position, target.position, target.facing, target.twist),
                partial_cover:     ctx.config.rules.partial_cover
                    && ctx.config.terrain.partial_cover(attacker.position, target.position),
                artemis_nullified: ctx.config.rules.equipment_modifiers
                    && ew_state(attacker, target, view.units).artemis_nullified(),
            });
        }
    }

    for (p, snapshot) in attacks.iter().zip(snapshots) {
        resolve_attack(ctx, &p.declaration, snapshot)?;
    }

    psr::queue_damage_threshold(ctx);
    psr::drain_queue(ctx)
}

fn weapon_spec<'c>(ctx: &BattleContext<'c>, mount: &MountedWeapon) -> SimResult<&'c WeaponSpec> {
    let config: &'c BattleConfig = ctx.config;
    config.catalog.weapon(&mount.weapon_id).ok_or_else(|| {
        crate::error::SimError::invariant(
            ctx.state.next_seq(),
            format!("weapon '{}' vanished from the catalog", mount.weapon_id),
        )
    })
}

fn resolve_attack(ctx: &mut BattleContext, decl: &AttackDeclaration, snapshot: AttackSnapshot) -> SimResult<()> {
    let attacker = ctx.unit(&decl.attacker)?;
    let mount = attacker.weapons[decl.weapon].clone();
    let spec = weapon_spec(ctx, &mount)?;
    if let Err(reason) = ammo::check_available(attacker, &ctx.config.catalog, decl.weapon, decl.rate, 0) {
        // The feed went up earlier in the phase.
        log::warn!("{} weapon {} cannot fire: {reason}", decl.attacker, decl.weapon);
        ctx.emit(EventKind::AttackCancelled {
            attacker: decl.attacker.clone(),
            target:   decl.target.clone(),
            weapon:   decl.weapon,
            reason:   reason.to_string(),
        })?;
        return Ok(());
    }
    let cluster_bonus = if ctx.config.rules.trait_modifiers {
        sum_hooks(&attacker.traits(), |h| match h {
            TraitHook::ClusterRoll(d) => Some(*d),
            _ => None,
        })
    } else {
        0
    };
    let ammo_modifier = spec
        .ammo_type
        .as_ref()
        .and_then(|t| attacker.ammo.iter().find(|b| !b.destroyed && b.rounds > 0 && &b.ammo_type == t))
        .map_or(0, |b| b.cluster_modifier);

    ammo::consume(ctx, &decl.attacker, decl.weapon, decl.rate)?;
    ctx.emit(EventKind::WeaponFired {
        unit:   decl.attacker.clone(),
        weapon: decl.weapon,
        rate:   decl.rate,
        heat:   firing_heat(spec, &mount, decl.rate),
    })?;

    let roll = ctx.roll_2d6();
    let jammed = jam_threshold(spec.fire_mode, decl.rate, &mount).is_some_and(|t| roll <= t);
    if jammed {
        ctx.emit(EventKind::WeaponJammed {
            unit:   decl.attacker.clone(),
            weapon: decl.weapon,
        })?;
        log::info!("{} weapon {} jams on a natural {roll}", decl.attacker, decl.weapon);
    }
    let hit = !jammed && !snapshot.to_hit.is_impossible() && i32::from(roll) >= snapshot.to_hit.total;

    let mut cluster: Option<ClusterRoll> = None;
    let (groups, kind) = if !hit {
        (Vec::new(), DamageKind::Standard)
    } else if let Some(c) = spec.cluster {
        let artemis = if mount.artemis && !snapshot.artemis_nullified { 2 } else { 0 };
        let r = roll_cluster(c.rack, artemis + ammo_modifier + cluster_bonus, &mut *ctx.dice);
        cluster = Some(r);
        (damage_groups(r.hits, c.damage_per_missile, c.group), DamageKind::Cluster)
    } else if decl.rate > 1 {
        let r = roll_cluster(u32::from(decl.rate), cluster_bonus, &mut *ctx.dice);
        cluster = Some(r);
        (damage_groups(r.hits, spec.damage, 1), DamageKind::Cluster)
    } else {
        (vec![spec.damage], DamageKind::Standard)
    };

    ctx.emit(EventKind::AttackResolved {
        attacker: decl.attacker.clone(),
        target:   decl.target.clone(),
        attack:   AttackRef::Weapon { weapon: decl.weapon },
        to_hit:   snapshot.to_hit.clone(),
        roll,
        hit,
        cluster,
    })?;
    log::debug!(
        "{} -> {} weapon {}: need {}, rolled {roll}, {}",
        decl.attacker,
        decl.target,
        decl.weapon,
        snapshot.to_hit.total,
        if hit { "hit" } else { "miss" }
    );

    let table = match decl.called_shot {
        Some(CalledShot::High) => HitTable::Punch,
        Some(CalledShot::Low) => HitTable::Kick,
        None => HitTable::Standard,
    };
    for amount in groups {
        if ctx.unit(&decl.target)?.is_destroyed() {
            break;
        }
        let location = resolve_hit_location(snapshot.arc, table, &mut *ctx.dice);
        if snapshot.partial_cover && location.location.is_leg() {
            ctx.emit(EventKind::HitAbsorbedByCover {
                unit:     decl.target.clone(),
                location: location.location,
                damage:   amount,
            })?;
            continue;
        }
        damage::apply_hit(ctx, &decl.target, &location, amount, kind)?;
    }
    Ok(())
}
