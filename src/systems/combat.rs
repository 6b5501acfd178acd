//! Combat system - target selection, damage and shields.
//!
//! ## Phases
//!
//! 1. **Cooldown** - every weapon's cooldown runs down by the tick delta.
//! 2. **Gather** - O(n × k) where n = armed units, k = units per spatial query.
//!    Each attacker picks the nearest hostile unit in range and produces an
//!    [`AttackOutcome`]: damage intents plus the projectile to spawn. This
//!    phase only reads the spatial grid and player registry.
//! 3. **Apply** - O(n + m). Damage is summed per target and applied in unit
//!    id order, draining covering shields before health.
//!
//! Nothing is removed mid-tick, so two units that kill each other in the same
//! tick both die.
//!
//! ## Parallel Feature
//!
//! With `--features parallel` the gather phase runs on rayon. Outcomes are
//! collected in attacker order and merged sequentially, so the result is the
//! same with or without the feature.

use crate::components::*;
use crate::config::SimConfig;
use crate::players::{PlayerRegistry, Players};
use crate::resources::{DeltaTime, IdAllocator};
use crate::spatial::{SpatialEntry, SpatialGrid};
use bevy_ecs::prelude::*;
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Attacker data extracted for the gather phase.
#[derive(Debug, Clone, Copy)]
pub struct AttackerData {
    pub entity: Entity,
    pub unit: UnitId,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub weapon: Weapon,
}

/// Projectile an attacker launches this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub velocity: Velocity,
    pub life: f32,
    pub payload: ProjectilePayload,
}

/// What one attacker does in a tick.
#[derive(Debug, Clone, Default)]
pub struct AttackOutcome {
    pub hits: Vec<(Entity, f32)>,
    pub shot: Option<Shot>,
    /// The weapon fired and its cooldown restarts.
    pub fired: bool,
}

/// Collected combat results to apply after the gather phase.
#[derive(Debug, Default, Clone)]
pub struct CombatResults {
    pub damage: HashMap<Entity, f32>,
    pub shots: Vec<Shot>,
    pub fired: Vec<Entity>,
}

impl CombatResults {
    /// Fold one attacker's outcome in. Call in attacker order.
    pub fn merge(&mut self, attacker: Entity, outcome: AttackOutcome) {
        for (target, amount) in outcome.hits {
            *self.damage.entry(target).or_insert(0.0) += amount;
        }
        self.shots.extend(outcome.shot);
        if outcome.fired {
            self.fired.push(attacker);
        }
    }
}

/// Compute combat for a single attacker. Pure, so it can run in parallel.
pub fn compute_attacker_combat(
    attacker: &AttackerData,
    grid: &SpatialGrid,
    players: &dyn PlayerRegistry,
    config: &SimConfig,
    delta: f32,
) -> AttackOutcome {
    let mut outcome = AttackOutcome::default();
    let hostile = |e: &SpatialEntry| e.unit != attacker.unit && players.is_hostile(attacker.owner, e.owner);
    let Some(target) = grid.nearest(attacker.x, attacker.y, attacker.weapon.range, hostile) else {
        return outcome;
    };
    let ready = attacker.weapon.is_ready();

    match attacker.weapon.profile {
        WeaponProfile::Continuous { dps, .. } => {
            outcome.hits.push((target.entity, dps * delta));
            if ready {
                outcome.fired = true;
                outcome.shot = Some(bolt(attacker, target.x, target.y, config));
            }
        }
        WeaponProfile::Burst { damage, effect, .. } => {
            if ready {
                outcome.fired = true;
                outcome.hits.push((target.entity, damage));
                let payload = match effect {
                    BurstEffect::Beam => ProjectilePayload::Beam {
                        from_x: attacker.x,
                        from_y: attacker.y,
                        to_x: target.x,
                        to_y: target.y,
                    },
                    BurstEffect::Barrage { volleys } => ProjectilePayload::Barrage {
                        target_x: target.x,
                        target_y: target.y,
                        volleys,
                    },
                };
                outcome.shot = Some(effect_shot(attacker, target.x, target.y, payload, config));
            }
        }
        WeaponProfile::Splash { damage, radius, .. } => {
            if ready {
                outcome.fired = true;
                for victim in grid.query_filtered(target.x, target.y, radius, hostile) {
                    outcome.hits.push((victim.entity, damage));
                }
                let payload = ProjectilePayload::Ballistic {
                    target_x: target.x,
                    target_y: target.y,
                    splash_radius: radius,
                };
                outcome.shot = Some(effect_shot(attacker, target.x, target.y, payload, config));
            }
        }
    }
    outcome
}

fn bolt(attacker: &AttackerData, tx: f32, ty: f32, config: &SimConfig) -> Shot {
    let dx = tx - attacker.x;
    let dy = ty - attacker.y;
    let dist = (dx * dx + dy * dy).sqrt();
    let speed = config.bolt_speed;
    let velocity = if dist > 0.0 {
        Velocity::new(dx / dist * speed, dy / dist * speed)
    } else {
        Velocity::default()
    };
    Shot {
        owner: attacker.owner,
        x: attacker.x,
        y: attacker.y,
        velocity,
        life: dist / speed,
        payload: ProjectilePayload::Bolt,
    }
}

fn effect_shot(attacker: &AttackerData, tx: f32, ty: f32, payload: ProjectilePayload, config: &SimConfig) -> Shot {
    let (velocity, life) = match payload {
        ProjectilePayload::Beam { .. } => (Velocity::default(), config.beam_lifetime),
        _ => {
            let t = config.shell_flight_time;
            (Velocity::new((tx - attacker.x) / t, (ty - attacker.y) / t), t)
        }
    };
    Shot {
        owner: attacker.owner,
        x: attacker.x,
        y: attacker.y,
        velocity,
        life,
        payload,
    }
}

/// Shield bearer that may absorb damage for a unit.
#[derive(Debug, Clone, Copy)]
struct ShieldCover {
    entity: Entity,
    unit: UnitId,
    owner: PlayerId,
    x: f32,
    y: f32,
    radius: f32,
}

/// Shields that cover a unit: its own, then projected ones nearest first.
fn covering_shields(covers: &[ShieldCover], target: Entity, owner: PlayerId, pos: &Position) -> Vec<Entity> {
    let mut own = Vec::new();
    let mut projected: Vec<(f32, UnitId, Entity)> = Vec::new();
    for cover in covers {
        if cover.entity == target {
            own.push(cover.entity);
            continue;
        }
        if cover.owner != owner || cover.radius <= 0.0 {
            continue;
        }
        let d2 = (cover.x - pos.x).powi(2) + (cover.y - pos.y).powi(2);
        if d2 <= cover.radius * cover.radius {
            projected.push((d2, cover.unit, cover.entity));
        }
    }
    projected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    own.extend(projected.into_iter().map(|(_, _, e)| e));
    own
}

type CombatQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static UnitId,
        &'static Owner,
        &'static Position,
        &'static mut Health,
        Option<&'static mut Weapon>,
        Option<&'static mut Shield>,
    ),
    Without<Embarked>,
>;

/// System that resolves one tick of combat between hostile units.
///
/// ## Data Access
/// - Reads: DeltaTime, SimConfig, SpatialGrid, Players
/// - Writes: Health, Weapon cooldown, Shield, IdAllocator (projectile ids)
pub fn combat_system(
    mut commands: Commands,
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    players: Res<Players>,
    mut ids: ResMut<IdAllocator>,
    mut query: CombatQuery,
) {
    let delta = dt.0;
    let registry = players.registry();

    // Cooldown pass
    for (.., weapon, _) in query.iter_mut() {
        if let Some(mut weapon) = weapon {
            weapon.cooldown = (weapon.cooldown - delta).max(0.0);
        }
    }

    let mut attackers: Vec<AttackerData> = query
        .iter()
        .filter(|(_, _, _, _, health, _, _)| health.is_alive())
        .filter_map(|(entity, unit, owner, pos, _, weapon, _)| {
            weapon.map(|w| AttackerData {
                entity,
                unit: *unit,
                owner: owner.0,
                x: pos.x,
                y: pos.y,
                weapon: *w,
            })
        })
        .collect();
    attackers.sort_by_key(|a| a.unit);

    #[cfg(feature = "parallel")]
    let outcomes: Vec<AttackOutcome> = attackers
        .par_iter()
        .map(|attacker| compute_attacker_combat(attacker, &grid, registry, &config, delta))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<AttackOutcome> = attackers
        .iter()
        .map(|attacker| compute_attacker_combat(attacker, &grid, registry, &config, delta))
        .collect();

    let mut results = CombatResults::default();
    for (attacker, outcome) in attackers.iter().zip(outcomes) {
        results.merge(attacker.entity, outcome);
    }

    // Apply phase
    let covers: Vec<ShieldCover> = query
        .iter()
        .filter(|(_, _, _, _, health, _, _)| health.is_alive())
        .filter_map(|(entity, unit, owner, pos, _, _, shield)| {
            shield.map(|s| ShieldCover {
                entity,
                unit: *unit,
                owner: owner.0,
                x: pos.x,
                y: pos.y,
                radius: s.radius,
            })
        })
        .collect();

    let mut damaged: Vec<(UnitId, Entity, PlayerId, Position, f32)> = results
        .damage
        .iter()
        .filter_map(|(&entity, &amount)| {
            let (_, unit, owner, pos, ..) = query.get(entity).ok()?;
            Some((*unit, entity, owner.0, *pos, amount))
        })
        .collect();
    damaged.sort_by_key(|d| d.0);

    for (_, entity, owner, pos, amount) in damaged {
        let mut remaining = amount;
        for shield_entity in covering_shields(&covers, entity, owner, &pos) {
            if remaining <= 0.0 {
                break;
            }
            if let Ok((.., Some(mut shield))) = query.get_mut(shield_entity) {
                remaining = shield.absorb(remaining, config.shield_regen_delay);
            }
        }
        if remaining > 0.0 {
            if let Ok((_, _, _, _, mut health, _, _)) = query.get_mut(entity) {
                health.damage(remaining);
            }
        }
    }

    for entity in &results.fired {
        if let Ok((.., Some(mut weapon), _)) = query.get_mut(*entity) {
            weapon.cooldown = weapon.profile.fire_interval();
        }
    }

    for shot in results.shots {
        commands.spawn(ProjectileBundle {
            id: ids.projectile(),
            owner: Owner(shot.owner),
            position: Position::new(shot.x, shot.y),
            velocity: shot.velocity,
            lifetime: Lifetime::new(shot.life),
            payload: shot.payload,
        });
    }
}

/// System that regenerates shields once their post-hit delay has elapsed.
pub fn shield_regen_system(dt: Res<DeltaTime>, config: Res<SimConfig>, mut query: Query<&mut Shield>) {
    for mut shield in query.iter_mut() {
        shield.regenerate(dt.0, config.shield_regen_window);
    }
}
