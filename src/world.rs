//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable, read-only view of the
//! simulation state for renderers and network sync. Every list is sorted by
//! id so two identical simulations produce byte-identical JSON.

use crate::components::*;
use crate::resources::{DefeatedPlayers, SimClock, SimTick};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single unit's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: u32,
    pub owner: PlayerId,
    pub kind: UnitKind,
    pub tier: u8,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub health: f32,
    pub health_max: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield_max: Option<f32>,
    /// Carrying an attack-order assignment this tick.
    #[serde(default)]
    pub attack_assigned: bool,
    /// Transporter id while embarked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embarked_in: Option<u32>,
}

/// Snapshot of a structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSnapshot {
    pub id: u32,
    pub owner: PlayerId,
    pub kind: StructureKind,
    pub tier: u8,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub health_max: f32,
    /// Fraction of the current spawn interval elapsed, spawners only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_progress: Option<f32>,
    /// Units produced here that are still alive, spawners only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_units: Option<u32>,
}

/// Snapshot of an in-flight projectile or effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: u32,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub age: f32,
    pub life: f32,
    /// Carries beam endpoints and ballistic/barrage target points.
    pub payload: ProjectilePayload,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f64,
    pub units: Vec<UnitSnapshot>,
    pub structures: Vec<StructureSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    /// Players eliminated so far, ascending.
    pub defeated: Vec<PlayerId>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World) -> Self {
        let tick = world.get_resource::<SimTick>().map(|t| t.0).unwrap_or(0);
        let time = world.get_resource::<SimClock>().map(|c| c.0).unwrap_or(0.0);
        let defeated = world
            .get_resource::<DefeatedPlayers>()
            .map(|d| d.iter().collect())
            .unwrap_or_default();

        let mut unit_query = world.query::<(
            &UnitId,
            &Owner,
            &UnitKind,
            &Tier,
            &Position,
            &Velocity,
            &Health,
            Option<&Shield>,
            Option<&AttackAssignment>,
            Option<&Embarked>,
        )>();
        let mut units: Vec<UnitSnapshot> = unit_query
            .iter(world)
            .map(
                |(id, owner, kind, tier, pos, vel, health, shield, assignment, embarked)| UnitSnapshot {
                    id: id.0,
                    owner: owner.0,
                    kind: *kind,
                    tier: tier.0,
                    x: pos.x,
                    y: pos.y,
                    vx: vel.vx,
                    vy: vel.vy,
                    health: health.current,
                    health_max: health.max,
                    shield: shield.map(|s| s.current),
                    shield_max: shield.map(|s| s.max),
                    attack_assigned: assignment.is_some_and(|a| a.0.is_some()),
                    embarked_in: embarked.map(|e| e.transport.0),
                },
            )
            .collect();
        units.sort_by_key(|u| u.id);

        let mut structure_query = world.query::<(
            &StructureId,
            &Owner,
            &StructureKind,
            &Tier,
            &Position,
            &Health,
            Option<&Spawner>,
        )>();
        let mut structures: Vec<StructureSnapshot> = structure_query
            .iter(world)
            .map(|(id, owner, kind, tier, pos, health, spawner)| StructureSnapshot {
                id: id.0,
                owner: owner.0,
                kind: *kind,
                tier: tier.0,
                x: pos.x,
                y: pos.y,
                health: health.current,
                health_max: health.max,
                spawn_progress: spawner.map(|s| s.progress()),
                live_units: spawner.map(|s| s.live_units),
            })
            .collect();
        structures.sort_by_key(|s| s.id);

        let mut projectile_query =
            world.query::<(&ProjectileId, &Owner, &Position, &Velocity, &Lifetime, &ProjectilePayload)>();
        let mut projectiles: Vec<ProjectileSnapshot> = projectile_query
            .iter(world)
            .map(|(id, owner, pos, vel, lifetime, payload)| ProjectileSnapshot {
                id: id.0,
                owner: owner.0,
                x: pos.x,
                y: pos.y,
                vx: vel.vx,
                vy: vel.vy,
                age: lifetime.age,
                life: lifetime.life,
                payload: *payload,
            })
            .collect();
        projectiles.sort_by_key(|p| p.id);

        Self {
            tick,
            time,
            units,
            structures,
            projectiles,
            defeated,
        }
    }

    /// Units owned by `player`.
    pub fn units_of(&self, player: PlayerId) -> impl Iterator<Item = &UnitSnapshot> {
        self.units.iter().filter(move |u| u.owner == player)
    }

    pub fn headquarters_of(&self, player: PlayerId) -> Option<&StructureSnapshot> {
        self.structures
            .iter()
            .find(|s| s.owner == player && s.kind == StructureKind::Headquarters)
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
