//! End-of-tick removal of dead units.

use crate::components::*;
use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};

/// Despawns units whose health reached zero this tick, along with anyone
/// riding a dead transporter, and frees their spawner slots.
pub fn cleanup_system(
    mut commands: Commands,
    units: Query<(Entity, &UnitId, &Health, Option<&SpawnedBy>)>,
    passengers: Query<(Entity, &Embarked, Option<&SpawnedBy>)>,
    mut spawners: Query<(&StructureId, &mut Spawner)>,
) {
    let mut removed: HashSet<Entity> = HashSet::new();
    let mut released: HashMap<StructureId, u32> = HashMap::new();
    let mut release = |entity: Entity, spawned_by: Option<&SpawnedBy>, removed: &mut HashSet<Entity>| {
        if removed.insert(entity) {
            if let Some(SpawnedBy(structure)) = spawned_by {
                *released.entry(*structure).or_insert(0) += 1;
            }
        }
    };

    let mut dead_transports: HashSet<UnitId> = HashSet::new();
    for (entity, unit, health, spawned_by) in units.iter() {
        if !health.is_alive() {
            dead_transports.insert(*unit);
            release(entity, spawned_by, &mut removed);
        }
    }
    for (entity, embarked, spawned_by) in passengers.iter() {
        if dead_transports.contains(&embarked.transport) {
            release(entity, spawned_by, &mut removed);
        }
    }

    if removed.is_empty() {
        return;
    }
    for entity in &removed {
        commands.entity(*entity).despawn();
    }
    for (id, mut spawner) in spawners.iter_mut() {
        if let Some(n) = released.get(id) {
            spawner.live_units = spawner.live_units.saturating_sub(*n);
        }
    }
    tracing::trace!(target: "warfront::engine", removed = removed.len(), "units.removed");
}
