//! Shared ECS resources that are not tied to one subsystem.

use crate::components::{PlayerId, ProjectileId, StructureId, UnitId};
use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Debug, Default)]
pub struct DeltaTime(pub f32);

/// Current simulation tick (incremented before the pipeline runs).
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

/// Elapsed simulated seconds.
///
/// Accumulated in f64 so per-tick deltas still register after days of play.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock(pub f64);

/// Hands out ids for new units, structures and projectiles.
#[derive(Resource, Debug, Default)]
pub struct IdAllocator {
    next_unit: u32,
    next_structure: u32,
    next_projectile: u32,
}

impl IdAllocator {
    pub fn unit(&mut self) -> UnitId {
        self.next_unit += 1;
        UnitId(self.next_unit)
    }

    pub fn structure(&mut self) -> StructureId {
        self.next_structure += 1;
        StructureId(self.next_structure)
    }

    pub fn projectile(&mut self) -> ProjectileId {
        // Projectiles churn quickly; ids may wrap on very long sessions.
        self.next_projectile = self.next_projectile.wrapping_add(1);
        ProjectileId(self.next_projectile)
    }
}

/// Seeded RNG; the only source of randomness in the simulation.
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub ChaCha8Rng);

impl SimRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

/// Players eliminated this session. Membership is permanent.
#[derive(Resource, Debug, Default, Clone)]
pub struct DefeatedPlayers(BTreeSet<PlayerId>);

impl DefeatedPlayers {
    pub fn contains(&self, player: PlayerId) -> bool {
        self.0.contains(&player)
    }

    /// Returns false when the player was already defeated.
    pub fn insert(&mut self, player: PlayerId) -> bool {
        self.0.insert(player)
    }

    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
