//! Projectile advancer.

use crate::components::{Lifetime, Position, ProjectilePayload, Velocity};
use crate::resources::DeltaTime;
use bevy_ecs::prelude::*;

/// System that ages projectiles, moves them and drops the expired ones.
///
/// Beams never move; they only live long enough to be drawn.
pub fn projectile_system(
    mut commands: Commands,
    dt: Res<DeltaTime>,
    mut query: Query<(Entity, &mut Position, &Velocity, &mut Lifetime), With<ProjectilePayload>>,
) {
    let delta = dt.0;
    for (entity, mut pos, vel, mut lifetime) in query.iter_mut() {
        lifetime.age += delta;
        pos.x += vel.vx * delta;
        pos.y += vel.vy * delta;
        if lifetime.expired() {
            commands.entity(entity).despawn();
        }
    }
}
