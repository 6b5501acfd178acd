//! Movement systems - steer toward targets, integrate positions, carry passengers.

use crate::components::*;
use crate::config::SimConfig;
use crate::resources::DeltaTime;
use crate::spatial::SpatialGrid;
use crate::territory::Territory;
use bevy_ecs::prelude::*;
use std::collections::HashMap;

const GOLDEN_ANGLE: f32 = 2.399_963;
/// Below this separation two units count as stacked on the same point.
const STACKED_EPSILON: f32 = 1e-3;

/// Repulsion from same-owner neighbours within `radius`, each weighted by
/// how deep inside the radius it sits. Exactly stacked units are pushed
/// along a fixed per-id angle so the result does not depend on order.
pub fn separation_vector(grid: &SpatialGrid, unit: UnitId, owner: PlayerId, pos: &Position, radius: f32) -> (f32, f32) {
    if radius <= 0.0 {
        return (0.0, 0.0);
    }
    let neighbors = grid.query_filtered(pos.x, pos.y, radius, |e| e.owner == owner && e.unit != unit);
    let mut push = (0.0, 0.0);
    for neighbor in neighbors {
        let dx = pos.x - neighbor.x;
        let dy = pos.y - neighbor.y;
        let dist = (dx * dx + dy * dy).sqrt();
        let strength = 1.0 - dist / radius;
        if dist < STACKED_EPSILON {
            let angle = unit.0 as f32 * GOLDEN_ANGLE;
            push.0 += angle.cos() * strength;
            push.1 += angle.sin() * strength;
        } else {
            push.0 += dx / dist * strength;
            push.1 += dy / dist * strength;
        }
    }
    push
}

/// System that turns each mobile unit's target into a velocity.
///
/// Reads the grid built at the end of the previous tick for separation.
pub fn steering_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    mut query: Query<(&UnitId, &Owner, &Position, &Mobility, &mut Velocity), Without<Embarked>>,
) {
    let delta = dt.0;
    for (unit, owner, pos, mobility, mut vel) in query.iter_mut() {
        let dx = mobility.target_x - pos.x;
        let dy = mobility.target_y - pos.y;
        let dist = (dx * dx + dy * dy).sqrt();

        let (mut vx, mut vy) = if dist < STACKED_EPSILON {
            (0.0, 0.0)
        } else {
            // Never overshoot the target within one step
            let speed = if delta > 0.0 {
                mobility.speed.min(dist / delta)
            } else {
                mobility.speed
            };
            (dx / dist * speed, dy / dist * speed)
        };

        let (px, py) = separation_vector(&grid, *unit, owner.0, pos, config.separation_radius);
        vx += px * config.separation_weight * mobility.speed;
        vy += py * config.separation_weight * mobility.speed;

        vel.vx = vx;
        vel.vy = vy;
    }
}

/// System that applies velocity to position, keeping units on the map.
pub fn movement_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    territory: Res<Territory>,
    mut query: Query<(&mut Position, &Velocity), (With<Mobility>, Without<Embarked>)>,
) {
    let delta = dt.0;
    for (mut pos, vel) in query.iter_mut() {
        let (x, y) = territory.clamp(pos.x + vel.vx * delta, pos.y + vel.vy * delta, config.tile_size);
        pos.x = x;
        pos.y = y;
    }
}

/// System that keeps passengers on their transporter.
///
/// A passenger whose transporter no longer exists goes down with it.
pub fn transport_sync_system(
    transports: Query<(&UnitId, &Position, &Health), (With<Cargo>, Without<Embarked>)>,
    mut passengers: Query<(&Embarked, &mut Position, &mut Velocity, &mut Health), Without<Cargo>>,
) {
    let carriers: HashMap<UnitId, (f32, f32, bool)> = transports
        .iter()
        .map(|(id, pos, health)| (*id, (pos.x, pos.y, health.is_alive())))
        .collect();

    for (embarked, mut pos, mut vel, mut health) in passengers.iter_mut() {
        match carriers.get(&embarked.transport) {
            Some(&(x, y, true)) => {
                pos.x = x;
                pos.y = y;
                vel.vx = 0.0;
                vel.vy = 0.0;
            }
            _ => health.kill(),
        }
    }
}
