//! Spatial partitioning for efficient neighbor queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of units in nearby cells, rather than O(n) for brute force.
//!
//! The grid is rebuilt from the live unit set every tick and never patched
//! incrementally, so it can not drift from the authoritative ECS state.

use crate::components::{Embarked, Health, Owner, PlayerId, Position, UnitId};
use crate::config::SimConfig;
use bevy_ecs::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Grid-based spatial partitioning structure.
///
/// Divides the world into square cells keyed by `floor(x / cell_size)`,
/// `floor(y / cell_size)`.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    count: usize,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub unit: UnitId,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
}

impl SpatialEntry {
    #[inline]
    pub fn distance_sq(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            count: 0,
        }
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Drop every entry. Cell vectors keep their capacity for the next rebuild.
    pub fn clear(&mut self) {
        for entries in self.cells.values_mut() {
            entries.clear();
        }
        self.count = 0;
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        let cell = self.world_to_cell(entry.x, entry.y);
        self.cells.entry(cell).or_default().push(entry);
        self.count += 1;
    }

    /// Query all units within `radius` of a point (boundary inclusive).
    /// Returns entries sorted by distance, ties broken by unit id.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        self.query_filtered(x, y, radius, |_| true)
    }

    /// Like [`query_radius`](Self::query_radius) but keeps only entries accepted by `filter`.
    pub fn query_filtered<F>(&self, x: f32, y: f32, radius: f32, mut filter: F) -> Vec<SpatialEntry>
    where
        F: FnMut(&SpatialEntry) -> bool,
    {
        if !(radius >= 0.0) || !x.is_finite() || !y.is_finite() {
            return Vec::new();
        }
        let radius_sq = radius * radius;
        let (min_cx, min_cy) = self.world_to_cell(x - radius, y - radius);
        let (max_cx, max_cy) = self.world_to_cell(x + radius, y + radius);

        let mut results = Vec::new();
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                if let Some(entries) = self.cells.get(&(cx, cy)) {
                    for entry in entries {
                        if entry.distance_sq(x, y) <= radius_sq && filter(entry) {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            a.distance_sq(x, y)
                .partial_cmp(&b.distance_sq(x, y))
                .unwrap_or(Ordering::Equal)
                .then(a.unit.cmp(&b.unit))
        });
        results
    }

    /// Closest entry within `radius` accepted by `filter`.
    pub fn nearest<F>(&self, x: f32, y: f32, radius: f32, filter: F) -> Option<SpatialEntry>
    where
        F: FnMut(&SpatialEntry) -> bool,
    {
        self.query_filtered(x, y, radius, filter).into_iter().next()
    }

    /// Same-owner units within `radius`.
    pub fn query_owned(&self, x: f32, y: f32, radius: f32, owner: PlayerId) -> Vec<SpatialEntry> {
        self.query_filtered(x, y, radius, |e| e.owner == owner)
    }

    /// Number of units inserted since the last clear.
    pub fn total_count(&self) -> usize {
        self.count
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.values().filter(|entries| !entries.is_empty()).count()
    }
}

/// System that rebuilds the spatial grid from every live, deployed unit.
///
/// Passengers riding a transporter are left out: they can neither be shot
/// nor shoot while embarked.
pub fn spatial_grid_update_system(
    config: Res<SimConfig>,
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &UnitId, &Owner, &Position, &Health), Without<Embarked>>,
) {
    if grid.cell_size != config.spatial_cell_size {
        *grid = SpatialGrid::new(config.spatial_cell_size);
    }
    grid.clear();
    for (entity, unit, owner, pos, health) in query.iter() {
        if !health.is_alive() {
            continue;
        }
        grid.insert(SpatialEntry {
            entity,
            unit: *unit,
            owner: owner.0,
            x: pos.x,
            y: pos.y,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    fn entry(id: u32, x: f32, y: f32, owner: u32) -> SpatialEntry {
        SpatialEntry {
            entity: Entity::from_raw(id),
            unit: UnitId(id),
            owner: PlayerId(owner),
            x,
            y,
        }
    }

    #[test]
    fn test_insert_and_query() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(entry(1, 5.0, 5.0, 0));
        grid.insert(entry(2, 15.0, 5.0, 0));
        grid.insert(entry(3, 100.0, 100.0, 1));

        let results = grid.query_radius(5.0, 5.0, 15.0);
        let ids: Vec<_> = results.iter().map(|e| e.unit.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(grid.total_count(), 3);
        assert_eq!(grid.cell_count(), 3);
    }

    #[test]
    fn test_query_boundary_is_inclusive() {
        let mut grid = SpatialGrid::new(50.0);
        grid.insert(entry(1, 25.0, 0.0, 0));
        grid.insert(entry(2, 25.01, 0.0, 0));
        let ids: Vec<_> = grid.query_radius(0.0, 0.0, 25.0).iter().map(|e| e.unit.0).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_query_crosses_negative_cells() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(entry(1, -0.5, -0.5, 0));
        grid.insert(entry(2, 0.5, 0.5, 0));
        grid.insert(entry(3, -19.0, 0.0, 0));
        let ids: BTreeSet<_> = grid.query_radius(0.0, 0.0, 2.0).iter().map(|e| e.unit.0).collect();
        assert_eq!(ids, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_owner_filter_and_nearest() {
        let mut grid = SpatialGrid::new(20.0);
        grid.insert(entry(1, 0.0, 0.0, 0));
        grid.insert(entry(2, 3.0, 0.0, 1));
        grid.insert(entry(3, 8.0, 0.0, 1));
        grid.insert(entry(4, 2.0, 0.0, 0));

        let owned = grid.query_owned(0.0, 0.0, 10.0, PlayerId(1));
        assert_eq!(owned.len(), 2);

        let hostile = grid.nearest(0.0, 0.0, 10.0, |e| e.owner != PlayerId(0));
        assert_eq!(hostile.map(|e| e.unit), Some(UnitId(2)));
    }

    #[test]
    fn test_clear_then_rebuild() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(entry(1, 0.0, 0.0, 0));
        grid.clear();
        assert_eq!(grid.total_count(), 0);
        assert!(grid.query_radius(0.0, 0.0, 100.0).is_empty());
        grid.insert(entry(2, 1.0, 1.0, 0));
        assert_eq!(grid.query_radius(0.0, 0.0, 5.0).len(), 1);
    }

    #[test]
    fn test_degenerate_queries_are_empty() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(entry(1, 0.0, 0.0, 0));
        assert!(grid.query_radius(0.0, 0.0, -1.0).is_empty());
        assert!(grid.query_radius(0.0, 0.0, f32::NAN).is_empty());
        assert!(grid.query_radius(f32::NAN, 0.0, 5.0).is_empty());
        assert_eq!(grid.query_radius(0.0, 0.0, 0.0).len(), 1);
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut grid = SpatialGrid::new(50.0);
        let mut all = Vec::new();
        for id in 0..600 {
            let e = entry(id, rng.gen_range(-300.0..300.0), rng.gen_range(-300.0..300.0), id % 3);
            grid.insert(e);
            all.push(e);
        }

        for _ in 0..200 {
            let x = rng.gen_range(-350.0..350.0);
            let y = rng.gen_range(-350.0..350.0);
            let r = rng.gen_range(0.0..160.0);

            let expected: BTreeSet<u32> = all
                .iter()
                .filter(|e| e.distance_sq(x, y) <= r * r)
                .map(|e| e.unit.0)
                .collect();
            let actual: BTreeSet<u32> = grid.query_radius(x, y, r).iter().map(|e| e.unit.0).collect();
            assert_eq!(actual, expected, "query ({x}, {y}, {r})");
        }
    }

    #[test]
    fn test_update_system_skips_dead_and_embarked() {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(SpatialGrid::default());

        world.spawn((UnitId(1), Owner(PlayerId(0)), Position::new(0.0, 0.0), Health::new(10.0)));
        world.spawn((
            UnitId(2),
            Owner(PlayerId(0)),
            Position::new(1.0, 0.0),
            Health { current: 0.0, max: 10.0 },
        ));
        world.spawn((
            UnitId(3),
            Owner(PlayerId(0)),
            Position::new(2.0, 0.0),
            Health::new(10.0),
            Embarked { transport: UnitId(1) },
        ));

        let mut schedule = Schedule::default();
        schedule.add_systems(spatial_grid_update_system);
        schedule.run(&mut world);

        let grid = world.resource::<SpatialGrid>();
        assert_eq!(grid.total_count(), 1);
        assert_eq!(grid.query_radius(0.0, 0.0, 10.0)[0].unit, UnitId(1));
    }
}
