//! Periodic per-player territory snapshots.
//!
//! Enumerating border tiles walks the whole map, so it is done every
//! `territory_refresh_ticks` ticks instead of every tick. Consumers read a
//! snapshot that is at most `territory_refresh_ticks - 1` ticks old; the age
//! is exposed through [`TerritoryCache::age`] so the bound can be checked.

use crate::components::{Headquarters, Owner, PlayerId, Position, StructureKind, Tier};
use crate::config::SimConfig;
use crate::players::Players;
use crate::resources::{DefeatedPlayers, IdAllocator, SimTick};
use crate::systems::spawn::structure_blueprint;
use crate::territory::{Territory, TileRef};
use bevy_ecs::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// Sampled border of one player's territory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerritorySnapshot {
    /// Evenly strided sample of border tiles, in tile order.
    pub border_sample: Vec<TileRef>,
    /// Total border tiles at rebuild time.
    pub border_count: usize,
    /// Centroid of the sampled tiles in world coordinates.
    pub centroid: Option<(f32, f32)>,
}

impl TerritorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.border_sample.is_empty()
    }

    pub fn build(territory: &Territory, player: PlayerId, tile_size: f32, sample_size: usize) -> Self {
        let border = territory.map().border_tiles(player);
        let border_count = border.len();
        let border_sample = stride_sample(&border, sample_size);

        let centroid = if border_sample.is_empty() {
            None
        } else {
            let (sx, sy) = border_sample.iter().fold((0.0f64, 0.0f64), |(sx, sy), &tile| {
                let (x, y) = territory.tile_center(tile, tile_size);
                (sx + x as f64, sy + y as f64)
            });
            let n = border_sample.len() as f64;
            Some(((sx / n) as f32, (sy / n) as f32))
        };

        Self {
            border_sample,
            border_count,
            centroid,
        }
    }
}

/// At most `cap` items spread evenly over `items`.
pub fn stride_sample<T: Copy>(items: &[T], cap: usize) -> Vec<T> {
    if cap == 0 {
        return Vec::new();
    }
    if items.len() <= cap {
        return items.to_vec();
    }
    let stride = items.len().div_ceil(cap);
    items.iter().step_by(stride).copied().collect()
}

#[derive(Resource, Debug, Default)]
pub struct TerritoryCache {
    snapshots: HashMap<PlayerId, TerritorySnapshot>,
    last_rebuilt: Option<u64>,
}

impl TerritoryCache {
    pub fn get(&self, player: PlayerId) -> Option<&TerritorySnapshot> {
        self.snapshots.get(&player)
    }

    pub fn last_rebuilt(&self) -> Option<u64> {
        self.last_rebuilt
    }

    /// Ticks since the last rebuild, `None` if never built.
    pub fn age(&self, tick: u64) -> Option<u64> {
        self.last_rebuilt.map(|t| tick.saturating_sub(t))
    }

    pub fn is_stale(&self, tick: u64, refresh_ticks: u64) -> bool {
        match self.age(tick) {
            None => true,
            Some(age) => age >= refresh_ticks,
        }
    }

    /// Force a rebuild on the next pass (after an elimination reshapes the map).
    pub fn invalidate(&mut self) {
        self.last_rebuilt = None;
    }

    pub fn rebuild(
        &mut self,
        territory: &Territory,
        players: impl IntoIterator<Item = PlayerId>,
        tile_size: f32,
        sample_size: usize,
        tick: u64,
    ) {
        self.snapshots.clear();
        for player in players {
            let snapshot = TerritorySnapshot::build(territory, player, tile_size, sample_size);
            self.snapshots.insert(player, snapshot);
        }
        self.last_rebuilt = Some(tick);
    }
}

/// Rebuilds territory snapshots for every active player when they are due.
pub fn territory_cache_system(
    tick: Res<SimTick>,
    config: Res<SimConfig>,
    territory: Res<Territory>,
    players: Res<Players>,
    defeated: Res<DefeatedPlayers>,
    mut cache: ResMut<TerritoryCache>,
) {
    if !cache.is_stale(tick.0, config.territory_refresh_ticks) {
        return;
    }
    let active = players
        .registry()
        .players()
        .into_iter()
        .filter(|p| !defeated.contains(*p));
    cache.rebuild(
        &territory,
        active,
        config.tile_size,
        config.border_sample_size,
        tick.0,
    );
    tracing::trace!(
        target: "warfront::territory",
        tick = tick.0,
        players = cache.snapshots.len(),
        "territory.cache_rebuilt"
    );
}

/// Founds a headquarters for every landed player that lacks one.
///
/// The headquarters goes on the owned tile closest to the territory centroid.
pub fn headquarters_bootstrap_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    territory: Res<Territory>,
    defeated: Res<DefeatedPlayers>,
    cache: Res<TerritoryCache>,
    mut ids: ResMut<IdAllocator>,
    headquarters: Query<&Owner, With<Headquarters>>,
) {
    if !config.auto_headquarters {
        return;
    }
    let established: BTreeSet<PlayerId> = headquarters.iter().map(|o| o.0).collect();
    let mut candidates: Vec<_> = cache
        .snapshots
        .iter()
        .filter(|(player, snapshot)| {
            !snapshot.is_empty() && !established.contains(player) && !defeated.contains(**player)
        })
        .filter_map(|(player, snapshot)| snapshot.centroid.map(|c| (*player, c)))
        .collect();
    candidates.sort_by_key(|(player, _)| *player);

    for (player, (cx, cy)) in candidates {
        let site = territory
            .map()
            .tiles_owned_by(player)
            .into_iter()
            .map(|tile| {
                let (x, y) = territory.tile_center(tile, config.tile_size);
                (x, y, (x - cx).powi(2) + (y - cy).powi(2))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2));
        let Some((x, y, _)) = site else { continue };

        let id = ids.structure();
        structure_blueprint(
            &config,
            id,
            player,
            StructureKind::Headquarters,
            Tier::default(),
            Position::new(x, y),
        )
        .spawn(&mut commands);
        tracing::info!(
            target: "warfront::territory",
            player = %player,
            structure = id.0,
            x,
            y,
            "headquarters.established"
        );
    }
}
