//! Territory capture and player elimination.
//!
//! Every live, deployed unit claims the tiles whose centres lie within
//! `capture_radius` of it, but only tiles that touch land its owner already
//! holds. A tile within reach of two hostile players is contested and keeps
//! its owner. A pass runs the adjacency check to a fixed point, so running it
//! a second time on unchanged state captures nothing more.
//!
//! Taking a tile inside a player's headquarters capture radius eliminates
//! that player on the spot: their remaining land goes to the capturer and all
//! of their entities are removed.

use crate::components::*;
use crate::config::SimConfig;
use crate::players::{PlayerRegistry, Players};
use crate::resources::DefeatedPlayers;
use crate::systems::orders::AttackOrders;
use crate::systems::stance::Stances;
use crate::systems::territory_cache::TerritoryCache;
use crate::territory::{Territory, TileRef};
use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A unit claiming tiles around itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSource {
    pub unit: UnitId,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
}

/// Headquarters location and the radius that makes it vulnerable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadquartersSite {
    pub x: f32,
    pub y: f32,
    pub capture_radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elimination {
    pub defeated: PlayerId,
    pub conqueror: PlayerId,
    /// Tiles handed to the conqueror on elimination.
    pub tiles_transferred: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureOutcome {
    pub captured: Vec<(TileRef, PlayerId)>,
    pub eliminations: Vec<Elimination>,
}

impl CaptureOutcome {
    pub fn is_empty(&self) -> bool {
        self.captured.is_empty() && self.eliminations.is_empty()
    }
}

fn capturable(territory: &Territory, players: &dyn PlayerRegistry, tile: TileRef, player: PlayerId) -> bool {
    let map = territory.map();
    if !map.is_land(tile) {
        return false;
    }
    match map.owner(tile) {
        Some(owner) => owner != player && !players.is_allied(player, owner),
        None => true,
    }
}

fn touches_owned(territory: &Territory, tile: TileRef, player: PlayerId) -> bool {
    let map = territory.map();
    map.neighbors(tile).into_iter().any(|n| map.owner(n) == Some(player))
}

/// Valid tiles whose centres lie within `radius` of (x, y).
fn tiles_in_radius(territory: &Territory, x: f32, y: f32, radius: f32, tile_size: f32) -> Vec<TileRef> {
    if !x.is_finite() || !y.is_finite() || !(radius >= 0.0) {
        return Vec::new();
    }
    let map = territory.map();
    let last_x = map.width() as i32 - 1;
    let last_y = map.height() as i32 - 1;
    let min_x = (((x - radius) / tile_size).floor() as i32).max(0);
    let max_x = (((x + radius) / tile_size).floor() as i32).min(last_x);
    let min_y = (((y - radius) / tile_size).floor() as i32).max(0);
    let max_y = (((y + radius) / tile_size).floor() as i32).min(last_y);
    let radius_sq = radius * radius;

    let mut tiles = Vec::new();
    for ty in min_y..=max_y {
        for tx in min_x..=max_x {
            if !map.is_valid(tx, ty) {
                continue;
            }
            let tile = map.tile(tx as u32, ty as u32);
            let (cx, cy) = territory.tile_center(tile, tile_size);
            if (cx - x).powi(2) + (cy - y).powi(2) <= radius_sq {
                tiles.push(tile);
            }
        }
    }
    tiles
}

/// Tiles within reach of at least two mutually hostile players.
fn contested_tiles(reach: &BTreeMap<PlayerId, BTreeSet<TileRef>>, players: &dyn PlayerRegistry) -> HashSet<TileRef> {
    let mut claimants: HashMap<TileRef, Vec<PlayerId>> = HashMap::new();
    for (player, tiles) in reach {
        for tile in tiles {
            claimants.entry(*tile).or_default().push(*player);
        }
    }
    claimants
        .into_iter()
        .filter(|(_, claim)| {
            claim
                .iter()
                .enumerate()
                .any(|(i, a)| claim[i + 1..].iter().any(|b| players.is_hostile(*a, *b)))
        })
        .map(|(tile, _)| tile)
        .collect()
}

/// One capture pass over the map.
///
/// Contested tiles are settled from the unit positions alone, before any
/// tile changes hands, so the outcome does not depend on player ids. Players
/// are then processed in id order; each player's uncontested candidates are
/// captured repeatedly until none left touches their land.
pub fn run_capture_pass(
    territory: &mut Territory,
    players: &dyn PlayerRegistry,
    defeated: &DefeatedPlayers,
    config: &SimConfig,
    sources: &[CaptureSource],
    headquarters: &HashMap<PlayerId, HeadquartersSite>,
) -> CaptureOutcome {
    let mut outcome = CaptureOutcome::default();
    let mut eliminated: HashSet<PlayerId> = HashSet::new();

    let mut reach: BTreeMap<PlayerId, BTreeSet<TileRef>> = BTreeMap::new();
    for source in sources {
        if defeated.contains(source.owner) {
            continue;
        }
        let tiles = tiles_in_radius(territory, source.x, source.y, config.capture_radius, config.tile_size);
        reach.entry(source.owner).or_default().extend(tiles);
    }
    let contested = contested_tiles(&reach, players);

    for (player, tiles) in reach {
        if eliminated.contains(&player) {
            continue;
        }
        let mut candidates: BTreeSet<TileRef> = tiles
            .into_iter()
            .filter(|tile| !contested.contains(tile) && capturable(territory, players, *tile, player))
            .collect();

        loop {
            let mut progressed = false;
            let pending: Vec<TileRef> = candidates.iter().copied().collect();
            for tile in pending {
                if eliminated.contains(&player) {
                    break;
                }
                if !capturable(territory, players, tile, player) {
                    candidates.remove(&tile);
                    continue;
                }
                if !touches_owned(territory, tile, player) {
                    continue;
                }

                let previous = territory.map().owner(tile);
                territory.map_mut().conquer(tile, player);
                candidates.remove(&tile);
                outcome.captured.push((tile, player));
                progressed = true;

                let Some(defender) = previous else { continue };
                if eliminated.contains(&defender) || defeated.contains(defender) {
                    continue;
                }
                let Some(site) = headquarters.get(&defender) else { continue };
                let (cx, cy) = territory.tile_center(tile, config.tile_size);
                if (cx - site.x).powi(2) + (cy - site.y).powi(2) <= site.capture_radius * site.capture_radius {
                    let remaining = territory.map().tiles_owned_by(defender);
                    let map = territory.map_mut();
                    for &t in &remaining {
                        map.conquer(t, player);
                    }
                    eliminated.insert(defender);
                    outcome.eliminations.push(Elimination {
                        defeated: defender,
                        conqueror: player,
                        tiles_transferred: remaining.len(),
                    });
                }
            }
            if !progressed || candidates.is_empty() {
                break;
            }
        }
    }
    outcome
}

/// System that runs the capture pass and carries out eliminations.
#[allow(clippy::too_many_arguments)]
pub fn capture_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut territory: ResMut<Territory>,
    players: Res<Players>,
    mut defeated: ResMut<DefeatedPlayers>,
    mut orders: ResMut<AttackOrders>,
    mut stances: ResMut<Stances>,
    mut cache: ResMut<TerritoryCache>,
    units: Query<(&UnitId, &Owner, &Position, &Health), Without<Embarked>>,
    headquarters: Query<(&Owner, &Position, &Headquarters)>,
    owned: Query<(Entity, &Owner)>,
) {
    let sources: Vec<CaptureSource> = units
        .iter()
        .filter(|(.., health)| health.is_alive())
        .map(|(unit, owner, pos, _)| CaptureSource {
            unit: *unit,
            owner: owner.0,
            x: pos.x,
            y: pos.y,
        })
        .collect();
    let sites: HashMap<PlayerId, HeadquartersSite> = headquarters
        .iter()
        .map(|(owner, pos, hq)| {
            (
                owner.0,
                HeadquartersSite {
                    x: pos.x,
                    y: pos.y,
                    capture_radius: hq.capture_radius,
                },
            )
        })
        .collect();

    let outcome = run_capture_pass(
        &mut territory,
        players.registry(),
        &defeated,
        &config,
        &sources,
        &sites,
    );
    if outcome.eliminations.is_empty() {
        return;
    }

    for elimination in &outcome.eliminations {
        let player = elimination.defeated;
        defeated.insert(player);
        orders.clear_involving(player);
        stances.remove(player);

        let mut removed = 0usize;
        for (entity, owner) in owned.iter() {
            if owner.0 == player {
                commands.entity(entity).despawn();
                removed += 1;
            }
        }
        tracing::info!(
            target: "warfront::capture",
            player = %player,
            conqueror = %elimination.conqueror,
            tiles = elimination.tiles_transferred,
            entities = removed,
            "player.eliminated"
        );
    }
    cache.invalidate();
}
