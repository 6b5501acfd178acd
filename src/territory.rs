//! Tile map and ownership oracle.
//!
//! The simulation only talks to the map through the [`TileMap`] trait:
//! bounds, land/water, neighbours, ownership and the conquer primitive.
//! [`GridMap`] is the in-crate implementation, storing one packed terrain
//! byte per tile in the same layout the map generator writes:
//!
//! | bit  | meaning                |
//! |------|------------------------|
//! | 7    | land                   |
//! | 6    | shoreline              |
//! | 5    | ocean                  |
//! | 0..4 | magnitude (0-31)       |

use crate::components::PlayerId;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of a tile: `y * width + x`.
pub type TileRef = u32;

pub const LAND_BIT: u8 = 0b1000_0000;
pub const SHORELINE_BIT: u8 = 0b0100_0000;
pub const OCEAN_BIT: u8 = 0b0010_0000;
pub const MAGNITUDE_MASK: u8 = 0b0001_1111;

/// Tile/ownership oracle consumed by the simulation.
pub trait TileMap: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn is_land(&self, tile: TileRef) -> bool;
    fn owner(&self, tile: TileRef) -> Option<PlayerId>;
    /// Hand `tile` to `player`.
    fn conquer(&mut self, tile: TileRef, player: PlayerId);
    /// Owned tiles with at least one neighbour the player does not own.
    fn border_tiles(&self, player: PlayerId) -> Vec<TileRef>;
    fn tiles_owned_by(&self, player: PlayerId) -> Vec<TileRef>;

    fn is_valid(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    fn tile(&self, x: u32, y: u32) -> TileRef {
        y * self.width() + x
    }

    fn x(&self, tile: TileRef) -> u32 {
        tile % self.width()
    }

    fn y(&self, tile: TileRef) -> u32 {
        tile / self.width()
    }

    /// Orthogonal neighbours inside the map.
    fn neighbors(&self, tile: TileRef) -> Vec<TileRef> {
        let (x, y) = (self.x(tile), self.y(tile));
        let mut out = Vec::with_capacity(4);
        if x > 0 {
            out.push(tile - 1);
        }
        if x + 1 < self.width() {
            out.push(tile + 1);
        }
        if y > 0 {
            out.push(tile - self.width());
        }
        if y + 1 < self.height() {
            out.push(tile + self.width());
        }
        out
    }
}

/// Resource wrapper around the map oracle.
#[derive(Resource)]
pub struct Territory(pub Box<dyn TileMap>);

impl Territory {
    pub fn new(map: impl TileMap + 'static) -> Self {
        Self(Box::new(map))
    }

    pub fn map(&self) -> &dyn TileMap {
        self.0.as_ref()
    }

    pub fn map_mut(&mut self) -> &mut dyn TileMap {
        self.0.as_mut()
    }

    /// World-space centre of a tile.
    pub fn tile_center(&self, tile: TileRef, tile_size: f32) -> (f32, f32) {
        let map = self.map();
        (
            (map.x(tile) as f32 + 0.5) * tile_size,
            (map.y(tile) as f32 + 0.5) * tile_size,
        )
    }

    /// Tile containing a world position, if it lies on the map.
    pub fn tile_at(&self, x: f32, y: f32, tile_size: f32) -> Option<TileRef> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let tx = (x / tile_size).floor() as i32;
        let ty = (y / tile_size).floor() as i32;
        let map = self.map();
        map.is_valid(tx, ty).then(|| map.tile(tx as u32, ty as u32))
    }

    /// Map extent in world units.
    pub fn extent(&self, tile_size: f32) -> (f32, f32) {
        let map = self.map();
        (map.width() as f32 * tile_size, map.height() as f32 * tile_size)
    }

    pub fn center(&self, tile_size: f32) -> (f32, f32) {
        let (w, h) = self.extent(tile_size);
        (w * 0.5, h * 0.5)
    }

    pub fn contains(&self, x: f32, y: f32, tile_size: f32) -> bool {
        let (w, h) = self.extent(tile_size);
        x >= 0.0 && y >= 0.0 && x <= w && y <= h
    }

    pub fn clamp(&self, x: f32, y: f32, tile_size: f32) -> (f32, f32) {
        let (w, h) = self.extent(tile_size);
        (x.clamp(0.0, w), y.clamp(0.0, h))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("terrain has {actual} bytes, expected {expected} for a {width}x{height} map")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("map dimensions must be non-zero")]
    Empty,
}

/// Packed-terrain tile grid with per-tile ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMap {
    width: u32,
    height: u32,
    terrain: Vec<u8>,
    owners: Vec<Option<PlayerId>>,
}

impl GridMap {
    /// Wrap raw terrain bytes (row-major, no header).
    pub fn from_terrain(width: u32, height: u32, terrain: Vec<u8>) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::Empty);
        }
        let expected = width as usize * height as usize;
        if terrain.len() != expected {
            return Err(MapError::SizeMismatch {
                width,
                height,
                expected,
                actual: terrain.len(),
            });
        }
        Ok(Self {
            width,
            height,
            terrain,
            owners: vec![None; expected],
        })
    }

    /// Map made entirely of featureless land. Zero dimensions are bumped to 1.
    pub fn all_land(width: u32, height: u32) -> Self {
        Self::generate(width.max(1), height.max(1), |_, _| LAND_BIT)
    }

    /// Circular island covering 44% of the smaller dimension (as radius).
    /// Land magnitude rises toward the centre, ocean magnitude away from the coast.
    pub fn circle(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let radius = width.min(height) as f32 * 0.44;
        let mut map = Self::generate(width, height, |x, y| {
            let distance = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            if distance <= radius {
                LAND_BIT | magnitude((radius - distance) / radius * 20.0)
            } else {
                OCEAN_BIT | magnitude((distance - radius) / 100.0 * 20.0)
            }
        });
        map.mark_shorelines();
        map
    }

    /// Square island of half-size 40% of the smaller dimension, with a
    /// high-magnitude zone in the central 10%.
    pub fn square(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let land_half = width.min(height) as f32 * 0.40;
        let crystal_half = width.min(height) as f32 * 0.10;
        let mut map = Self::generate(width, height, |x, y| {
            let chebyshev = (x as f32 - cx).abs().max((y as f32 - cy).abs());
            if chebyshev <= land_half {
                if chebyshev <= crystal_half {
                    let normalized = 1.0 - chebyshev / crystal_half;
                    LAND_BIT | magnitude(normalized * 25.0 + 6.0)
                } else {
                    LAND_BIT
                }
            } else {
                OCEAN_BIT | magnitude((chebyshev - land_half) / 50.0 * 20.0)
            }
        });
        map.mark_shorelines();
        map
    }

    /// Default nation sites on a square map: north, east, south and west.
    pub fn square_nation_sites(width: u32, height: u32) -> [(u32, u32); 4] {
        let (w, h) = (width as f32, height as f32);
        let at = |fx: f32, fy: f32| ((w * fx) as u32, (h * fy) as u32);
        [at(0.5, 0.125), at(0.875, 0.5), at(0.5, 0.875), at(0.125, 0.5)]
    }

    fn generate(width: u32, height: u32, mut terrain_at: impl FnMut(u32, u32) -> u8) -> Self {
        let mut terrain = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                terrain.push(terrain_at(x, y));
            }
        }
        Self {
            width,
            height,
            owners: vec![None; terrain.len()],
            terrain,
        }
    }

    /// Flag land tiles that touch water.
    pub fn mark_shorelines(&mut self) {
        let coastal: Vec<TileRef> = (0..self.terrain.len() as TileRef)
            .filter(|&t| self.is_land(t) && self.neighbors(t).iter().any(|&n| !self.is_land(n)))
            .collect();
        for tile in coastal {
            self.terrain[tile as usize] |= SHORELINE_BIT;
        }
    }

    pub fn terrain(&self) -> &[u8] {
        &self.terrain
    }

    pub fn magnitude(&self, tile: TileRef) -> u8 {
        self.terrain[tile as usize] & MAGNITUDE_MASK
    }

    pub fn is_shoreline(&self, tile: TileRef) -> bool {
        self.terrain[tile as usize] & SHORELINE_BIT != 0
    }

    pub fn is_ocean(&self, tile: TileRef) -> bool {
        self.terrain[tile as usize] & OCEAN_BIT != 0
    }

    pub fn land_count(&self) -> usize {
        self.terrain.iter().filter(|&&b| b & LAND_BIT != 0).count()
    }

    /// Turn a tile into water, dropping any owner.
    pub fn flood(&mut self, tile: TileRef) {
        self.terrain[tile as usize] = OCEAN_BIT;
        self.owners[tile as usize] = None;
    }

    /// Give `player` every unowned land tile within `radius` tiles of (cx, cy).
    /// Returns the number of tiles claimed.
    pub fn claim_disc(&mut self, player: PlayerId, cx: u32, cy: u32, radius: u32) -> usize {
        let r = radius as i64;
        let mut claimed = 0;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let x = cx as i64 + dx;
                let y = cy as i64 + dy;
                if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
                    continue;
                }
                let tile = self.tile(x as u32, y as u32);
                if self.is_land(tile) && self.owners[tile as usize].is_none() {
                    self.owners[tile as usize] = Some(player);
                    claimed += 1;
                }
            }
        }
        claimed
    }
}

fn magnitude(value: f32) -> u8 {
    (value.max(0.0) as u32).min(31) as u8
}

impl TileMap for GridMap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_land(&self, tile: TileRef) -> bool {
        self.terrain[tile as usize] & LAND_BIT != 0
    }

    fn owner(&self, tile: TileRef) -> Option<PlayerId> {
        self.owners[tile as usize]
    }

    fn conquer(&mut self, tile: TileRef, player: PlayerId) {
        self.owners[tile as usize] = Some(player);
    }

    fn border_tiles(&self, player: PlayerId) -> Vec<TileRef> {
        (0..self.owners.len() as TileRef)
            .filter(|&t| {
                self.owners[t as usize] == Some(player)
                    && self
                        .neighbors(t)
                        .iter()
                        .any(|&n| self.owners[n as usize] != Some(player))
            })
            .collect()
    }

    fn tiles_owned_by(&self, player: PlayerId) -> Vec<TileRef> {
        (0..self.owners.len() as TileRef)
            .filter(|&t| self.owners[t as usize] == Some(player))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_terrain_validates_length() {
        assert_eq!(
            GridMap::from_terrain(4, 4, vec![LAND_BIT; 15]).unwrap_err(),
            MapError::SizeMismatch {
                width: 4,
                height: 4,
                expected: 16,
                actual: 15
            }
        );
        assert_eq!(GridMap::from_terrain(0, 4, vec![]).unwrap_err(), MapError::Empty);
        assert!(GridMap::from_terrain(2, 2, vec![LAND_BIT, OCEAN_BIT, LAND_BIT, LAND_BIT]).is_ok());
    }

    #[test]
    fn test_circle_map_layout() {
        let map = GridMap::circle(100, 100);
        let center = map.tile(50, 50);
        assert!(map.is_land(center));
        assert_eq!(map.magnitude(center), 20);
        assert!(!map.is_land(map.tile(0, 0)));
        assert!(map.is_ocean(map.tile(0, 0)));

        // Disc of radius 44 holds roughly pi * 44^2 tiles
        let land = map.land_count() as f32;
        let expected = std::f32::consts::PI * 44.0 * 44.0;
        assert!((land - expected).abs() / expected < 0.02, "land = {land}");
    }

    #[test]
    fn test_square_map_crystal_zone() {
        let map = GridMap::square(200, 200);
        assert_eq!(map.magnitude(map.tile(100, 100)), 31);
        // Outside the crystal zone but on land
        assert!(map.is_land(map.tile(100, 50)));
        assert_eq!(map.magnitude(map.tile(100, 50)), 0);
        assert!(!map.is_land(map.tile(100, 10)));
        assert_eq!(
            GridMap::square_nation_sites(800, 800),
            [(400, 100), (700, 400), (400, 700), (100, 400)]
        );
    }

    #[test]
    fn test_shorelines_marked_on_coast_only() {
        let map = GridMap::circle(60, 60);
        let coast = (0..60)
            .map(|x| map.tile(x, 30))
            .find(|&t| map.is_land(t))
            .unwrap();
        assert!(map.is_shoreline(coast));
        assert!(!map.is_shoreline(map.tile(30, 30)));
    }

    #[test]
    fn test_neighbors_respect_edges() {
        let map = GridMap::all_land(3, 3);
        assert_eq!(map.neighbors(map.tile(0, 0)).len(), 2);
        assert_eq!(map.neighbors(map.tile(1, 0)).len(), 3);
        assert_eq!(map.neighbors(map.tile(1, 1)).len(), 4);
        assert!(!map.is_valid(-1, 0));
        assert!(!map.is_valid(3, 0));
    }

    #[test]
    fn test_claim_disc_and_borders() {
        let mut map = GridMap::all_land(20, 20);
        let p = PlayerId(1);
        let claimed = map.claim_disc(p, 10, 10, 2);
        assert_eq!(claimed, 13);
        assert_eq!(map.tiles_owned_by(p).len(), 13);

        let border = map.border_tiles(p);
        assert!(!border.contains(&map.tile(10, 10)));
        assert!(border.contains(&map.tile(12, 10)));
        assert_eq!(border.len(), 8);

        // Already-owned tiles are not re-claimed
        assert_eq!(map.claim_disc(PlayerId(2), 10, 10, 1), 0);
    }

    #[test]
    fn test_flood_drops_owner() {
        let mut map = GridMap::all_land(4, 4);
        map.conquer(5, PlayerId(1));
        map.flood(5);
        assert!(!map.is_land(5));
        assert_eq!(map.owner(5), None);
    }

    #[test]
    fn test_territory_world_conversions() {
        let territory = Territory::new(GridMap::all_land(10, 8));
        assert_eq!(territory.tile_at(3.5, 2.2, 2.0), Some(territory.map().tile(1, 1)));
        assert_eq!(territory.tile_at(-0.1, 2.0, 1.0), None);
        assert_eq!(territory.tile_at(10.0, 2.0, 1.0), None);
        assert_eq!(territory.tile_center(territory.map().tile(1, 1), 2.0), (3.0, 3.0));
        assert_eq!(territory.center(1.0), (5.0, 4.0));
        assert_eq!(territory.clamp(-3.0, 20.0, 1.0), (0.0, 8.0));
    }
}
