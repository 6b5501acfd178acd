//! Warfront - Simulation Core
//!
//! A deterministic, real-time unit warfare simulation on a tile map.
//! Uses `bevy_ecs` for the entity-component-system architecture.
//!
//! The host game owns the map and the player registry; it hands both to
//! [`SimWorld`], steps it with [`SimWorld::tick`] and reads the result back
//! through [`Snapshot`].

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod players;
pub mod resources;
pub mod spatial;
pub mod systems;
pub mod territory;
pub mod world;

pub use api::SimWorld;
pub use components::*;
pub use config::{ConfigError, SimConfig};
pub use error::CommandError;
pub use players::{PlayerKind, PlayerRegistry, Roster};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
pub use territory::{GridMap, MapError, Territory, TileMap, TileRef};
pub use world::{ProjectileSnapshot, Snapshot, StructureSnapshot, UnitSnapshot};
