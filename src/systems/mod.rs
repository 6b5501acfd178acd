//! ECS Systems for the Warfront simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick order
//!
//! The schedule runs single-threaded and chained, so every system sees the
//! deferred commands of the ones before it:
//!
//! **Territory**
//! - `territory_cache_system` - Rebuilds per-player border/centroid snapshots
//! - `headquarters_bootstrap_system` - Founds missing headquarters
//!
//! **Production**
//! - `unit_cap_system` - Culls units above the per-player cap
//! - `spawn_system` - Advances spawn timers
//!
//! **Planning**
//! - `attack_order_system` - Expires orders and resolves their target point
//! - `attack_assignment_system` - Hands the quota of units to each order
//! - `targeting_system` - Picks a destination for arrived units
//!
//! **Motion**
//! - `steering_system` - Velocity toward the target plus separation
//! - `movement_system` - Integrates velocity, clamps to the map
//! - `transport_sync_system` - Passengers follow their transporter
//! - `spatial_grid_update_system` - Rebuilds the spatial index
//!
//! **Combat**
//! - `combat_system` - Gathers attacks, applies damage through shields
//! - `shield_regen_system` - Refills idle shields
//! - `projectile_system` - Ages and moves visual projectiles
//!
//! **Resolution**
//! - `capture_system` - Flips tiles around units, eliminates players
//! - `cleanup_system` - Removes the dead

pub mod capture;
pub mod cleanup;
pub mod combat;
pub mod movement;
pub mod orders;
pub mod projectiles;
pub mod spawn;
pub mod stance;
pub mod targeting;
pub mod territory_cache;

pub use capture::*;
pub use cleanup::*;
pub use combat::*;
pub use movement::*;
pub use orders::*;
pub use projectiles::*;
pub use spawn::*;
pub use stance::*;
pub use targeting::*;
pub use territory_cache::*;
