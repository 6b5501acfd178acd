//! ECS Components for the Warfront simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.
//!
//! Archetype-specific state is split into its own component: only armed units
//! carry a [`Weapon`], only mobile units carry [`Mobility`], only shielded
//! units carry a [`Shield`], and so on. An entity never holds fields that are
//! meaningless for its kind.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D position in world coordinates.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.distance_sq_to(other).sqrt()
    }

    pub fn distance_sq_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// 2D velocity vector.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Self::default()
        } else {
            Self {
                vx: self.vx / mag,
                vy: self.vy / mag,
            }
        }
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Identifier of a player taking part in the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Owning player of a unit, structure or projectile.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner(pub PlayerId);

/// Stable unit identifier. Cross references between units use this, never an `Entity`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u32);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structure#{}", self.0)
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileId(pub u32);

/// Upgrade level of a unit or structure (1 = base).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier(pub u8);

impl Default for Tier {
    fn default() -> Self {
        Self(1)
    }
}

// ============================================================================
// UNIT COMPONENTS
// ============================================================================

/// Unit type. The first four variants move, the rest are stationary towers.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Soldier,
    EliteSoldier,
    Warship,
    Transporter,
    DefensePost,
    Sam,
    MissileSilo,
    ShieldGenerator,
    Artillery,
}

impl UnitKind {
    pub const ALL: [UnitKind; 9] = [
        UnitKind::Soldier,
        UnitKind::EliteSoldier,
        UnitKind::Warship,
        UnitKind::Transporter,
        UnitKind::DefensePost,
        UnitKind::Sam,
        UnitKind::MissileSilo,
        UnitKind::ShieldGenerator,
        UnitKind::Artillery,
    ];

    pub fn is_mobile(&self) -> bool {
        matches!(
            self,
            UnitKind::Soldier | UnitKind::EliteSoldier | UnitKind::Warship | UnitKind::Transporter
        )
    }

    /// Kinds that may ride inside a transporter.
    pub fn can_board(&self) -> bool {
        matches!(self, UnitKind::Soldier | UnitKind::EliteSoldier)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Soldier => "soldier",
            UnitKind::EliteSoldier => "elite_soldier",
            UnitKind::Warship => "warship",
            UnitKind::Transporter => "transporter",
            UnitKind::DefensePost => "defense_post",
            UnitKind::Sam => "sam",
            UnitKind::MissileSilo => "missile_silo",
            UnitKind::ShieldGenerator => "shield_generator",
            UnitKind::Artillery => "artillery",
        }
    }
}

/// Health of a unit or structure.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn damage(&mut self, amount: f32) {
        self.current -= amount;
    }

    pub fn kill(&mut self) {
        self.current = 0.0;
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Speed and current destination of a mobile unit.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mobility {
    pub speed: f32,
    pub target_x: f32,
    pub target_y: f32,
}

impl Mobility {
    pub fn new(speed: f32, x: f32, y: f32) -> Self {
        Self {
            speed,
            target_x: x,
            target_y: y,
        }
    }

    pub fn distance_to_target(&self, pos: &Position) -> f32 {
        let dx = self.target_x - pos.x;
        let dy = self.target_y - pos.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Point the unit at where it already stands so the planner picks a fresh target.
    pub fn retarget_here(&mut self, pos: &Position) {
        self.target_x = pos.x;
        self.target_y = pos.y;
    }
}

/// What a burst weapon leaves behind as its visual cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstEffect {
    Beam,
    Barrage { volleys: u32 },
}

/// Damage model of a weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeaponProfile {
    /// Deals `dps * dt` every tick a target is in range; fires a bolt each interval.
    Continuous { dps: f32, fire_interval: f32 },
    /// Deals `damage` to one target each time the cooldown elapses.
    Burst {
        damage: f32,
        fire_interval: f32,
        effect: BurstEffect,
    },
    /// Deals `damage` to every hostile unit within `radius` of the target.
    Splash {
        damage: f32,
        fire_interval: f32,
        radius: f32,
    },
}

impl WeaponProfile {
    pub fn fire_interval(&self) -> f32 {
        match *self {
            WeaponProfile::Continuous { fire_interval, .. }
            | WeaponProfile::Burst { fire_interval, .. }
            | WeaponProfile::Splash { fire_interval, .. } => fire_interval,
        }
    }

    /// Same weapon with its damage multiplied by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        match self {
            WeaponProfile::Continuous { dps, fire_interval } => WeaponProfile::Continuous {
                dps: dps * factor,
                fire_interval,
            },
            WeaponProfile::Burst {
                damage,
                fire_interval,
                effect,
            } => WeaponProfile::Burst {
                damage: damage * factor,
                fire_interval,
                effect,
            },
            WeaponProfile::Splash {
                damage,
                fire_interval,
                radius,
            } => WeaponProfile::Splash {
                damage: damage * factor,
                fire_interval,
                radius,
            },
        }
    }
}

/// An armed unit's weapon and its cooldown.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub profile: WeaponProfile,
    /// Effective range, tower multiplier already applied.
    pub range: f32,
    /// Seconds until the weapon may fire again; ready at or below zero.
    pub cooldown: f32,
}

impl Weapon {
    pub fn new(profile: WeaponProfile, range: f32) -> Self {
        Self {
            profile,
            range,
            cooldown: 0.0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown <= 0.0
    }
}

/// Damage-absorbing shield. A non-zero radius also covers friendly units nearby.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shield {
    pub current: f32,
    pub max: f32,
    pub radius: f32,
    /// Seconds until regeneration resumes after the last hit.
    pub regen_timer: f32,
}

impl Shield {
    pub fn new(max: f32, radius: f32) -> Self {
        Self {
            current: max,
            max,
            radius,
            regen_timer: 0.0,
        }
    }

    /// Soak up as much of `amount` as possible and return what spills through.
    pub fn absorb(&mut self, amount: f32, regen_delay: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }
        let absorbed = amount.min(self.current);
        self.current -= absorbed;
        self.regen_timer = regen_delay;
        amount - absorbed
    }

    /// Refill from empty to full over `window` seconds once the delay has elapsed.
    pub fn regenerate(&mut self, dt: f32, window: f32) {
        if self.regen_timer > 0.0 {
            self.regen_timer = (self.regen_timer - dt).max(0.0);
            return;
        }
        if window <= 0.0 {
            self.current = self.max;
            return;
        }
        self.current = (self.current + self.max / window * dt).min(self.max);
    }
}

/// Where an attack order is sending this unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackTarget {
    /// `None` when the order pushes into unclaimed land.
    pub player: Option<PlayerId>,
    pub x: f32,
    pub y: f32,
}

/// Attack-order assignment of a mobile unit, refreshed every tick.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct AttackAssignment(pub Option<AttackTarget>);

/// Passenger link. The transporter is looked up by id every tick.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embarked {
    pub transport: UnitId,
}

/// Passenger capacity of a transporter.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cargo {
    pub capacity: u32,
}

/// Structure that produced this unit, for live-count bookkeeping.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedBy(pub StructureId);

// ============================================================================
// STRUCTURE COMPONENTS
// ============================================================================

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Headquarters,
    Factory,
    Port,
    Airport,
    Mine,
    MiniHeadquarters,
}

impl StructureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureKind::Headquarters => "headquarters",
            StructureKind::Factory => "factory",
            StructureKind::Port => "port",
            StructureKind::Airport => "airport",
            StructureKind::Mine => "mine",
            StructureKind::MiniHeadquarters => "mini_headquarters",
        }
    }
}

/// Marks a player's headquarters. Losing the tiles around it eliminates the player.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Headquarters {
    pub capture_radius: f32,
}

/// Spawn timer of a unit-producing structure.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spawner {
    pub unit: UnitKind,
    pub interval: f32,
    pub timer: f32,
    /// Units produced here that are still alive.
    pub live_units: u32,
}

impl Spawner {
    pub fn new(unit: UnitKind, interval: f32) -> Self {
        Self {
            unit,
            interval,
            timer: interval,
            live_units: 0,
        }
    }

    /// Fraction of the current interval that has elapsed, in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.interval <= 0.0 {
            return 1.0;
        }
        (1.0 - self.timer / self.interval).clamp(0.0, 1.0)
    }

    pub fn release(&mut self) {
        self.live_units = self.live_units.saturating_sub(1);
    }
}

// ============================================================================
// PROJECTILE COMPONENTS
// ============================================================================

/// Age and time-to-live of a projectile.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    pub age: f32,
    pub life: f32,
}

impl Lifetime {
    pub fn new(life: f32) -> Self {
        Self { age: 0.0, life }
    }

    pub fn expired(&self) -> bool {
        self.age >= self.life
    }
}

/// Kind-specific data of a projectile.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectilePayload {
    /// Direct shot flying toward its target.
    Bolt,
    /// Instant beam; stationary, lives only as an effect cue.
    Beam {
        from_x: f32,
        from_y: f32,
        to_x: f32,
        to_y: f32,
    },
    /// Artillery shell arcing onto a point.
    Ballistic {
        target_x: f32,
        target_y: f32,
        splash_radius: f32,
    },
    /// Guided missile salvo.
    Barrage {
        target_x: f32,
        target_y: f32,
        volleys: u32,
    },
}

// ============================================================================
// BUNDLES
// ============================================================================

/// Components shared by every unit.
#[derive(Bundle, Debug, Clone)]
pub struct UnitBundle {
    pub id: UnitId,
    pub owner: Owner,
    pub kind: UnitKind,
    pub tier: Tier,
    pub position: Position,
    pub velocity: Velocity,
    pub health: Health,
}

#[derive(Bundle, Debug, Clone)]
pub struct StructureBundle {
    pub id: StructureId,
    pub owner: Owner,
    pub kind: StructureKind,
    pub tier: Tier,
    pub position: Position,
    pub health: Health,
}

#[derive(Bundle, Debug, Clone)]
pub struct ProjectileBundle {
    pub id: ProjectileId,
    pub owner: Owner,
    pub position: Position,
    pub velocity: Velocity,
    pub lifetime: Lifetime,
    pub payload: ProjectilePayload,
}
