//! Simulation tuning.
//!
//! Every number the pipeline depends on lives in [`SimConfig`]. The config is
//! handed to the engine at construction and inserted as a resource, so two
//! simulations in the same process can run with different balance.

use crate::components::{BurstEffect, StructureKind, UnitKind, WeaponProfile};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse sim config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read sim config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid sim config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShieldStats {
    pub max: f32,
    /// Radius within which friendly units are covered; zero protects only the bearer.
    #[serde(default)]
    pub radius: f32,
}

/// Base statistics of one unit kind at tier 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub max_health: f32,
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub range: f32,
    /// Towers reach further than their nominal range.
    #[serde(default = "default_range_multiplier")]
    pub range_multiplier: f32,
    #[serde(default)]
    pub weapon: Option<WeaponProfile>,
    #[serde(default)]
    pub shield: Option<ShieldStats>,
    #[serde(default)]
    pub cargo_capacity: u32,
}

fn default_range_multiplier() -> f32 {
    1.0
}

impl UnitStats {
    pub fn effective_range(&self) -> f32 {
        self.range * self.range_multiplier
    }
}

/// Per-kind stat table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitStatsTable {
    pub soldier: UnitStats,
    pub elite_soldier: UnitStats,
    pub warship: UnitStats,
    pub transporter: UnitStats,
    pub defense_post: UnitStats,
    pub sam: UnitStats,
    pub missile_silo: UnitStats,
    pub shield_generator: UnitStats,
    pub artillery: UnitStats,
}

impl UnitStatsTable {
    pub fn get(&self, kind: UnitKind) -> &UnitStats {
        match kind {
            UnitKind::Soldier => &self.soldier,
            UnitKind::EliteSoldier => &self.elite_soldier,
            UnitKind::Warship => &self.warship,
            UnitKind::Transporter => &self.transporter,
            UnitKind::DefensePost => &self.defense_post,
            UnitKind::Sam => &self.sam,
            UnitKind::MissileSilo => &self.missile_silo,
            UnitKind::ShieldGenerator => &self.shield_generator,
            UnitKind::Artillery => &self.artillery,
        }
    }
}

impl Default for UnitStatsTable {
    fn default() -> Self {
        Self {
            soldier: UnitStats {
                max_health: 100.0,
                speed: 6.0,
                range: 25.0,
                range_multiplier: 1.0,
                weapon: Some(WeaponProfile::Continuous {
                    dps: 15.0,
                    fire_interval: 0.5,
                }),
                shield: None,
                cargo_capacity: 0,
            },
            elite_soldier: UnitStats {
                max_health: 180.0,
                speed: 7.0,
                range: 30.0,
                range_multiplier: 1.0,
                weapon: Some(WeaponProfile::Continuous {
                    dps: 25.0,
                    fire_interval: 0.4,
                }),
                shield: None,
                cargo_capacity: 0,
            },
            warship: UnitStats {
                max_health: 300.0,
                speed: 5.0,
                range: 40.0,
                range_multiplier: 1.0,
                weapon: Some(WeaponProfile::Continuous {
                    dps: 30.0,
                    fire_interval: 1.0,
                }),
                shield: None,
                cargo_capacity: 0,
            },
            transporter: UnitStats {
                max_health: 150.0,
                speed: 8.0,
                range: 0.0,
                range_multiplier: 1.0,
                weapon: None,
                shield: None,
                cargo_capacity: 8,
            },
            defense_post: UnitStats {
                max_health: 400.0,
                speed: 0.0,
                range: 30.0,
                range_multiplier: 1.25,
                weapon: Some(WeaponProfile::Burst {
                    damage: 40.0,
                    fire_interval: 1.0,
                    effect: BurstEffect::Beam,
                }),
                shield: None,
                cargo_capacity: 0,
            },
            sam: UnitStats {
                max_health: 250.0,
                speed: 0.0,
                range: 40.0,
                range_multiplier: 1.25,
                weapon: Some(WeaponProfile::Burst {
                    damage: 60.0,
                    fire_interval: 2.0,
                    effect: BurstEffect::Beam,
                }),
                shield: None,
                cargo_capacity: 0,
            },
            missile_silo: UnitStats {
                max_health: 300.0,
                speed: 0.0,
                range: 60.0,
                range_multiplier: 1.5,
                weapon: Some(WeaponProfile::Burst {
                    damage: 120.0,
                    fire_interval: 5.0,
                    effect: BurstEffect::Barrage { volleys: 3 },
                }),
                shield: None,
                cargo_capacity: 0,
            },
            shield_generator: UnitStats {
                max_health: 200.0,
                speed: 0.0,
                range: 0.0,
                range_multiplier: 1.0,
                weapon: None,
                shield: Some(ShieldStats {
                    max: 300.0,
                    radius: 30.0,
                }),
                cargo_capacity: 0,
            },
            artillery: UnitStats {
                max_health: 250.0,
                speed: 0.0,
                range: 55.0,
                range_multiplier: 1.25,
                weapon: Some(WeaponProfile::Splash {
                    damage: 50.0,
                    fire_interval: 3.0,
                    radius: 12.0,
                }),
                shield: None,
                cargo_capacity: 0,
            },
        }
    }
}

/// What a structure produces and how often.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnerStats {
    pub unit: UnitKind,
    pub interval: f32,
}

/// Spawner settings per structure kind; `None` means the structure never spawns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerTable {
    pub headquarters: Option<SpawnerStats>,
    pub factory: Option<SpawnerStats>,
    pub port: Option<SpawnerStats>,
    pub airport: Option<SpawnerStats>,
    pub mine: Option<SpawnerStats>,
    pub mini_headquarters: Option<SpawnerStats>,
}

impl SpawnerTable {
    pub fn get(&self, kind: StructureKind) -> Option<SpawnerStats> {
        match kind {
            StructureKind::Headquarters => self.headquarters,
            StructureKind::Factory => self.factory,
            StructureKind::Port => self.port,
            StructureKind::Airport => self.airport,
            StructureKind::Mine => self.mine,
            StructureKind::MiniHeadquarters => self.mini_headquarters,
        }
    }
}

impl Default for SpawnerTable {
    fn default() -> Self {
        Self {
            headquarters: Some(SpawnerStats {
                unit: UnitKind::Soldier,
                interval: 4.0,
            }),
            factory: Some(SpawnerStats {
                unit: UnitKind::EliteSoldier,
                interval: 6.0,
            }),
            port: Some(SpawnerStats {
                unit: UnitKind::Warship,
                interval: 10.0,
            }),
            airport: None,
            mine: None,
            mini_headquarters: Some(SpawnerStats {
                unit: UnitKind::Soldier,
                interval: 6.0,
            }),
        }
    }
}

/// Global simulation configuration resource.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed of the simulation RNG.
    pub seed: u64,
    /// World units per map tile.
    pub tile_size: f32,
    pub spatial_cell_size: f32,
    /// Territory snapshots are rebuilt every this many ticks.
    pub territory_refresh_ticks: u64,
    /// Border tiles kept per territory snapshot.
    pub border_sample_size: usize,
    /// Border tiles the planner scores per unit.
    pub targeting_sample_size: usize,
    pub retarget_distance: f32,
    /// How far past the border the offensive point lies.
    pub advance_distance: f32,
    pub radial_bias: f32,
    pub attack_bias: f32,
    pub separation_radius: f32,
    pub separation_weight: f32,
    pub capture_radius: f32,
    pub hq_capture_radius: f32,
    pub max_units_per_player: u32,
    /// Seconds an attack order stays active.
    pub attack_order_ttl: f32,
    pub shield_regen_delay: f32,
    pub shield_regen_window: f32,
    /// Extra health per tier above 1, as a fraction of base.
    pub tier_health_bonus: f32,
    pub tier_damage_bonus: f32,
    pub boarding_range: f32,
    pub bolt_speed: f32,
    pub beam_lifetime: f32,
    pub shell_flight_time: f32,
    pub human_default_stance: f32,
    /// Give every landed player without a headquarters one at their centroid.
    pub auto_headquarters: bool,
    pub units: UnitStatsTable,
    pub spawners: SpawnerTable,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            tile_size: 1.0,
            spatial_cell_size: 50.0,
            territory_refresh_ticks: 5,
            border_sample_size: 256,
            targeting_sample_size: 50,
            retarget_distance: 3.0,
            advance_distance: 15.0,
            radial_bias: 1.0,
            attack_bias: 2.0,
            separation_radius: 4.0,
            separation_weight: 0.8,
            capture_radius: 3.0,
            hq_capture_radius: 4.0,
            max_units_per_player: 120,
            attack_order_ttl: 15.0,
            shield_regen_delay: 3.0,
            shield_regen_window: 6.0,
            tier_health_bonus: 0.5,
            tier_damage_bonus: 0.25,
            boarding_range: 6.0,
            bolt_speed: 120.0,
            beam_lifetime: 0.2,
            shell_flight_time: 1.2,
            human_default_stance: 1.0,
            auto_headquarters: true,
            units: UnitStatsTable::default(),
            spawners: SpawnerTable::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("tile_size", self.tile_size),
            ("spatial_cell_size", self.spatial_cell_size),
            ("bolt_speed", self.bolt_speed),
            ("beam_lifetime", self.beam_lifetime),
            ("shell_flight_time", self.shell_flight_time),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if self.territory_refresh_ticks == 0 {
            return Err(ConfigError::Invalid("territory_refresh_ticks must be at least 1".into()));
        }
        if self.targeting_sample_size == 0 || self.border_sample_size == 0 {
            return Err(ConfigError::Invalid("border sample sizes must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.human_default_stance) {
            return Err(ConfigError::Invalid(format!(
                "human_default_stance must be within [0, 1], got {}",
                self.human_default_stance
            )));
        }
        for kind in UnitKind::ALL {
            let stats = self.units.get(kind);
            if !(stats.max_health > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} max_health must be positive",
                    kind.as_str()
                )));
            }
            if kind.is_mobile() != (stats.speed > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} speed must be positive exactly when the unit is mobile",
                    kind.as_str()
                )));
            }
        }
        for kind in [
            StructureKind::Headquarters,
            StructureKind::Factory,
            StructureKind::Port,
            StructureKind::Airport,
            StructureKind::Mine,
            StructureKind::MiniHeadquarters,
        ] {
            if let Some(spawner) = self.spawners.get(kind) {
                if !(spawner.interval > 0.0) || !spawner.unit.is_mobile() {
                    return Err(ConfigError::Invalid(format!(
                        "{} spawner needs a positive interval and a mobile unit",
                        kind.as_str()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Health multiplier of a unit at `tier`.
    pub fn tier_health_multiplier(&self, tier: u8) -> f32 {
        1.0 + self.tier_health_bonus * f32::from(tier.saturating_sub(1))
    }

    pub fn tier_damage_multiplier(&self, tier: u8) -> f32 {
        1.0 + self.tier_damage_bonus * f32::from(tier.saturating_sub(1))
    }
}
