//! Unit and structure creation, spawn timers and the per-player unit cap.

use crate::components::*;
use crate::config::SimConfig;
use crate::resources::{DefeatedPlayers, DeltaTime, IdAllocator};
use crate::territory::Territory;
use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};

/// Angle between consecutive spawn offsets, spreads units around a spawner.
const GOLDEN_ANGLE: f32 = 2.399_963;
/// Distance from the spawning structure, in tiles.
const SPAWN_OFFSET_TILES: f32 = 1.5;

/// Everything needed to spawn one unit, built from the stat table.
#[derive(Debug, Clone)]
pub struct UnitBlueprint {
    pub base: UnitBundle,
    pub mobility: Option<Mobility>,
    pub weapon: Option<Weapon>,
    pub shield: Option<Shield>,
    pub cargo: Option<Cargo>,
    pub spawned_by: Option<SpawnedBy>,
}

impl UnitBlueprint {
    pub fn spawn(self, commands: &mut Commands) -> Entity {
        let mut entity = commands.spawn(self.base);
        if let Some(mobility) = self.mobility {
            entity.insert((mobility, AttackAssignment::default()));
        }
        if let Some(weapon) = self.weapon {
            entity.insert(weapon);
        }
        if let Some(shield) = self.shield {
            entity.insert(shield);
        }
        if let Some(cargo) = self.cargo {
            entity.insert(cargo);
        }
        if let Some(spawned_by) = self.spawned_by {
            entity.insert(spawned_by);
        }
        entity.id()
    }

    pub fn spawn_in(self, world: &mut World) -> Entity {
        let mut entity = world.spawn(self.base);
        if let Some(mobility) = self.mobility {
            entity.insert((mobility, AttackAssignment::default()));
        }
        if let Some(weapon) = self.weapon {
            entity.insert(weapon);
        }
        if let Some(shield) = self.shield {
            entity.insert(shield);
        }
        if let Some(cargo) = self.cargo {
            entity.insert(cargo);
        }
        if let Some(spawned_by) = self.spawned_by {
            entity.insert(spawned_by);
        }
        entity.id()
    }
}

/// Tier-scaled unit of `kind` standing at `position`.
pub fn unit_blueprint(
    config: &SimConfig,
    id: UnitId,
    owner: PlayerId,
    kind: UnitKind,
    tier: Tier,
    position: Position,
) -> UnitBlueprint {
    let stats = config.units.get(kind);
    let health = stats.max_health * config.tier_health_multiplier(tier.0);
    let damage = config.tier_damage_multiplier(tier.0);

    UnitBlueprint {
        base: UnitBundle {
            id,
            owner: Owner(owner),
            kind,
            tier,
            position,
            velocity: Velocity::default(),
            health: Health::new(health),
        },
        mobility: kind
            .is_mobile()
            .then(|| Mobility::new(stats.speed, position.x, position.y)),
        weapon: stats
            .weapon
            .map(|profile| Weapon::new(profile.scaled(damage), stats.effective_range())),
        shield: stats.shield.map(|s| Shield::new(s.max, s.radius)),
        cargo: (stats.cargo_capacity > 0).then_some(Cargo {
            capacity: stats.cargo_capacity,
        }),
        spawned_by: None,
    }
}

#[derive(Debug, Clone)]
pub struct StructureBlueprint {
    pub base: StructureBundle,
    pub spawner: Option<Spawner>,
    pub headquarters: Option<Headquarters>,
}

impl StructureBlueprint {
    pub fn spawn(self, commands: &mut Commands) -> Entity {
        let mut entity = commands.spawn(self.base);
        if let Some(spawner) = self.spawner {
            entity.insert(spawner);
        }
        if let Some(hq) = self.headquarters {
            entity.insert(hq);
        }
        entity.id()
    }

    pub fn spawn_in(self, world: &mut World) -> Entity {
        let mut entity = world.spawn(self.base);
        if let Some(spawner) = self.spawner {
            entity.insert(spawner);
        }
        if let Some(hq) = self.headquarters {
            entity.insert(hq);
        }
        entity.id()
    }
}

pub fn structure_blueprint(
    config: &SimConfig,
    id: StructureId,
    owner: PlayerId,
    kind: StructureKind,
    tier: Tier,
    position: Position,
) -> StructureBlueprint {
    let max_health = 1000.0 * config.tier_health_multiplier(tier.0);
    StructureBlueprint {
        base: StructureBundle {
            id,
            owner: Owner(owner),
            kind,
            tier,
            position,
            health: Health::new(max_health),
        },
        spawner: config
            .spawners
            .get(kind)
            .map(|s| Spawner::new(s.unit, s.interval)),
        headquarters: (kind == StructureKind::Headquarters).then_some(Headquarters {
            capture_radius: config.hq_capture_radius,
        }),
    }
}

/// Deterministic spot around a spawner for the unit with `id`.
pub fn spawn_point(origin: &Position, id: UnitId, tile_size: f32) -> (f32, f32) {
    let angle = id.0 as f32 * GOLDEN_ANGLE;
    let r = SPAWN_OFFSET_TILES * tile_size;
    (origin.x + angle.cos() * r, origin.y + angle.sin() * r)
}

/// Culls mobile units beyond the per-player cap.
///
/// Units are ranked by id; the first `max_units_per_player` of each player
/// survive and the rest are removed, releasing their spawner slot.
pub fn unit_cap_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    units: Query<(Entity, &UnitId, &Owner, Option<&SpawnedBy>), With<Mobility>>,
    mut spawners: Query<(&StructureId, &mut Spawner)>,
) {
    let mut ranked: Vec<_> = units.iter().collect();
    ranked.sort_by_key(|(_, id, _, _)| **id);

    let mut counts: HashMap<PlayerId, u32> = HashMap::new();
    let mut released: HashMap<StructureId, u32> = HashMap::new();
    let mut culled = 0usize;
    for (entity, _, owner, spawned_by) in ranked {
        let count = counts.entry(owner.0).or_insert(0);
        *count += 1;
        if *count <= config.max_units_per_player {
            continue;
        }
        commands.entity(entity).despawn();
        if let Some(SpawnedBy(structure)) = spawned_by {
            *released.entry(*structure).or_insert(0) += 1;
        }
        culled += 1;
    }

    if culled == 0 {
        return;
    }
    for (id, mut spawner) in spawners.iter_mut() {
        if let Some(n) = released.get(id) {
            spawner.live_units = spawner.live_units.saturating_sub(*n);
        }
    }
    tracing::debug!(
        target: "warfront::spawn",
        culled,
        cap = config.max_units_per_player,
        "units.cap_enforced"
    );
}

/// Advances spawn timers and produces units at structures whose timer elapsed.
///
/// A player at the unit cap holds its timers at zero until a slot frees up.
/// Players without a headquarters produce nothing.
#[allow(clippy::too_many_arguments)]
pub fn spawn_system(
    mut commands: Commands,
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    territory: Res<Territory>,
    defeated: Res<DefeatedPlayers>,
    mut ids: ResMut<IdAllocator>,
    mut structures: Query<(&StructureId, &Owner, &Position, &Tier, &mut Spawner)>,
    units: Query<&Owner, With<Mobility>>,
    headquarters: Query<&Owner, With<Headquarters>>,
) {
    let established: HashSet<PlayerId> = headquarters.iter().map(|o| o.0).collect();
    let mut counts: HashMap<PlayerId, u32> = HashMap::new();
    for owner in units.iter() {
        *counts.entry(owner.0).or_insert(0) += 1;
    }

    let mut ordered: Vec<_> = structures.iter_mut().collect();
    ordered.sort_by_key(|(id, ..)| **id);

    for (structure, owner, pos, tier, mut spawner) in ordered {
        if defeated.contains(owner.0) || !established.contains(&owner.0) {
            continue;
        }
        spawner.timer -= dt.0;
        if spawner.timer > 0.0 {
            continue;
        }
        let count = counts.entry(owner.0).or_insert(0);
        if *count >= config.max_units_per_player {
            spawner.timer = 0.0;
            continue;
        }

        let id = ids.unit();
        let (x, y) = spawn_point(pos, id, config.tile_size);
        let (x, y) = territory.clamp(x, y, config.tile_size);
        let mut blueprint = unit_blueprint(&config, id, owner.0, spawner.unit, *tier, Position::new(x, y));
        blueprint.spawned_by = Some(SpawnedBy(*structure));
        blueprint.spawn(&mut commands);

        *count += 1;
        spawner.live_units += 1;
        spawner.timer = (spawner.timer + spawner.interval).max(0.0);
        tracing::trace!(
            target: "warfront::spawn",
            structure = structure.0,
            unit = id.0,
            kind = spawner.unit.as_str(),
            "unit.spawned"
        );
    }
}
