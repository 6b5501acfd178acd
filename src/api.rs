//! Public API for the simulation.
//!
//! [`SimWorld`] owns the ECS world and the tick schedule. The enclosing game
//! loop calls [`SimWorld::tick`] with a delta time, reads state through
//! [`SimWorld::snapshot`], and issues player commands (stance, attack orders,
//! structure registration, boarding) between ticks.
//!
//! ## Pipeline
//!
//! Every tick runs the same chained, single-threaded schedule:
//!
//! 1. territory cache, headquarters bootstrap, unit cap, spawn timers
//! 2. attack orders, attack assignment, targeting
//! 3. steering, movement, transport sync, spatial grid rebuild
//! 4. combat, shield regeneration, projectiles
//! 5. capture, cleanup

use crate::components::*;
use crate::config::{ConfigError, SimConfig};
use crate::error::CommandError;
use crate::players::{PlayerKind, PlayerRegistry, Players, Roster};
use crate::resources::{DefeatedPlayers, DeltaTime, IdAllocator, SimClock, SimRng, SimTick};
use crate::spatial::{spatial_grid_update_system, SpatialGrid};
use crate::systems::*;
use crate::territory::{GridMap, Territory, TileMap};
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation from a config, map and player registry
/// - Stepping the simulation forward
/// - Extracting state snapshots
/// - Issuing player commands
pub struct SimWorld {
    world: World,
    schedule: Schedule,
}

impl SimWorld {
    /// Create a simulation over `map` for the players in `players`.
    ///
    /// Fails with [`ConfigError::Invalid`] when the config does not validate.
    pub fn new(
        config: SimConfig,
        map: impl TileMap + 'static,
        players: impl PlayerRegistry + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, map, players))
    }

    fn assemble(config: SimConfig, map: impl TileMap + 'static, players: impl PlayerRegistry + 'static) -> Self {
        let mut world = World::new();

        world.insert_resource(DeltaTime(0.0));
        world.insert_resource(SimTick(0));
        world.insert_resource(SimClock(0.0));
        world.insert_resource(IdAllocator::default());
        world.insert_resource(SimRng::from_seed(config.seed));
        world.insert_resource(DefeatedPlayers::default());
        world.insert_resource(SpatialGrid::new(config.spatial_cell_size));
        world.insert_resource(TerritoryCache::default());
        world.insert_resource(Stances::default());
        world.insert_resource(AttackOrders::default());
        world.insert_resource(Territory::new(map));
        world.insert_resource(Players::new(players));
        world.insert_resource(config);

        Self {
            world,
            schedule: Self::build_schedule(),
        }
    }

    fn build_schedule() -> Schedule {
        let mut schedule = Schedule::default();
        // Run order is part of the simulation's contract
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems(
            (
                territory_cache_system,
                headquarters_bootstrap_system,
                unit_cap_system,
                spawn_system,
                attack_order_system,
                attack_assignment_system,
                targeting_system,
                steering_system,
                movement_system,
                transport_sync_system,
                spatial_grid_update_system,
                combat_system,
                shield_regen_system,
                projectile_system,
                capture_system,
                cleanup_system,
            )
                .chain(),
        );
        schedule
    }

    /// Two-player match on a circular island: a human in the west, a bot in
    /// the east, each starting with a small disc of land.
    pub fn skirmish(seed: u64) -> Self {
        let (map, roster) = Self::skirmish_setup();
        // Default tables always validate
        Self::assemble(
            SimConfig {
                seed,
                ..SimConfig::default()
            },
            map,
            roster,
        )
    }

    pub fn skirmish_with(config: SimConfig) -> Result<Self, ConfigError> {
        let (map, roster) = Self::skirmish_setup();
        Self::new(config, map, roster)
    }

    fn skirmish_setup() -> (GridMap, Roster) {
        let mut map = GridMap::circle(120, 120);
        map.claim_disc(PlayerId(1), 30, 60, 8);
        map.claim_disc(PlayerId(2), 90, 60, 8);
        let roster = Roster::new()
            .with_player(PlayerId(1), PlayerKind::Human)
            .with_player(PlayerId(2), PlayerKind::Bot);
        (map, roster)
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Non-finite or negative deltas are ignored.
    pub fn tick(&mut self, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(target: "warfront::engine", dt, "tick.invalid_delta");
            return;
        }
        self.world.resource_mut::<DeltaTime>().0 = dt;
        self.world.resource_mut::<SimTick>().increment();
        self.world.resource_mut::<SimClock>().0 += f64::from(dt);
        self.schedule.run(&mut self.world);
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    pub fn current_tick(&self) -> u64 {
        self.world.resource::<SimTick>().0
    }

    /// Elapsed simulated seconds.
    pub fn current_time(&self) -> f64 {
        self.world.resource::<SimClock>().0
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    pub fn territory(&self) -> &Territory {
        self.world.resource::<Territory>()
    }

    /// Mutable map access for the enclosing game (e.g. scripted conquest).
    pub fn territory_mut(&mut self) -> Mut<'_, Territory> {
        self.world.resource_mut::<Territory>()
    }

    /// Get the spatial grid (for debugging/visualization).
    pub fn spatial_grid(&self) -> &SpatialGrid {
        self.world.resource::<SpatialGrid>()
    }

    pub fn territory_cache(&self) -> &TerritoryCache {
        self.world.resource::<TerritoryCache>()
    }

    pub fn is_defeated(&self, player: PlayerId) -> bool {
        self.world.resource::<DefeatedPlayers>().contains(player)
    }

    /// Units (mobile and stationary) owned by `player`.
    pub fn unit_count(&mut self, player: PlayerId) -> usize {
        let mut query = self.world.query_filtered::<&Owner, With<UnitId>>();
        query.iter(&self.world).filter(|o| o.0 == player).count()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn ensure_active(&self, player: PlayerId) -> Result<(), CommandError> {
        if !self.world.resource::<Players>().registry().exists(player) {
            return Err(CommandError::UnknownPlayer(player));
        }
        if self.is_defeated(player) {
            return Err(CommandError::PlayerDefeated(player));
        }
        Ok(())
    }

    fn ensure_on_map(&self, x: f32, y: f32) -> Result<(), CommandError> {
        let tile_size = self.config().tile_size;
        if self.territory().contains(x, y, tile_size) {
            Ok(())
        } else {
            Err(CommandError::OutOfBounds { x, y })
        }
    }

    fn find_unit(&mut self, id: UnitId) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &UnitId)>();
        query
            .iter(&self.world)
            .find(|(_, unit)| **unit == id)
            .map(|(entity, _)| entity)
    }

    /// Log and pass through a rejected command.
    fn rejected<T>(command: &'static str, result: Result<T, CommandError>) -> Result<T, CommandError> {
        if let Err(err) = &result {
            tracing::debug!(target: "warfront::engine", command, error = %err, "command.rejected");
        }
        result
    }

    /// Set a player's defensive stance, clamped to [0, 1].
    ///
    /// When the value changes every mobile unit of the player re-plans its
    /// target on the next tick. Returns whether the stance changed.
    pub fn set_stance(&mut self, player: PlayerId, value: f32) -> Result<bool, CommandError> {
        Self::rejected("set_stance", self.ensure_active(player))?;
        let changed = self.world.resource_mut::<Stances>().set(player, value);
        if changed {
            let mut query = self
                .world
                .query_filtered::<(&Owner, &Position, &mut Mobility), Without<Embarked>>();
            for (owner, pos, mut mobility) in query.iter_mut(&mut self.world) {
                if owner.0 == player {
                    mobility.retarget_here(pos);
                }
            }
            tracing::debug!(target: "warfront::engine", player = %player, value, "stance.changed");
        }
        Ok(changed)
    }

    /// Current stance of a player, assigning a bot's random stance on first use.
    pub fn stance(&mut self, player: PlayerId) -> f32 {
        let human_default = self.config().human_default_stance;
        self.world.resource_scope(|world, mut stances: Mut<Stances>| {
            world.resource_scope(|world, mut rng: Mut<SimRng>| {
                let players = world.resource::<Players>();
                stances.get(player, players.registry(), &mut rng.0, human_default)
            })
        })
    }

    /// Queue (or with `ratio <= 0`, clear) the player's attack order.
    pub fn queue_attack_order(
        &mut self,
        player: PlayerId,
        target: Option<PlayerId>,
        ratio: f32,
    ) -> Result<OrderStatus, CommandError> {
        let tick = self.current_tick();
        let now = self.current_time();
        let result = self.world.resource_scope(|world, mut orders: Mut<AttackOrders>| {
            orders.queue(
                player,
                target,
                ratio,
                tick,
                now,
                world.resource::<Players>().registry(),
                world.resource::<DefeatedPlayers>(),
            )
        });
        let status = Self::rejected("queue_attack_order", result)?;
        tracing::debug!(
            target: "warfront::orders",
            issuer = %player,
            target_player = ?target,
            ratio,
            status = ?status,
            "order.queued"
        );
        Ok(status)
    }

    pub fn attack_order(&self, player: PlayerId) -> Option<AttackOrder> {
        self.world.resource::<AttackOrders>().get(player).copied()
    }

    /// Register a completed structure. Used by external construction logic.
    pub fn register_structure(
        &mut self,
        owner: PlayerId,
        kind: StructureKind,
        tier: Tier,
        x: f32,
        y: f32,
    ) -> Result<StructureId, CommandError> {
        Self::rejected("register_structure", self.check_structure(owner, kind, x, y))?;

        let id = self.world.resource_mut::<IdAllocator>().structure();
        let blueprint = structure_blueprint(self.config(), id, owner, kind, tier, Position::new(x, y));
        blueprint.spawn_in(&mut self.world);
        tracing::info!(
            target: "warfront::engine",
            player = %owner,
            structure = id.0,
            kind = kind.as_str(),
            x,
            y,
            "structure.registered"
        );
        Ok(id)
    }

    fn check_structure(&mut self, owner: PlayerId, kind: StructureKind, x: f32, y: f32) -> Result<(), CommandError> {
        self.ensure_active(owner)?;
        self.ensure_on_map(x, y)?;
        if kind == StructureKind::Headquarters {
            let mut query = self.world.query_filtered::<&Owner, With<Headquarters>>();
            if query.iter(&self.world).any(|o| o.0 == owner) {
                return Err(CommandError::HeadquartersExists(owner));
            }
        }
        Ok(())
    }

    /// Place a player's headquarters explicitly instead of waiting for the bootstrap.
    pub fn place_headquarters(&mut self, owner: PlayerId, x: f32, y: f32) -> Result<StructureId, CommandError> {
        self.register_structure(owner, StructureKind::Headquarters, Tier::default(), x, y)
    }

    /// Spawn a unit directly, outside of any spawner.
    pub fn spawn_unit(
        &mut self,
        owner: PlayerId,
        kind: UnitKind,
        tier: Tier,
        x: f32,
        y: f32,
    ) -> Result<UnitId, CommandError> {
        Self::rejected("spawn_unit", self.check_spawn(owner, kind, x, y))?;

        let id = self.world.resource_mut::<IdAllocator>().unit();
        let blueprint = unit_blueprint(self.config(), id, owner, kind, tier, Position::new(x, y));
        blueprint.spawn_in(&mut self.world);
        Ok(id)
    }

    fn check_spawn(&mut self, owner: PlayerId, kind: UnitKind, x: f32, y: f32) -> Result<(), CommandError> {
        self.ensure_active(owner)?;
        self.ensure_on_map(x, y)?;
        if kind.is_mobile() {
            let cap = self.config().max_units_per_player as usize;
            let mut query = self.world.query_filtered::<&Owner, With<Mobility>>();
            if query.iter(&self.world).filter(|o| o.0 == owner).count() >= cap {
                return Err(CommandError::UnitCapReached(owner));
            }
        }
        Ok(())
    }

    /// Put `unit` aboard `transport`. Both must belong to the same player and
    /// be within boarding range.
    pub fn board(&mut self, unit: UnitId, transport: UnitId) -> Result<(), CommandError> {
        let result = self.check_board(unit, transport);
        let (passenger, carrier_pos) = Self::rejected("board", result)?;
        let mut entity = self.world.entity_mut(passenger);
        entity.insert((Embarked { transport }, carrier_pos, Velocity::default()));
        if let Some(mut assignment) = entity.get_mut::<AttackAssignment>() {
            assignment.0 = None;
        }
        Ok(())
    }

    fn check_board(&mut self, unit: UnitId, transport: UnitId) -> Result<(Entity, Position), CommandError> {
        let passenger = self.find_unit(unit).ok_or(CommandError::UnknownUnit(unit))?;
        let carrier = self.find_unit(transport).ok_or(CommandError::UnknownUnit(transport))?;
        let cannot = CommandError::CannotBoard { unit, transport };

        let p = self.world.entity(passenger);
        let c = self.world.entity(carrier);
        let (Some(p_kind), Some(p_owner), Some(p_pos)) = (p.get::<UnitKind>(), p.get::<Owner>(), p.get::<Position>())
        else {
            return Err(cannot);
        };
        let (Some(cargo), Some(c_owner), Some(c_pos)) = (c.get::<Cargo>(), c.get::<Owner>(), c.get::<Position>()) else {
            return Err(cannot);
        };
        if !p_kind.can_board()
            || p_owner != c_owner
            || p.contains::<Embarked>()
            || c.contains::<Embarked>()
            || p_pos.distance_to(c_pos) > self.config().boarding_range
        {
            return Err(cannot);
        }
        let capacity = cargo.capacity as usize;
        let carrier_pos = *c_pos;

        let mut riders = self.world.query::<&Embarked>();
        if riders.iter(&self.world).filter(|e| e.transport == transport).count() >= capacity {
            return Err(CommandError::TransportFull(transport));
        }
        Ok((passenger, carrier_pos))
    }

    /// Unload every passenger of `transport` where it stands. Returns how many left.
    pub fn disembark(&mut self, transport: UnitId) -> Result<usize, CommandError> {
        let carrier = Self::rejected(
            "disembark",
            self.find_unit(transport).ok_or(CommandError::UnknownUnit(transport)),
        )?;
        let Some(&drop_at) = self.world.entity(carrier).get::<Position>() else {
            return Ok(0);
        };

        let mut query = self.world.query::<(Entity, &Embarked)>();
        let riders: Vec<Entity> = query
            .iter(&self.world)
            .filter(|(_, e)| e.transport == transport)
            .map(|(entity, _)| entity)
            .collect();
        for rider in &riders {
            let mut entity = self.world.entity_mut(*rider);
            entity.remove::<Embarked>();
            entity.insert(drop_at);
            if let Some(mut mobility) = entity.get_mut::<Mobility>() {
                mobility.retarget_here(&drop_at);
            }
        }
        Ok(riders.len())
    }
}
