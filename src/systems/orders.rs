//! Attack orders: a player sends a share of their army at an enemy.
//!
//! Each player has at most one order. Every tick, before planning, orders are
//! expired or resolved into a target point and a unit quota; the first
//! `quota` mobile units of the issuer (by id) then carry an
//! [`AttackAssignment`] that biases their border choice.

use crate::components::*;
use crate::config::SimConfig;
use crate::error::CommandError;
use crate::players::{PlayerRegistry, Players};
use crate::resources::{DefeatedPlayers, SimClock, SimTick};
use crate::systems::territory_cache::TerritoryCache;
use crate::territory::Territory;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Target point and unit quota computed for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOrder {
    pub x: f32,
    pub y: f32,
    pub quota: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackOrder {
    pub issuer: PlayerId,
    /// `None` sends the units into unclaimed land.
    pub target: Option<PlayerId>,
    pub ratio: f32,
    pub created_tick: u64,
    /// Simulated time at intake, for the TTL.
    pub created_at: f64,
    pub resolved: Option<ResolvedOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Queued,
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    IssuerGone,
    NoUnits,
    TargetGone,
    TimedOut,
    NoTargetPoint,
}

impl Expiry {
    fn as_str(self) -> &'static str {
        match self {
            Expiry::IssuerGone => "issuer_gone",
            Expiry::NoUnits => "no_units",
            Expiry::TargetGone => "target_gone",
            Expiry::TimedOut => "timed_out",
            Expiry::NoTargetPoint => "no_target_point",
        }
    }
}

#[derive(Resource, Debug, Default, Clone)]
pub struct AttackOrders {
    orders: BTreeMap<PlayerId, AttackOrder>,
}

impl AttackOrders {
    pub fn get(&self, issuer: PlayerId) -> Option<&AttackOrder> {
        self.orders.get(&issuer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttackOrder> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Validate and store an order, replacing the issuer's previous one.
    ///
    /// A ratio at or below zero clears the issuer's order instead.
    #[allow(clippy::too_many_arguments)]
    pub fn queue(
        &mut self,
        issuer: PlayerId,
        target: Option<PlayerId>,
        ratio: f32,
        tick: u64,
        now: f64,
        players: &dyn PlayerRegistry,
        defeated: &DefeatedPlayers,
    ) -> Result<OrderStatus, CommandError> {
        if !players.exists(issuer) {
            return Err(CommandError::UnknownPlayer(issuer));
        }
        if defeated.contains(issuer) {
            return Err(CommandError::PlayerDefeated(issuer));
        }
        if ratio.is_nan() {
            return Err(CommandError::InvalidRatio(ratio));
        }
        if ratio <= 0.0 {
            self.orders.remove(&issuer);
            return Ok(OrderStatus::Cleared);
        }
        if let Some(target) = target {
            if target == issuer {
                return Err(CommandError::SelfTarget(issuer));
            }
            if !players.exists(target) {
                return Err(CommandError::UnknownPlayer(target));
            }
            if defeated.contains(target) {
                return Err(CommandError::PlayerDefeated(target));
            }
            if players.is_allied(issuer, target) {
                return Err(CommandError::AlliedTarget { issuer, target });
            }
        }

        self.orders.insert(
            issuer,
            AttackOrder {
                issuer,
                target,
                ratio: ratio.min(1.0),
                created_tick: tick,
                created_at: now,
                resolved: None,
            },
        );
        Ok(OrderStatus::Queued)
    }

    pub fn remove(&mut self, issuer: PlayerId) -> Option<AttackOrder> {
        self.orders.remove(&issuer)
    }

    /// Drop orders issued by or aimed at `player`.
    pub fn clear_involving(&mut self, player: PlayerId) {
        self.orders
            .retain(|issuer, order| *issuer != player && order.target != Some(player));
    }
}

/// `max(1, floor(live * ratio))`, never above `live`.
pub fn order_quota(live: u32, ratio: f32) -> u32 {
    ((live as f32 * ratio).floor() as u32).max(1).min(live)
}

fn nearest_to(points: impl Iterator<Item = (f32, f32)>, origin: (f32, f32)) -> Option<(f32, f32)> {
    points.min_by(|a, b| {
        let da = (a.0 - origin.0).powi(2) + (a.1 - origin.1).powi(2);
        let db = (b.0 - origin.0).powi(2) + (b.1 - origin.1).powi(2);
        da.total_cmp(&db)
    })
}

fn resolve_point(
    order: &AttackOrder,
    cache: &TerritoryCache,
    territory: &Territory,
    tile_size: f32,
    headquarters: &HashMap<PlayerId, (f32, f32)>,
) -> Option<(f32, f32)> {
    let issuer = cache.get(order.issuer);
    let origin = issuer
        .and_then(|s| s.centroid)
        .or_else(|| headquarters.get(&order.issuer).copied())?;

    match order.target {
        Some(target) => {
            let snapshot = cache.get(target);
            let border = snapshot.map(|s| {
                s.border_sample
                    .iter()
                    .map(|&tile| territory.tile_center(tile, tile_size))
            });
            border
                .and_then(|tiles| nearest_to(tiles, origin))
                .or_else(|| snapshot.and_then(|s| s.centroid))
                .or_else(|| headquarters.get(&target).copied())
        }
        None => {
            let map = territory.map();
            let frontier = issuer?.border_sample.iter().flat_map(move |&tile| {
                map.neighbors(tile)
                    .into_iter()
                    .filter(move |&n| map.is_land(n) && map.owner(n).is_none())
            });
            nearest_to(
                frontier.map(|tile| territory.tile_center(tile, tile_size)),
                origin,
            )
        }
    }
}

/// Expires stale orders and resolves the rest into a target point and quota.
#[allow(clippy::too_many_arguments)]
pub fn attack_order_system(
    tick: Res<SimTick>,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    territory: Res<Territory>,
    players: Res<Players>,
    defeated: Res<DefeatedPlayers>,
    cache: Res<TerritoryCache>,
    mut orders: ResMut<AttackOrders>,
    units: Query<&Owner, (With<Mobility>, Without<Embarked>)>,
    headquarters: Query<(&Owner, &Position), With<Headquarters>>,
) {
    if orders.is_empty() {
        return;
    }
    let mut live: HashMap<PlayerId, u32> = HashMap::new();
    for owner in units.iter() {
        *live.entry(owner.0).or_insert(0) += 1;
    }
    let hq_positions: HashMap<PlayerId, (f32, f32)> = headquarters
        .iter()
        .map(|(owner, pos)| (owner.0, (pos.x, pos.y)))
        .collect();
    let registry = players.registry();

    orders.orders.retain(|issuer, order| {
        let live_units = live.get(issuer).copied().unwrap_or(0);
        let expiry = if !registry.exists(*issuer) || defeated.contains(*issuer) {
            Some(Expiry::IssuerGone)
        } else if live_units == 0 {
            Some(Expiry::NoUnits)
        } else if order
            .target
            .is_some_and(|t| !registry.exists(t) || defeated.contains(t))
        {
            Some(Expiry::TargetGone)
        } else if clock.0 - order.created_at > f64::from(config.attack_order_ttl) {
            Some(Expiry::TimedOut)
        } else {
            match resolve_point(order, &cache, &territory, config.tile_size, &hq_positions) {
                Some((x, y)) => {
                    order.resolved = Some(ResolvedOrder {
                        x,
                        y,
                        quota: order_quota(live_units, order.ratio),
                    });
                    None
                }
                None => Some(Expiry::NoTargetPoint),
            }
        };

        if let Some(reason) = expiry {
            tracing::debug!(
                target: "warfront::orders",
                tick = tick.0,
                issuer = %issuer,
                reason = reason.as_str(),
                "order.expired"
            );
        }
        expiry.is_none()
    });
}

/// Hands out attack assignments up to each order's quota.
///
/// A unit whose assignment starts, stops or switches target is pointed at its
/// own position so the planner re-targets it this tick.
pub fn attack_assignment_system(
    orders: Res<AttackOrders>,
    mut units: Query<
        (&UnitId, &Owner, &Position, &mut Mobility, &mut AttackAssignment),
        Without<Embarked>,
    >,
) {
    let mut ranked: Vec<_> = units.iter_mut().collect();
    ranked.sort_by_key(|(id, ..)| **id);

    let mut assigned: HashMap<PlayerId, u32> = HashMap::new();
    for (_, owner, pos, mut mobility, mut assignment) in ranked {
        let desired = orders.get(owner.0).and_then(|order| {
            let resolved = order.resolved?;
            let count = assigned.entry(owner.0).or_insert(0);
            if *count >= resolved.quota {
                return None;
            }
            *count += 1;
            Some(AttackTarget {
                player: order.target,
                x: resolved.x,
                y: resolved.y,
            })
        });

        let switched = assignment.0.map(|a| a.player) != desired.map(|a| a.player);
        if switched {
            mobility.retarget_here(pos);
        }
        if assignment.0 != desired {
            assignment.0 = desired;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::{PlayerKind, Roster};
    use crate::territory::GridMap;

    fn roster() -> Roster {
        let mut roster = Roster::new()
            .with_player(PlayerId(1), PlayerKind::Human)
            .with_player(PlayerId(2), PlayerKind::Bot)
            .with_player(PlayerId(3), PlayerKind::Bot);
        roster.ally(PlayerId(1), PlayerId(3));
        roster
    }

    #[test]
    fn test_quota() {
        assert_eq!(order_quota(10, 0.5), 5);
        assert_eq!(order_quota(10, 0.01), 1);
        assert_eq!(order_quota(3, 1.0), 3);
        assert_eq!(order_quota(7, 0.33), 2);
    }

    #[test]
    fn test_intake_validation() {
        let registry = roster();
        let mut defeated = DefeatedPlayers::default();
        let mut orders = AttackOrders::default();
        let p = PlayerId;

        assert_eq!(
            orders.queue(p(1), Some(p(1)), 0.5, 0, 0.0, &registry, &defeated),
            Err(CommandError::SelfTarget(p(1)))
        );
        assert_eq!(
            orders.queue(p(1), Some(p(9)), 0.5, 0, 0.0, &registry, &defeated),
            Err(CommandError::UnknownPlayer(p(9)))
        );
        assert_eq!(
            orders.queue(p(1), Some(p(3)), 0.5, 0, 0.0, &registry, &defeated),
            Err(CommandError::AlliedTarget {
                issuer: p(1),
                target: p(3)
            })
        );
        assert!(orders.is_empty());

        assert_eq!(
            orders.queue(p(1), Some(p(2)), 4.0, 3, 1.5, &registry, &defeated),
            Ok(OrderStatus::Queued)
        );
        let order = orders.get(p(1)).unwrap();
        assert_eq!(order.ratio, 1.0);
        assert_eq!(order.created_tick, 3);

        assert_eq!(
            orders.queue(p(1), Some(p(2)), 0.0, 4, 2.0, &registry, &defeated),
            Ok(OrderStatus::Cleared)
        );
        assert!(orders.get(p(1)).is_none());

        defeated.insert(p(2));
        assert_eq!(
            orders.queue(p(1), Some(p(2)), 0.5, 5, 2.0, &registry, &defeated),
            Err(CommandError::PlayerDefeated(p(2)))
        );
    }

    #[test]
    fn test_clear_involving() {
        let registry = roster();
        let defeated = DefeatedPlayers::default();
        let mut orders = AttackOrders::default();
        orders
            .queue(PlayerId(1), Some(PlayerId(2)), 0.5, 0, 0.0, &registry, &defeated)
            .unwrap();
        orders
            .queue(PlayerId(2), None, 0.5, 0, 0.0, &registry, &defeated)
            .unwrap();
        orders
            .queue(PlayerId(3), Some(PlayerId(2)), 0.5, 0, 0.0, &registry, &defeated)
            .unwrap();
        orders.clear_involving(PlayerId(2));
        assert!(orders.is_empty());
    }

    fn order_world() -> World {
        let mut map = GridMap::all_land(60, 60);
        map.claim_disc(PlayerId(1), 15, 30, 6);
        map.claim_disc(PlayerId(2), 45, 30, 6);
        let territory = Territory::new(map);
        let mut cache = TerritoryCache::default();
        cache.rebuild(&territory, [PlayerId(1), PlayerId(2)], 1.0, 256, 1);

        let mut world = World::new();
        world.insert_resource(SimTick(1));
        world.insert_resource(SimClock(0.0));
        world.insert_resource(SimConfig::default());
        world.insert_resource(territory);
        world.insert_resource(Players::new(roster()));
        world.insert_resource(DefeatedPlayers::default());
        world.insert_resource(cache);
        world.insert_resource(AttackOrders::default());

        for id in 1..=10 {
            world.spawn((
                UnitId(id),
                Owner(PlayerId(1)),
                Position::new(15.0, 30.0),
                Mobility::new(6.0, 0.0, 0.0),
                AttackAssignment::default(),
            ));
        }
        world
    }

    fn queue(world: &mut World, target: Option<PlayerId>, ratio: f32) {
        world.resource_scope(|world, mut orders: Mut<AttackOrders>| {
            let now = world.resource::<SimClock>().0;
            let players = world.resource::<Players>();
            let defeated = world.resource::<DefeatedPlayers>();
            orders
                .queue(PlayerId(1), target, ratio, 1, now, players.registry(), defeated)
                .unwrap();
        });
    }

    fn schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems((attack_order_system, attack_assignment_system).chain());
        schedule
    }

    #[test]
    fn test_half_ratio_assigns_exactly_half() {
        let mut world = order_world();
        queue(&mut world, Some(PlayerId(2)), 0.5);
        schedule().run(&mut world);

        let resolved = world
            .resource::<AttackOrders>()
            .get(PlayerId(1))
            .and_then(|o| o.resolved)
            .unwrap();
        assert_eq!(resolved.quota, 5);
        // Nearest enemy border tile faces the issuer
        assert!(resolved.x < 45.0);

        let mut query = world.query::<(&UnitId, &AttackAssignment, &Mobility, &Position)>();
        let mut assigned: Vec<u32> = query
            .iter(&world)
            .filter(|(_, a, ..)| a.0.is_some())
            .map(|(id, ..)| id.0)
            .collect();
        assigned.sort();
        assert_eq!(assigned, vec![1, 2, 3, 4, 5]);

        for (id, assignment, mobility, pos) in query.iter(&world) {
            if let Some(target) = assignment.0 {
                assert_eq!(target.player, Some(PlayerId(2)));
                assert_eq!((mobility.target_x, mobility.target_y), (pos.x, pos.y));
            } else {
                assert!(id.0 > 5);
                assert_eq!((mobility.target_x, mobility.target_y), (0.0, 0.0));
            }
        }
    }

    #[test]
    fn test_order_times_out() {
        let mut world = order_world();
        queue(&mut world, Some(PlayerId(2)), 1.0);
        let mut schedule = schedule();
        schedule.run(&mut world);
        assert_eq!(world.resource::<AttackOrders>().len(), 1);

        let ttl = world.resource::<SimConfig>().attack_order_ttl;
        world.resource_mut::<SimClock>().0 = f64::from(ttl) + 0.5;
        schedule.run(&mut world);
        assert!(world.resource::<AttackOrders>().is_empty());

        let mut query = world.query::<&AttackAssignment>();
        assert!(query.iter(&world).all(|a| a.0.is_none()));
    }

    #[test]
    fn test_order_times_out_late_in_a_long_match() {
        let mut world = order_world();
        // Roughly four months of simulated time
        world.resource_mut::<SimClock>().0 = 1.0e7;
        queue(&mut world, Some(PlayerId(2)), 1.0);
        let mut schedule = schedule();

        let ttl = world.resource::<SimConfig>().attack_order_ttl;
        let dt = 0.1f32;
        let mut ticks = 0;
        while !world.resource::<AttackOrders>().is_empty() {
            world.resource_mut::<SimClock>().0 += f64::from(dt);
            schedule.run(&mut world);
            ticks += 1;
            assert!(ticks < 1000, "order never expired");
        }
        // Expires within a tick or two of the TTL, as it would at match start
        let expected = (ttl / dt).round() as i32;
        assert!((expected..=expected + 2).contains(&ticks), "expired after {ticks} ticks");
    }

    #[test]
    fn test_order_expires_when_issuer_has_no_units() {
        let mut world = order_world();
        queue(&mut world, Some(PlayerId(2)), 1.0);
        let mut schedule = schedule();
        schedule.run(&mut world);
        assert_eq!(world.resource::<AttackOrders>().len(), 1);

        // Target alive, order fresh: only the empty army ends it
        let units: Vec<Entity> = world
            .query_filtered::<Entity, With<Mobility>>()
            .iter(&world)
            .collect();
        for entity in units {
            world.despawn(entity);
        }
        schedule.run(&mut world);
        assert!(world.resource::<AttackOrders>().is_empty());

        // Units fielded later do not revive it
        world.spawn((
            UnitId(11),
            Owner(PlayerId(1)),
            Position::new(15.0, 30.0),
            Mobility::new(6.0, 0.0, 0.0),
            AttackAssignment::default(),
        ));
        schedule.run(&mut world);
        assert!(world.resource::<AttackOrders>().is_empty());
        let mut query = world.query::<&AttackAssignment>();
        assert!(query.iter(&world).all(|a| a.0.is_none()));
    }

    #[test]
    fn test_order_expires_when_target_defeated() {
        let mut world = order_world();
        queue(&mut world, Some(PlayerId(2)), 1.0);
        world.resource_mut::<DefeatedPlayers>().insert(PlayerId(2));
        schedule().run(&mut world);
        assert!(world.resource::<AttackOrders>().is_empty());
    }

    #[test]
    fn test_neutral_order_targets_unclaimed_land() {
        let mut world = order_world();
        queue(&mut world, None, 0.3);
        schedule().run(&mut world);

        let resolved = world
            .resource::<AttackOrders>()
            .get(PlayerId(1))
            .and_then(|o| o.resolved)
            .unwrap();
        assert_eq!(resolved.quota, 3);
        let territory = world.resource::<Territory>();
        let tile = territory.tile_at(resolved.x, resolved.y, 1.0).unwrap();
        assert_eq!(territory.map().owner(tile), None);
    }
}
