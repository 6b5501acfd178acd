//! Movement target planner.
//!
//! A mobile unit keeps steering at its current target until it is within
//! `retarget_distance` of it. It then picks a border reference tile from its
//! owner's territory snapshot and places the new target relative to that
//! tile according to the owner's defensive stance:
//!
//! ```text
//!   HQ ----> fire-range point ----> border tile ----> offensive point
//!            (border - range)                         (border + advance)
//! ```
//!
//! Tile scoring is `distance / alignment_boost`; tiles lying in the same
//! direction from the territory centroid as the unit score better, which
//! spreads the army radially instead of piling onto the nearest frontier.

use crate::components::*;
use crate::config::SimConfig;
use crate::players::{PlayerRegistry, Players};
use crate::resources::{DefeatedPlayers, SimRng};
use crate::systems::stance::Stances;
use crate::systems::territory_cache::{stride_sample, TerritoryCache, TerritorySnapshot};
use crate::territory::{Territory, TileRef};
use bevy_ecs::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// The scored border tile a unit orients on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderChoice {
    pub tile: TileRef,
    pub x: f32,
    pub y: f32,
    /// Owned by a hostile player rather than unclaimed.
    pub enemy: bool,
}

/// The three anchor points derived from a border choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StancePoints {
    pub fire_range: (f32, f32),
    pub border: (f32, f32),
    pub offensive: (f32, f32),
}

fn unit_vector(dx: f32, dy: f32) -> Option<(f32, f32)> {
    let len = (dx * dx + dy * dy).sqrt();
    (len > 1e-4).then(|| (dx / len, dy / len))
}

fn lerp(a: (f32, f32), b: (f32, f32), t: f32) -> (f32, f32) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// Pick the best-scoring capturable tile next to the player's border.
///
/// Only water, own and allied tiles are excluded; neutral and hostile tiles
/// are both candidates. Ties keep the first tile examined.
///
/// With an attack assignment, tiles facing `enemy_hq` from the centroid score
/// better. Without a known headquarters the order's resolved point is used.
#[allow(clippy::too_many_arguments)]
pub fn select_border_tile(
    territory: &Territory,
    players: &dyn PlayerRegistry,
    config: &SimConfig,
    player: PlayerId,
    unit: (f32, f32),
    snapshot: &TerritorySnapshot,
    attack: Option<&AttackTarget>,
    enemy_hq: Option<(f32, f32)>,
) -> Option<BorderChoice> {
    let map = territory.map();
    let centroid = snapshot.centroid.unwrap_or(unit);
    let unit_dir = unit_vector(unit.0 - centroid.0, unit.1 - centroid.1);
    let attack_dir = attack
        .map(|a| enemy_hq.unwrap_or((a.x, a.y)))
        .and_then(|(x, y)| unit_vector(x - centroid.0, y - centroid.1));

    let mut best: Option<(f32, BorderChoice)> = None;
    for tile in stride_sample(&snapshot.border_sample, config.targeting_sample_size) {
        for neighbor in map.neighbors(tile) {
            if !map.is_land(neighbor) {
                continue;
            }
            let owner = map.owner(neighbor);
            if let Some(owner) = owner {
                if owner == player || players.is_allied(player, owner) {
                    continue;
                }
            }

            let (x, y) = territory.tile_center(neighbor, config.tile_size);
            let tile_dir = unit_vector(x - centroid.0, y - centroid.1);
            let alignment = |dir: Option<(f32, f32)>| match (tile_dir, dir) {
                (Some(a), Some(b)) => (a.0 * b.0 + a.1 * b.1 + 1.0) * 0.5,
                _ => 0.5,
            };

            let mut boost = 1.0 + config.radial_bias * alignment(unit_dir);
            if let Some(target) = attack {
                boost *= 1.0 + config.attack_bias * alignment(attack_dir);
                if owner == target.player {
                    boost *= 1.0 + config.attack_bias;
                }
            }

            let distance = ((x - unit.0).powi(2) + (y - unit.1).powi(2)).sqrt();
            let score = distance / boost;
            if best.as_ref().map_or(true, |(s, _)| score < *s) {
                best = Some((
                    score,
                    BorderChoice {
                        tile: neighbor,
                        x,
                        y,
                        enemy: owner.is_some(),
                    },
                ));
            }
        }
    }
    best.map(|(_, choice)| choice)
}

/// Fire-range, border and offensive points along the headquarters-to-border axis.
pub fn stance_points(
    border: (f32, f32),
    headquarters: (f32, f32),
    fallback_origin: (f32, f32),
    combat_range: f32,
    advance: f32,
) -> StancePoints {
    let dir = unit_vector(border.0 - headquarters.0, border.1 - headquarters.1)
        .or_else(|| unit_vector(border.0 - fallback_origin.0, border.1 - fallback_origin.1))
        .unwrap_or((1.0, 0.0));
    StancePoints {
        fire_range: (border.0 - dir.0 * combat_range, border.1 - dir.1 * combat_range),
        border,
        offensive: (border.0 + dir.0 * advance, border.1 + dir.1 * advance),
    }
}

/// Blend the anchor points by stance.
///
/// * stance <= 0.5 against an enemy: hold at fire range.
/// * stance <= 0.5 against neutral land: fire range -> border.
/// * stance > 0.5: border (fire range against an enemy) -> offensive point.
pub fn interpolate_stance(points: &StancePoints, stance: f32, enemy: bool) -> (f32, f32) {
    let stance = stance.clamp(0.0, 1.0);
    if stance <= 0.5 {
        if enemy {
            points.fire_range
        } else {
            lerp(points.fire_range, points.border, stance / 0.5)
        }
    } else {
        let start = if enemy { points.fire_range } else { points.border };
        lerp(start, points.offensive, (stance - 0.5) / 0.5)
    }
}

/// Full target computation for one unit, clamped to the map.
#[allow(clippy::too_many_arguments)]
pub fn plan_target(
    territory: &Territory,
    players: &dyn PlayerRegistry,
    config: &SimConfig,
    player: PlayerId,
    unit: (f32, f32),
    headquarters: (f32, f32),
    snapshot: Option<&TerritorySnapshot>,
    stance: f32,
    combat_range: f32,
    attack: Option<&AttackTarget>,
    enemy_hq: Option<(f32, f32)>,
) -> (f32, f32) {
    let snapshot = match snapshot {
        Some(s) if !s.is_empty() => s,
        _ => return territory.center(config.tile_size),
    };
    let Some(choice) =
        select_border_tile(territory, players, config, player, unit, snapshot, attack, enemy_hq)
    else {
        // Nothing left to take: hold position
        return unit;
    };
    let points = stance_points(
        (choice.x, choice.y),
        headquarters,
        snapshot.centroid.unwrap_or(headquarters),
        combat_range,
        config.advance_distance,
    );
    let (x, y) = interpolate_stance(&points, stance, choice.enemy);
    territory.clamp(x, y, config.tile_size)
}

/// Re-targets mobile units that reached (or never had) a destination.
#[allow(clippy::too_many_arguments)]
pub fn targeting_system(
    config: Res<SimConfig>,
    territory: Res<Territory>,
    players: Res<Players>,
    defeated: Res<DefeatedPlayers>,
    cache: Res<TerritoryCache>,
    mut stances: ResMut<Stances>,
    mut rng: ResMut<SimRng>,
    headquarters: Query<(&Owner, &Position), With<Headquarters>>,
    mut units: Query<
        (&Owner, &Position, Option<&Weapon>, &AttackAssignment, &mut Mobility),
        Without<Embarked>,
    >,
) {
    let registry = players.registry();
    let hq_positions: HashMap<PlayerId, (f32, f32)> = headquarters
        .iter()
        .map(|(owner, pos)| (owner.0, (pos.x, pos.y)))
        .collect();

    // Resolve stances in id order so bot rolls consume the RNG deterministically
    let owners: BTreeSet<PlayerId> = units.iter().map(|(owner, ..)| owner.0).collect();
    let stance_of: HashMap<PlayerId, f32> = owners
        .into_iter()
        .map(|p| {
            let s = stances.get(p, registry, &mut rng.0, config.human_default_stance);
            (p, s)
        })
        .collect();

    for (owner, pos, weapon, assignment, mut mobility) in units.iter_mut() {
        let player = owner.0;
        if defeated.contains(player) {
            continue;
        }
        let Some(&hq) = hq_positions.get(&player) else {
            continue;
        };
        if mobility.distance_to_target(pos) > config.retarget_distance {
            continue;
        }

        let combat_range = weapon.map_or(0.0, |w| w.range);
        let attack = assignment.0.as_ref();
        let enemy_hq = attack
            .and_then(|a| a.player)
            .and_then(|target| hq_positions.get(&target).copied());
        let (x, y) = plan_target(
            &territory,
            registry,
            &config,
            player,
            (pos.x, pos.y),
            hq,
            cache.get(player),
            stance_of.get(&player).copied().unwrap_or(config.human_default_stance),
            combat_range,
            attack,
            enemy_hq,
        );
        mobility.target_x = x;
        mobility.target_y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::{PlayerKind, Roster};
    use crate::territory::{GridMap, TileMap};

    fn points() -> StancePoints {
        stance_points((50.0, 20.0), (20.0, 20.0), (20.0, 20.0), 10.0, 15.0)
    }

    #[test]
    fn test_stance_points_follow_hq_axis() {
        let p = points();
        assert_eq!(p.fire_range, (40.0, 20.0));
        assert_eq!(p.border, (50.0, 20.0));
        assert_eq!(p.offensive, (65.0, 20.0));
    }

    #[test]
    fn test_stance_boundaries() {
        let p = points();
        // Stance 0 against an enemy holds at fire range
        assert_eq!(interpolate_stance(&p, 0.0, true), p.fire_range);
        // Stance 1 against neutral land reaches the offensive point
        assert_eq!(interpolate_stance(&p, 1.0, false), p.offensive);
    }

    #[test]
    fn test_stance_interpolation_midpoints() {
        let p = points();
        assert_eq!(interpolate_stance(&p, 0.5, true), p.fire_range);
        assert_eq!(interpolate_stance(&p, 0.5, false), p.border);
        assert_eq!(interpolate_stance(&p, 0.25, false), (45.0, 20.0));
        assert_eq!(interpolate_stance(&p, 0.75, false), (57.5, 20.0));
        assert_eq!(interpolate_stance(&p, 1.0, true), p.offensive);
        // Out-of-range stances are clamped
        assert_eq!(interpolate_stance(&p, -2.0, true), p.fire_range);
    }

    #[test]
    fn test_degenerate_axis_falls_back() {
        let p = stance_points((10.0, 10.0), (10.0, 10.0), (10.0, 0.0), 5.0, 5.0);
        assert_eq!(p.fire_range, (10.0, 5.0));
        let p = stance_points((10.0, 10.0), (10.0, 10.0), (10.0, 10.0), 5.0, 5.0);
        assert_eq!(p.fire_range, (5.0, 10.0));
    }

    fn setup() -> (Territory, Roster, TerritorySnapshot) {
        let mut map = GridMap::all_land(80, 80);
        map.claim_disc(PlayerId(1), 40, 40, 8);
        let territory = Territory::new(map);
        let snapshot = TerritorySnapshot::build(&territory, PlayerId(1), 1.0, 256);
        let roster = Roster::new()
            .with_player(PlayerId(1), PlayerKind::Human)
            .with_player(PlayerId(2), PlayerKind::Bot)
            .with_player(PlayerId(3), PlayerKind::Bot);
        (territory, roster, snapshot)
    }

    #[test]
    fn test_radial_bias_picks_tile_on_units_side() {
        let (territory, roster, snapshot) = setup();
        let config = SimConfig::default();

        let east = select_border_tile(&territory, &roster, &config, PlayerId(1), (45.0, 40.5), &snapshot, None, None)
            .unwrap();
        assert!(east.x > 46.0, "east pick {east:?}");
        assert!(!east.enemy);

        let west = select_border_tile(&territory, &roster, &config, PlayerId(1), (36.0, 40.5), &snapshot, None, None)
            .unwrap();
        assert!(west.x < 35.0, "west pick {west:?}");
    }

    #[test]
    fn test_candidates_skip_water_and_allies() {
        let (mut territory, mut roster, _) = setup();
        roster.ally(PlayerId(1), PlayerId(3));
        {
            let map = territory.map_mut();
            // Enclose player 1 with an allied ring
            for tile in map.border_tiles(PlayerId(1)) {
                for n in map.neighbors(tile) {
                    if map.owner(n).is_none() {
                        map.conquer(n, PlayerId(3));
                    }
                }
            }
        }
        let snapshot = TerritorySnapshot::build(&territory, PlayerId(1), 1.0, 256);
        let config = SimConfig::default();
        assert_eq!(
            select_border_tile(&territory, &roster, &config, PlayerId(1), (40.5, 40.5), &snapshot, None, None),
            None
        );

        // Hold position when nothing is capturable
        let target = plan_target(
            &territory,
            &roster,
            &config,
            PlayerId(1),
            (41.0, 42.0),
            (40.5, 40.5),
            Some(&snapshot),
            1.0,
            25.0,
            None,
            None,
        );
        assert_eq!(target, (41.0, 42.0));
    }

    #[test]
    fn test_attack_bias_prefers_target_player() {
        let (mut territory, roster, _) = setup();
        {
            // Player 2 holds everything north of row 40
            let map = territory.map_mut();
            for y in 0..40u32 {
                for x in 0..80u32 {
                    let tile = map.tile(x, y);
                    if map.owner(tile).is_none() {
                        map.conquer(tile, PlayerId(2));
                    }
                }
            }
        }
        let snapshot = TerritorySnapshot::build(&territory, PlayerId(1), 1.0, 256);
        let config = SimConfig::default();

        let attack = AttackTarget {
            player: Some(PlayerId(2)),
            x: 40.5,
            y: 31.5,
        };
        // The unit stands south of the centre; without the order it heads south
        let plain = select_border_tile(&territory, &roster, &config, PlayerId(1), (40.5, 42.0), &snapshot, None, None)
            .unwrap();
        assert!(plain.y > 40.5);
        let ordered = select_border_tile(
            &territory,
            &roster,
            &config,
            PlayerId(1),
            (40.5, 42.0),
            &snapshot,
            Some(&attack),
            None,
        )
        .unwrap();
        assert!(ordered.enemy);
        assert_eq!(territory.map().owner(ordered.tile), Some(PlayerId(2)));
    }

    #[test]
    fn test_attack_bias_faces_enemy_headquarters() {
        let (mut territory, roster, _) = setup();
        {
            // Player 2 flanks player 1 on both sides
            let map = territory.map_mut();
            for y in 0..80u32 {
                for x in (0..=34u32).chain(46..80) {
                    let tile = map.tile(x, y);
                    if map.owner(tile).is_none() {
                        map.conquer(tile, PlayerId(2));
                    }
                }
            }
        }
        let snapshot = TerritorySnapshot::build(&territory, PlayerId(1), 1.0, 256);
        let config = SimConfig::default();

        // Resolved order point on the west flank, headquarters far east
        let attack = AttackTarget {
            player: Some(PlayerId(2)),
            x: 31.5,
            y: 40.5,
        };
        let pick = |enemy_hq| {
            select_border_tile(
                &territory,
                &roster,
                &config,
                PlayerId(1),
                (40.5, 42.0),
                &snapshot,
                Some(&attack),
                enemy_hq,
            )
            .unwrap()
        };

        let toward_hq = pick(Some((70.5, 40.5)));
        assert_eq!(territory.map().owner(toward_hq.tile), Some(PlayerId(2)));
        assert!(toward_hq.x > 40.5, "{toward_hq:?}");

        // Unknown headquarters falls back to the resolved point
        let toward_point = pick(None);
        assert_eq!(territory.map().owner(toward_point.tile), Some(PlayerId(2)));
        assert!(toward_point.x < 40.5, "{toward_point:?}");
    }

    #[test]
    fn test_empty_snapshot_falls_back_to_map_center() {
        let (territory, roster, _) = setup();
        let config = SimConfig::default();
        let empty = TerritorySnapshot::default();
        let target = plan_target(
            &territory,
            &roster,
            &config,
            PlayerId(2),
            (3.0, 3.0),
            (3.0, 3.0),
            Some(&empty),
            1.0,
            25.0,
            None,
            None,
        );
        assert_eq!(target, (40.0, 40.0));
    }

    #[test]
    fn test_plan_target_is_clamped() {
        let mut map = GridMap::all_land(20, 20);
        map.claim_disc(PlayerId(1), 17, 10, 2);
        let territory = Territory::new(map);
        let snapshot = TerritorySnapshot::build(&territory, PlayerId(1), 1.0, 256);
        let roster = Roster::new().with_player(PlayerId(1), PlayerKind::Human);
        let config = SimConfig::default();
        let (x, y) = plan_target(
            &territory,
            &roster,
            &config,
            PlayerId(1),
            (19.0, 10.5),
            (10.0, 10.5),
            Some(&snapshot),
            1.0,
            25.0,
            None,
            None,
        );
        assert!((0.0..=20.0).contains(&x));
        assert!((0.0..=20.0).contains(&y));
    }

    #[test]
    fn test_system_retargets_only_arrived_units() {
        let mut map = GridMap::all_land(80, 80);
        map.claim_disc(PlayerId(1), 40, 40, 8);
        let territory = Territory::new(map);
        let mut cache = TerritoryCache::default();
        cache.rebuild(&territory, [PlayerId(1)], 1.0, 256, 1);

        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(territory);
        world.insert_resource(Players::new(Roster::new().with_player(PlayerId(1), PlayerKind::Human)));
        world.insert_resource(DefeatedPlayers::default());
        world.insert_resource(cache);
        world.insert_resource(Stances::default());
        world.insert_resource(SimRng::from_seed(1));

        world.spawn((Owner(PlayerId(1)), Position::new(40.5, 40.5), Headquarters { capture_radius: 4.0 }));
        let arrived = world
            .spawn((
                Owner(PlayerId(1)),
                Position::new(44.0, 40.5),
                AttackAssignment::default(),
                Mobility::new(6.0, 44.0, 40.5),
            ))
            .id();
        let travelling = world
            .spawn((
                Owner(PlayerId(1)),
                Position::new(44.0, 40.5),
                AttackAssignment::default(),
                Mobility::new(6.0, 10.0, 10.0),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(targeting_system);
        schedule.run(&mut world);

        let moved = world.get::<Mobility>(arrived).unwrap();
        // Human default stance is fully offensive: target past the eastern border
        assert!(moved.target_x > 49.0, "{moved:?}");
        let kept = world.get::<Mobility>(travelling).unwrap();
        assert_eq!((kept.target_x, kept.target_y), (10.0, 10.0));
    }

    #[test]
    fn test_units_without_headquarters_keep_target() {
        let mut map = GridMap::all_land(40, 40);
        map.claim_disc(PlayerId(1), 20, 20, 4);
        let territory = Territory::new(map);
        let mut cache = TerritoryCache::default();
        cache.rebuild(&territory, [PlayerId(1)], 1.0, 256, 1);

        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(territory);
        world.insert_resource(Players::new(Roster::new().with_player(PlayerId(1), PlayerKind::Bot)));
        world.insert_resource(DefeatedPlayers::default());
        world.insert_resource(cache);
        world.insert_resource(Stances::default());
        world.insert_resource(SimRng::from_seed(1));
        let unit = world
            .spawn((
                Owner(PlayerId(1)),
                Position::new(20.5, 20.5),
                AttackAssignment::default(),
                Mobility::new(6.0, 20.5, 20.5),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(targeting_system);
        schedule.run(&mut world);

        let mobility = world.get::<Mobility>(unit).unwrap();
        assert_eq!((mobility.target_x, mobility.target_y), (20.5, 20.5));
    }

    #[test]
    fn test_assigned_units_head_for_target_headquarters() {
        let (mut territory, roster, _) = setup();
        {
            let map = territory.map_mut();
            for y in 0..80u32 {
                for x in (0..=34u32).chain(46..80) {
                    let tile = map.tile(x, y);
                    if map.owner(tile).is_none() {
                        map.conquer(tile, PlayerId(2));
                    }
                }
            }
        }
        let mut cache = TerritoryCache::default();
        cache.rebuild(&territory, [PlayerId(1)], 1.0, 256, 1);

        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(territory);
        world.insert_resource(Players::new(roster));
        world.insert_resource(DefeatedPlayers::default());
        world.insert_resource(cache);
        world.insert_resource(Stances::default());
        world.insert_resource(SimRng::from_seed(1));

        world.spawn((Owner(PlayerId(1)), Position::new(40.5, 40.5), Headquarters { capture_radius: 4.0 }));
        world.spawn((Owner(PlayerId(2)), Position::new(70.5, 40.5), Headquarters { capture_radius: 4.0 }));
        let unit = world
            .spawn((
                Owner(PlayerId(1)),
                Position::new(40.5, 42.0),
                AttackAssignment(Some(AttackTarget {
                    player: Some(PlayerId(2)),
                    x: 31.5,
                    y: 40.5,
                })),
                Mobility::new(6.0, 40.5, 42.0),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(targeting_system);
        schedule.run(&mut world);

        let mobility = world.get::<Mobility>(unit).unwrap();
        assert!(mobility.target_x > 45.0, "{mobility:?}");
    }
}
