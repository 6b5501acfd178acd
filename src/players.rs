//! Player registry: who exists, who is allied, who is a bot.

use crate::components::PlayerId;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKind {
    Human,
    Bot,
}

/// Player/alliance oracle consumed by the simulation.
pub trait PlayerRegistry: Send + Sync {
    fn exists(&self, player: PlayerId) -> bool;
    fn is_allied(&self, a: PlayerId, b: PlayerId) -> bool;
    fn kind(&self, player: PlayerId) -> Option<PlayerKind>;
    /// Every registered player, in ascending id order.
    fn players(&self) -> Vec<PlayerId>;

    /// Different players that are not allied.
    fn is_hostile(&self, a: PlayerId, b: PlayerId) -> bool {
        a != b && !self.is_allied(a, b)
    }
}

/// Resource wrapper around the player oracle.
#[derive(Resource)]
pub struct Players(pub Box<dyn PlayerRegistry>);

impl Players {
    pub fn new(registry: impl PlayerRegistry + 'static) -> Self {
        Self(Box::new(registry))
    }

    pub fn registry(&self) -> &dyn PlayerRegistry {
        self.0.as_ref()
    }
}

/// In-memory registry with symmetric alliances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    players: BTreeMap<PlayerId, PlayerKind>,
    alliances: BTreeSet<(PlayerId, PlayerId)>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_player(mut self, player: PlayerId, kind: PlayerKind) -> Self {
        self.add_player(player, kind);
        self
    }

    pub fn add_player(&mut self, player: PlayerId, kind: PlayerKind) {
        self.players.insert(player, kind);
    }

    pub fn ally(&mut self, a: PlayerId, b: PlayerId) {
        if a != b {
            self.alliances.insert(ordered(a, b));
        }
    }

    pub fn break_alliance(&mut self, a: PlayerId, b: PlayerId) {
        self.alliances.remove(&ordered(a, b));
    }
}

fn ordered(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl PlayerRegistry for Roster {
    fn exists(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }

    fn is_allied(&self, a: PlayerId, b: PlayerId) -> bool {
        self.alliances.contains(&ordered(a, b))
    }

    fn kind(&self, player: PlayerId) -> Option<PlayerKind> {
        self.players.get(&player).copied()
    }

    fn players(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alliances_are_symmetric() {
        let (a, b, c) = (PlayerId(1), PlayerId(2), PlayerId(3));
        let mut roster = Roster::new()
            .with_player(a, PlayerKind::Human)
            .with_player(b, PlayerKind::Bot)
            .with_player(c, PlayerKind::Bot);
        roster.ally(b, a);

        assert!(roster.is_allied(a, b));
        assert!(roster.is_allied(b, a));
        assert!(!roster.is_hostile(a, b));
        assert!(roster.is_hostile(a, c));
        assert!(!roster.is_hostile(a, a));

        roster.break_alliance(a, b);
        assert!(roster.is_hostile(b, a));
    }

    #[test]
    fn test_registry_lookups() {
        let roster = Roster::new()
            .with_player(PlayerId(4), PlayerKind::Bot)
            .with_player(PlayerId(2), PlayerKind::Human);
        assert_eq!(roster.players(), vec![PlayerId(2), PlayerId(4)]);
        assert_eq!(roster.kind(PlayerId(4)), Some(PlayerKind::Bot));
        assert_eq!(roster.kind(PlayerId(9)), None);
        assert!(!roster.exists(PlayerId(9)));
    }
}
