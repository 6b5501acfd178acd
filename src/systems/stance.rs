//! Defensive stance store.
//!
//! A stance is a per-player scalar in [0, 1]: 0 holds the army back at fire
//! range from the frontier, 1 pushes past it. Humans default to the
//! configured value; bots roll theirs once from the simulation RNG.

use crate::components::PlayerId;
use crate::players::{PlayerKind, PlayerRegistry};
use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::BTreeMap;

#[derive(Resource, Debug, Default, Clone)]
pub struct Stances {
    values: BTreeMap<PlayerId, f32>,
}

impl Stances {
    /// Stored stance, or the lazily assigned default.
    pub fn get<R: Rng>(
        &mut self,
        player: PlayerId,
        players: &dyn PlayerRegistry,
        rng: &mut R,
        human_default: f32,
    ) -> f32 {
        if let Some(value) = self.values.get(&player) {
            return *value;
        }
        match players.kind(player) {
            Some(PlayerKind::Bot) => {
                let value = rng.gen_range(0.0..=1.0);
                self.values.insert(player, value);
                value
            }
            _ => human_default,
        }
    }

    pub fn stored(&self, player: PlayerId) -> Option<f32> {
        self.values.get(&player).copied()
    }

    /// Clamp and store. Returns true when the stored value changed.
    pub fn set(&mut self, player: PlayerId, value: f32) -> bool {
        if value.is_nan() {
            return false;
        }
        let value = value.clamp(0.0, 1.0);
        match self.values.insert(player, value) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    pub fn remove(&mut self, player: PlayerId) {
        self.values.remove(&player);
    }
}
