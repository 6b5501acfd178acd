//! Errors returned by player-facing commands.
//!
//! The tick pipeline itself never fails; anomalies inside a tick degrade to
//! "no effect". Only command intake reports errors, and a rejected command
//! leaves the simulation untouched.

use crate::components::{PlayerId, UnitId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("player {0} is not registered")]
    UnknownPlayer(PlayerId),
    #[error("player {0} has been defeated")]
    PlayerDefeated(PlayerId),
    #[error("player {0} cannot target itself")]
    SelfTarget(PlayerId),
    #[error("player {issuer} is allied with {target}")]
    AlliedTarget { issuer: PlayerId, target: PlayerId },
    #[error("attack ratio {0} is not a number")]
    InvalidRatio(f32),
    #[error("player {0} already has a headquarters")]
    HeadquartersExists(PlayerId),
    #[error("position ({x:.1}, {y:.1}) is outside the map")]
    OutOfBounds { x: f32, y: f32 },
    #[error("player {0} has reached the unit cap")]
    UnitCapReached(PlayerId),
    #[error("{0} does not exist")]
    UnknownUnit(UnitId),
    #[error("{unit} cannot board {transport}")]
    CannotBoard { unit: UnitId, transport: UnitId },
    #[error("{0} is full")]
    TransportFull(UnitId),
}
