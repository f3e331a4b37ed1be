//! # Shared kart movement core
//!
//! Everything both ends of the connection must agree on lives here: the
//! deterministic movement step, the move sampler, the client's prediction
//! ledger and reconciliation, the observer's dead-reckoning interpolator,
//! the role dispatch that ties them together, and the wire protocol.
//!
//! The crate never touches a socket or a wall clock directly. Time comes in
//! through [`clock::WorldClock`] and the world (gravity plus the swept
//! collision query) comes in through [`collision::Environment`], so the same
//! code runs on the authority, on the controlling client, and in tests.

pub mod authority;
pub mod channel;
pub mod clock;
pub mod collision;
pub mod error;
pub mod interpolation;
pub mod ledger;
pub mod movement;
pub mod moves;
pub mod observer;
pub mod prediction;
pub mod reconciliation;
pub mod snapshot;
pub mod vehicle;

use serde::{Deserialize, Serialize};

pub use authority::{AuthorityBehavior, MoveValidator};
pub use clock::{ManualClock, ServerClock, SyncedClock, WorldClock};
pub use collision::{ArenaBounds, Environment, OpenField, SweepQuery};
pub use error::{MoveRejection, VehicleError};
pub use interpolation::{DeadReckoningInterpolator, HermiteCubicSpline, InterpolationWindow};
pub use ledger::PredictionLedger;
pub use movement::{KartConfig, MovementSimulator, Pose, VehicleState};
pub use moves::{Move, MoveSampler};
pub use observer::{ObserverBehavior, ObserverMode};
pub use prediction::PredictingBehavior;
pub use reconciliation::{reconcile, Reconciliation};
pub use snapshot::{AuthoritativeSnapshot, SnapshotSlot};
pub use vehicle::{NetRole, NetworkedVehicle, RoleBehavior, TickOutcome};

pub const PROTOCOL_VERSION: u32 = 1;

/// Gravitational acceleration (m/s²).
pub const GRAVITY: f32 = 9.81;
/// Kart mass (kg).
pub const KART_MASS: f32 = 1000.0;
/// Drive force with the throttle fully down (N).
pub const MAX_DRIVE_FORCE: f32 = 10_000.0;
/// Turning circle radius at full lock (m).
pub const MIN_TURNING_RADIUS: f32 = 10.0;
/// Higher means more drag.
pub const DRAG_COEFFICIENT: f32 = 16.0;
/// Higher means more rolling resistance.
pub const ROLLING_RESISTANCE_COEFFICIENT: f32 = 0.015;

/// Half the side length of the walled arena (m).
pub const ARENA_HALF_EXTENT: f32 = 100.0;
/// Authoritative snapshots per second per kart.
pub const SNAPSHOT_RATE: f32 = 1.0;
/// Interpolation windows shorter than this (s) are treated as degenerate.
pub const KINDA_SMALL_INTERVAL: f32 = 1.0e-4;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Move {
        kart_move: Move,
    },
    Disconnect,

    Connected {
        client_id: u32,
        server_time: f64,
    },
    Snapshots {
        server_time: f64,
        karts: Vec<KartSnapshot>,
    },
    Disconnected {
        reason: String,
    },
}

/// One kart's latest authoritative snapshot, tagged with the kart it belongs to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct KartSnapshot {
    pub kart_id: u32,
    pub snapshot: AuthoritativeSnapshot,
}
