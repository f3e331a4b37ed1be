//! Authoritative snapshots and the last-value-wins slot they travel through

use crate::movement::VehicleState;
use crate::moves::Move;
use serde::{Deserialize, Serialize};

/// The authority's state for one kart, plus the move that produced it.
///
/// `last_move` doubles as the acknowledgement: every move the controlling
/// client stamped at or before `last_move.timestamp` has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthoritativeSnapshot {
    pub state: VehicleState,
    pub last_move: Move,
}

impl AuthoritativeSnapshot {
    pub fn new(state: VehicleState, last_move: Move) -> Self {
        Self { state, last_move }
    }

    /// Snapshot for a freshly spawned kart. The idle marker move has zero
    /// duration and acknowledges nothing stamped after `spawned_at`.
    pub fn spawn(state: VehicleState, spawned_at: f64) -> Self {
        Self {
            state,
            last_move: Move::new(0.0, 0.0, 0.0, spawned_at),
        }
    }

    pub fn acknowledged_time(&self) -> f64 {
        self.last_move.timestamp
    }
}

/// Holds only the most recent snapshot and remembers whether it changed.
///
/// The authority publishes into a slot after every applied move and drains
/// it at the snapshot rate; observers push every received snapshot through
/// one so their handler runs once per distinct value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotSlot {
    latest: Option<AuthoritativeSnapshot>,
    changed: bool,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `snapshot`, returning true when it differs from the held value.
    pub fn publish(&mut self, snapshot: AuthoritativeSnapshot) -> bool {
        if self.latest == Some(snapshot) {
            return false;
        }
        self.latest = Some(snapshot);
        self.changed = true;
        true
    }

    /// Runs `handler` on `snapshot` only if it is new to this slot.
    pub fn deliver<F>(&mut self, snapshot: AuthoritativeSnapshot, handler: F) -> bool
    where
        F: FnOnce(&AuthoritativeSnapshot),
    {
        if !self.publish(snapshot) {
            return false;
        }
        self.changed = false;
        handler(&snapshot);
        true
    }

    /// Returns the held snapshot if it changed since the last call.
    pub fn take_changed(&mut self) -> Option<AuthoritativeSnapshot> {
        if !self.changed {
            return None;
        }
        self.changed = false;
        self.latest
    }

    pub fn latest(&self) -> Option<&AuthoritativeSnapshot> {
        self.latest.as_ref()
    }
}
