//! Role dispatch for a replicated kart
//!
//! Each participant holds one [`NetworkedVehicle`] per kart. Which of the
//! three behaviours it wraps is decided once, when the vehicle is created,
//! and every tick and every snapshot is routed to exactly that behaviour.

use crate::authority::AuthorityBehavior;
use crate::clock::WorldClock;
use crate::collision::Environment;
use crate::error::VehicleError;
use crate::movement::VehicleState;
use crate::moves::{Move, MoveSampler};
use crate::observer::ObserverBehavior;
use crate::prediction::PredictingBehavior;
use crate::snapshot::AuthoritativeSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetRole {
    Authority,
    ControllingClient,
    Observer,
}

impl NetRole {
    pub fn label(&self) -> &'static str {
        match self {
            NetRole::Authority => "Authority",
            NetRole::ControllingClient => "ControllingClient",
            NetRole::Observer => "Observer",
        }
    }
}

impl fmt::Display for NetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the host has to do after ticking a vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Idle,
    /// Transmit this move to the authority.
    SendMove(Move),
    /// Replicate this snapshot to everyone.
    Publish(AuthoritativeSnapshot),
}

pub trait RoleBehavior {
    fn role(&self) -> NetRole;

    fn tick(&mut self, delta_time: f32, clock: &dyn WorldClock, env: &Environment) -> TickOutcome;

    fn on_snapshot(&mut self, snapshot: &AuthoritativeSnapshot, env: &Environment);

    /// State to draw this frame, or `None` before anything is known about the kart.
    fn rendered_state(&self) -> Option<VehicleState>;

    /// Input sampler, for roles that produce moves.
    fn controls_mut(&mut self) -> Option<&mut MoveSampler> {
        None
    }
}

#[derive(Debug, Clone)]
pub enum NetworkedVehicle {
    Authority(AuthorityBehavior),
    ControllingClient(PredictingBehavior),
    Observer(ObserverBehavior),
}

impl NetworkedVehicle {
    fn behavior(&self) -> &dyn RoleBehavior {
        match self {
            NetworkedVehicle::Authority(b) => b,
            NetworkedVehicle::ControllingClient(b) => b,
            NetworkedVehicle::Observer(b) => b,
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn RoleBehavior {
        match self {
            NetworkedVehicle::Authority(b) => b,
            NetworkedVehicle::ControllingClient(b) => b,
            NetworkedVehicle::Observer(b) => b,
        }
    }

    pub fn role(&self) -> NetRole {
        self.behavior().role()
    }

    pub fn role_label(&self) -> &'static str {
        self.role().label()
    }

    pub fn tick(&mut self, delta_time: f32, clock: &dyn WorldClock, env: &Environment) -> TickOutcome {
        self.behavior_mut().tick(delta_time, clock, env)
    }

    pub fn on_snapshot(&mut self, snapshot: &AuthoritativeSnapshot, env: &Environment) {
        self.behavior_mut().on_snapshot(snapshot, env);
    }

    pub fn rendered_state(&self) -> Option<VehicleState> {
        self.behavior().rendered_state()
    }

    /// Feeds the latest input into the vehicle's sampler.
    pub fn set_controls(&mut self, throttle: f32, steering_throw: f32) -> Result<(), VehicleError> {
        let actual = self.role();
        let sampler = self
            .behavior_mut()
            .controls_mut()
            .ok_or(VehicleError::WrongRole {
                operation: "set_controls",
                expected: NetRole::ControllingClient,
                actual,
            })?;

        sampler.set_throttle(throttle);
        sampler.set_steering_throw(steering_throw);
        Ok(())
    }

    /// Hands a move from the controlling client to the authority.
    pub fn receive_move(
        &mut self,
        kart_move: &Move,
        world_time: f64,
        env: &Environment,
    ) -> Result<AuthoritativeSnapshot, VehicleError> {
        match self {
            NetworkedVehicle::Authority(authority) => {
                Ok(authority.receive_move(kart_move, world_time, env)?)
            }
            other => Err(VehicleError::WrongRole {
                operation: "receive_move",
                expected: NetRole::Authority,
                actual: other.role(),
            }),
        }
    }
}
