//! Timestamped control samples and the sampler that produces them

use crate::clock::WorldClock;
use serde::{Deserialize, Serialize};

/// One input sample: the unit of simulation, transmission and acknowledgement.
///
/// `timestamp` is read from the shared (server-synchronized) clock when the
/// move is created, so the authority can acknowledge moves by time and the
/// controlling client can trim its ledger with a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub throttle: f32,
    pub steering_throw: f32,
    pub delta_time: f32,
    pub timestamp: f64,
}

impl Move {
    pub fn new(throttle: f32, steering_throw: f32, delta_time: f32, timestamp: f64) -> Self {
        Self {
            throttle,
            steering_throw,
            delta_time,
            timestamp,
        }
    }

    /// Both control axes are within full deflection.
    pub fn is_valid(&self) -> bool {
        self.throttle.abs() <= 1.0 && self.steering_throw.abs() <= 1.0
    }
}

/// Holds the latest control inputs and stamps them into [`Move`]s.
///
/// The host's input source writes throttle and steering whenever they change;
/// the role logic calls [`MoveSampler::create_move`] once per tick. Values are
/// stored as given. Out-of-range input is not clamped here, the authority's
/// validation is what rejects it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveSampler {
    throttle: f32,
    steering_throw: f32,
}

impl MoveSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_throttle(&mut self, value: f32) {
        self.throttle = value;
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn set_steering_throw(&mut self, value: f32) {
        self.steering_throw = value;
    }

    pub fn steering_throw(&self) -> f32 {
        self.steering_throw
    }

    pub fn create_move(&self, delta_time: f32, clock: &dyn WorldClock) -> Move {
        Move {
            throttle: self.throttle,
            steering_throw: self.steering_throw,
            delta_time,
            timestamp: clock.server_time_seconds(),
        }
    }
}
