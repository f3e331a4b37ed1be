//! Deterministic point-mass kart physics
//!
//! The step is a pure function of (state, move, environment). Both the
//! controlling client and the authority run it on the same ordered moves,
//! which is what makes replay-based reconciliation valid.

use crate::collision::Environment;
use crate::moves::Move;
use crate::{
    DRAG_COEFFICIENT, KART_MASS, MAX_DRIVE_FORCE, MIN_TURNING_RADIUS,
    ROLLING_RESISTANCE_COEFFICIENT,
};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local axis the kart drives along.
pub const FORWARD: Vec3 = Vec3::X;
/// Local axis the kart turns about.
pub const UP: Vec3 = Vec3::Z;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * FORWARD
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * UP
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleState {
    /// World units per second.
    pub velocity: Vec3,
    pub pose: Pose,
}

impl VehicleState {
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            velocity: Vec3::ZERO,
            pose,
        }
    }
}

/// Static tuning shared by every participant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KartConfig {
    pub mass: f32,
    pub max_drive_force: f32,
    pub min_turning_radius: f32,
    pub drag_coefficient: f32,
    pub rolling_resistance_coefficient: f32,
}

impl Default for KartConfig {
    fn default() -> Self {
        Self {
            mass: KART_MASS,
            max_drive_force: MAX_DRIVE_FORCE,
            min_turning_radius: MIN_TURNING_RADIUS,
            drag_coefficient: DRAG_COEFFICIENT,
            rolling_resistance_coefficient: ROLLING_RESISTANCE_COEFFICIENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementSimulator {
    config: KartConfig,
}

impl MovementSimulator {
    pub fn new(config: KartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KartConfig {
        &self.config
    }

    /// Advances `state` by one move.
    pub fn step(&self, state: &VehicleState, kart_move: &Move, env: &Environment) -> VehicleState {
        let force = self.drive_force(&state.pose, kart_move.throttle)
            + self.air_resistance(state.velocity)
            + self.rolling_resistance(state.velocity, env.gravity);

        let acceleration = force / self.config.mass;
        let mut velocity = state.velocity + acceleration * kart_move.delta_time;

        let rotation = self.rotation_delta(
            &state.pose,
            velocity,
            kart_move.delta_time,
            kart_move.steering_throw,
        );
        velocity = rotation * velocity;
        let orientation = (rotation * state.pose.orientation).normalize();

        let displacement = velocity * kart_move.delta_time;
        let position = match env.sweep(state.pose.position, displacement) {
            Some(hit) => {
                velocity = Vec3::ZERO;
                hit
            }
            None => state.pose.position + displacement,
        };

        VehicleState {
            velocity,
            pose: Pose::new(position, orientation),
        }
    }

    pub fn drive_force(&self, pose: &Pose, throttle: f32) -> Vec3 {
        pose.forward() * self.config.max_drive_force * throttle
    }

    pub fn air_resistance(&self, velocity: Vec3) -> Vec3 {
        -velocity.normalize_or_zero() * velocity.length_squared() * self.config.drag_coefficient
    }

    pub fn rolling_resistance(&self, velocity: Vec3, gravity: f32) -> Vec3 {
        let normal_force = self.config.mass * gravity;
        -velocity.normalize_or_zero() * self.config.rolling_resistance_coefficient * normal_force
    }

    /// Yaw for this step. Proportional to forward speed, so a stationary kart does not turn.
    pub fn turn_angle(&self, pose: &Pose, velocity: Vec3, delta_time: f32, steering_throw: f32) -> f32 {
        let distance_forward = pose.forward().dot(velocity) * delta_time;
        distance_forward / self.config.min_turning_radius * steering_throw
    }

    fn rotation_delta(&self, pose: &Pose, velocity: Vec3, delta_time: f32, steering_throw: f32) -> Quat {
        let angle = self.turn_angle(pose, velocity, delta_time, steering_throw);
        Quat::from_axis_angle(pose.up(), angle)
    }
}
