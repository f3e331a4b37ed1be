//! Dead reckoning for karts this participant only observes
//!
//! Between two authoritative snapshots the observer draws a cubic Hermite
//! curve from where the kart is currently rendered to where the newest
//! snapshot puts it. The curve's end tangents are the velocities at either
//! end, scaled into curve space by the time between snapshots, so the
//! rendered kart keeps velocity continuity across snapshot boundaries instead
//! of changing direction abruptly at each update.
//!
//! Only position follows the curve; orientation is slerped on the same ratio.

use crate::movement::{Pose, VehicleState};
use crate::snapshot::AuthoritativeSnapshot;
use crate::KINDA_SMALL_INTERVAL;
use glam::Vec3;
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HermiteCubicSpline {
    pub start_location: Vec3,
    pub start_derivative: Vec3,
    pub target_location: Vec3,
    pub target_derivative: Vec3,
}

impl HermiteCubicSpline {
    pub fn location(&self, ratio: f32) -> Vec3 {
        let a2 = ratio * ratio;
        let a3 = a2 * ratio;

        self.start_location * (2.0 * a3 - 3.0 * a2 + 1.0)
            + self.start_derivative * (a3 - 2.0 * a2 + ratio)
            + self.target_derivative * (a3 - a2)
            + self.target_location * (-2.0 * a3 + 3.0 * a2)
    }

    pub fn derivative(&self, ratio: f32) -> Vec3 {
        let p0 = self.start_location;
        let t0 = self.start_derivative;
        let p1 = self.target_location;
        let t1 = self.target_derivative;

        let a = p0 * 6.0 + t0 * 3.0 + t1 * 3.0 - p1 * 6.0;
        let b = p0 * -6.0 - t0 * 4.0 - t1 * 2.0 + p1 * 6.0;

        a * (ratio * ratio) + b * ratio + t0
    }
}

/// Everything needed to render a kart between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationWindow {
    pub start_pose: Pose,
    pub start_velocity: Vec3,
    pub target_pose: Pose,
    pub target_velocity: Vec3,
    /// Seconds between the previous snapshot and the current one.
    pub interval: f32,
}

impl InterpolationWindow {
    pub fn is_degenerate(&self) -> bool {
        self.interval < KINDA_SMALL_INTERVAL
    }

    fn velocity_to_derivative(&self) -> f32 {
        self.interval
    }

    pub fn spline(&self) -> HermiteCubicSpline {
        let scale = self.velocity_to_derivative();
        HermiteCubicSpline {
            start_location: self.start_pose.position,
            start_derivative: self.start_velocity * scale,
            target_location: self.target_pose.position,
            target_derivative: self.target_velocity * scale,
        }
    }

    /// Rendered state at `ratio` through the window. Ratios past 1 extrapolate.
    ///
    /// Callers must check [`InterpolationWindow::is_degenerate`] first.
    pub fn sample(&self, ratio: f32) -> VehicleState {
        let spline = self.spline();
        let position = spline.location(ratio);
        let velocity = spline.derivative(ratio) / self.velocity_to_derivative();
        let orientation = self
            .start_pose
            .orientation
            .slerp(self.target_pose.orientation, ratio);

        VehicleState {
            velocity,
            pose: Pose::new(position, orientation),
        }
    }
}

/// Per observed kart: builds a window on every snapshot and samples it every render tick.
#[derive(Debug, Clone, Default)]
pub struct DeadReckoningInterpolator {
    window: Option<InterpolationWindow>,
    rendered: Option<VehicleState>,
    time_since_update: f32,
}

impl DeadReckoningInterpolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new window from the currently rendered state towards `snapshot`.
    ///
    /// The first snapshot has nothing to interpolate from, so the kart is
    /// placed on it directly and holds there until the next one arrives.
    pub fn on_snapshot(&mut self, snapshot: &AuthoritativeSnapshot) {
        let target = snapshot.state;

        let window = match self.rendered {
            Some(rendered) => InterpolationWindow {
                start_pose: rendered.pose,
                start_velocity: rendered.velocity,
                target_pose: target.pose,
                target_velocity: target.velocity,
                interval: self.time_since_update,
            },
            None => {
                self.rendered = Some(target);
                InterpolationWindow {
                    start_pose: target.pose,
                    start_velocity: target.velocity,
                    target_pose: target.pose,
                    target_velocity: target.velocity,
                    interval: 0.0,
                }
            }
        };

        self.window = Some(window);
        self.time_since_update = 0.0;
    }

    /// Advances the render clock and returns the state to draw, if any
    /// snapshot has arrived yet.
    pub fn tick(&mut self, delta_time: f32) -> Option<VehicleState> {
        self.time_since_update += delta_time;

        let window = self.window?;
        if window.is_degenerate() {
            trace!("Holding pose: interpolation interval {:.6}s", window.interval);
            return self.rendered;
        }

        let ratio = self.time_since_update / window.interval;
        let state = window.sample(ratio);
        self.rendered = Some(state);
        Some(state)
    }

    pub fn rendered(&self) -> Option<VehicleState> {
        self.rendered
    }

    pub fn window(&self) -> Option<&InterpolationWindow> {
        self.window.as_ref()
    }

    pub fn time_since_update(&self) -> f32 {
        self.time_since_update
    }
}
