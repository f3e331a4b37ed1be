//! Scripted control input for a headless client

use log::debug;
use std::f32::consts::TAU;

/// Produces throttle and steering for the controlled kart each tick.
///
/// Throttle is held constant. Steering either stays constant or weaves
/// sinusoidally with the configured period, so the kart traces curves that
/// exercise turning in prediction and reconciliation.
#[derive(Debug, Clone)]
pub struct InputManager {
    throttle: f32,
    steering: f32,
    weave_period: f32,
    current: (f32, f32),
    last_logged: (f32, f32),
}

impl InputManager {
    pub fn new(throttle: f32, steering: f32, weave_period: f32) -> Self {
        Self {
            throttle,
            steering,
            weave_period,
            current: (0.0, 0.0),
            last_logged: (0.0, 0.0),
        }
    }

    /// Samples the script at `elapsed` seconds since the client started.
    /// Returns (throttle, steering_throw).
    pub fn update(&mut self, elapsed: f32) -> (f32, f32) {
        let steering = if self.weave_period > 0.0 {
            self.steering * (elapsed / self.weave_period * TAU).sin()
        } else {
            self.steering
        };

        let next = (self.throttle, steering);
        if next.0 != self.last_logged.0 || (next.1 - self.last_logged.1).abs() > 0.25 {
            debug!("Input throttle {:.2}, steering {:.2}", next.0, next.1);
            self.last_logged = next;
        }
        self.current = next;
        next
    }

    pub fn get_current_input(&self) -> (f32, f32) {
        self.current
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new(1.0, 0.5, 0.0)
    }
}
