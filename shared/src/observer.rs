//! Rendering karts that someone else controls

use crate::clock::WorldClock;
use crate::collision::Environment;
use crate::interpolation::DeadReckoningInterpolator;
use crate::movement::{MovementSimulator, VehicleState};
use crate::moves::Move;
use crate::snapshot::AuthoritativeSnapshot;
use crate::vehicle::{NetRole, RoleBehavior, TickOutcome};
use std::fmt;
use std::str::FromStr;

/// How an observer fills the gaps between snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObserverMode {
    /// Cubic Hermite curve from the rendered pose to the latest snapshot.
    #[default]
    Hermite,
    /// Keep re-simulating the snapshot's last move from the rendered pose.
    ReplayLastMove,
}

impl fmt::Display for ObserverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverMode::Hermite => write!(f, "hermite"),
            ObserverMode::ReplayLastMove => write!(f, "replay"),
        }
    }
}

impl FromStr for ObserverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hermite" => Ok(ObserverMode::Hermite),
            "replay" | "replay-last-move" => Ok(ObserverMode::ReplayLastMove),
            other => Err(format!(
                "unknown observer mode '{}' (expected 'hermite' or 'replay')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObserverBehavior {
    mode: ObserverMode,
    simulator: MovementSimulator,
    interpolator: DeadReckoningInterpolator,
    replay: Option<(VehicleState, Move)>,
}

impl ObserverBehavior {
    pub fn new(mode: ObserverMode, simulator: MovementSimulator) -> Self {
        Self {
            mode,
            simulator,
            interpolator: DeadReckoningInterpolator::new(),
            replay: None,
        }
    }

    pub fn mode(&self) -> ObserverMode {
        self.mode
    }

    pub fn interpolator(&self) -> &DeadReckoningInterpolator {
        &self.interpolator
    }
}

impl RoleBehavior for ObserverBehavior {
    fn role(&self) -> NetRole {
        NetRole::Observer
    }

    fn tick(&mut self, delta_time: f32, _clock: &dyn WorldClock, env: &Environment) -> TickOutcome {
        match self.mode {
            ObserverMode::Hermite => {
                self.interpolator.tick(delta_time);
            }
            ObserverMode::ReplayLastMove => {
                if let Some((state, last_move)) = self.replay.as_mut() {
                    let repeated = Move {
                        delta_time,
                        ..*last_move
                    };
                    *state = self.simulator.step(state, &repeated, env);
                }
            }
        }
        TickOutcome::Idle
    }

    fn on_snapshot(&mut self, snapshot: &AuthoritativeSnapshot, _env: &Environment) {
        match self.mode {
            ObserverMode::Hermite => self.interpolator.on_snapshot(snapshot),
            ObserverMode::ReplayLastMove => self.replay = Some((snapshot.state, snapshot.last_move)),
        }
    }

    fn rendered_state(&self) -> Option<VehicleState> {
        match self.mode {
            ObserverMode::Hermite => self.interpolator.rendered(),
            ObserverMode::ReplayLastMove => self.replay.map(|(state, _)| state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::movement::Pose;
    use assert_approx_eq::assert_approx_eq;
    use glam::{Quat, Vec3};

    fn snapshot(x: f32, speed: f32, throttle: f32) -> AuthoritativeSnapshot {
        AuthoritativeSnapshot::new(
            VehicleState {
                velocity: Vec3::new(speed, 0.0, 0.0),
                pose: Pose::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY),
            },
            Move::new(throttle, 0.0, 1.0 / 60.0, 1.0),
        )
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("hermite".parse::<ObserverMode>(), Ok(ObserverMode::Hermite));
        assert_eq!("Replay".parse::<ObserverMode>(), Ok(ObserverMode::ReplayLastMove));
        assert!("spline".parse::<ObserverMode>().is_err());
        assert_eq!(ObserverMode::default(), ObserverMode::Hermite);
    }

    #[test]
    fn test_hermite_observer_follows_snapshots() {
        let env = Environment::open_field();
        let clock = ManualClock::new(0.0);
        let mut observer = ObserverBehavior::new(ObserverMode::Hermite, MovementSimulator::default());
        assert!(observer.rendered_state().is_none());

        observer.on_snapshot(&snapshot(0.0, 2.0, 0.0), &env);
        assert_eq!(observer.tick(0.5, &clock, &env), TickOutcome::Idle);
        observer.tick(0.5, &clock, &env);
        observer.on_snapshot(&snapshot(2.0, 2.0, 0.0), &env);

        observer.tick(0.5, &clock, &env);
        assert_approx_eq!(observer.rendered_state().unwrap().pose.position.x, 1.0, 1e-5);
        observer.tick(0.5, &clock, &env);
        assert_approx_eq!(observer.rendered_state().unwrap().pose.position.x, 2.0, 1e-5);
    }

    #[test]
    fn test_replay_observer_extrapolates_last_move() {
        let env = Environment::open_field();
        let clock = ManualClock::new(0.0);
        let sim = MovementSimulator::default();
        let mut observer = ObserverBehavior::new(ObserverMode::ReplayLastMove, sim);

        let received = snapshot(5.0, 0.0, 1.0);
        observer.on_snapshot(&received, &env);
        assert_eq!(observer.rendered_state(), Some(received.state));

        observer.tick(0.1, &clock, &env);

        let expected = sim.step(&received.state, &Move::new(1.0, 0.0, 0.1, 1.0), &env);
        assert_eq!(observer.rendered_state(), Some(expected));
        assert_approx_eq!(expected.pose.position.x, 5.1, 1e-5);
    }
}
