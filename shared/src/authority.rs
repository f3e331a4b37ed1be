//! The authority's side of a kart: validate, simulate, publish

use crate::clock::WorldClock;
use crate::collision::Environment;
use crate::error::MoveRejection;
use crate::movement::{MovementSimulator, VehicleState};
use crate::moves::{Move, MoveSampler};
use crate::snapshot::AuthoritativeSnapshot;
use crate::vehicle::{NetRole, RoleBehavior, TickOutcome};
use log::{debug, warn};

/// Per-connection move validation.
///
/// Tracks the total simulated time this connection has been granted. A move
/// that would push that total to or past the authority's world time is the
/// client claiming time that has not elapsed yet and is refused.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveValidator {
    simulated_time: f64,
    clock_slack: f64,
}

impl MoveValidator {
    pub fn new(clock_slack: f64) -> Self {
        Self {
            simulated_time: 0.0,
            clock_slack,
        }
    }

    /// Checks `kart_move` against the current world time without recording it.
    pub fn validate(&self, kart_move: &Move, world_time: f64) -> Result<(), MoveRejection> {
        if !kart_move.is_valid() {
            return Err(MoveRejection::InvalidInput {
                throttle: kart_move.throttle,
                steering_throw: kart_move.steering_throw,
            });
        }

        if !(kart_move.delta_time.is_finite() && kart_move.delta_time > 0.0) {
            return Err(MoveRejection::BadDuration {
                delta_time: kart_move.delta_time,
            });
        }

        let proposed = self.simulated_time + kart_move.delta_time as f64;
        // Accept only when strictly behind; NaN compares false and is refused.
        if !(proposed < world_time + self.clock_slack) {
            return Err(MoveRejection::RunningAhead {
                proposed,
                world_time,
            });
        }

        Ok(())
    }

    pub fn record(&mut self, kart_move: &Move) {
        self.simulated_time += kart_move.delta_time as f64;
    }

    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    pub fn clock_slack(&self) -> f64 {
        self.clock_slack
    }
}

/// Canonical state for one kart.
///
/// Remote karts advance only through [`AuthorityBehavior::receive_move`].
/// A kart the authority drives itself carries its own [`MoveSampler`] and
/// advances on every tick instead, with no validation and no network hop.
#[derive(Debug, Clone)]
pub struct AuthorityBehavior {
    simulator: MovementSimulator,
    state: VehicleState,
    validator: MoveValidator,
    driver: Option<MoveSampler>,
    last_snapshot: AuthoritativeSnapshot,
}

impl AuthorityBehavior {
    /// A kart controlled by a remote client.
    pub fn remote(
        simulator: MovementSimulator,
        spawn: VehicleState,
        spawned_at: f64,
        clock_slack: f64,
    ) -> Self {
        Self {
            simulator,
            state: spawn,
            validator: MoveValidator::new(clock_slack),
            driver: None,
            last_snapshot: AuthoritativeSnapshot::spawn(spawn, spawned_at),
        }
    }

    /// A kart the authority drives itself.
    pub fn locally_driven(simulator: MovementSimulator, spawn: VehicleState, spawned_at: f64) -> Self {
        Self {
            driver: Some(MoveSampler::new()),
            ..Self::remote(simulator, spawn, spawned_at, 0.0)
        }
    }

    pub fn is_locally_driven(&self) -> bool {
        self.driver.is_some()
    }

    /// Validates a move from the controlling client and, if accepted,
    /// simulates it and returns the snapshot to publish.
    pub fn receive_move(
        &mut self,
        kart_move: &Move,
        world_time: f64,
        env: &Environment,
    ) -> Result<AuthoritativeSnapshot, MoveRejection> {
        if let Err(rejection) = self.validator.validate(kart_move, world_time) {
            warn!("Rejected move at {:.3}s: {}", kart_move.timestamp, rejection);
            return Err(rejection);
        }

        self.validator.record(kart_move);
        Ok(self.apply(kart_move, env))
    }

    fn apply(&mut self, kart_move: &Move, env: &Environment) -> AuthoritativeSnapshot {
        self.state = self.simulator.step(&self.state, kart_move, env);
        self.last_snapshot = AuthoritativeSnapshot::new(self.state, *kart_move);
        self.last_snapshot
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn last_snapshot(&self) -> &AuthoritativeSnapshot {
        &self.last_snapshot
    }

    pub fn validator(&self) -> &MoveValidator {
        &self.validator
    }
}

impl RoleBehavior for AuthorityBehavior {
    fn role(&self) -> NetRole {
        NetRole::Authority
    }

    fn tick(&mut self, delta_time: f32, clock: &dyn WorldClock, env: &Environment) -> TickOutcome {
        let Some(driver) = self.driver else {
            return TickOutcome::Idle;
        };

        let kart_move = driver.create_move(delta_time, clock);
        TickOutcome::Publish(self.apply(&kart_move, env))
    }

    fn on_snapshot(&mut self, snapshot: &AuthoritativeSnapshot, _env: &Environment) {
        debug!(
            "Authority ignoring snapshot acknowledging {:.3}s",
            snapshot.acknowledged_time()
        );
    }

    fn rendered_state(&self) -> Option<VehicleState> {
        Some(self.state)
    }

    fn controls_mut(&mut self) -> Option<&mut MoveSampler> {
        self.driver.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_approx_eq::assert_approx_eq;

    fn remote_kart() -> AuthorityBehavior {
        AuthorityBehavior::remote(MovementSimulator::default(), VehicleState::default(), 0.0, 0.0)
    }

    #[test]
    fn test_throttle_boundary() {
        let validator = MoveValidator::new(0.0);

        assert!(validator.validate(&Move::new(1.0, 0.0, 0.1, 0.1), 10.0).is_ok());
        assert_eq!(
            validator.validate(&Move::new(1.2, 0.0, 0.1, 0.1), 10.0),
            Err(MoveRejection::InvalidInput {
                throttle: 1.2,
                steering_throw: 0.0
            })
        );
    }

    #[test]
    fn test_running_ahead_boundary() {
        let mut validator = MoveValidator::new(0.0);
        for _ in 0..9 {
            validator.record(&Move::new(1.0, 0.0, 0.1, 0.0));
        }
        let kart_move = Move::new(1.0, 0.0, 0.1, 1.0);

        // 0.9 + 0.1 lands on world time 1.0: not strictly behind.
        assert!(matches!(
            validator.validate(&kart_move, 1.0),
            Err(MoveRejection::RunningAhead { .. })
        ));
        assert!(validator.validate(&kart_move, 1.05).is_ok());
    }

    #[test]
    fn test_non_positive_or_non_finite_duration_rejected() {
        let validator = MoveValidator::new(0.0);

        for delta_time in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -0.1, 0.0] {
            let kart_move = Move::new(1.0, 0.0, delta_time, 0.1);
            assert!(
                matches!(
                    validator.validate(&kart_move, 1.0),
                    Err(MoveRejection::BadDuration { .. })
                ),
                "delta_time {} should be refused",
                delta_time
            );
        }
    }

    #[test]
    fn test_nan_move_leaves_kart_untouched() {
        let env = Environment::open_field();
        let mut kart = remote_kart();
        let before = *kart.state();

        assert!(kart
            .receive_move(&Move::new(1.0, 0.0, f32::NAN, 0.1), 1.0, &env)
            .is_err());
        assert_eq!(*kart.state(), before);
        assert_eq!(kart.validator().simulated_time(), 0.0);

        // The running total is still intact, so a huge move is still refused.
        assert!(kart
            .receive_move(&Move::new(1.0, 0.0, 1.0e6, 0.2), 1.0, &env)
            .is_err());
    }

    #[test]
    fn test_negative_duration_cannot_buy_time() {
        let env = Environment::open_field();
        let mut kart = remote_kart();

        assert!(kart
            .receive_move(&Move::new(1.0, 0.0, -100.0, 0.1), 1.0, &env)
            .is_err());
        assert!(kart
            .receive_move(&Move::new(1.0, 0.0, 100.0, 0.2), 1.0, &env)
            .is_err());
        assert_eq!(kart.validator().simulated_time(), 0.0);
    }

    #[test]
    fn test_nan_world_time_refuses_everything() {
        let validator = MoveValidator::new(0.0);
        assert!(matches!(
            validator.validate(&Move::new(1.0, 0.0, 0.1, 0.1), f64::NAN),
            Err(MoveRejection::RunningAhead { .. })
        ));
    }

    #[test]
    fn test_clock_slack_widens_window() {
        let validator = MoveValidator::new(0.5);
        let kart_move = Move::new(0.0, 0.0, 0.2, 0.0);

        assert!(validator.validate(&kart_move, 0.0).is_ok());
        assert!(validator.validate(&kart_move, -0.3).is_err());
    }

    #[test]
    fn test_rejected_move_has_no_side_effect() {
        let env = Environment::open_field();
        let mut kart = remote_kart();
        let before_state = *kart.state();
        let before_snapshot = *kart.last_snapshot();

        assert!(kart.receive_move(&Move::new(2.0, 0.0, 0.1, 0.1), 5.0, &env).is_err());
        assert!(kart.receive_move(&Move::new(1.0, 0.0, 10.0, 0.1), 5.0, &env).is_err());

        assert_eq!(*kart.state(), before_state);
        assert_eq!(*kart.last_snapshot(), before_snapshot);
        assert_eq!(kart.validator().simulated_time(), 0.0);
    }

    #[test]
    fn test_accepted_move_is_simulated_and_published() {
        let env = Environment::open_field();
        let mut kart = remote_kart();
        let kart_move = Move::new(1.0, 0.0, 0.1, 0.1);

        let snapshot = kart.receive_move(&kart_move, 1.0, &env).unwrap();

        assert_approx_eq!(snapshot.state.velocity.x, 1.0, 1e-6);
        assert_approx_eq!(snapshot.state.pose.position.x, 0.1, 1e-6);
        assert_eq!(snapshot.last_move, kart_move);
        assert_eq!(*kart.last_snapshot(), snapshot);
        assert_approx_eq!(kart.validator().simulated_time(), 0.1, 1e-6);
    }

    #[test]
    fn test_remote_kart_idles_on_tick() {
        let env = Environment::open_field();
        let clock = ManualClock::new(1.0);
        let mut kart = remote_kart();

        assert_eq!(kart.tick(0.1, &clock, &env), TickOutcome::Idle);
        assert!(kart.controls_mut().is_none());
    }

    #[test]
    fn test_locally_driven_kart_publishes_every_tick() {
        let env = Environment::open_field();
        let mut clock = ManualClock::new(0.0);
        let mut kart =
            AuthorityBehavior::locally_driven(MovementSimulator::default(), VehicleState::default(), 0.0);
        kart.controls_mut().unwrap().set_throttle(1.0);

        let mut published = Vec::new();
        for _ in 0..3 {
            clock.advance(0.1);
            if let TickOutcome::Publish(snapshot) = kart.tick(0.1, &clock, &env) {
                published.push(snapshot);
            }
        }

        assert_eq!(published.len(), 3);
        assert!(published[2].state.pose.position.x > published[0].state.pose.position.x);
        assert_approx_eq!(published[2].acknowledged_time(), 0.3, 1e-9);
    }
}
