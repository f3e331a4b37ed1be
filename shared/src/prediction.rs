//! Client-side prediction for the kart this participant controls

use crate::clock::WorldClock;
use crate::collision::Environment;
use crate::ledger::PredictionLedger;
use crate::movement::{MovementSimulator, VehicleState};
use crate::moves::MoveSampler;
use crate::reconciliation::reconcile;
use crate::snapshot::AuthoritativeSnapshot;
use crate::vehicle::{NetRole, RoleBehavior, TickOutcome};
use log::debug;

/// Corrections shorter than this (m) are not worth a log line.
const NOTABLE_CORRECTION: f32 = 0.01;

/// Applies input immediately and keeps every unconfirmed move for replay.
#[derive(Debug, Clone)]
pub struct PredictingBehavior {
    simulator: MovementSimulator,
    state: VehicleState,
    ledger: PredictionLedger,
    sampler: MoveSampler,
    last_correction: f32,
}

impl PredictingBehavior {
    pub fn new(simulator: MovementSimulator, initial: VehicleState) -> Self {
        Self {
            simulator,
            state: initial,
            ledger: PredictionLedger::new(),
            sampler: MoveSampler::new(),
            last_correction: 0.0,
        }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn ledger(&self) -> &PredictionLedger {
        &self.ledger
    }

    pub fn sampler(&self) -> &MoveSampler {
        &self.sampler
    }

    /// Distance the last reconciliation moved the predicted kart.
    pub fn last_correction(&self) -> f32 {
        self.last_correction
    }
}

impl RoleBehavior for PredictingBehavior {
    fn role(&self) -> NetRole {
        NetRole::ControllingClient
    }

    fn tick(&mut self, delta_time: f32, clock: &dyn WorldClock, env: &Environment) -> TickOutcome {
        let kart_move = self.sampler.create_move(delta_time, clock);

        // A move the ledger cannot hold could never be replayed, so it is not predicted either.
        if !self.ledger.append(kart_move) {
            return TickOutcome::Idle;
        }

        self.state = self.simulator.step(&self.state, &kart_move, env);
        TickOutcome::SendMove(kart_move)
    }

    fn on_snapshot(&mut self, snapshot: &AuthoritativeSnapshot, env: &Environment) {
        let predicted = self.state.pose.position;
        let result = reconcile(&self.simulator, snapshot, &mut self.ledger, env);

        self.last_correction = predicted.distance(result.state.pose.position);
        if self.last_correction > NOTABLE_CORRECTION {
            debug!(
                "Prediction corrected by {:.3}m ({} moves replayed)",
                self.last_correction, result.replayed
            );
        }

        self.state = result.state;
    }

    fn rendered_state(&self) -> Option<VehicleState> {
        Some(self.state)
    }

    fn controls_mut(&mut self) -> Option<&mut MoveSampler> {
        Some(&mut self.sampler)
    }
}
