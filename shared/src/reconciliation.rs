//! Correct-and-replay for the controlling client

use crate::collision::Environment;
use crate::ledger::PredictionLedger;
use crate::movement::{MovementSimulator, VehicleState};
use crate::snapshot::AuthoritativeSnapshot;
use log::debug;

/// Result of reconciling against one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    /// Predicted state after replaying the unacknowledged moves.
    pub state: VehicleState,
    /// Moves the snapshot confirmed and the ledger dropped.
    pub acknowledged: usize,
    /// Moves replayed on top of the snapshot.
    pub replayed: usize,
}

/// Snaps to `snapshot`, trims the moves it acknowledges from `ledger`, and
/// replays the rest in order. The authority wins unconditionally; whatever
/// was predicted before is discarded.
pub fn reconcile(
    simulator: &MovementSimulator,
    snapshot: &AuthoritativeSnapshot,
    ledger: &mut PredictionLedger,
    env: &Environment,
) -> Reconciliation {
    let acknowledged = ledger.clear_acknowledged(snapshot.acknowledged_time());

    let state = ledger
        .iter()
        .fold(snapshot.state, |state, kart_move| {
            simulator.step(&state, kart_move, env)
        });

    debug!(
        "Reconciled at {:.3}s: {} acknowledged, {} replayed",
        snapshot.acknowledged_time(),
        acknowledged,
        ledger.len()
    );

    Reconciliation {
        state,
        acknowledged,
        replayed: ledger.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::Move;
    use glam::Vec3;

    fn moves(count: usize) -> Vec<Move> {
        (1..=count)
            .map(|i| {
                let steer = if i % 3 == 0 { 0.5 } else { -0.25 };
                Move::new(1.0, steer, 1.0 / 30.0, i as f64 / 30.0)
            })
            .collect()
    }

    fn simulate(sim: &MovementSimulator, from: VehicleState, moves: &[Move], env: &Environment) -> VehicleState {
        moves.iter().fold(from, |state, m| sim.step(&state, m, env))
    }

    #[test]
    fn test_replay_equivalence() {
        let env = Environment::arena();
        let sim = MovementSimulator::default();
        let all = moves(12);
        let k = 5;

        let mut ledger = PredictionLedger::new();
        for m in &all {
            ledger.append(*m);
        }

        // Authority state after the first k moves, nudged so it disagrees with prediction.
        let mut authority = simulate(&sim, VehicleState::default(), &all[..k], &env);
        authority.pose.position += Vec3::new(0.5, -0.25, 0.0);
        let snapshot = AuthoritativeSnapshot::new(authority, all[k - 1]);

        let result = reconcile(&sim, &snapshot, &mut ledger, &env);

        let expected = simulate(&sim, authority, &all[k..], &env);
        assert_eq!(result.state, expected);
        assert_eq!(result.acknowledged, k);
        assert_eq!(result.replayed, all.len() - k);
    }

    #[test]
    fn test_ledger_holds_only_newer_moves_after_reconcile() {
        let env = Environment::open_field();
        let sim = MovementSimulator::default();
        let all = moves(6);

        let mut ledger = PredictionLedger::new();
        for m in &all {
            ledger.append(*m);
        }

        let snapshot = AuthoritativeSnapshot::new(VehicleState::default(), all[3]);
        reconcile(&sim, &snapshot, &mut ledger, &env);

        let remaining: Vec<f64> = ledger.iter().map(|m| m.timestamp).collect();
        let expected: Vec<f64> = all
            .iter()
            .filter(|m| m.timestamp > all[3].timestamp)
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(remaining, expected);
    }

    #[test]
    fn test_empty_ledger_yields_snapshot_verbatim() {
        let env = Environment::open_field();
        let sim = MovementSimulator::default();
        let mut ledger = PredictionLedger::new();
        ledger.append(Move::new(1.0, 0.0, 0.1, 1.0));

        let mut state = VehicleState::default();
        state.velocity = Vec3::new(3.0, 1.0, 0.0);
        state.pose.position = Vec3::new(-4.0, 2.0, 0.0);
        let snapshot = AuthoritativeSnapshot::new(state, Move::new(1.0, 0.0, 0.1, 2.0));

        let result = reconcile(&sim, &snapshot, &mut ledger, &env);

        assert!(ledger.is_empty());
        assert_eq!(result.state, state);
        assert_eq!(result.replayed, 0);
    }

    #[test]
    fn test_stale_snapshot_replays_everything() {
        let env = Environment::open_field();
        let sim = MovementSimulator::default();
        let all = moves(4);
        let mut ledger = PredictionLedger::new();
        for m in &all {
            ledger.append(*m);
        }

        let snapshot = AuthoritativeSnapshot::spawn(VehicleState::default(), 0.0);
        let result = reconcile(&sim, &snapshot, &mut ledger, &env);

        assert_eq!(result.acknowledged, 0);
        assert_eq!(result.state, simulate(&sim, VehicleState::default(), &all, &env));
    }
}
