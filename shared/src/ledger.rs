//! Moves the controlling client has simulated but the authority has not yet confirmed

use crate::moves::Move;
use log::warn;
use std::collections::VecDeque;

/// Most unacknowledged moves kept; about 17 seconds at 60Hz.
pub const MAX_PENDING_MOVES: usize = 1024;

/// Unacknowledged moves in creation order, strictly increasing by timestamp.
#[derive(Debug, Clone, Default)]
pub struct PredictionLedger {
    moves: VecDeque<Move>,
}

impl PredictionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `kart_move`. A move not strictly newer than the last entry is
    /// refused and `false` is returned, keeping trimming by timestamp exact.
    /// Once [`MAX_PENDING_MOVES`] are held the oldest is dropped to make room.
    pub fn append(&mut self, kart_move: Move) -> bool {
        if let Some(last) = self.moves.back() {
            if kart_move.timestamp <= last.timestamp {
                warn!(
                    "Refusing out-of-order move at {:.4}s (last recorded {:.4}s)",
                    kart_move.timestamp, last.timestamp
                );
                return false;
            }
        }
        if self.moves.len() >= MAX_PENDING_MOVES {
            if let Some(dropped) = self.moves.pop_front() {
                warn!(
                    "Ledger full, dropping unacknowledged move at {:.4}s",
                    dropped.timestamp
                );
            }
        }
        self.moves.push_back(kart_move);
        true
    }

    /// Drops every move stamped at or before `acknowledged`. Returns how many were dropped.
    pub fn clear_acknowledged(&mut self, acknowledged: f64) -> usize {
        let before = self.moves.len();
        while self
            .moves
            .front()
            .is_some_and(|kart_move| kart_move.timestamp <= acknowledged)
        {
            self.moves.pop_front();
        }
        before - self.moves.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn last(&self) -> Option<&Move> {
        self.moves.back()
    }
}
