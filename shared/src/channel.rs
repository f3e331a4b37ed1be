//! In-process replication between participants sharing one runtime
//!
//! Moves travel on an unbounded mpsc queue, so they arrive in order and none
//! are dropped. Snapshots travel on a watch channel: a subscriber that falls
//! behind only ever sees the newest value.

use crate::moves::Move;
use crate::snapshot::AuthoritativeSnapshot;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone)]
pub struct MoveSender {
    tx: mpsc::UnboundedSender<Move>,
}

impl MoveSender {
    /// Queues `kart_move`. Returns false once the authority side is gone.
    pub fn send(&self, kart_move: Move) -> bool {
        self.tx.send(kart_move).is_ok()
    }
}

#[derive(Debug)]
pub struct MoveReceiver {
    rx: mpsc::UnboundedReceiver<Move>,
}

impl MoveReceiver {
    pub async fn recv(&mut self) -> Option<Move> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Move> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&mut self) -> Vec<Move> {
        let mut moves = Vec::new();
        while let Ok(kart_move) = self.rx.try_recv() {
            moves.push(kart_move);
        }
        moves
    }
}

pub fn move_channel() -> (MoveSender, MoveReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MoveSender { tx }, MoveReceiver { rx })
}

#[derive(Debug)]
pub struct SnapshotPublisher {
    tx: watch::Sender<Option<AuthoritativeSnapshot>>,
}

impl SnapshotPublisher {
    /// Replaces the replicated value. Never blocks, even with no subscribers.
    pub fn publish(&self, snapshot: AuthoritativeSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }

    pub fn subscribe(&self) -> SnapshotSubscriber {
        SnapshotSubscriber {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotSubscriber {
    rx: watch::Receiver<Option<AuthoritativeSnapshot>>,
}

impl SnapshotSubscriber {
    /// The newest snapshot, if one was published since the last poll.
    pub fn poll(&mut self) -> Option<AuthoritativeSnapshot> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        *self.rx.borrow_and_update()
    }

    /// Waits for the next published snapshot. `None` once the publisher is dropped.
    pub async fn changed(&mut self) -> Option<AuthoritativeSnapshot> {
        self.rx.changed().await.ok()?;
        *self.rx.borrow_and_update()
    }

    pub fn latest(&self) -> Option<AuthoritativeSnapshot> {
        *self.rx.borrow()
    }
}

pub fn snapshot_channel() -> (SnapshotPublisher, SnapshotSubscriber) {
    let (tx, rx) = watch::channel(None);
    (SnapshotPublisher { tx }, SnapshotSubscriber { rx })
}
