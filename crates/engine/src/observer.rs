//! Round notifications.
//!
//! Observers are called synchronously from the engine after its locks are
//! released. Implementations must not block.

use tokio::sync::broadcast;

use crate::faction::Faction;
use crate::round::{RoundRecord, RoundResult};

pub trait RoundObserver: Send + Sync {
    fn on_round_start(&self, _round: &RoundRecord) {}
    fn on_round_stop(&self, _result: &RoundResult) {}
    fn on_vote_change(&self, _faction: Faction, _votes: i32) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RoundObserver for NoopObserver {}

/// Notification published by [`BroadcastObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    RoundStarted(RoundRecord),
    RoundStopped(RoundResult),
    VoteChanged { faction: Faction, votes: i32 },
}

/// Forwards notifications to a broadcast channel for the transport layer.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl RoundObserver for BroadcastObserver {
    fn on_round_start(&self, round: &RoundRecord) {
        self.publish(EngineEvent::RoundStarted(round.clone()));
    }

    fn on_round_stop(&self, result: &RoundResult) {
        self.publish(EngineEvent::RoundStopped(result.clone()));
    }

    fn on_vote_change(&self, faction: Faction, votes: i32) {
        self.publish(EngineEvent::VoteChanged { faction, votes });
    }
}
