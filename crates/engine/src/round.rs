//! Round lifecycle types.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::faction::Faction;

/// Round phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundStatus {
    /// Waiting for `start_round`.
    #[default]
    NotStarted,
    /// Players move and capture cells.
    Running,
    /// Winner decided; waiting for the next-round signal.
    Stopped,
}

/// Persisted summary of one round. Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoundRecord {
    /// Assigned by the engine on start, counting up from 1.
    pub id: u64,
    pub started_at_ms: u64,
    /// Scheduled end.
    pub ends_at_ms: u64,
    /// Actual end, once stopped.
    pub ended_at_ms: Option<u64>,
    pub winner: Option<Faction>,
    pub score: u32,
    /// Account receiving the victory reward.
    pub reward_target: String,
}

/// Outcome of a finished round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub round_id: u64,
    pub winner: Faction,
    pub score: u32,
    /// Votes cast for the winner this round.
    pub winner_votes: i32,
    /// Delay before the engine returns to NotStarted.
    pub next_round_in: Duration,
}

/// Internal clock state of the current round.
#[derive(Debug, Default)]
pub(crate) struct Round {
    pub status: RoundStatus,
    pub record: RoundRecord,
    /// Local id, bumped on every start. Guards stale next-round signals.
    pub seq: u64,
    pub deadline: Option<Instant>,
    /// Cached once the round stops.
    pub result: Option<(Faction, u32)>,
}

impl Round {
    pub fn expired(&self, now: Instant) -> bool {
        self.status == RoundStatus::Running && self.deadline.is_some_and(|d| now >= d)
    }
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_only_while_running() {
        let now = Instant::now();
        let mut round = Round {
            deadline: Some(now + Duration::from_secs(1)),
            ..Round::default()
        };
        let later = now + Duration::from_secs(2);
        assert!(!round.expired(later));
        round.status = RoundStatus::Running;
        assert!(!round.expired(now));
        assert!(round.expired(later));
        round.deadline = None;
        assert!(!round.expired(later));
    }
}
