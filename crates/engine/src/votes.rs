//! Per-faction join counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::faction::Faction;

/// Lock-free vote counters, one per faction.
#[derive(Debug, Default)]
pub struct VoteTally {
    counts: [AtomicI32; Faction::ALL.len()],
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one vote and return the new count.
    pub fn increment(&self, faction: Faction) -> i32 {
        self.counts[faction.id() as usize].fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn get(&self, faction: Faction) -> i32 {
        self.counts[faction.id() as usize].load(Ordering::Acquire)
    }

    /// Factions with at least one vote.
    pub fn snapshot(&self) -> BTreeMap<Faction, i32> {
        Faction::ALL
            .into_iter()
            .filter_map(|f| {
                let n = self.get(f);
                (n != 0).then_some((f, n))
            })
            .collect()
    }

    pub fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_skips_empty() {
        let tally = VoteTally::new();
        for _ in 0..3 {
            tally.increment(Faction::Btc);
        }
        assert_eq!(tally.increment(Faction::Eth), 1);
        assert_eq!(
            tally.snapshot(),
            BTreeMap::from([(Faction::Btc, 3), (Faction::Eth, 1)])
        );
        tally.reset();
        assert!(tally.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_increments() {
        let tally = Arc::new(VoteTally::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tally = Arc::clone(&tally);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        tally.increment(Faction::Avax);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tally.get(Faction::Avax), 8000);
    }
}
