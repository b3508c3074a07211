//! External collaborators: round persistence and reward minting.
//!
//! The engine never calls these on the tick path. Round transitions queue a
//! [`RoundTask`] which the dispatcher applies on a blocking thread.

use anyhow::bail;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::faction::Faction;
use crate::round::RoundRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactionScore {
    pub faction: Faction,
    pub score: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerScore {
    pub player_id: u64,
    pub score: u64,
}

/// Persistence of rounds and scores.
pub trait RoundStore: Send + Sync {
    fn create_round(&self, round: &RoundRecord) -> anyhow::Result<()>;
    fn update_round(&self, round: &RoundRecord) -> anyhow::Result<()>;
    fn increase_faction_score(&self, faction: Faction) -> anyhow::Result<()>;
    fn increase_player_score(&self, player_id: u64) -> anyhow::Result<()>;
    /// Highest scoring factions, best first.
    fn top_factions(&self, n: usize) -> anyhow::Result<Vec<FactionScore>>;
    /// Highest scoring players, best first.
    fn top_players(&self, n: usize) -> anyhow::Result<Vec<PlayerScore>>;
    /// Winner of the most recent finished round.
    fn last_winner(&self) -> anyhow::Result<Option<Faction>>;
}

/// A minted victory reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardAsset {
    pub id: String,
    pub name: String,
}

/// Issues the end-of-round reward.
pub trait RewardMinter: Send + Sync {
    fn mint_victory_reward(
        &self,
        collection_id: i64,
        to: &str,
        name: &str,
        description: &str,
    ) -> anyhow::Result<RewardAsset>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardRequest {
    pub collection_id: i64,
    pub to: String,
    pub name: String,
    pub description: String,
}

/// Deferred collaborator work produced by round transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundTask {
    CreateRound(RoundRecord),
    FinishRound {
        record: RoundRecord,
        /// Players of the winning faction.
        winners: Vec<u64>,
        reward: RewardRequest,
    },
}

/// Apply one task. Failures are logged and never propagated.
pub fn apply_task(store: &dyn RoundStore, minter: &dyn RewardMinter, task: RoundTask) {
    match task {
        RoundTask::CreateRound(record) => {
            if let Err(e) = store.create_round(&record) {
                error!(round = record.id, "Failed to create round: {e:#}");
            }
        }
        RoundTask::FinishRound {
            record,
            winners,
            reward,
        } => {
            if let Err(e) = store.update_round(&record) {
                error!(round = record.id, "Failed to update round: {e:#}");
            }
            if let Some(winner) = record.winner.filter(|f| f.is_playable()) {
                if let Err(e) = store.increase_faction_score(winner) {
                    error!(round = record.id, %winner, "Failed to increase faction score: {e:#}");
                }
                for player_id in winners {
                    if let Err(e) = store.increase_player_score(player_id) {
                        error!(round = record.id, player_id, "Failed to increase player score: {e:#}");
                    }
                }
            }
            match minter.mint_victory_reward(reward.collection_id, &reward.to, &reward.name, &reward.description) {
                Ok(asset) => info!(round = record.id, asset = %asset.id, to = %reward.to, "Victory reward minted"),
                Err(e) => warn!(round = record.id, to = %reward.to, "Failed to mint victory reward: {e:#}"),
            }
        }
    }
}

/// Run queued tasks on a blocking thread until every sender is dropped.
pub fn spawn_dispatcher(
    store: Arc<dyn RoundStore>,
    minter: Arc<dyn RewardMinter>,
    mut tasks: mpsc::UnboundedReceiver<RoundTask>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(task) = tasks.blocking_recv() {
            apply_task(store.as_ref(), minter.as_ref(), task);
        }
        debug!("Round task dispatcher stopped");
    })
}

#[derive(Debug, Default)]
struct MemoryInner {
    rounds: BTreeMap<u64, RoundRecord>,
    faction_scores: BTreeMap<Faction, u64>,
    player_scores: HashMap<u64, u64>,
}

/// In-process store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round(&self, id: u64) -> Option<RoundRecord> {
        self.inner.lock().rounds.get(&id).cloned()
    }

    pub fn faction_score(&self, faction: Faction) -> u64 {
        self.inner.lock().faction_scores.get(&faction).copied().unwrap_or(0)
    }

    pub fn player_score(&self, player_id: u64) -> u64 {
        self.inner.lock().player_scores.get(&player_id).copied().unwrap_or(0)
    }
}

impl RoundStore for MemoryStore {
    fn create_round(&self, round: &RoundRecord) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        if inner.rounds.contains_key(&round.id) {
            bail!("round {} already exists", round.id);
        }
        inner.rounds.insert(round.id, round.clone());
        Ok(())
    }

    fn update_round(&self, round: &RoundRecord) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        match inner.rounds.get_mut(&round.id) {
            Some(existing) => {
                *existing = round.clone();
                Ok(())
            }
            None => bail!("round {} not found", round.id),
        }
    }

    fn increase_faction_score(&self, faction: Faction) -> anyhow::Result<()> {
        *self.inner.lock().faction_scores.entry(faction).or_default() += 1;
        Ok(())
    }

    fn increase_player_score(&self, player_id: u64) -> anyhow::Result<()> {
        *self.inner.lock().player_scores.entry(player_id).or_default() += 1;
        Ok(())
    }

    fn top_factions(&self, n: usize) -> anyhow::Result<Vec<FactionScore>> {
        let inner = self.inner.lock();
        let mut scores: Vec<FactionScore> = inner
            .faction_scores
            .iter()
            .map(|(&faction, &score)| FactionScore { faction, score })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.faction.cmp(&b.faction)));
        scores.truncate(n);
        Ok(scores)
    }

    fn top_players(&self, n: usize) -> anyhow::Result<Vec<PlayerScore>> {
        let inner = self.inner.lock();
        let mut scores: Vec<PlayerScore> = inner
            .player_scores
            .iter()
            .map(|(&player_id, &score)| PlayerScore { player_id, score })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.player_id.cmp(&b.player_id)));
        scores.truncate(n);
        Ok(scores)
    }

    fn last_winner(&self) -> anyhow::Result<Option<Faction>> {
        let inner = self.inner.lock();
        Ok(inner.rounds.values().rev().find_map(|r| r.winner))
    }
}

/// Minter used when no reward backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMinter;

impl RewardMinter for DisabledMinter {
    fn mint_victory_reward(
        &self,
        _collection_id: i64,
        to: &str,
        name: &str,
        _description: &str,
    ) -> anyhow::Result<RewardAsset> {
        debug!(to, name, "Reward minting disabled, skipping");
        Ok(RewardAsset {
            id: String::new(),
            name: name.to_string(),
        })
    }
}
