//! Game facade.
//!
//! [`Game`] is shared between the driver loop, which calls [`Game::tick`],
//! and transport handlers, which join players and read state concurrently.
//! Locks are always taken in the order round, world, players, rng.

use bytes::Bytes;
use glam::DVec2;
use parking_lot::{Mutex, RwLock};
use protocol::{ItemRecord, PlayerRecord, Snapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::entity::Player;
use crate::error::EngineError;
use crate::faction::Faction;
use crate::kinematics;
use crate::observer::RoundObserver;
use crate::round::{Round, RoundRecord, RoundResult, RoundStatus, unix_millis};
use crate::spatial::CollisionTag;
use crate::store::{FactionScore, PlayerScore, RewardRequest, RoundStore, RoundTask};
use crate::votes::VoteTally;
use crate::world::{Capture, World};

/// Entries in each leaderboard of [`RoundInfo`].
const LEADERBOARD_LEN: usize = 3;

/// Signal from the engine to its driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundSignal {
    /// The round stopped; the driver should schedule the next one.
    RoundEnded { round: u64 },
}

/// Receiving ends handed out by [`Game::new`].
#[derive(Debug)]
pub struct GameChannels {
    /// Single-slot next-round signal.
    pub signals: mpsc::Receiver<RoundSignal>,
    /// Collaborator work for [`crate::store::spawn_dispatcher`].
    pub tasks: mpsc::UnboundedReceiver<RoundTask>,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// `(player, cell)` for every capture.
    pub captures: Vec<(u64, Capture)>,
    pub pickups: Vec<u32>,
    pub spawned_item: Option<u32>,
    /// Players whose motion was cut short by the segment limit.
    pub stalled: Vec<u64>,
    /// Set when this tick ended the round.
    pub ended: Option<RoundResult>,
}

/// State of the current round together with the store's leaderboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundInfo {
    pub round: RoundRecord,
    pub status: RoundStatus,
    pub votes: BTreeMap<Faction, i32>,
    pub top_factions: Vec<FactionScore>,
    pub top_players: Vec<PlayerScore>,
    pub last_winner: Option<Faction>,
}

pub struct Game {
    config: Config,
    round: Mutex<Round>,
    world: Mutex<World>,
    players: RwLock<BTreeMap<u64, Player>>,
    rng: Mutex<StdRng>,
    votes: VoteTally,
    frame_number: AtomicU32,
    /// Obstruction tags per faction, indexed by faction id.
    collision_tags: Vec<Vec<CollisionTag>>,
    signals: mpsc::Sender<RoundSignal>,
    tasks: mpsc::UnboundedSender<RoundTask>,
    observer: Arc<dyn RoundObserver>,
}

impl Game {
    pub fn new(config: Config, observer: Arc<dyn RoundObserver>) -> Result<(Self, GameChannels), EngineError> {
        config.validate()?;
        let world = World::new(config.grid)?;
        let rng = match config.game.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (signal_tx, signal_rx) = mpsc::channel(1);
        let (task_tx, task_rx) = mpsc::unbounded_channel();

        let game = Self {
            collision_tags: Faction::ALL.iter().map(|f| f.collision_priority()).collect(),
            config,
            round: Mutex::new(Round::default()),
            world: Mutex::new(world),
            players: RwLock::new(BTreeMap::new()),
            rng: Mutex::new(rng),
            votes: VoteTally::new(),
            frame_number: AtomicU32::new(0),
            signals: signal_tx,
            tasks: task_tx,
            observer,
        };
        let channels = GameChannels {
            signals: signal_rx,
            tasks: task_rx,
        };
        Ok((game, channels))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> RoundStatus {
        self.round.lock().status
    }

    pub fn round_record(&self) -> RoundRecord {
        self.round.lock().record.clone()
    }

    /// Advance the simulation by one step.
    ///
    /// Does nothing unless a round is running. Moves every player in id
    /// order, rolls for a pickup, then ends the round if its time is up.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let mut round = self.round.lock();
        if round.status != RoundStatus::Running {
            return report;
        }

        {
            let mut world = self.world.lock();
            let mut players = self.players.write();
            let multiplier = self.config.item.accelerator_multiplier;
            for player in players.values_mut() {
                let tags = &self.collision_tags[player.faction.id() as usize];
                let outcome = kinematics::advance(&mut world, player, tags, multiplier);
                if let Some(capture) = outcome.capture {
                    debug!(
                        player = player.id,
                        x = capture.x,
                        y = capture.y,
                        from = %capture.previous,
                        to = %capture.owner,
                        "Cell captured"
                    );
                    report.captures.push((player.id, capture));
                }
                report.pickups.extend(outcome.pickups);
                if outcome.stalled {
                    report.stalled.push(player.id);
                }
            }
            drop(players);

            let mut rng = self.rng.lock();
            report.spawned_item = world.try_spawn_item(&mut *rng, &self.config.item);
        }

        if round.expired(Instant::now()) {
            let result = self.stop_locked(&mut round);
            drop(round);
            self.observer.on_round_stop(&result);
            report.ended = Some(result);
        }
        report
    }

    /// Encode the current state as a snapshot frame. Every call takes the
    /// next frame number.
    pub fn serialize(&self) -> Result<Bytes, EngineError> {
        let frame_number = self.frame_number.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        let world = self.world.lock();
        let players = self.players.read();

        let snapshot = Snapshot {
            frame_number,
            grid: world.grid().serialize()?.into(),
            players: players
                .values()
                .map(|p| {
                    let origin = world.local_origin(p.body).unwrap_or_default();
                    PlayerRecord {
                        id: p.id,
                        radius: p.radius,
                        x: origin.x,
                        y: origin.y,
                    }
                })
                .collect(),
            items: world
                .items()
                .map(|item| {
                    let origin = item.origin() - world.offset();
                    ItemRecord {
                        id: item.id,
                        kind: item.kind.id(),
                        x: origin.x,
                        y: origin.y,
                    }
                })
                .collect(),
        };
        Ok(snapshot.encode()?)
    }

    /// Join a player to the running round.
    ///
    /// The player spawns on its faction's spawn cell heading in a random
    /// direction, and the faction gains a vote.
    pub fn add_player(&self, id: u64, faction: Faction) -> Result<Player, EngineError> {
        if !faction.is_playable() {
            return Err(EngineError::InvalidFaction(faction));
        }

        let player = {
            let round = self.round.lock();
            if round.status != RoundStatus::Running {
                return Err(EngineError::RoundNotRunning);
            }
            let mut world = self.world.lock();
            let mut players = self.players.write();
            if players.contains_key(&id) {
                return Err(EngineError::DuplicatePlayer(id));
            }

            let radius = self.config.player.radius;
            let center = world.spawn_point(faction, radius as f64);
            let angle = self.rng.lock().random_range(0.0..TAU);
            let velocity = DVec2::from_angle(angle) * self.config.player.speed;
            let body = world.insert_player_body(id, center, radius as f64);
            let player = Player::new(id, faction, radius, velocity, body);
            players.insert(id, player.clone());
            player
        };

        let votes = self.votes.increment(faction);
        info!(player = id, %faction, votes, "Player joined");
        self.observer.on_vote_change(faction, votes);
        Ok(player)
    }

    pub fn remove_player(&self, id: u64) -> Option<Player> {
        let mut world = self.world.lock();
        let player = self.players.write().remove(&id)?;
        world.remove_body(player.body);
        info!(player = id, "Player left");
        Some(player)
    }

    pub fn player(&self, id: u64) -> Option<Player> {
        self.players.read().get(&id).cloned()
    }

    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// Centre of a player's body in world coordinates.
    pub fn player_position(&self, id: u64) -> Option<DVec2> {
        let world = self.world.lock();
        let body = self.players.read().get(&id)?.body;
        world.body_center(body)
    }

    /// Current owner of cell `(x, y)`.
    pub fn cell(&self, x: u32, y: u32) -> Option<Faction> {
        self.world.lock().grid().get(x, y)
    }

    pub fn item_count(&self) -> usize {
        self.world.lock().item_count()
    }

    /// Leading faction and its cell count. Fixed once the round stops.
    pub fn winner(&self) -> (Faction, u32) {
        let round = self.round.lock();
        if let Some(result) = round.result {
            return result;
        }
        self.world.lock().grid().winner()
    }

    pub fn votes(&self) -> BTreeMap<Faction, i32> {
        self.votes.snapshot()
    }

    /// Start a round, wiping the grid, players, pickups and votes.
    ///
    /// Legal from NotStarted or Stopped.
    pub fn start_round(&self, reward_target: impl Into<String>) -> Result<RoundRecord, EngineError> {
        let record = {
            let mut round = self.round.lock();
            if round.status == RoundStatus::Running {
                return Err(EngineError::InvalidTransition(round.status));
            }
            self.reset_locked()?;

            let duration = Duration::from_secs(self.config.game.round_duration_secs);
            let now = unix_millis();
            round.seq += 1;
            round.record = RoundRecord {
                id: round.seq,
                started_at_ms: now,
                ends_at_ms: now + duration.as_millis() as u64,
                reward_target: reward_target.into(),
                ..RoundRecord::default()
            };
            round.deadline = Some(Instant::now() + duration);
            round.result = None;
            round.status = RoundStatus::Running;
            self.queue(RoundTask::CreateRound(round.record.clone()));
            round.record.clone()
        };

        info!(
            round = record.id,
            duration_secs = self.config.game.round_duration_secs,
            "Round started"
        );
        self.observer.on_round_start(&record);
        Ok(record)
    }

    /// Stop the running round now.
    pub fn end_round(&self) -> Result<RoundResult, EngineError> {
        let mut round = self.round.lock();
        if round.status != RoundStatus::Running {
            return Err(EngineError::RoundNotRunning);
        }
        let result = self.stop_locked(&mut round);
        drop(round);
        self.observer.on_round_stop(&result);
        Ok(result)
    }

    /// Return to NotStarted after round `round_id` stopped.
    ///
    /// Ignored if a different round has started since.
    pub fn advance_to_next_round(&self, round_id: u64) -> Result<bool, EngineError> {
        let mut round = self.round.lock();
        if round.status != RoundStatus::Stopped || round.seq != round_id {
            debug!(round = round_id, current = round.seq, "Ignoring stale next-round signal");
            return Ok(false);
        }
        self.reset_locked()?;
        round.status = RoundStatus::NotStarted;
        round.deadline = None;
        round.result = None;
        info!(round = round_id, "Ready for next round");
        Ok(true)
    }

    /// Round record, votes and store leaderboards.
    pub fn round_info(&self, store: &dyn RoundStore) -> anyhow::Result<RoundInfo> {
        let (round, status) = {
            let round = self.round.lock();
            (round.record.clone(), round.status)
        };
        Ok(RoundInfo {
            round,
            status,
            votes: self.votes(),
            top_factions: store.top_factions(LEADERBOARD_LEN)?,
            top_players: store.top_players(LEADERBOARD_LEN)?,
            last_winner: store.last_winner()?,
        })
    }

    /// Decide the winner and queue the round-end work. Caller holds the round lock.
    fn stop_locked(&self, round: &mut Round) -> RoundResult {
        let (winner, score) = self.world.lock().grid().winner();
        let winners: Vec<u64> = self
            .players
            .read()
            .values()
            .filter(|p| p.faction == winner)
            .map(|p| p.id)
            .collect();

        round.status = RoundStatus::Stopped;
        round.deadline = None;
        round.result = Some((winner, score));
        round.record.ended_at_ms = Some(unix_millis());
        round.record.winner = Some(winner);
        round.record.score = score;

        let millis = unix_millis();
        let reward = RewardRequest {
            collection_id: self.config.reward.collection_id,
            to: round.record.reward_target.clone(),
            name: format!("{}{}", self.config.reward.nft_prefix, millis),
            description: format!("victory reward {millis}"),
        };
        self.queue(RoundTask::FinishRound {
            record: round.record.clone(),
            winners,
            reward,
        });

        if let Err(e) = self.signals.try_send(RoundSignal::RoundEnded { round: round.seq }) {
            debug!("Next-round signal not delivered: {e}");
        }

        info!(round = round.record.id, %winner, score, "Round stopped");
        RoundResult {
            round_id: round.record.id,
            winner,
            score,
            winner_votes: self.votes.get(winner),
            next_round_in: Duration::from_secs(self.config.game.round_interval_secs),
        }
    }

    /// Fresh grid, no players, pickups or votes. Caller holds the round lock.
    fn reset_locked(&self) -> Result<(), EngineError> {
        let mut world = self.world.lock();
        *world = World::new(self.config.grid)?;
        self.players.write().clear();
        self.votes.reset();
        self.frame_number.store(0, Ordering::Release);
        Ok(())
    }

    fn queue(&self, task: RoundTask) {
        if self.tasks.send(task).is_err() {
            warn!("Round task dispatcher is gone, dropping task");
        }
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("status", &self.status())
            .field("players", &self.player_count())
            .finish()
    }
}
