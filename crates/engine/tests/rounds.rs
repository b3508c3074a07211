use std::collections::BTreeMap;
use std::sync::Arc;

use engine::store::apply_task;
use engine::{
    Config, DisabledMinter, EngineError, Faction, Game, GameChannels, MemoryStore, NoopObserver,
    RoundStatus,
};
use protocol::{Snapshot, cells};

fn config() -> Config {
    let mut config = Config::default();
    config.game.seed = Some(2024);
    config.item.frame_chance = 0;
    config
}

fn running(config: Config) -> (Game, GameChannels) {
    let (game, channels) = Game::new(config, Arc::new(NoopObserver)).unwrap();
    game.start_round("reward-target").unwrap();
    (game, channels)
}

fn grid_cells(game: &Game) -> Vec<u8> {
    let snapshot = Snapshot::decode(game.serialize().unwrap()).unwrap();
    let dims = game.config().grid;
    cells::unpack(&snapshot.grid, (dims.rows * dims.cols) as usize).unwrap()
}

#[test]
fn votes_follow_joins() {
    let (game, _channels) = running(config());
    for id in 0..3 {
        game.add_player(id, Faction::Btc).unwrap();
    }
    game.add_player(3, Faction::Eth).unwrap();
    assert_eq!(
        game.votes(),
        BTreeMap::from([(Faction::Btc, 3), (Faction::Eth, 1)])
    );
}

#[test]
fn concurrent_joins_lose_no_votes() {
    let (game, _channels) = running(config());
    let game = Arc::new(game);
    let handles: Vec<_> = (0..16u64)
        .map(|t| {
            let game = Arc::clone(&game);
            std::thread::spawn(move || {
                for i in 0..25 {
                    game.add_player(t * 100 + i, Faction::Bnb).unwrap();
                    if i % 5 == 0 {
                        game.tick();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(game.votes().get(&Faction::Bnb), Some(&400));
    assert_eq!(game.player_count(), 400);
}

#[test]
fn invalid_and_duplicate_joins_rejected() {
    let (game, _channels) = running(config());
    assert!(matches!(
        game.add_player(1, Faction::Neutral),
        Err(EngineError::InvalidFaction(Faction::Neutral))
    ));
    assert!(game.votes().is_empty());
    assert_eq!(game.player_count(), 0);

    game.add_player(1, Faction::Matic).unwrap();
    assert!(matches!(
        game.add_player(1, Faction::Btc),
        Err(EngineError::DuplicatePlayer(1))
    ));
    assert_eq!(game.votes(), BTreeMap::from([(Faction::Matic, 1)]));
    assert_eq!(game.player(1).map(|p| p.faction), Some(Faction::Matic));
}

#[test]
fn motionless_player_on_tiny_grid() {
    let mut config = config();
    config.grid.rows = 2;
    config.grid.cols = 2;
    config.player.speed = 0.0;
    let (game, _channels) = running(config);
    let before = grid_cells(&game);
    game.add_player(1, Faction::Btc).unwrap();
    let position = game.player_position(1).unwrap();

    let report = game.tick();
    assert!(report.captures.is_empty());
    assert!(report.stalled.is_empty());
    assert_eq!(grid_cells(&game), before);
    assert_eq!(game.player_position(1), Some(position));
}

#[test]
fn expired_round_goes_to_initial_plurality() {
    let mut config = config();
    config.game.round_duration_secs = 0;
    let (game, _channels) = running(config);

    let report = game.tick();
    let ended = report.ended.unwrap();
    assert_eq!((ended.winner, ended.score), (Faction::Btc, 36));
    assert_eq!(game.status(), RoundStatus::Stopped);
    assert_eq!(game.winner(), (Faction::Btc, 36));

    // Stopped rounds no longer tick.
    assert_eq!(game.tick(), Default::default());
}

#[test]
fn at_most_one_capture_per_player_per_tick() {
    let mut config = config();
    config.player.speed = 25.0;
    let (game, _channels) = running(config);
    let mut id = 0;
    for faction in Faction::PLAYABLE {
        for _ in 0..4 {
            game.add_player(id, faction).unwrap();
            id += 1;
        }
    }

    let mut total = 0;
    let mut before = grid_cells(&game);
    for _ in 0..200 {
        let report = game.tick();
        let mut per_player = BTreeMap::new();
        for (player, _) in &report.captures {
            *per_player.entry(*player).or_insert(0) += 1;
        }
        assert!(per_player.values().all(|&n| n == 1));

        let after = grid_cells(&game);
        let changed = before.iter().zip(&after).filter(|(a, b)| a != b).count();
        assert!(changed <= report.captures.len());
        total += report.captures.len();
        before = after;
    }
    assert!(total > 0);
}

#[test]
fn rebounds_preserve_speed() {
    let mut config = config();
    config.player.speed = 7.5;
    let (game, _channels) = running(config);
    for (id, faction) in Faction::PLAYABLE.into_iter().enumerate() {
        game.add_player(id as u64, faction).unwrap();
    }
    for _ in 0..500 {
        game.tick();
    }
    for id in 0..5 {
        let speed = game.player(id).unwrap().speed();
        assert!((speed - 7.5).abs() < 1e-6, "player {id} speed {speed}");
    }
}

#[test]
fn pickups_accelerate_players() {
    let mut config = config();
    config.item.frame_chance = 1;
    config.item.max_active = 64;
    config.player.speed = 6.0;
    let (game, _channels) = running(config);
    for (id, faction) in Faction::PLAYABLE.into_iter().enumerate() {
        game.add_player(id as u64, faction).unwrap();
    }

    let mut pickups = 0;
    for _ in 0..500 {
        pickups += game.tick().pickups.len();
    }
    let fastest = (0..5).map(|id| game.player(id).unwrap().speed()).fold(0.0, f64::max);
    assert!(pickups > 0);
    assert!(fastest > 6.0);
    assert!(game.item_count() <= 64);
}

#[test]
fn round_end_reaches_store() {
    let (game, mut channels) = running(config());
    game.add_player(10, Faction::Btc).unwrap();
    game.add_player(11, Faction::Eth).unwrap();
    game.add_player(12, Faction::Btc).unwrap();
    let result = game.end_round().unwrap();
    assert_eq!(result.winner_votes, 2);

    let store = MemoryStore::new();
    while let Ok(task) = channels.tasks.try_recv() {
        apply_task(&store, &DisabledMinter, task);
    }

    let stored = store.round(result.round_id).unwrap();
    assert_eq!(stored.winner, Some(Faction::Btc));
    assert_eq!(stored.score, 36);
    assert_eq!(stored.reward_target, "reward-target");
    assert!(stored.ended_at_ms.is_some());
    assert_eq!(store.player_score(10), 1);
    assert_eq!(store.player_score(12), 1);
    assert_eq!(store.player_score(11), 0);

    let info = game.round_info(&store).unwrap();
    assert_eq!(info.status, RoundStatus::Stopped);
    assert_eq!(info.last_winner, Some(Faction::Btc));
    assert_eq!(info.top_factions[0].faction, Faction::Btc);
    assert_eq!(info.top_players[0].player_id, 10);
    assert_eq!(info.votes.len(), 2);
}
