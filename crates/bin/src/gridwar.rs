//! Gridwar - headless engine process

use bytes::Bytes;
use engine::{BroadcastObserver, Config, DisabledMinter, EngineEvent, Game, MemoryStore};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,engine=debug")),
        )
        .init();

    info!("Gridwar v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(CONFIG_PATH)?;
    info!("Loaded configuration");
    info!("  Grid: {}x{} cells", config.grid.cols, config.grid.rows);
    info!("  Round: {}s, interval {}s", config.game.round_duration_secs, config.game.round_interval_secs);
    info!("  Tick rate: {} fps", config.game.fps);

    let observer = Arc::new(BroadcastObserver::new(256));
    let mut events = observer.subscribe();
    let (game, channels) = Game::new(config, observer)?;
    let game = Arc::new(game);

    let store = Arc::new(MemoryStore::new());
    let dispatcher = engine::spawn_dispatcher(store, Arc::new(DisabledMinter), channels.tasks);

    let (frames, _) = broadcast::channel::<Bytes>(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let game_loop = tokio::spawn(engine::run_game_loop(
        game.clone(),
        channels.signals,
        frames,
        shutdown_rx,
    ));

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::RoundStopped(result) => info!(
                    round = result.round_id,
                    winner = %result.winner,
                    score = result.score,
                    votes = result.winner_votes,
                    next_in_secs = result.next_round_in.as_secs(),
                    "Round summary"
                ),
                EngineEvent::RoundStarted(_) | EngineEvent::VoteChanged { .. } => {}
            }
        }
    });

    let target = game.config().game.default_reward_target.clone();
    game.start_round(target)?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = game_loop.await {
        warn!("Game loop ended abnormally: {e}");
    }

    // Dropping the last game handle closes the task queue.
    drop(game);
    if let Err(e) = dispatcher.await {
        warn!("Dispatcher ended abnormally: {e}");
    }
    Ok(())
}
