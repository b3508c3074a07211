//! Async driver loop.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, info, warn};

use crate::game::{Game, RoundSignal};

/// Tick `game` at the configured rate until `shutdown` flips or its sender
/// is dropped.
///
/// After every tick the state is serialized and published on `frames` when
/// anyone is listening. A round-ended signal schedules the return to
/// NotStarted after the round interval, and with `auto_restart` the next
/// round starts right away.
pub async fn run_game_loop(
    game: Arc<Game>,
    mut signals: mpsc::Receiver<RoundSignal>,
    frames: broadcast::Sender<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    let config = game.config().game.clone();
    let period = Duration::from_secs_f64(1.0 / config.fps as f64);
    let round_interval = Duration::from_secs(config.round_interval_secs);

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let next_round = sleep(Duration::ZERO);
    tokio::pin!(next_round);
    let mut pending: Option<u64> = None;

    info!(fps = config.fps, "Game loop started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Game loop shutting down");
                break;
            }
            Some(signal) = signals.recv() => match signal {
                RoundSignal::RoundEnded { round } => {
                    debug!(round, after = ?round_interval, "Next round scheduled");
                    pending = Some(round);
                    next_round.as_mut().reset(Instant::now() + round_interval);
                }
            },
            () = &mut next_round, if pending.is_some() => {
                let Some(round) = pending.take() else { continue };
                match game.advance_to_next_round(round) {
                    Ok(true) if config.auto_restart => {
                        if let Err(e) = game.start_round(config.default_reward_target.clone()) {
                            warn!("Failed to start next round: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => error!(round, "Failed to reset round: {e}"),
                }
            }
            _ = ticker.tick() => {
                let tick_start = std::time::Instant::now();
                let report = game.tick();
                if !report.stalled.is_empty() {
                    warn!(players = ?report.stalled, "Tick cut short for some players");
                }
                let tick_time = tick_start.elapsed();
                if tick_time > period {
                    warn!("Slow tick: {:.3}ms (budget: {:.1}ms)", tick_time.as_secs_f64() * 1000.0, period.as_secs_f64() * 1000.0);
                }

                if frames.receiver_count() > 0 {
                    match game.serialize() {
                        Ok(frame) => {
                            let _ = frames.send(frame);
                        }
                        Err(e) => error!("Failed to serialize frame: {e}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::faction::Faction;
    use crate::observer::{BroadcastObserver, EngineEvent};
    use crate::round::RoundStatus;
    use tokio::time::timeout;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.game.fps = 200;
        config.game.round_duration_secs = 0;
        config.game.round_interval_secs = 0;
        config.game.seed = Some(1);
        config
    }

    #[tokio::test]
    async fn test_round_ends_and_resets() {
        let observer = Arc::new(BroadcastObserver::new(16));
        let mut events = observer.subscribe();
        let (game, channels) = Game::new(fast_config(), observer.clone()).unwrap();
        let game = Arc::new(game);
        let (frames, _) = broadcast::channel(4);
        let (stop_tx, stop_rx) = watch::channel(false);

        game.start_round("alice").unwrap();
        let handle = tokio::spawn(run_game_loop(game.clone(), channels.signals, frames, stop_rx));

        let result = timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(EngineEvent::RoundStopped(result)) = events.recv().await {
                    return result;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!((result.winner, result.score), (Faction::Btc, 36));

        timeout(Duration::from_secs(5), async {
            while game.status() != RoundStatus::NotStarted {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_frames_published() {
        let mut config = fast_config();
        config.game.round_duration_secs = 60;
        let (game, channels) = Game::new(config, Arc::new(crate::observer::NoopObserver)).unwrap();
        let game = Arc::new(game);
        let (frames, mut rx) = broadcast::channel(64);
        let (stop_tx, stop_rx) = watch::channel(false);

        game.start_round("").unwrap();
        game.add_player(1, Faction::Avax).unwrap();
        let handle = tokio::spawn(run_game_loop(game.clone(), channels.signals, frames, stop_rx));

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        let first = protocol::Snapshot::decode(first).unwrap();
        let second = protocol::Snapshot::decode(second).unwrap();
        assert_eq!(second.frame_number, first.frame_number + 1);
        assert_eq!(first.players.len(), 1);

        drop(stop_tx);
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_auto_restart_uses_default_target() {
        let mut config = fast_config();
        config.game.auto_restart = true;
        config.game.default_reward_target = "bob".into();
        let observer = Arc::new(BroadcastObserver::new(256));
        let mut events = observer.subscribe();
        let (game, channels) = Game::new(config, observer.clone()).unwrap();
        let game = Arc::new(game);
        let (frames, _) = broadcast::channel(4);
        let (stop_tx, stop_rx) = watch::channel(false);

        game.start_round("alice").unwrap();
        let handle = tokio::spawn(run_game_loop(game.clone(), channels.signals, frames, stop_rx));

        let started = timeout(Duration::from_secs(5), async {
            let mut started = Vec::new();
            while started.len() < 3 {
                if let Ok(EngineEvent::RoundStarted(record)) = events.recv().await {
                    started.push((record.id, record.reward_target));
                }
            }
            started
        })
        .await
        .unwrap();
        assert_eq!(
            started,
            vec![(1, "alice".to_string()), (2, "bob".to_string()), (3, "bob".to_string())]
        );

        stop_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
