//! Tick-stepped territory engine for gridwar.
//!
//! Bouncing players claim grid cells for their faction; when the round
//! timer runs out the faction owning the most cells wins.

pub mod collision;
pub mod config;
pub mod entity;
pub mod error;
pub mod faction;
pub mod game;
pub mod grid;
pub mod kinematics;
pub mod observer;
pub mod round;
pub mod server;
pub mod spatial;
pub mod store;
pub mod votes;
pub mod world;

pub use config::Config;
pub use error::EngineError;
pub use faction::Faction;
pub use game::{Game, GameChannels, RoundInfo, RoundSignal, TickReport};
pub use observer::{BroadcastObserver, EngineEvent, NoopObserver, RoundObserver};
pub use round::{RoundRecord, RoundResult, RoundStatus};
pub use server::run_game_loop;
pub use store::{DisabledMinter, MemoryStore, RewardMinter, RoundStore, spawn_dispatcher};
