//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::EngineError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub item: ItemConfig,
    #[serde(default)]
    pub reward: RewardConfig,
}

impl Config {
    /// Load configuration from `path`, writing the defaults there if the file is missing.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config: Self = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            info!(path = %path.display(), "No config found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let g = &self.grid;
        if g.rows == 0 || g.cols == 0 {
            return Err(EngineError::Config(format!(
                "grid must have at least one cell, got {}x{}",
                g.rows, g.cols
            )));
        }
        if g.cell_width == 0 || g.cell_height == 0 {
            return Err(EngineError::Config("cell size must be non-zero".into()));
        }
        if self.player.radius == 0 {
            return Err(EngineError::Config("player radius must be non-zero".into()));
        }
        if !(self.player.speed.is_finite() && self.player.speed >= 0.0) {
            return Err(EngineError::Config("player speed must be finite and >= 0".into()));
        }
        if !(self.item.accelerator_multiplier >= 1.0) {
            return Err(EngineError::Config(
                "accelerator multiplier must be at least 1".into(),
            ));
        }
        if self.item.radius <= 0.0 {
            return Err(EngineError::Config("item radius must be positive".into()));
        }
        if self.game.fps == 0 {
            return Err(EngineError::Config("fps must be non-zero".into()));
        }
        Ok(())
    }
}

/// Round timing and driver settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    /// Simulation ticks per second.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Length of a round.
    #[serde(default = "default_round_duration")]
    pub round_duration_secs: u64,
    /// Pause between a round ending and the engine returning to NotStarted.
    #[serde(default = "default_round_interval")]
    pub round_interval_secs: u64,
    /// Start the next round automatically after the interval.
    #[serde(default)]
    pub auto_restart: bool,
    /// Reward target used for automatically started rounds.
    #[serde(default)]
    pub default_reward_target: String,
    /// Fixed RNG seed. Unset means seeded from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            round_duration_secs: default_round_duration(),
            round_interval_secs: default_round_interval(),
            auto_restart: false,
            default_reward_target: String::new(),
            seed: None,
        }
    }
}

fn default_fps() -> u32 {
    30
}
fn default_round_duration() -> u64 {
    300
}
fn default_round_interval() -> u64 {
    30
}

/// Grid dimensions in cells and pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct GridConfig {
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default = "default_cols")]
    pub cols: u32,
    #[serde(default = "default_cell_size")]
    pub cell_width: u32,
    #[serde(default = "default_cell_size")]
    pub cell_height: u32,
    /// Gap between neighbouring cells.
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    /// Thickness of the boundary walls.
    #[serde(default = "default_edge_width")]
    pub edge_width: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
            cell_width: default_cell_size(),
            cell_height: default_cell_size(),
            line_width: default_line_width(),
            edge_width: default_edge_width(),
        }
    }
}

fn default_rows() -> u32 {
    30
}
fn default_cols() -> u32 {
    40
}
fn default_cell_size() -> u32 {
    20
}
fn default_line_width() -> u32 {
    1
}
fn default_edge_width() -> u32 {
    6
}

/// Player body settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_radius")]
    pub radius: u16,
    /// Initial speed in pixels per tick; direction is random.
    #[serde(default = "default_player_speed")]
    pub speed: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            radius: default_player_radius(),
            speed: default_player_speed(),
        }
    }
}

fn default_player_radius() -> u16 {
    15
}
fn default_player_speed() -> f64 {
    2.0
}

/// Pickup settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemConfig {
    /// One in `frame_chance` ticks spawns a pickup. Zero disables spawning.
    #[serde(default = "default_item_frame_chance")]
    pub frame_chance: u32,
    #[serde(default = "default_item_radius")]
    pub radius: f64,
    #[serde(default = "default_accelerator_multiplier")]
    pub accelerator_multiplier: f64,
    /// Pickups present at once; spawning pauses at the cap.
    #[serde(default = "default_item_max_active")]
    pub max_active: usize,
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self {
            frame_chance: default_item_frame_chance(),
            radius: default_item_radius(),
            accelerator_multiplier: default_accelerator_multiplier(),
            max_active: default_item_max_active(),
        }
    }
}

fn default_item_frame_chance() -> u32 {
    300
}
fn default_item_radius() -> f64 {
    5.0
}
fn default_accelerator_multiplier() -> f64 {
    1.5
}
fn default_item_max_active() -> usize {
    8
}

/// End-of-round reward naming.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewardConfig {
    #[serde(default = "default_reward_prefix")]
    pub nft_prefix: String,
    #[serde(default)]
    pub collection_id: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            nft_prefix: default_reward_prefix(),
            collection_id: 0,
        }
    }
}

fn default_reward_prefix() -> String {
    "gridwar-victory-".to_string()
}
