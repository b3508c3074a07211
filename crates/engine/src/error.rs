//! Engine error types.

use protocol::ProtocolError;
use thiserror::Error;

use crate::faction::Faction;
use crate::round::RoundStatus;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Faction {0} cannot take part in a round")]
    InvalidFaction(Faction),

    #[error("Player {0} is already in the round")]
    DuplicatePlayer(u64),

    #[error("No round is running")]
    RoundNotRunning,

    #[error("Cannot start a round while {0:?}")]
    InvalidTransition(RoundStatus),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
