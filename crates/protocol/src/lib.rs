//! Shared protocol crate for gridwar.
//!
//! This crate contains:
//! - Big-endian binary reading/writing utilities
//! - 4-bit grid cell packing
//! - The snapshot frame handed to the broadcast layer

mod binary;
pub mod cells;
mod error;
pub mod snapshot;

pub use binary::{BinaryReader, BinaryWriter};
pub use error::ProtocolError;
pub use snapshot::{ItemRecord, PlayerRecord, Snapshot};
