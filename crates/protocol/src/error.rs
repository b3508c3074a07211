//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected end of data")]
    UnexpectedEof,

    #[error("Cell value {0} does not fit in 4 bits")]
    NibbleOverflow(u8),

    #[error("Length {0} does not fit in a u32 field")]
    LengthOverflow(usize),

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("Packed grid holds {actual} bytes, expected {expected}")]
    CellCountMismatch { expected: usize, actual: usize },
}
