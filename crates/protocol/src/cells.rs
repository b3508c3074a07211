//! 4-bit packing of grid cell values.
//!
//! Two cells share a byte: the even-indexed cell in the high nibble, the
//! following cell in the low nibble. An odd trailing cell leaves the low
//! nibble zero.

use crate::ProtocolError;

/// Largest value a packed cell can hold.
pub const MAX_CELL_VALUE: u8 = 0x0F;

const HIGH_MASK: u8 = 0xF0;
const LOW_MASK: u8 = 0x0F;

/// Number of bytes needed to pack `count` cells.
#[inline]
pub const fn packed_len(count: usize) -> usize {
    count.div_ceil(2)
}

/// Pack cell values into nibbles.
pub fn pack(values: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(packed_len(values.len()));
    for pair in values.chunks(2) {
        let high = nibble(pair[0])?;
        let low = match pair.get(1) {
            Some(&v) => nibble(v)?,
            None => 0,
        };
        out.push(((high << 4) & HIGH_MASK) | (low & LOW_MASK));
    }
    Ok(out)
}

/// Unpack exactly `count` cell values.
pub fn unpack(bytes: &[u8], count: usize) -> Result<Vec<u8>, ProtocolError> {
    let expected = packed_len(count);
    if bytes.len() != expected {
        return Err(ProtocolError::CellCountMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for &b in bytes {
        out.push((b & HIGH_MASK) >> 4);
        if out.len() < count {
            out.push(b & LOW_MASK);
        }
    }
    Ok(out)
}

#[inline]
fn nibble(v: u8) -> Result<u8, ProtocolError> {
    if v > MAX_CELL_VALUE {
        Err(ProtocolError::NibbleOverflow(v))
    } else {
        Ok(v)
    }
}
