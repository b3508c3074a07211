//! Snapshot frame sent to the broadcast layer.
//!
//! ```text
//! frame_number  u32
//! grid_len      u32
//! grid          grid_len bytes (packed 4-bit cells)
//! player_count  u32
//! players       player_count * { id u64, radius u16, x f64, y f64 }
//! item_count    u32
//! items         item_count * { id u32, kind u8, x f64, y f64 }
//! ```

use bytes::Bytes;

use crate::{BinaryReader, BinaryWriter, ProtocolError};

/// Encoded size of one player record.
pub const PLAYER_RECORD_LEN: usize = 8 + 2 + 8 + 8;
/// Encoded size of one item record.
pub const ITEM_RECORD_LEN: usize = 4 + 1 + 8 + 8;

/// A player entry in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRecord {
    pub id: u64,
    pub radius: u16,
    pub x: f64,
    pub y: f64,
}

/// A pickup entry in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemRecord {
    pub id: u32,
    pub kind: u8,
    pub x: f64,
    pub y: f64,
}

/// A complete point-in-time frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub frame_number: u32,
    /// Packed grid cells, see [`crate::cells`].
    pub grid: Bytes,
    pub players: Vec<PlayerRecord>,
    pub items: Vec<ItemRecord>,
}

impl Snapshot {
    /// Exact number of bytes [`Snapshot::encode`] produces.
    pub fn encoded_len(&self) -> usize {
        4 + 4
            + self.grid.len()
            + 4
            + self.players.len() * PLAYER_RECORD_LEN
            + 4
            + self.items.len() * ITEM_RECORD_LEN
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut w = BinaryWriter::with_capacity(self.encoded_len());
        w.put_u32(self.frame_number);
        w.put_len(self.grid.len())?;
        w.put_slice(&self.grid);

        w.put_len(self.players.len())?;
        for p in &self.players {
            w.put_u64(p.id);
            w.put_u16(p.radius);
            w.put_f64(p.x);
            w.put_f64(p.y);
        }

        w.put_len(self.items.len())?;
        for item in &self.items {
            w.put_u32(item.id);
            w.put_u8(item.kind);
            w.put_f64(item.x);
            w.put_f64(item.y);
        }
        Ok(w.finish())
    }

    pub fn decode(data: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let mut r = BinaryReader::new(data);
        let frame_number = r.get_u32()?;
        let grid_len = r.get_u32()? as usize;
        let grid = r.get_bytes(grid_len)?;

        let player_count = r.get_u32()? as usize;
        if player_count.saturating_mul(PLAYER_RECORD_LEN) > r.remaining() {
            return Err(ProtocolError::UnexpectedEof);
        }
        let mut players = Vec::with_capacity(player_count);
        for _ in 0..player_count {
            players.push(PlayerRecord {
                id: r.get_u64()?,
                radius: r.get_u16()?,
                x: r.get_f64()?,
                y: r.get_f64()?,
            });
        }

        let item_count = r.get_u32()? as usize;
        if item_count.saturating_mul(ITEM_RECORD_LEN) > r.remaining() {
            return Err(ProtocolError::UnexpectedEof);
        }
        let mut items = Vec::with_capacity(item_count);
        for _ in 0..item_count {
            items.push(ItemRecord {
                id: r.get_u32()?,
                kind: r.get_u8()?,
                x: r.get_f64()?,
                y: r.get_f64()?,
            });
        }

        if r.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(r.remaining()));
        }
        Ok(Self {
            frame_number,
            grid,
            players,
            items,
        })
    }
}
