//! Faction registry.
//!
//! Factions are a fixed set. Each owns a starting rectangle of the grid
//! and a spawn cell; the rectangles are tested in a fixed priority order so
//! overlapping territories on small grids resolve deterministically.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::spatial::CollisionTag;

/// A competing team. The discriminant is the wire value of a grid cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Faction {
    #[default]
    Neutral = 0,
    Btc = 1,
    Eth = 2,
    Bnb = 3,
    Avax = 4,
    Matic = 5,
}

// Cells are packed as 4-bit values on the wire.
const _: () = assert!(Faction::ALL.len() <= protocol::cells::MAX_CELL_VALUE as usize + 1);

/// Side of the grid a starting rectangle is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    TopLeft,
    TopRight,
    Center,
    BottomLeft,
    BottomRight,
}

/// Order in which starting rectangles claim cells.
const TERRITORY_PRIORITY: [Faction; 5] = [
    Faction::Eth,
    Faction::Bnb,
    Faction::Btc,
    Faction::Avax,
    Faction::Matic,
];

impl Faction {
    /// Every faction, indexed by discriminant.
    pub const ALL: [Faction; 6] = [
        Faction::Neutral,
        Faction::Btc,
        Faction::Eth,
        Faction::Bnb,
        Faction::Avax,
        Faction::Matic,
    ];

    /// Factions players can join.
    pub const PLAYABLE: [Faction; 5] = [
        Faction::Btc,
        Faction::Eth,
        Faction::Bnb,
        Faction::Avax,
        Faction::Matic,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn tag(self) -> &'static str {
        match self {
            Faction::Neutral => "Empty",
            Faction::Btc => "BTC",
            Faction::Eth => "ETH",
            Faction::Bnb => "BNB",
            Faction::Avax => "AVAX",
            Faction::Matic => "MATIC",
        }
    }

    #[inline]
    pub fn is_playable(self) -> bool {
        self != Faction::Neutral
    }

    /// Side length of the square starting territory.
    fn initial_len(self) -> u32 {
        match self {
            Faction::Neutral => 0,
            Faction::Btc => 6,
            Faction::Eth => 5,
            Faction::Bnb => 4,
            Faction::Avax => 3,
            Faction::Matic => 2,
        }
    }

    fn anchor(self) -> Anchor {
        match self {
            Faction::Eth => Anchor::TopLeft,
            Faction::Bnb => Anchor::TopRight,
            Faction::Avax => Anchor::BottomLeft,
            Faction::Matic => Anchor::BottomRight,
            Faction::Btc | Faction::Neutral => Anchor::Center,
        }
    }

    /// Starting rectangle as `(x0, y0, x1, y1)`, half-open, in cell coordinates.
    fn territory(self, rows: u32, cols: u32) -> (u32, u32, u32, u32) {
        let len = self.initial_len();
        let (x0, y0) = match self.anchor() {
            Anchor::TopLeft => (0, 0),
            Anchor::TopRight => (cols.saturating_sub(len), 0),
            Anchor::Center => (cols.saturating_sub(len) / 2, rows.saturating_sub(len) / 2),
            Anchor::BottomLeft => (0, rows.saturating_sub(len)),
            Anchor::BottomRight => (cols.saturating_sub(len), rows.saturating_sub(len)),
        };
        (x0, y0, (x0 + len).min(cols), (y0 + len).min(rows))
    }

    /// Cell a freshly joined player of this faction starts on.
    pub fn spawn_center(self, rows: u32, cols: u32) -> (u32, u32) {
        let (x0, y0, x1, y1) = self.territory(rows, cols);
        (
            (x0 + (x1 - x0) / 2).min(cols.saturating_sub(1)),
            (y0 + (y1 - y0) / 2).min(rows.saturating_sub(1)),
        )
    }

    /// Body tags a mover of this faction collides with, highest priority first.
    ///
    /// Foreign cells come first, then unclaimed cells, pickups, and finally
    /// the boundary walls.
    pub fn collision_priority(self) -> Vec<CollisionTag> {
        let foreign: &[Faction] = match self {
            Faction::Btc => &[Faction::Eth, Faction::Bnb, Faction::Avax, Faction::Matic],
            Faction::Eth => &[Faction::Bnb, Faction::Btc, Faction::Avax, Faction::Matic],
            Faction::Bnb => &[Faction::Eth, Faction::Btc, Faction::Avax, Faction::Matic],
            Faction::Avax => &[Faction::Eth, Faction::Bnb, Faction::Btc, Faction::Matic],
            Faction::Matic => &[Faction::Eth, Faction::Bnb, Faction::Btc, Faction::Avax],
            Faction::Neutral => &Faction::PLAYABLE,
        };
        let mut tags: Vec<CollisionTag> = foreign.iter().map(|&f| CollisionTag::Cell(f)).collect();
        tags.push(CollisionTag::Cell(Faction::Neutral));
        tags.push(CollisionTag::Item);
        tags.extend([
            CollisionTag::HorizontalEdge,
            CollisionTag::VerticalEdge,
            CollisionTag::Edge,
        ]);
        tags
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Starting owner of cell `(x, y)`.
pub fn initial_owner(x: u32, y: u32, rows: u32, cols: u32) -> Faction {
    TERRITORY_PRIORITY
        .into_iter()
        .find(|f| {
            let (x0, y0, x1, y1) = f.territory(rows, cols);
            x >= x0 && x < x1 && y >= y0 && y < y1
        })
        .unwrap_or(Faction::Neutral)
}
