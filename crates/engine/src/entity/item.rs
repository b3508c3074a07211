//! Pickups.

use glam::DVec2;

use crate::spatial::BodyId;

/// Kind of pickup. The discriminant is its wire value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Scales the collector's velocity.
    Accelerator = 0,
}

impl ItemKind {
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A pickup lying on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: u32,
    pub kind: ItemKind,
    pub center: DVec2,
    pub radius: f64,
    pub body: BodyId,
}

impl Item {
    /// Top-left of the bounding box.
    pub fn origin(&self) -> DVec2 {
        self.center - DVec2::splat(self.radius)
    }
}
