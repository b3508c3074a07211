//! Player agent.

use glam::DVec2;

use crate::faction::Faction;
use crate::spatial::BodyId;

/// A bouncing agent. Its position is held by its body in the spatial index.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: u64,
    pub faction: Faction,
    pub radius: u16,
    /// Displacement per tick in pixels.
    pub velocity: DVec2,
    pub body: BodyId,
}

impl Player {
    pub fn new(id: u64, faction: Faction, radius: u16, velocity: DVec2, body: BodyId) -> Self {
        Self {
            id,
            faction,
            radius,
            velocity,
            body,
        }
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }
}
