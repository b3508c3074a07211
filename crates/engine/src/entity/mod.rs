//! Game entities.
//!
//! Players and pickups. Both own a body in the spatial index; their
//! positions live there and are read back through [`crate::world::World`].

mod item;
mod player;

pub use item::{Item, ItemKind};
pub use player::Player;
