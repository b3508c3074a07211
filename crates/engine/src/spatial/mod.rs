//! Spatial indexing of collision bodies.
//!
//! Bodies are stored in a uniform spatial hash; queries sweep a circular
//! mover through it and return the first obstruction.

mod index;

pub use index::{Body, BodyId, BodyKind, Bounds, CollisionTag, Contact, EdgeOrientation, Shape, SpatialIndex};
