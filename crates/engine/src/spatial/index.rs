//! Uniform spatial hash over tagged bodies.

use glam::DVec2;
use std::collections::HashMap;

use crate::collision::{self, SweepHit};
use crate::entity::ItemKind;
use crate::faction::Faction;

/// Contacts closer together than this are considered simultaneous.
const TIME_EPSILON: f64 = 1e-12;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Bounds from a top-left corner and a size.
    pub fn from_origin(origin: DVec2, size: DVec2) -> Self {
        Self::new(origin.x, origin.y, origin.x + size.x, origin.y + size.y)
    }

    /// Create bounds from center and half-extent.
    #[inline]
    pub fn from_center(center: DVec2, half: f64) -> Self {
        Self::new(center.x - half, center.y - half, center.x + half, center.y + half)
    }

    /// Check if two bounds overlap with non-zero area.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.min_x >= self.max_x
            || other.max_x <= self.min_x
            || other.min_y >= self.max_y
            || other.max_y <= self.min_y)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn center_x(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    #[inline]
    pub fn center_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }

    #[inline]
    pub fn min(&self) -> DVec2 {
        DVec2::new(self.min_x, self.min_y)
    }

    /// Grow every side by `by`.
    #[inline]
    pub fn inflate(&self, by: f64) -> Self {
        Self::new(self.min_x - by, self.min_y - by, self.max_x + by, self.max_y + by)
    }

    #[inline]
    pub fn translate(&self, delta: DVec2) -> Self {
        Self::new(
            self.min_x + delta.x,
            self.min_y + delta.y,
            self.max_x + delta.x,
            self.max_y + delta.y,
        )
    }

    #[inline]
    pub fn union(&self, other: &Bounds) -> Self {
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Normal of the face nearest to an interior point.
    pub fn exit_normal(&self, p: DVec2) -> DVec2 {
        let faces = [
            (p.x - self.min_x, DVec2::NEG_X),
            (self.max_x - p.x, DVec2::X),
            (p.y - self.min_y, DVec2::NEG_Y),
            (self.max_y - p.y, DVec2::Y),
        ];
        faces
            .into_iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, n)| n)
            .unwrap_or(DVec2::NEG_Y)
    }
}

pub type BodyId = u32;

/// Which way a boundary wall runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOrientation {
    Horizontal,
    Vertical,
}

/// What a body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Cell { x: u32, y: u32, owner: Faction },
    Edge(EdgeOrientation),
    Player(u64),
    Item { id: u32, kind: ItemKind },
}

/// Selects bodies a mover collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionTag {
    /// Cells owned by the given faction.
    Cell(Faction),
    Item,
    HorizontalEdge,
    VerticalEdge,
    /// Any boundary wall.
    Edge,
}

impl CollisionTag {
    pub fn matches(&self, kind: &BodyKind) -> bool {
        match (self, kind) {
            (CollisionTag::Cell(f), BodyKind::Cell { owner, .. }) => f == owner,
            (CollisionTag::Item, BodyKind::Item { .. }) => true,
            (CollisionTag::HorizontalEdge, BodyKind::Edge(EdgeOrientation::Horizontal)) => true,
            (CollisionTag::VerticalEdge, BodyKind::Edge(EdgeOrientation::Vertical)) => true,
            (CollisionTag::Edge, BodyKind::Edge(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rect(Bounds),
    Circle { center: DVec2, radius: f64 },
}

impl Shape {
    pub fn bounds(&self) -> Bounds {
        match *self {
            Shape::Rect(b) => b,
            Shape::Circle { center, radius } => Bounds::from_center(center, radius),
        }
    }

    fn translate(&mut self, delta: DVec2) {
        match self {
            Shape::Rect(b) => *b = b.translate(delta),
            Shape::Circle { center, .. } => *center += delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: BodyId,
    pub kind: BodyKind,
    pub shape: Shape,
}

/// Nearest obstruction found by [`SpatialIndex::query`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body: BodyId,
    pub kind: BodyKind,
    /// Fraction of the requested displacement that is free.
    pub time: f64,
    /// Free portion of the displacement.
    pub travel: DVec2,
    pub normal: DVec2,
    /// Index of the matching tag in the query's tag list.
    pub priority: usize,
}

/// Inclusive bucket range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BucketRange {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

/// Spatial hash of bodies.
///
/// Each body is listed in every bucket its bounds overlap. Bodies outside
/// the world bounds are clamped into the border buckets.
pub struct SpatialIndex {
    bodies: HashMap<BodyId, Body>,
    next_id: BodyId,
    bounds: Bounds,
    buckets: Vec<Vec<BodyId>>,
    cols: usize,
    rows: usize,
    bucket_size: f64,
}

impl SpatialIndex {
    pub fn new(bounds: Bounds, bucket_size: f64) -> Self {
        let bucket_size = bucket_size.max(1.0);
        let cols = ((bounds.width() / bucket_size).ceil() as usize).max(1);
        let rows = ((bounds.height() / bucket_size).ceil() as usize).max(1);
        Self {
            bodies: HashMap::with_capacity(1024),
            next_id: 1,
            bounds,
            buckets: vec![Vec::new(); cols * rows],
            cols,
            rows,
            bucket_size,
        }
    }

    fn bucket_range(&self, b: &Bounds) -> BucketRange {
        let to_col = |x: f64| {
            (((x - self.bounds.min_x) / self.bucket_size).floor().max(0.0) as usize).min(self.cols - 1)
        };
        let to_row = |y: f64| {
            (((y - self.bounds.min_y) / self.bucket_size).floor().max(0.0) as usize).min(self.rows - 1)
        };
        BucketRange {
            min_x: to_col(b.min_x),
            min_y: to_row(b.min_y),
            max_x: to_col(b.max_x),
            max_y: to_row(b.max_y),
        }
    }

    fn link(&mut self, id: BodyId, range: BucketRange) {
        for gy in range.min_y..=range.max_y {
            let row_start = gy * self.cols;
            for gx in range.min_x..=range.max_x {
                self.buckets[row_start + gx].push(id);
            }
        }
    }

    fn unlink(&mut self, id: BodyId, range: BucketRange) {
        for gy in range.min_y..=range.max_y {
            let row_start = gy * self.cols;
            for gx in range.min_x..=range.max_x {
                let bucket = &mut self.buckets[row_start + gx];
                if let Some(pos) = bucket.iter().position(|&b| b == id) {
                    bucket.swap_remove(pos);
                }
            }
        }
    }

    /// Add a body and return its id.
    pub fn insert(&mut self, kind: BodyKind, shape: Shape) -> BodyId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let range = self.bucket_range(&shape.bounds());
        self.link(id, range);
        self.bodies.insert(id, Body { id, kind, shape });
        id
    }

    pub fn remove(&mut self, id: BodyId) -> Option<Body> {
        let body = self.bodies.remove(&id)?;
        let range = self.bucket_range(&body.shape.bounds());
        self.unlink(id, range);
        Some(body)
    }

    #[inline]
    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    /// Replace a body's kind, e.g. to relabel a cell's owner.
    pub fn set_kind(&mut self, id: BodyId, kind: BodyKind) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.kind = kind;
                true
            }
            None => false,
        }
    }

    /// Move a body by `delta`, re-bucketing it if needed.
    pub fn translate(&mut self, id: BodyId, delta: DVec2) -> bool {
        let Some(body) = self.bodies.get_mut(&id) else {
            return false;
        };
        let old = body.shape.bounds();
        body.shape.translate(delta);
        let new = body.shape.bounds();
        let (old_range, new_range) = (self.bucket_range(&old), self.bucket_range(&new));
        if old_range != new_range {
            self.unlink(id, old_range);
            self.link(id, new_range);
        }
        true
    }

    fn candidates(&self, area: &Bounds) -> Vec<BodyId> {
        let range = self.bucket_range(area);
        let mut ids = Vec::with_capacity(32);
        for gy in range.min_y..=range.max_y {
            let row_start = gy * self.cols;
            for gx in range.min_x..=range.max_x {
                ids.extend_from_slice(&self.buckets[row_start + gx]);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// First body matching `tags` that the circular body `mover` touches while
    /// moving by `delta`.
    ///
    /// Simultaneous contacts resolve to the lowest tag index, then the lowest
    /// body id. A zero or non-finite displacement, or a non-circular mover,
    /// never collides.
    pub fn query(&self, mover: BodyId, delta: DVec2, tags: &[CollisionTag]) -> Option<Contact> {
        if delta == DVec2::ZERO || !delta.is_finite() {
            return None;
        }
        let Shape::Circle { center, radius } = self.bodies.get(&mover)?.shape else {
            return None;
        };

        let start = Bounds::from_center(center, radius);
        let swept = start.union(&start.translate(delta));
        let mut best: Option<Contact> = None;

        for id in self.candidates(&swept) {
            if id == mover {
                continue;
            }
            let Some(body) = self.bodies.get(&id) else { continue };
            let Some(priority) = tags.iter().position(|t| t.matches(&body.kind)) else {
                continue;
            };
            let hit: Option<SweepHit> = match body.shape {
                Shape::Rect(rect) => collision::sweep_circle_rect(center, radius, delta, &rect),
                Shape::Circle { center: other, radius: other_radius } => {
                    collision::sweep_circle_circle(center, radius, delta, other, other_radius)
                }
            };
            let Some(hit) = hit else { continue };

            let better = match &best {
                None => true,
                Some(b) if hit.time < b.time - TIME_EPSILON => true,
                Some(b) if (hit.time - b.time).abs() <= TIME_EPSILON => {
                    (priority, id) < (b.priority, b.body)
                }
                Some(_) => false,
            };
            if better {
                best = Some(Contact {
                    body: id,
                    kind: body.kind,
                    time: hit.time,
                    travel: delta * hit.time,
                    normal: hit.normal,
                    priority,
                });
            }
        }
        best
    }

    /// Whether any body accepted by `filter` overlaps `area`.
    pub fn overlaps(&self, area: &Bounds, filter: impl Fn(&BodyKind) -> bool) -> bool {
        self.candidates(area).into_iter().any(|id| {
            self.bodies
                .get(&id)
                .is_some_and(|b| filter(&b.kind) && b.shape.bounds().intersects(area))
        })
    }

    /// Get the number of bodies.
    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("bodies", &self.bodies.len())
            .field("bounds", &self.bounds)
            .finish()
    }
}
