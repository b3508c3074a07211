//! World state management.
//!
//! Owns the grid, the spatial index holding every body, and the pickups.
//! World coordinates place the grid inside a frame of boundary walls, so
//! grid pixel `(0, 0)` sits at `(edge_width, edge_width)`.

use glam::DVec2;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{GridConfig, ItemConfig};
use crate::entity::{Item, ItemKind};
use crate::error::EngineError;
use crate::faction::Faction;
use crate::grid::Grid;
use crate::spatial::{BodyId, BodyKind, Bounds, EdgeOrientation, Shape, SpatialIndex};

/// Placement attempts per pickup spawn before giving up for the tick.
const ITEM_PLACEMENT_ATTEMPTS: usize = 8;

/// A cell whose owner changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub x: u32,
    pub y: u32,
    pub previous: Faction,
    pub owner: Faction,
}

#[derive(Debug)]
pub struct World {
    grid: Grid,
    space: SpatialIndex,
    /// Body of each cell, row-major like the grid.
    cell_bodies: Vec<BodyId>,
    items: BTreeMap<u32, Item>,
    next_item_id: u32,
    offset: DVec2,
}

impl World {
    /// Build a world with every faction's starting territory painted in.
    pub fn new(dims: GridConfig) -> Result<Self, EngineError> {
        Self::from_grid(Grid::with_initial_territory(dims)?)
    }

    pub fn from_grid(grid: Grid) -> Result<Self, EngineError> {
        let dims = *grid.dims();
        let edge = dims.edge_width as f64;
        let offset = DVec2::splat(edge);
        let field = grid.pixel_size();
        let total = field + DVec2::splat(2.0 * edge);

        let bucket = grid.pitch_x().max(grid.pitch_y()) * 2.0;
        let mut space = SpatialIndex::new(Bounds::new(0.0, 0.0, total.x, total.y), bucket);

        // Top and bottom span the full width; left and right fill between them.
        let walls = [
            (EdgeOrientation::Horizontal, Bounds::new(0.0, 0.0, total.x, edge)),
            (EdgeOrientation::Horizontal, Bounds::new(0.0, edge + field.y, total.x, total.y)),
            (EdgeOrientation::Vertical, Bounds::new(0.0, edge, edge, edge + field.y)),
            (EdgeOrientation::Vertical, Bounds::new(edge + field.x, edge, total.x, edge + field.y)),
        ];
        for (orientation, bounds) in walls {
            space.insert(BodyKind::Edge(orientation), Shape::Rect(bounds));
        }

        let size = DVec2::new(dims.cell_width as f64, dims.cell_height as f64);
        let mut cell_bodies = Vec::with_capacity(grid.cells().len());
        for y in 0..dims.rows {
            for x in 0..dims.cols {
                let owner = grid.get(x, y).unwrap_or_default();
                let bounds = Bounds::from_origin(offset + grid.cell_to_pixel(x, y), size);
                cell_bodies.push(space.insert(BodyKind::Cell { x, y, owner }, Shape::Rect(bounds)));
            }
        }

        Ok(Self {
            grid,
            space,
            cell_bodies,
            items: BTreeMap::new(),
            next_item_id: 1,
            offset,
        })
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn space(&self) -> &SpatialIndex {
        &self.space
    }

    /// World position of grid pixel `(0, 0)`.
    #[inline]
    pub fn offset(&self) -> DVec2 {
        self.offset
    }

    /// Area inside the boundary walls, in world coordinates.
    pub fn play_area(&self) -> Bounds {
        Bounds::from_origin(self.offset, self.grid.pixel_size())
    }

    /// Body of cell `(x, y)`.
    pub fn cell_body(&self, x: u32, y: u32) -> Option<BodyId> {
        (x < self.grid.cols() && y < self.grid.rows())
            .then(|| self.cell_bodies[y as usize * self.grid.cols() as usize + x as usize])
    }

    /// Relabel a cell body and its grid entry with `owner`.
    ///
    /// Returns `None` if `body` is not a cell or already belongs to `owner`.
    pub fn capture(&mut self, body: BodyId, owner: Faction) -> Option<Capture> {
        let BodyKind::Cell { x, y, owner: previous } = self.space.get(body)?.kind else {
            return None;
        };
        if previous == owner {
            return None;
        }
        self.space.set_kind(body, BodyKind::Cell { x, y, owner });
        self.grid.set(x, y, owner);
        Some(Capture { x, y, previous, owner })
    }

    /// Where a player of `faction` enters the world: the origin of its
    /// spawn cell, kept at least `radius` inside the walls.
    pub fn spawn_point(&self, faction: Faction, radius: f64) -> DVec2 {
        let (cx, cy) = faction.spawn_center(self.grid.rows(), self.grid.cols());
        let area = self.play_area();
        let p = self.offset + self.grid.cell_to_pixel(cx, cy);
        let clamp = |v: f64, lo: f64, hi: f64| if lo <= hi { v.clamp(lo, hi) } else { (lo + hi) / 2.0 };
        DVec2::new(
            clamp(p.x, area.min_x + radius, area.max_x - radius),
            clamp(p.y, area.min_y + radius, area.max_y - radius),
        )
    }

    pub fn insert_player_body(&mut self, id: u64, center: DVec2, radius: f64) -> BodyId {
        self.space.insert(BodyKind::Player(id), Shape::Circle { center, radius })
    }

    pub fn remove_body(&mut self, body: BodyId) {
        self.space.remove(body);
    }

    /// Move a body by `delta`.
    pub fn translate(&mut self, body: BodyId, delta: DVec2) {
        self.space.translate(body, delta);
    }

    /// Centre of a circular body.
    pub fn body_center(&self, body: BodyId) -> Option<DVec2> {
        match self.space.get(body)?.shape {
            Shape::Circle { center, .. } => Some(center),
            Shape::Rect(b) => Some(DVec2::new(b.center_x(), b.center_y())),
        }
    }

    /// Top-left of a body's bounding box in grid-local pixels.
    pub fn local_origin(&self, body: BodyId) -> Option<DVec2> {
        self.space.get(body).map(|b| b.shape.bounds().min() - self.offset)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    #[inline]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Place a pickup at `center` and return its id.
    pub fn spawn_item(&mut self, kind: ItemKind, center: DVec2, radius: f64) -> u32 {
        let id = self.next_item_id;
        self.next_item_id = self.next_item_id.wrapping_add(1);
        let body = self.space.insert(BodyKind::Item { id, kind }, Shape::Circle { center, radius });
        self.items.insert(
            id,
            Item {
                id,
                kind,
                center,
                radius,
                body,
            },
        );
        debug!(id, x = center.x, y = center.y, "Item spawned");
        id
    }

    /// Remove a pickup from the world.
    pub fn take_item(&mut self, id: u32) -> Option<Item> {
        let item = self.items.remove(&id)?;
        self.space.remove(item.body);
        Some(item)
    }

    /// Roll for a pickup spawn.
    ///
    /// One in `frame_chance` calls places an accelerator at a random spot not
    /// covered by a player or another pickup. Nothing spawns at the cap or
    /// when no free spot turns up.
    pub fn try_spawn_item<R: Rng + ?Sized>(&mut self, rng: &mut R, config: &ItemConfig) -> Option<u32> {
        if config.frame_chance == 0 || self.items.len() >= config.max_active {
            return None;
        }
        if !rng.random_ratio(1, config.frame_chance) {
            return None;
        }

        let area = self.play_area().inflate(-config.radius);
        if !(area.min_x < area.max_x && area.min_y < area.max_y) {
            return None;
        }
        for _ in 0..ITEM_PLACEMENT_ATTEMPTS {
            let center = DVec2::new(
                rng.random_range(area.min_x..area.max_x),
                rng.random_range(area.min_y..area.max_y),
            );
            let footprint = Bounds::from_center(center, config.radius);
            let occupied = self
                .space
                .overlaps(&footprint, |k| matches!(k, BodyKind::Player(_) | BodyKind::Item { .. }));
            if !occupied {
                return Some(self.spawn_item(ItemKind::Accelerator, center, config.radius));
            }
        }
        None
    }
}
