//! Per-tick motion of a single player.
//!
//! A player's velocity is consumed in segments. Each segment runs to the
//! first obstruction, applies the rule for what was hit, and hands the
//! rest of the displacement to the next segment.

use glam::DVec2;
use tracing::warn;

use crate::entity::{ItemKind, Player};
use crate::spatial::{BodyKind, Bounds, CollisionTag, EdgeOrientation};
use crate::world::{Capture, World};

/// Segments a player may use in one tick before its motion is cut short.
pub const MAX_SEGMENTS: usize = 64;

/// What happened to a player during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionOutcome {
    /// The cell captured this tick. At most one per tick.
    pub capture: Option<Capture>,
    /// Pickups collected this tick.
    pub pickups: Vec<u32>,
    pub segments: usize,
    /// Motion stopped at [`MAX_SEGMENTS`] with displacement left over.
    pub stalled: bool,
}

/// Move `player` by its velocity for one tick.
///
/// `tags` lists what obstructs the player, highest priority first.
/// Pickups scale both velocity and the remaining displacement by
/// `multiplier`.
pub fn advance(world: &mut World, player: &mut Player, tags: &[CollisionTag], multiplier: f64) -> MotionOutcome {
    let mut outcome = MotionOutcome::default();
    let mut remaining = player.velocity;

    while remaining != DVec2::ZERO {
        if outcome.segments == MAX_SEGMENTS {
            warn!(
                player = player.id,
                rx = remaining.x,
                ry = remaining.y,
                "Segment limit reached, stopping player for this tick"
            );
            outcome.stalled = true;
            break;
        }
        outcome.segments += 1;

        let Some(contact) = world.space().query(player.body, remaining, tags) else {
            world.translate(player.body, remaining);
            break;
        };
        let step = contact.travel;
        world.translate(player.body, step);
        let left = remaining - step;

        remaining = match contact.kind {
            BodyKind::Cell { .. } => {
                let Some(rect) = world.space().get(contact.body).map(|b| b.shape.bounds()) else {
                    break;
                };
                let center = world.body_center(player.body).unwrap_or_default();
                let next = rebound(player, center, &rect, contact.normal, left);
                if outcome.capture.is_none() {
                    outcome.capture = world.capture(contact.body, player.faction);
                }
                next
            }
            BodyKind::Edge(EdgeOrientation::Horizontal) => {
                player.velocity.y = -player.velocity.y;
                DVec2::new(left.x, -left.y)
            }
            BodyKind::Edge(EdgeOrientation::Vertical) => {
                player.velocity.x = -player.velocity.x;
                DVec2::new(-left.x, left.y)
            }
            BodyKind::Item { id, kind: ItemKind::Accelerator } => {
                world.take_item(id);
                outcome.pickups.push(id);
                player.velocity *= multiplier;
                left * multiplier
            }
            // Players never obstruct each other.
            BodyKind::Player(_) => DVec2::ZERO,
        };
    }

    outcome
}

/// Bounce off a cell. Returns the new remaining displacement.
///
/// A centre within the cell's span on one axis is a face hit and mirrors
/// the other axis. Otherwise the player hit a corner and leaves radially
/// from it at unchanged speed, keeping the distance it still had to travel.
fn rebound(player: &mut Player, center: DVec2, cell: &Bounds, normal: DVec2, left: DVec2) -> DVec2 {
    let in_x = center.x >= cell.min_x && center.x <= cell.max_x;
    let in_y = center.y >= cell.min_y && center.y <= cell.max_y;

    let flip_y = match (in_x, in_y) {
        (true, false) => true,
        (false, true) => false,
        // Overlapping: follow the contact normal.
        (true, true) => normal.y.abs() >= normal.x.abs(),
        (false, false) => {
            let corner = DVec2::new(
                if center.x < cell.min_x { cell.min_x } else { cell.max_x },
                if center.y < cell.min_y { cell.min_y } else { cell.max_y },
            );
            let dir = (center - corner).normalize_or_zero();
            player.velocity = dir * player.velocity.length();
            return dir * left.length();
        }
    };

    if flip_y {
        player.velocity.y = -player.velocity.y;
        DVec2::new(left.x, -left.y)
    } else {
        player.velocity.x = -player.velocity.x;
        DVec2::new(-left.x, left.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::faction::Faction;
    use crate::grid::Grid;

    const EPS: f64 = 1e-9;

    /// Grid of Btc cells with the listed cells left neutral.
    fn world(rows: u32, cols: u32, neutral: &[(u32, u32)]) -> World {
        let dims = GridConfig {
            rows,
            cols,
            ..GridConfig::default()
        };
        let mut grid = Grid::from_cells(dims, vec![Faction::Btc; (rows * cols) as usize]).unwrap();
        for &(x, y) in neutral {
            grid.set(x, y, Faction::Neutral);
        }
        World::from_grid(grid).unwrap()
    }

    fn player(world: &mut World, center: DVec2, radius: u16, velocity: DVec2) -> Player {
        let body = world.insert_player_body(1, center, radius as f64);
        Player::new(1, Faction::Btc, radius, velocity, body)
    }

    fn center(world: &World, p: &Player) -> DVec2 {
        world.body_center(p.body).unwrap()
    }

    #[test]
    fn test_free_motion() {
        let mut w = world(3, 7, &[]);
        let mut p = player(&mut w, DVec2::new(50.0, 37.0), 5, DVec2::new(2.0, -1.0));
        let out = advance(&mut w, &mut p, &Faction::Btc.collision_priority(), 1.5);
        assert_eq!(center(&w, &p), DVec2::new(52.0, 36.0));
        assert_eq!(out.segments, 1);
        assert!(out.capture.is_none());
    }

    #[test]
    fn test_zero_velocity_terminates() {
        let mut w = World::from_grid(Grid::new(GridConfig { rows: 2, cols: 2, ..GridConfig::default() }).unwrap())
            .unwrap();
        let before = w.grid().clone();
        let mut p = player(&mut w, DVec2::new(27.0, 27.0), 15, DVec2::ZERO);
        let out = advance(&mut w, &mut p, &Faction::Eth.collision_priority(), 1.5);
        assert_eq!(out, MotionOutcome::default());
        assert_eq!(w.grid(), &before);
    }

    #[test]
    fn test_edge_reflection_preserves_speed() {
        let mut w = world(4, 4, &[]);
        let mut p = player(&mut w, DVec2::new(22.0, 50.0), 15, DVec2::new(-4.0, 3.0));
        let out = advance(&mut w, &mut p, &Faction::Btc.collision_priority(), 1.5);
        assert_eq!(out.segments, 2);
        assert!((p.velocity - DVec2::new(4.0, 3.0)).length() < EPS);
        assert!((p.speed() - 5.0).abs() < EPS);
        assert!((center(&w, &p) - DVec2::new(24.0, 53.0)).length() < EPS);
    }

    #[test]
    fn test_face_capture_and_rebound() {
        let mut w = world(3, 5, &[(4, 1)]);
        let mut p = player(&mut w, DVec2::new(58.0, 37.0), 5, DVec2::new(50.0, 0.0));
        let out = advance(&mut w, &mut p, &Faction::Btc.collision_priority(), 1.5);

        let capture = out.capture.unwrap();
        assert_eq!((capture.x, capture.y), (4, 1));
        assert_eq!(capture.previous, Faction::Neutral);
        assert_eq!(w.grid().get(4, 1), Some(Faction::Btc));
        assert_eq!(p.velocity, DVec2::new(-50.0, 0.0));
        assert!((center(&w, &p).x - 62.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_capture_per_tick() {
        let mut w = world(3, 7, &[(0, 1), (6, 1)]);
        let mut p = player(&mut w, DVec2::new(79.0, 37.0), 5, DVec2::new(200.0, 0.0));
        let out = advance(&mut w, &mut p, &Faction::Btc.collision_priority(), 1.5);

        assert_eq!(out.segments, 3);
        assert_eq!(out.capture.map(|c| (c.x, c.y)), Some((6, 1)));
        assert_eq!(w.grid().get(6, 1), Some(Faction::Btc));
        assert_eq!(w.grid().get(0, 1), Some(Faction::Neutral));
        assert_eq!(p.velocity, DVec2::new(200.0, 0.0));
        assert!((center(&w, &p).x - 87.0).abs() < 1e-6);
    }

    #[test]
    fn test_corner_rebound_keeps_speed() {
        let mut w = world(3, 7, &[(4, 1)]);
        let mut p = player(&mut w, DVec2::new(80.0, 17.0), 5, DVec2::new(10.0, 10.0));
        let out = advance(&mut w, &mut p, &Faction::Btc.collision_priority(), 1.5);

        assert!(out.capture.is_some());
        assert!((p.velocity - DVec2::new(-10.0, -10.0)).length() < 1e-6);
        let travelled = 10.0 * 2f64.sqrt() - 5.0;
        let expected = DVec2::new(80.0, 17.0) + DVec2::splat(travelled / 2f64.sqrt()) - DVec2::splat(5.0 / 2f64.sqrt());
        assert!((center(&w, &p) - expected).length() < 1e-6);
    }

    #[test]
    fn test_segment_limit_in_narrow_gap() {
        // Every cell is foreign to an Eth player, so after its one capture
        // it can get wedged between two cells closer than its diameter.
        let mut w = world(30, 40, &[]);
        let start = w.spawn_point(Faction::Eth, 15.0);
        let body = w.insert_player_body(1, start, 15.0);
        let mut p = Player::new(1, Faction::Eth, 15, DVec2::new(2.0, 0.7), body);
        let tags = Faction::Eth.collision_priority();
        let speed = p.speed();

        let mut stalled = None;
        for tick in 0..16 {
            let before = center(&w, &p);
            let out = advance(&mut w, &mut p, &tags, 1.5);
            if out.stalled {
                assert_eq!(out.segments, MAX_SEGMENTS);
                assert!((center(&w, &p) - before).length() < speed);
                stalled = Some(tick);
                break;
            }
        }
        assert!(stalled.is_some(), "player never hit the segment limit");

        let out = advance(&mut w, &mut p, &tags, 1.5);
        assert!(!out.stalled);
        assert!(out.capture.is_some());
        assert!((p.speed() - speed).abs() < EPS);
    }

    #[test]
    fn test_accelerator_pickup() {
        let mut w = world(3, 7, &[]);
        let item = w.spawn_item(ItemKind::Accelerator, DVec2::new(75.0, 37.0), 5.0);
        let mut p = player(&mut w, DVec2::new(50.0, 37.0), 5, DVec2::new(30.0, 0.0));
        let out = advance(&mut w, &mut p, &Faction::Btc.collision_priority(), 1.5);

        assert_eq!(out.pickups, vec![item]);
        assert!(out.capture.is_none());
        assert_eq!(w.item_count(), 0);
        assert!((p.velocity.x - 45.0).abs() < EPS);
        assert!((center(&w, &p).x - 87.5).abs() < 1e-6);
    }
}
