//! Swept collision tests.
//!
//! A moving circle is tested against axis-aligned rectangles and other
//! circles. Results are expressed as a fraction `time` of the requested
//! displacement plus the contact normal pointing away from the obstacle.

use glam::DVec2;

use crate::spatial::Bounds;

/// Distances closer than this count as touching, not overlapping.
pub const CONTACT_EPSILON: f64 = 1e-9;

/// First contact along a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the displacement travelled before contact, in `[0, 1]`.
    pub time: f64,
    /// Unit normal of the obstacle surface at the contact.
    pub normal: DVec2,
}

/// Sweep a circle against a rectangle.
pub fn sweep_circle_rect(center: DVec2, radius: f64, delta: DVec2, rect: &Bounds) -> Option<SweepHit> {
    if delta == DVec2::ZERO {
        return None;
    }

    let closest = DVec2::new(
        center.x.clamp(rect.min_x, rect.max_x),
        center.y.clamp(rect.min_y, rect.max_y),
    );
    let offset = center - closest;
    let dist_sq = offset.length_squared();
    let inner = (radius - CONTACT_EPSILON).max(0.0);
    if dist_sq < inner * inner {
        // Already overlapping: only report it while moving further in.
        let normal = if dist_sq > CONTACT_EPSILON * CONTACT_EPSILON {
            offset / dist_sq.sqrt()
        } else {
            rect.exit_normal(center)
        };
        return (delta.dot(normal) < 0.0).then_some(SweepHit { time: 0.0, normal });
    }

    let expanded = rect.inflate(radius);
    let (t_enter, face_normal) = ray_slab(center, delta, &expanded)?;
    let t = t_enter.max(0.0);
    let point = center + delta * t;
    let in_x = point.x >= rect.min_x && point.x <= rect.max_x;
    let in_y = point.y >= rect.min_y && point.y <= rect.max_y;

    if in_x || in_y {
        // Starting inside the inflated box means touching a face already.
        let normal = if t_enter >= 0.0 {
            face_normal
        } else {
            offset / dist_sq.sqrt()
        };
        return (delta.dot(normal) < 0.0).then_some(SweepHit { time: t, normal });
    }

    // Corner region of the rounded rectangle.
    let corner = DVec2::new(
        if point.x < rect.center_x() { rect.min_x } else { rect.max_x },
        if point.y < rect.center_y() { rect.min_y } else { rect.max_y },
    );
    sweep_circle_point(center, radius, delta, corner)
}

/// Sweep a circle against another circle at rest.
pub fn sweep_circle_circle(
    center: DVec2,
    radius: f64,
    delta: DVec2,
    other: DVec2,
    other_radius: f64,
) -> Option<SweepHit> {
    if delta == DVec2::ZERO {
        return None;
    }
    sweep_circle_point(center, radius + other_radius, delta, other)
}

/// Sweep a circle of `radius` against a single point.
fn sweep_circle_point(center: DVec2, radius: f64, delta: DVec2, point: DVec2) -> Option<SweepHit> {
    let m = center - point;
    let a = delta.length_squared();
    let b = 2.0 * m.dot(delta);
    let c = m.length_squared() - radius * radius;

    if c < -CONTACT_EPSILON {
        let normal = m.try_normalize().unwrap_or(-delta.normalize());
        return (delta.dot(normal) < 0.0).then_some(SweepHit { time: 0.0, normal });
    }
    // Touching or apart and moving away.
    if b >= 0.0 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = ((-b - disc.sqrt()) / (2.0 * a)).max(0.0);
    if t > 1.0 {
        return None;
    }
    let normal = (m + delta * t).try_normalize()?;
    Some(SweepHit { time: t, normal })
}

/// Slab intersection of the ray `origin + t * delta` with `bounds`.
/// Returns the entry time (possibly negative) and the entry face normal.
fn ray_slab(origin: DVec2, delta: DVec2, bounds: &Bounds) -> Option<(f64, DVec2)> {
    let mut t_enter = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;
    let mut normal = DVec2::ZERO;

    let axes = [
        (origin.x, delta.x, bounds.min_x, bounds.max_x, DVec2::X),
        (origin.y, delta.y, bounds.min_y, bounds.max_y, DVec2::Y),
    ];
    for (o, d, min, max, axis) in axes {
        if d == 0.0 {
            if o < min || o > max {
                return None;
            }
            continue;
        }
        let t1 = (min - o) / d;
        let t2 = (max - o) / d;
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        if near > t_enter {
            t_enter = near;
            normal = if d > 0.0 { -axis } else { axis };
        }
        t_exit = t_exit.min(far);
    }

    if t_enter > t_exit || t_exit < 0.0 || t_enter > 1.0 {
        return None;
    }
    Some((t_enter, normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Bounds {
        Bounds::new(10.0, 0.0, 20.0, 10.0)
    }

    #[test]
    fn test_face_hit() {
        let hit = sweep_circle_rect(DVec2::new(0.0, 5.0), 2.0, DVec2::new(16.0, 0.0), &unit_box())
            .unwrap();
        assert!((hit.time - 0.5).abs() < 1e-12);
        assert_eq!(hit.normal, DVec2::NEG_X);
    }

    #[test]
    fn test_miss_when_short() {
        assert!(
            sweep_circle_rect(DVec2::new(0.0, 5.0), 2.0, DVec2::new(7.0, 0.0), &unit_box())
                .is_none()
        );
    }

    #[test]
    fn test_corner_hit_uses_rounded_corner() {
        // Diagonal approach toward the top-left corner.
        let start = DVec2::new(5.0, -5.0);
        let hit = sweep_circle_rect(start, 2.0, DVec2::new(5.0, 5.0), &unit_box()).unwrap();
        let contact = start + DVec2::new(5.0, 5.0) * hit.time;
        let to_corner = contact - DVec2::new(10.0, 0.0);
        assert!((to_corner.length() - 2.0).abs() < 1e-9);
        assert!((hit.normal - to_corner / 2.0).length() < 1e-9);
    }

    #[test]
    fn test_corner_region_miss() {
        // Passes the expanded box corner without touching the rounded corner.
        let start = DVec2::new(7.0, -3.0);
        assert!(sweep_circle_rect(start, 2.0, DVec2::new(2.0, 0.0), &unit_box()).is_none());
    }

    #[test]
    fn test_touching_and_leaving_is_free() {
        let hit = sweep_circle_rect(DVec2::new(8.0, 5.0), 2.0, DVec2::new(-3.0, 0.0), &unit_box());
        assert!(hit.is_none());
        let hit = sweep_circle_rect(DVec2::new(8.0, 5.0), 2.0, DVec2::new(3.0, 0.0), &unit_box());
        assert_eq!(hit.map(|h| h.time), Some(0.0));
    }

    #[test]
    fn test_zero_displacement_never_hits() {
        assert!(sweep_circle_rect(DVec2::new(15.0, 5.0), 2.0, DVec2::ZERO, &unit_box()).is_none());
    }

    #[test]
    fn test_circle_circle() {
        let hit = sweep_circle_circle(
            DVec2::ZERO,
            1.0,
            DVec2::new(10.0, 0.0),
            DVec2::new(6.0, 0.0),
            1.0,
        )
        .unwrap();
        assert!((hit.time - 0.4).abs() < 1e-12);
        assert_eq!(hit.normal, DVec2::NEG_X);
    }
}
