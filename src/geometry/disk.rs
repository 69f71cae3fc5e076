//! Threat disk predicates: engulfment, segment intersection, tangent
//! construction, and arc length along a disk boundary (spec §4.1).

use crate::config::constant::EPSILON_GEOM;
use crate::geometry::point::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disk {
    pub center: Point,
    pub radius: f64,
}

impl Disk {
    pub fn new(center: Point, radius: f64) -> Self {
        Disk { center, radius }
    }

    /// A point strictly inside the disk is *engulfed*. Uses strict `<` on
    /// squared distance per spec §9 numeric semantics.
    pub fn engulfs(&self, p: &Point) -> bool {
        p.dist_sq(&self.center) < self.radius * self.radius
    }

    /// Whether segment `[a, b]` intersects the disk's interior, within a
    /// small epsilon that treats grazing segments as intersecting (spec
    /// §4.1 edge-case policy: stay strictly outside).
    pub fn segment_intersects(&self, a: &Point, b: &Point) -> bool {
        let (closest, t) = crate::geometry::point::closest_point_on_segment(&self.center, a, b);
        if !(-EPSILON_GEOM..=1.0 + EPSILON_GEOM).contains(&t) {
            // Closest approach falls outside the segment's span; only the
            // endpoints can be inside, and an engulfed endpoint is the
            // caller's concern (escape rule), not an "intersects" verdict.
            return false;
        }
        let d = self.center.dist(&closest);
        d < self.radius + EPSILON_GEOM
    }

    /// The two tangent points on the disk boundary visible from an
    /// external point `p`, as seen looking from `p` toward the center:
    /// `(left_tangent, right_tangent)` where "left"/"right" follow the
    /// standard orientation (left = counter-clockwise from the
    /// center-to-p direction).
    ///
    /// Returns `None` if `p` is inside or on the disk (no tangents exist).
    pub fn tangent_points(&self, p: &Point) -> Option<(Point, Point)> {
        let d_vec = p.sub(&self.center);
        let d = d_vec.norm();
        if d <= self.radius + EPSILON_GEOM {
            return None;
        }
        // Standard two-tangent-line construction: the tangent point lies
        // at angle +/- alpha from the center->p direction, where
        // cos(alpha) = r/d.
        let alpha = (self.radius / d).acos();
        let theta = d_vec.y.atan2(d_vec.x);
        let left = self.point_at_angle(theta + alpha);
        let right = self.point_at_angle(theta - alpha);
        Some((left, right))
    }

    pub fn point_at_angle(&self, theta: f64) -> Point {
        Point::new(
            self.center.x + self.radius * theta.cos(),
            self.center.y + self.radius * theta.sin(),
        )
    }

    fn angle_of(&self, p: &Point) -> f64 {
        (p.y - self.center.y).atan2(p.x - self.center.x)
    }

    /// Arc length travelling from `from` to `to` along the boundary,
    /// going counter-clockwise if `ccw` else clockwise.
    pub fn arc_length(&self, from: &Point, to: &Point, ccw: bool) -> f64 {
        let a0 = self.angle_of(from);
        let a1 = self.angle_of(to);
        let two_pi = std::f64::consts::TAU;
        let mut delta = a1 - a0;
        if ccw {
            delta = delta.rem_euclid(two_pi);
        } else {
            delta = -((-delta).rem_euclid(two_pi));
            delta = delta.abs();
        }
        self.radius * delta
    }

    /// Escape point for an engulfed position: along the ray from the
    /// disk center through `p`, at `radius + margin`. If `p` coincides
    /// with the center, the `+x` direction is used deterministically
    /// (spec §4.8 step 2).
    pub fn escape_point(&self, p: &Point, margin: f64) -> Point {
        let dir = p.sub(&self.center);
        let n = dir.norm();
        let unit = if n < EPSILON_GEOM {
            Point::new(1.0, 0.0)
        } else {
            dir.scale(1.0 / n)
        };
        self.center.add(&unit.scale(self.radius + margin))
    }
}

/// Fingerprint-relevant projection of a threat, kept separate from `Disk`
/// so callers needn't depend on geometry internals for hashing/equality.
pub fn disks_from(centers: &[(Point, f64)]) -> Vec<Disk> {
    centers.iter().map(|(c, r)| Disk::new(*c, *r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engulfment_is_strict() {
        let d = Disk::new(Point::new(0.0, 0.0), 2.0);
        assert!(d.engulfs(&Point::new(1.0, 0.0)));
        assert!(!d.engulfs(&Point::new(2.0, 0.0)));
        assert!(!d.engulfs(&Point::new(3.0, 0.0)));
    }

    #[test]
    fn segment_through_center_intersects() {
        let d = Disk::new(Point::new(5.0, 5.0), 2.0);
        assert!(d.segment_intersects(&Point::new(0.0, 5.0), &Point::new(10.0, 5.0)));
    }

    #[test]
    fn segment_far_away_does_not_intersect() {
        let d = Disk::new(Point::new(5.0, 5.0), 2.0);
        assert!(!d.segment_intersects(&Point::new(0.0, 0.0), &Point::new(0.0, 10.0)));
    }

    #[test]
    fn tangent_points_are_on_boundary() {
        let d = Disk::new(Point::new(0.0, 0.0), 2.0);
        let (l, r) = d.tangent_points(&Point::new(10.0, 0.0)).unwrap();
        assert!((l.dist(&d.center) - d.radius).abs() < 1e-9);
        assert!((r.dist(&d.center) - d.radius).abs() < 1e-9);
    }

    #[test]
    fn escape_point_lies_outside_with_margin() {
        let d = Disk::new(Point::new(5.0, 5.0), 3.0);
        let escaped = d.escape_point(&Point::new(4.0, 5.0), 0.5);
        assert!((escaped.x - 1.5).abs() < 1e-9);
        assert!((escaped.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn escape_point_at_center_uses_plus_x() {
        let d = Disk::new(Point::new(1.0, 1.0), 2.0);
        let escaped = d.escape_point(&Point::new(1.0, 1.0), 0.5);
        assert!((escaped.x - 3.5).abs() < 1e-9);
        assert!((escaped.y - 1.0).abs() < 1e-9);
    }
}
