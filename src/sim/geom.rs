//! 2D vector helpers on top of `glam::DVec2`
//!
//! Every helper is total: degenerate input (zero-length vectors, coincident
//! points) maps to a defined value instead of NaN.

use glam::DVec2;

/// Lengths below this are treated as zero
pub const GEOM_EPSILON: f64 = 1e-9;

/// Unit vector in the direction of `v`, or zero for near-zero input
#[inline]
pub fn safe_normalize(v: DVec2) -> DVec2 {
    let len = v.length();
    if len < GEOM_EPSILON || !len.is_finite() {
        DVec2::ZERO
    } else {
        v / len
    }
}

/// Rotate counter-clockwise by `angle` radians
#[inline]
pub fn rotate(v: DVec2, angle: f64) -> DVec2 {
    let (s, c) = angle.sin_cos();
    DVec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Reflect velocity off a surface with given unit normal
#[inline]
pub fn reflect(vel: DVec2, normal: DVec2) -> DVec2 {
    vel - 2.0 * vel.dot(normal) * normal
}

/// Closest point to `p` on the segment `a`-`b`
pub fn closest_point_on_segment(p: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < GEOM_EPSILON * GEOM_EPSILON {
        return a; // Degenerate segment
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Perpendicular distance from `p` to the segment `a`-`b`
#[inline]
pub fn point_segment_distance(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    p.distance(closest_point_on_segment(p, a, b))
}

/// Unsigned angle between two directions in [0, π]; zero if either is degenerate
pub fn angle_between(a: DVec2, b: DVec2) -> f64 {
    let a = safe_normalize(a);
    let b = safe_normalize(b);
    if a == DVec2::ZERO || b == DVec2::ZERO {
        return 0.0;
    }
    a.perp_dot(b).atan2(a.dot(b)).abs()
}

/// Signed angle (counter-clockwise positive) that rotates `from` onto `to`
pub fn signed_angle(from: DVec2, to: DVec2) -> f64 {
    let a = safe_normalize(from);
    let b = safe_normalize(to);
    if a == DVec2::ZERO || b == DVec2::ZERO {
        return 0.0;
    }
    a.perp_dot(b).atan2(a.dot(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_safe_normalize_zero() {
        assert_eq!(safe_normalize(DVec2::ZERO), DVec2::ZERO);
        assert_eq!(safe_normalize(DVec2::new(1e-12, -1e-12)), DVec2::ZERO);
        let n = safe_normalize(DVec2::new(3.0, 4.0));
        assert!((n - DVec2::new(0.6, 0.8)).length() < 1e-12);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = rotate(DVec2::X, FRAC_PI_2);
        assert!((v - DVec2::Y).length() < 1e-12);
    }

    #[test]
    fn test_reflect_velocity() {
        // Ball moving right, hits vertical wall (normal pointing left)
        let reflected = reflect(DVec2::new(100.0, 0.0), DVec2::new(-1.0, 0.0));
        assert!((reflected.x + 100.0).abs() < 1e-12);
        assert!(reflected.y.abs() < 1e-12);
    }

    #[test]
    fn test_point_segment_distance() {
        let a = DVec2::new(0.0, 0.0);
        let b = DVec2::new(10.0, 0.0);
        assert!((point_segment_distance(DVec2::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-12);
        // Beyond the end: distance to endpoint
        assert!((point_segment_distance(DVec2::new(13.0, 4.0), a, b) - 5.0).abs() < 1e-12);
        // Degenerate segment
        assert!((point_segment_distance(DVec2::new(3.0, 4.0), a, a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_angles() {
        assert!((angle_between(DVec2::X, DVec2::Y) - FRAC_PI_2).abs() < 1e-12);
        assert!((angle_between(DVec2::X, -DVec2::X) - PI).abs() < 1e-12);
        assert!((signed_angle(DVec2::X, -DVec2::Y) + FRAC_PI_2).abs() < 1e-12);
        assert_eq!(angle_between(DVec2::ZERO, DVec2::X), 0.0);
    }

    proptest! {
        #[test]
        fn prop_normalize_never_nan(x in -1e6f64..1e6, y in -1e6f64..1e6) {
            let n = safe_normalize(DVec2::new(x, y));
            prop_assert!(n.x.is_finite() && n.y.is_finite());
            prop_assert!(n == DVec2::ZERO || (n.length() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_rotate_preserves_length(x in -1e3f64..1e3, y in -1e3f64..1e3, a in -10.0f64..10.0) {
            let v = DVec2::new(x, y);
            prop_assert!((rotate(v, a).length() - v.length()).abs() < 1e-9);
        }
    }
}
