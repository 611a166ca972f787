//! Closed-form placement of the first three speakers.
//!
//! While fewer than three speakers are connected there is not enough data to
//! multilaterate, but the coordinate frame is ours to choose: the first
//! speaker pins the origin, the second pins the x-axis, and the third is
//! dropped onto the circle where its two range spheres intersect. From the
//! fourth speaker on, [`crate::solver`] takes over.

use crate::geometry::Vec3;

/// Position of the first speaker to connect: the origin of the frame.
pub fn first() -> Vec3 {
    Vec3::ZERO
}

/// Position of the second speaker: `distance` along the x-axis from the
/// first. Any point on the sphere would do; the frame is still arbitrary.
pub fn second(first: Vec3, distance: f64) -> Vec3 {
    first + Vec3::new(distance, 0.0, 0.0)
}

/// Position of the third speaker, constrained by its measured ranges `r1`
/// and `r2` to the speakers at `a` and `b`.
///
/// When the two range spheres properly intersect, the law of cosines gives
/// the angle at `a` between the inter-speaker axis and the direction to the
/// new speaker, and the point is placed in the plane spanned by the axis and
/// a fixed perpendicular. Noisy readings can make the spheres disjoint or
/// nested; those cases fall back to a compromise point on the axis.
pub fn third(a: Vec3, b: Vec3, r1: f64, r2: f64) -> Vec3 {
    let d = a.distance(b);
    if d <= f64::EPSILON {
        // Coincident anchors carry no direction information.
        return a + Vec3::new(r1, 0.0, 0.0);
    }
    let axis = (b - a) / d;

    if d > r1 + r2 {
        // Readings too short to meet: settle halfway out to our own ring.
        a + axis * (r1 * 0.5)
    } else if r1 > d + r2 {
        // b's sphere sits wholly inside ours.
        let near = a + axis * r1;
        let far = b + axis * r2;
        (near + far) * 0.5
    } else if r2 > d + r1 {
        // Mirror case: our sphere sits wholly inside b's.
        let near = b - axis * r2;
        let far = a - axis * r1;
        (near + far) * 0.5
    } else {
        let cos = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0);
        let sin = (1.0 - cos * cos).sqrt();
        a + (axis * cos + perpendicular(axis) * sin) * r1
    }
}

/// Fixed, reproducible unit vector perpendicular to `axis`.
///
/// Swap-and-negate the x/y components; when the axis is (anti)parallel to z
/// that degenerates, so fall back to the y/z pair. The choice is arbitrary
/// but must never vary between runs: placement results are part of the
/// engine's observable behavior.
fn perpendicular(axis: Vec3) -> Vec3 {
    let p = Vec3::new(-axis.y, axis.x, 0.0);
    if p.length() > f64::EPSILON {
        p.normalized()
    } else {
        Vec3::new(0.0, -axis.z, axis.y).normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn first_is_origin() {
        assert_eq!(first(), Vec3::ZERO);
    }

    #[test]
    fn second_lies_on_x_axis_at_distance() {
        let p = second(Vec3::ZERO, 2500.0);
        assert_eq!(p, Vec3::new(2500.0, 0.0, 0.0));
        assert_eq!(Vec3::ZERO.distance(p), 2500.0);
    }

    #[test]
    fn second_offsets_from_first() {
        let base = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(second(base, 10.0), Vec3::new(11.0, 2.0, 3.0));
    }

    #[test]
    fn third_disjoint_spheres() {
        // 3 + 3 < 10: the spheres cannot meet.
        let p = third(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 3.0, 3.0);
        assert!(close(p, Vec3::new(1.5, 0.0, 0.0)), "got {p:?}");
    }

    #[test]
    fn third_second_sphere_nested_in_first() {
        // Sphere around b spans [1, 3]; ours reaches to 10.
        let p = third(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 10.0, 1.0);
        assert!(close(p, Vec3::new(6.5, 0.0, 0.0)), "got {p:?}");
    }

    #[test]
    fn third_first_sphere_nested_in_second() {
        let p = third(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 1.0, 10.0);
        assert!(close(p, Vec3::new(-4.5, 0.0, 0.0)), "got {p:?}");
    }

    #[test]
    fn third_intersecting_spheres_reproduces_distances() {
        // Ground truth (5, 5, 0): both ranges are sqrt(50).
        let a = Vec3::ZERO;
        let b = Vec3::new(10.0, 0.0, 0.0);
        let r = 50.0_f64.sqrt();
        let p = third(a, b, r, r);
        assert!((a.distance(p) - r).abs() < 1e-9, "r1 violated: {p:?}");
        assert!((b.distance(p) - r).abs() < 1e-9, "r2 violated: {p:?}");
        assert!(close(p, Vec3::new(5.0, 5.0, 0.0)), "got {p:?}");
    }

    #[test]
    fn third_is_deterministic() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 6.0, 3.0);
        let once = third(a, b, 4.0, 3.5);
        let again = third(a, b, 4.0, 3.5);
        assert_eq!(once, again);
    }

    #[test]
    fn perpendicular_is_orthogonal_unit() {
        for axis in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.6, -0.8, 0.0).normalized(),
            Vec3::new(1.0, 2.0, -2.0).normalized(),
        ] {
            let p = perpendicular(axis);
            let dot = p.x * axis.x + p.y * axis.y + p.z * axis.z;
            assert!(dot.abs() < 1e-12, "not orthogonal for {axis:?}");
            assert!((p.length() - 1.0).abs() < 1e-12, "not unit for {axis:?}");
        }
    }
}
