//! Iterative multilateration.
//!
//! Finds the point minimizing the mean absolute range error against a set of
//! distance spheres. The search is a deliberately simple adaptive
//! coordinate-direction descent: try a step of size `eta` along each of the
//! six axis directions, take the best one if it improves, otherwise halve
//! `eta` and try again. `eta` re-seeds to the current error after every
//! accepted move, so the step size tracks how far off we still are.

use crate::geometry::{Sphere, Vec3};

/// Hard cap on search iterations; hitting it is a warning, not a failure.
pub const MAX_ITERATIONS: usize = 100;

/// Mean absolute error (in distance units) below which the search stops.
pub const CONVERGENCE_THRESHOLD: f64 = 0.1;

const DIRECTIONS: [Vec3; 6] = [
    Vec3 { x: 1.0, y: 0.0, z: 0.0 },
    Vec3 { x: 0.0, y: 1.0, z: 0.0 },
    Vec3 { x: 0.0, y: 0.0, z: 1.0 },
    Vec3 { x: -1.0, y: 0.0, z: 0.0 },
    Vec3 { x: 0.0, y: -1.0, z: 0.0 },
    Vec3 { x: 0.0, y: 0.0, z: -1.0 },
];

/// Locate the point best satisfying the given distance constraints,
/// starting the search at `start` (callers pass the centroid of the known
/// speaker positions).
///
/// Always returns a point. If the iteration cap is exhausted before the
/// error drops under [`CONVERGENCE_THRESHOLD`], the best point found so far
/// is returned and the residual is logged at warn level.
pub fn solve(spheres: &[Sphere], start: Vec3) -> Vec3 {
    if spheres.is_empty() {
        return start;
    }

    let mut point = start;
    let mut error = mean_error(point, spheres);
    let mut eta = error;

    for _ in 0..MAX_ITERATIONS {
        if error <= CONVERGENCE_THRESHOLD {
            return point;
        }

        let mut best_point = point;
        let mut best_error = f64::INFINITY;
        for dir in DIRECTIONS {
            let candidate = point + dir * eta;
            let candidate_error = mean_error(candidate, spheres);
            if candidate_error < best_error {
                best_point = candidate;
                best_error = candidate_error;
            }
        }

        if best_error < error {
            point = best_point;
            error = best_error;
            eta = best_error;
        } else {
            // Overshot in every direction; tighten the step.
            eta *= 0.5;
        }
    }

    if error > CONVERGENCE_THRESHOLD {
        tracing::warn!(
            residual = error,
            "position search stopped after {MAX_ITERATIONS} iterations without converging"
        );
    }

    point
}

/// Mean absolute difference between each sphere's radius and the point's
/// actual distance to its center.
fn mean_error(point: Vec3, spheres: &[Sphere]) -> f64 {
    let total: f64 = spheres
        .iter()
        .map(|s| (s.radius - s.center.distance(point)).abs())
        .sum();
    total / spheres.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::centroid;

    fn spheres_around(target: Vec3, anchors: &[Vec3]) -> Vec<Sphere> {
        anchors
            .iter()
            .map(|&a| Sphere::new(a, a.distance(target)))
            .collect()
    }

    #[test]
    fn converges_on_exact_ranges() {
        let anchors = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        let target = Vec3::new(2.0, 3.0, 4.0);
        let spheres = spheres_around(target, &anchors);
        let start = centroid(anchors);

        let found = solve(&spheres, start);
        assert!(
            found.distance(target) < 0.2,
            "found {found:?}, wanted {target:?}"
        );
    }

    #[test]
    fn converges_from_offset_targets() {
        let anchors = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(8.0, 0.0, 1.0),
            Vec3::new(1.0, 9.0, 0.0),
            Vec3::new(2.0, 3.0, 7.0),
        ];
        for target in [
            Vec3::new(4.0, 4.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(6.0, 2.0, 3.0),
        ] {
            let spheres = spheres_around(target, &anchors);
            let found = solve(&spheres, centroid(anchors));
            assert!(
                found.distance(target) < 0.2,
                "found {found:?}, wanted {target:?}"
            );
        }
    }

    #[test]
    fn already_converged_start_is_returned() {
        let anchors = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        ];
        let target = Vec3::new(1.0, 1.0, 0.0);
        let spheres = spheres_around(target, &anchors);
        assert_eq!(solve(&spheres, target), target);
    }

    #[test]
    fn inconsistent_ranges_still_produce_a_point() {
        // No point satisfies these; the solver must return best effort.
        let spheres = vec![
            Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0),
            Sphere::new(Vec3::new(100.0, 0.0, 0.0), 1.0),
            Sphere::new(Vec3::new(0.0, 100.0, 0.0), 1.0),
        ];
        let found = solve(&spheres, centroid(spheres.iter().map(|s| s.center)));
        assert!(found.x.is_finite() && found.y.is_finite() && found.z.is_finite());
    }

    #[test]
    fn no_spheres_returns_start() {
        let start = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(solve(&[], start), start);
    }
}
