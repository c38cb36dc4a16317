//! Great-circle interpolation and route perturbation helpers shared by the
//! ocean, land, and rail route generators.

use geo::{Distance, Haversine, InterpolatePoint, Point};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// A waypoint expressed as (longitude, latitude) degrees, matching the
/// lon-lat ordering used throughout the route data tables.
pub type LonLat = (f64, f64);

/// Great-circle distance between two lon/lat points, in meters.
pub fn haversine_meters(a: LonLat, b: LonLat) -> f64 {
    Haversine.distance(Point::new(a.0, a.1), Point::new(b.0, b.1))
}

/// Interpolate `n` intermediate points (exclusive of `start`/`end`) along the
/// great-circle path between two waypoints.
pub fn great_circle_points(start: LonLat, end: LonLat, n: usize) -> Vec<LonLat> {
    if n == 0 {
        return Vec::new();
    }
    let a = Point::new(start.0, start.1);
    let b = Point::new(end.0, end.1);
    (1..=n)
        .map(|i| {
            let ratio = i as f64 / (n + 1) as f64;
            let p = Haversine.point_at_ratio_between(a, b, ratio);
            (p.x(), p.y())
        })
        .collect()
}

/// Perturb a waypoint with Gaussian noise, used to give land/rail routes a
/// natural-looking wobble instead of a perfectly straight line.
///
/// `max_deviation_degrees` is treated as a soft 3-sigma bound: the actual
/// standard deviation is `max_deviation_degrees / 3`.
pub fn perturb<R: Rng + ?Sized>(point: LonLat, max_deviation_degrees: f64, rng: &mut R) -> LonLat {
    if max_deviation_degrees <= 0.0 {
        return point;
    }
    let sigma = max_deviation_degrees / 3.0;
    let normal = Normal::new(0.0, sigma).expect("sigma must be finite and positive");
    let dx: f64 = normal.sample(rng);
    let dy: f64 = normal.sample(rng);
    (point.0 + dx, point.1 + dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = (32.0, 31.0);
        assert!(haversine_meters(p, p) < 1e-6);
    }

    #[test]
    fn great_circle_points_count_and_order() {
        let start = (0.0, 0.0);
        let end = (10.0, 10.0);
        let points = great_circle_points(start, end, 3);
        assert_eq!(points.len(), 3);
        // each successive point should move monotonically toward `end`
        for pair in points.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn great_circle_points_zero_requested_is_empty() {
        assert!(great_circle_points((0.0, 0.0), (1.0, 1.0), 0).is_empty());
    }

    #[test]
    fn perturb_is_deterministic_for_seeded_rng() {
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        let p = (10.0, 20.0);
        assert_eq!(perturb(p, 1.0, &mut rng1), perturb(p, 1.0, &mut rng2));
    }

    #[test]
    fn perturb_with_zero_deviation_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = (10.0, 20.0);
        assert_eq!(perturb(p, 0.0, &mut rng), p);
    }
}
