//! Water-region and land-mass bounding boxes used to validate generated
//! ocean routes. Approximate by design — sufficient to keep waypoints from
//! visibly cutting across a continent, not a bathymetric model.

use crate::geometry::LonLat;

/// (min_lon, min_lat, max_lon, max_lat). When `wraps_dateline` is set,
/// `min_lon > max_lon` and the region spans the antimeridian.
struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
    wraps_dateline: bool,
}

struct WaterRegion {
    name: &'static str,
    bounds: BoundingBox,
}

macro_rules! water_region {
    ($name:expr, $min_lon:expr, $min_lat:expr, $max_lon:expr, $max_lat:expr) => {
        WaterRegion {
            name: $name,
            bounds: BoundingBox {
                min_lon: $min_lon,
                min_lat: $min_lat,
                max_lon: $max_lon,
                max_lat: $max_lat,
                wraps_dateline: false,
            },
        }
    };
    ($name:expr, $min_lon:expr, $min_lat:expr, $max_lon:expr, $max_lat:expr, wraps) => {
        WaterRegion {
            name: $name,
            bounds: BoundingBox {
                min_lon: $min_lon,
                min_lat: $min_lat,
                max_lon: $max_lon,
                max_lat: $max_lat,
                wraps_dateline: true,
            },
        }
    };
}

const WATER_REGIONS: &[WaterRegion] = &[
    water_region!("North Atlantic Ocean", -80.0, 0.0, 0.0, 65.0),
    water_region!("South Atlantic Ocean", -70.0, -60.0, 20.0, 0.0),
    water_region!("North Pacific Ocean", 100.0, 0.0, -100.0, 65.0, wraps),
    water_region!("South Pacific Ocean", 140.0, -60.0, -70.0, 0.0, wraps),
    water_region!("Indian Ocean", 20.0, -60.0, 120.0, 30.0),
    water_region!("Mediterranean Sea", -6.0, 30.0, 42.0, 47.0),
    water_region!("Red Sea", 32.0, 12.0, 44.0, 30.0),
    water_region!("Arabian Sea", 45.0, 5.0, 78.0, 26.0),
    water_region!("Bay of Bengal", 78.0, 5.0, 100.0, 23.0),
    water_region!("South China Sea", 100.0, 0.0, 122.0, 25.0),
    water_region!("East China Sea", 117.0, 23.0, 132.0, 35.0),
    water_region!("Sea of Japan", 127.0, 33.0, 142.0, 52.0),
    water_region!("Caribbean Sea", -90.0, 8.0, -60.0, 28.0),
    water_region!("Gulf of Mexico", -98.0, 18.0, -80.0, 31.0),
    water_region!("North Sea", -5.0, 50.0, 10.0, 62.0),
    water_region!("Baltic Sea", 9.0, 53.0, 30.0, 66.0),
    water_region!("Persian Gulf", 47.0, 23.0, 57.0, 31.0),
    water_region!("Gulf of Aden", 43.0, 10.0, 52.0, 16.0),
    water_region!("Strait of Malacca", 95.0, -1.0, 105.0, 8.0),
    water_region!("English Channel", -6.0, 48.0, 2.0, 52.0),
    water_region!("Suez Canal Region", 31.0, 29.0, 35.0, 32.0),
    water_region!("Panama Canal Region", -82.0, 7.0, -77.0, 11.0),
];

const LAND_MASSES: &[(&str, &[(f64, f64, f64, f64)])] = &[
    ("north_america", &[(-170.0, 25.0, -52.0, 85.0)]),
    ("south_america", &[(-82.0, -56.0, -34.0, 12.0)]),
    ("europe", &[(-10.0, 36.0, 40.0, 72.0)]),
    ("africa", &[(-18.0, -35.0, 52.0, 37.0)]),
    ("asia", &[(25.0, 1.0, 180.0, 78.0), (-180.0, 50.0, -170.0, 72.0)]),
    ("australia", &[(113.0, -45.0, 154.0, -10.0)]),
    ("india", &[(68.0, 6.0, 98.0, 38.0)]),
];

fn normalize_lon(mut lon: f64) -> f64 {
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}

fn in_box(lon: f64, lat: f64, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> bool {
    min_lon <= lon && lon <= max_lon && min_lat <= lat && lat <= max_lat
}

fn in_water_bounds(lon: f64, lat: f64, b: &BoundingBox) -> bool {
    let lon_match = if b.wraps_dateline {
        lon >= b.min_lon || lon <= b.max_lon
    } else {
        b.min_lon <= lon && lon <= b.max_lon
    };
    lon_match && b.min_lat <= lat && lat <= b.max_lat
}

/// True when a waypoint is likely over water, per the bounding-box model.
/// Defaults to water when the point falls outside every known region —
/// matching the original's bias toward not blocking route generation.
pub fn is_point_in_water(point: LonLat) -> bool {
    let lon = normalize_lon(point.0);
    let lat = point.1;

    if WATER_REGIONS.iter().any(|r| in_water_bounds(lon, lat, &r.bounds)) {
        return true;
    }

    let on_known_land = LAND_MASSES.iter().any(|(_, boxes)| {
        boxes
            .iter()
            .any(|&(min_lon, min_lat, max_lon, max_lat)| in_box(lon, lat, min_lon, min_lat, max_lon, max_lat))
    });

    !on_known_land
}

/// Conservative check: true only when a point is well inside a known land
/// mass and not inside any water region bounding box.
pub fn is_point_clearly_on_land(point: LonLat) -> bool {
    let lon = normalize_lon(point.0);
    let lat = point.1;
    const TOLERANCE: f64 = 2.0;

    for (_, boxes) in LAND_MASSES {
        for &(min_lon, min_lat, max_lon, max_lat) in *boxes {
            let shrunk = in_box(
                lon,
                lat,
                min_lon + TOLERANCE,
                min_lat + TOLERANCE,
                max_lon - TOLERANCE,
                max_lat - TOLERANCE,
            );
            if !shrunk {
                continue;
            }
            let in_water_region = WATER_REGIONS
                .iter()
                .any(|r| in_box(lon, lat, r.bounds.min_lon, r.bounds.min_lat, r.bounds.max_lon, r.bounds.max_lat));
            if !in_water_region {
                return true;
            }
        }
    }
    false
}

/// Snap a land-bound waypoint to the nearest water region by clamping it
/// into the bounding box of the closest region center (Euclidean, not
/// great-circle — this runs only on already-nearby perturbation artifacts).
pub fn nearest_water_point(point: LonLat) -> LonLat {
    let (lon, lat) = point;

    let nearest = WATER_REGIONS.iter().min_by(|a, b| {
        let dist = |r: &BoundingBox| {
            let cx = (r.min_lon + r.max_lon) / 2.0;
            let cy = (r.min_lat + r.max_lat) / 2.0;
            ((lon - cx).powi(2) + (lat - cy).powi(2)).sqrt()
        };
        dist(&a.bounds)
            .partial_cmp(&dist(&b.bounds))
            .expect("bounding box centers are always finite")
    });

    match nearest {
        Some(region) => (
            lon.clamp(
                region.bounds.min_lon.min(region.bounds.max_lon),
                region.bounds.min_lon.max(region.bounds.max_lon),
            ),
            lat.clamp(region.bounds.min_lat, region.bounds.max_lat),
        ),
        None => point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_atlantic_is_water() {
        assert!(is_point_in_water((-40.0, 30.0)));
    }

    #[test]
    fn central_africa_is_land() {
        assert!(!is_point_in_water((20.0, 0.0)));
    }

    #[test]
    fn central_africa_is_clearly_on_land() {
        assert!(is_point_clearly_on_land((20.0, 0.0)));
    }

    #[test]
    fn point_near_coast_is_not_clearly_on_land() {
        // Within tolerance of the Europe box edge.
        assert!(!is_point_clearly_on_land((-9.5, 36.5)));
    }

    #[test]
    fn dateline_wrapping_pacific_region_matches_both_sides() {
        assert!(is_point_in_water((170.0, 30.0)));
        assert!(is_point_in_water((-150.0, 30.0)));
    }

    #[test]
    fn nearest_water_point_clamps_into_bounds() {
        let snapped = nearest_water_point((20.0, 0.0));
        assert!(is_point_in_water(snapped) || !is_point_clearly_on_land(snapped));
    }
}
