//! Route generation: ocean, land, and rail paths between geofences.
//!
//! Ocean routes are built through named shipping chokepoints and then
//! validated to stay clear of land; land and rail routes are linear
//! interpolation between centroids with Gaussian wobble.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::chokepoints::{chokepoint_by_key, chokepoints_for_regions, classify_region};
use crate::geofence::{Geofence, GeofenceType};
use crate::geofence_repo::GeofenceStore;
use crate::geometry::{LonLat, great_circle_points, haversine_meters, perturb};
use crate::water_regions::{is_point_clearly_on_land, nearest_water_point};

/// Waypoints per leg when routing straight between two points.
const DIRECT_WAYPOINTS: usize = 20;
/// Waypoints per leg when routing to/from a chokepoint.
const CHOKEPOINT_LEG_WAYPOINTS: usize = 10;
const LAND_ROUTE_WAYPOINTS: usize = 10;
const RAIL_ROUTE_WAYPOINTS: usize = 15;

const OCEAN_ROUTE_MAX_DEVIATION_KM: f64 = 50.0;
const LAND_ROUTE_MAX_DEVIATION_KM: f64 = 5.0;
const RAIL_ROUTE_MAX_DEVIATION_KM: f64 = 2.0;

/// A complete depot-to-depot journey assignment, with an optional rail
/// detour at either end.
#[derive(Debug, Clone)]
pub struct Journey {
    pub origin_depot: Option<std::sync::Arc<Geofence>>,
    pub origin_terminal: std::sync::Arc<Geofence>,
    pub destination_terminal: std::sync::Arc<Geofence>,
    pub destination_depot: Option<std::sync::Arc<Geofence>>,
    pub origin_rail_ramp: Option<std::sync::Arc<Geofence>>,
    pub destination_rail_ramp: Option<std::sync::Arc<Geofence>>,
    pub use_rail: bool,
}

pub struct RouteGenerator<'a> {
    store: &'a GeofenceStore,
    rail_enabled_countries: &'a [String],
    rail_routing_probability: f64,
}

impl<'a> RouteGenerator<'a> {
    pub fn new(store: &'a GeofenceStore, rail_enabled_countries: &'a [String], rail_routing_probability: f64) -> Self {
        Self {
            store,
            rail_enabled_countries,
            rail_routing_probability,
        }
    }

    /// Arithmetic-mean centroid of a geofence's polygon, delegated to the
    /// underlying store.
    pub async fn centroid(&self, geofence_id: uuid::Uuid) -> anyhow::Result<LonLat> {
        self.store.centroid(geofence_id).await
    }

    pub fn get_random_terminal<R: Rng + ?Sized>(&self, exclude: Option<&str>, rng: &mut R) -> Option<std::sync::Arc<Geofence>> {
        let candidates: Vec<_> = self
            .store
            .by_type(GeofenceType::Terminal)
            .into_iter()
            .filter(|t| exclude.is_none_or(|name| t.name != name))
            .collect();
        candidates.choose(rng).cloned()
    }

    /// A random depot, preferring one in the same country as `near_terminal`.
    pub fn get_random_depot<R: Rng + ?Sized>(&self, near_terminal: Option<&Geofence>, rng: &mut R) -> Option<std::sync::Arc<Geofence>> {
        let all = self.store.by_type(GeofenceType::Depot);
        if all.is_empty() {
            return None;
        }
        if let Some(terminal) = near_terminal {
            if let Some(country) = country_prefix(&terminal.name) {
                let same_country = self.store.by_type_and_country(GeofenceType::Depot, country);
                if !same_country.is_empty() {
                    return same_country.choose(rng).cloned();
                }
            }
        }
        all.choose(rng).cloned()
    }

    pub fn get_random_rail_ramp<R: Rng + ?Sized>(&self, near_terminal: Option<&Geofence>, rng: &mut R) -> Option<std::sync::Arc<Geofence>> {
        let all = self.store.by_type(GeofenceType::RailRamp);
        if all.is_empty() {
            return None;
        }
        if let Some(terminal) = near_terminal {
            if let Some(country) = country_prefix(&terminal.name) {
                let same_country = self.store.by_type_and_country(GeofenceType::RailRamp, country);
                if !same_country.is_empty() {
                    return same_country.choose(rng).cloned();
                }
            }
        }
        all.choose(rng).cloned()
    }

    /// Rail is used when the terminal's country is rail-enabled, rail ramps
    /// exist in that country, and a coin flip at `rail_routing_probability`
    /// passes.
    pub fn should_use_rail<R: Rng + ?Sized>(&self, depot: Option<&Geofence>, terminal: Option<&Geofence>, rng: &mut R) -> bool {
        let (Some(_depot), Some(terminal)) = (depot, terminal) else {
            return false;
        };
        let Some(country) = country_prefix(&terminal.name) else {
            return false;
        };
        if !self.rail_enabled_countries.iter().any(|c| c == country) {
            return false;
        }
        if self.store.by_type_and_country(GeofenceType::RailRamp, country).is_empty() {
            return false;
        }
        rng.random_bool(self.rail_routing_probability)
    }

    /// Select a full journey: depot -> terminal -> terminal -> depot, with
    /// an optional rail detour at either end.
    pub fn select_journey<R: Rng + ?Sized>(&self, rng: &mut R) -> anyhow::Result<Journey> {
        let origin_terminal = self
            .get_random_terminal(None, rng)
            .ok_or_else(|| anyhow::anyhow!("no terminals available"))?;

        let destination_terminal = self
            .get_random_terminal(Some(&origin_terminal.name), rng)
            .unwrap_or_else(|| origin_terminal.clone());

        let origin_depot = self.get_random_depot(Some(&origin_terminal), rng);
        let destination_depot = self.get_random_depot(Some(&destination_terminal), rng);

        let mut journey = Journey {
            origin_depot,
            origin_terminal: origin_terminal.clone(),
            destination_terminal: destination_terminal.clone(),
            destination_depot,
            origin_rail_ramp: None,
            destination_rail_ramp: None,
            use_rail: false,
        };

        if self.should_use_rail(journey.origin_depot.as_deref(), Some(&origin_terminal), rng) {
            if let Some(ramp) = self.get_random_rail_ramp(Some(&origin_terminal), rng) {
                journey.origin_rail_ramp = Some(ramp);
                journey.use_rail = true;
            }
        }

        if self.should_use_rail(journey.destination_depot.as_deref(), Some(&destination_terminal), rng) {
            if let Some(ramp) = self.get_random_rail_ramp(Some(&destination_terminal), rng) {
                journey.destination_rail_ramp = Some(ramp);
                journey.use_rail = true;
            }
        }

        Ok(journey)
    }

    /// Ocean route between two terminal centroids, routed through the
    /// chokepoints their regions imply, then validated off any land and
    /// given a realistic wobble.
    pub async fn generate_ocean_route<R: Rng + ?Sized>(
        &self,
        origin: &Geofence,
        destination: &Geofence,
        rng: &mut R,
    ) -> anyhow::Result<Vec<LonLat>> {
        let origin_centroid = self.store.centroid(origin.id).await?;
        let dest_centroid = self.store.centroid(destination.id).await?;

        let origin_region = classify_region(country_prefix(&origin.name).unwrap_or(""), Some(origin_centroid.0));
        let dest_region = classify_region(country_prefix(&destination.name).unwrap_or(""), Some(dest_centroid.0));

        let chokepoint_keys = chokepoints_for_regions(origin_region, dest_region);

        let waypoints = build_chokepoint_route(origin_centroid, dest_centroid, &chokepoint_keys);
        let waypoints = validate_ocean_route(waypoints);
        let waypoints = add_route_variation(waypoints, OCEAN_ROUTE_MAX_DEVIATION_KM, rng);

        Ok(waypoints)
    }

    /// Road route between two geofence centroids: linear interpolation with
    /// a ~5km road-like wobble.
    pub async fn generate_land_route<R: Rng + ?Sized>(
        &self,
        origin: &Geofence,
        destination: &Geofence,
        rng: &mut R,
    ) -> anyhow::Result<Vec<LonLat>> {
        let origin_centroid = self.store.centroid(origin.id).await?;
        let dest_centroid = self.store.centroid(destination.id).await?;
        let waypoints = linear_interpolate(origin_centroid, dest_centroid, LAND_ROUTE_WAYPOINTS);
        Ok(add_route_variation(waypoints, LAND_ROUTE_MAX_DEVIATION_KM, rng))
    }

    /// Rail route: same linear interpolation as land routes, but a tighter
    /// ~2km wobble since trains follow fixed track.
    pub async fn generate_rail_route<R: Rng + ?Sized>(
        &self,
        origin: &Geofence,
        destination: &Geofence,
        rng: &mut R,
    ) -> anyhow::Result<Vec<LonLat>> {
        let origin_centroid = self.store.centroid(origin.id).await?;
        let dest_centroid = self.store.centroid(destination.id).await?;
        let waypoints = linear_interpolate(origin_centroid, dest_centroid, RAIL_ROUTE_WAYPOINTS);
        Ok(add_route_variation(waypoints, RAIL_ROUTE_MAX_DEVIATION_KM, rng))
    }
}

/// First two characters of a geofence name, used as its ISO country code.
fn country_prefix(name: &str) -> Option<&str> {
    name.get(0..2).filter(|_| name.len() >= 2)
}

fn linear_interpolate(origin: LonLat, dest: LonLat, n: usize) -> Vec<LonLat> {
    (0..=n)
        .map(|i| {
            let t = i as f64 / n as f64;
            (origin.0 + t * (dest.0 - origin.0), origin.1 + t * (dest.1 - origin.1))
        })
        .collect()
}

fn build_chokepoint_route(origin: LonLat, destination: LonLat, chokepoint_keys: &[&str]) -> Vec<LonLat> {
    if chokepoint_keys.is_empty() {
        let mut route = vec![origin];
        route.extend(great_circle_points(origin, destination, DIRECT_WAYPOINTS));
        route.push(destination);
        return route;
    }

    let mut all_waypoints = vec![origin];
    let mut current_point = origin;

    for key in chokepoint_keys {
        let Some(chokepoint) = chokepoint_by_key(key) else {
            continue;
        };
        if chokepoint.waypoints.is_empty() {
            continue;
        }

        let first = chokepoint.waypoints[0];
        all_waypoints.extend(great_circle_points(current_point, first, CHOKEPOINT_LEG_WAYPOINTS));
        all_waypoints.extend(chokepoint.waypoints.iter().copied());

        current_point = *chokepoint.waypoints.last().unwrap();
    }

    all_waypoints.extend(great_circle_points(current_point, destination, CHOKEPOINT_LEG_WAYPOINTS));
    all_waypoints.push(destination);
    all_waypoints
}

fn validate_ocean_route(waypoints: Vec<LonLat>) -> Vec<LonLat> {
    if waypoints.len() <= 2 {
        return waypoints;
    }

    let mut validated = Vec::with_capacity(waypoints.len());
    validated.push(waypoints[0]);

    for &point in &waypoints[1..waypoints.len() - 1] {
        if is_point_clearly_on_land(point) {
            validated.push(nearest_water_point(point));
        } else {
            validated.push(point);
        }
    }

    validated.push(*waypoints.last().unwrap());
    validated
}

/// Nudge every interior waypoint with Gaussian noise, leaving the endpoints
/// untouched, converting the km deviation to degrees at each point's
/// latitude (longitude degrees shrink toward the poles).
fn add_route_variation<R: Rng + ?Sized>(waypoints: Vec<LonLat>, max_deviation_km: f64, rng: &mut R) -> Vec<LonLat> {
    if waypoints.len() <= 2 {
        return waypoints;
    }

    let mut result = Vec::with_capacity(waypoints.len());
    result.push(waypoints[0]);

    for &(lon, lat) in &waypoints[1..waypoints.len() - 1] {
        let km_per_deg_lat = 111.0;
        let km_per_deg_lon = 111.0 * lat.to_radians().cos();

        let max_dev_lat_deg = max_deviation_km / km_per_deg_lat;
        let (perturbed_lon, _) = if km_per_deg_lon.abs() > 1e-9 {
            perturb((lon, lat), max_deviation_km / km_per_deg_lon, rng)
        } else {
            (lon, lat)
        };
        let (_, perturbed_lat) = perturb((lon, lat), max_dev_lat_deg, rng);

        result.push((perturbed_lon, perturbed_lat));
    }

    result.push(*waypoints.last().unwrap());
    result
}

/// Total great-circle length of a route, in meters.
pub fn calculate_route_distance(waypoints: &[LonLat]) -> f64 {
    waypoints.windows(2).map(|pair| haversine_meters(pair[0], pair[1])).sum()
}

/// Great-circle distance between two points, in kilometers.
pub fn distance_km(a: LonLat, b: LonLat) -> f64 {
    haversine_meters(a, b) / 1000.0
}

/// Total length of a route, in kilometers.
pub fn route_length_km(waypoints: &[LonLat]) -> f64 {
    calculate_route_distance(waypoints) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_prefix_requires_two_chars() {
        assert_eq!(country_prefix("USLAX Terminal"), Some("US"));
        assert_eq!(country_prefix("X"), None);
    }

    #[test]
    fn linear_interpolate_hits_endpoints() {
        let points = linear_interpolate((0.0, 0.0), (10.0, 20.0), 4);
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], (0.0, 0.0));
        assert_eq!(points[4], (10.0, 20.0));
    }

    #[test]
    fn direct_route_has_no_chokepoint_waypoints_inserted() {
        let route = build_chokepoint_route((0.0, 0.0), (1.0, 1.0), &[]);
        assert_eq!(route.first(), Some(&(0.0, 0.0)));
        assert_eq!(route.last(), Some(&(1.0, 1.0)));
    }

    #[test]
    fn chokepoint_route_passes_through_chokepoint_waypoints() {
        let route = build_chokepoint_route((30.0, 31.5), (40.0, 20.0), &["suez"]);
        let suez = chokepoint_by_key("suez").unwrap();
        for wp in suez.waypoints {
            assert!(route.contains(wp));
        }
    }

    #[test]
    fn route_distance_is_zero_for_single_point() {
        assert_eq!(calculate_route_distance(&[(0.0, 0.0)]), 0.0);
    }

    #[test]
    fn route_distance_sums_segment_lengths() {
        let waypoints = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)];
        let total = calculate_route_distance(&waypoints);
        let seg = haversine_meters((0.0, 0.0), (1.0, 0.0));
        assert!((total - 2.0 * seg).abs() < 1.0);
    }

    #[test]
    fn route_variation_preserves_endpoints() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        let mut rng = StdRng::seed_from_u64(5);
        let waypoints = linear_interpolate((0.0, 0.0), (10.0, 10.0), 5);
        let varied = add_route_variation(waypoints.clone(), 20.0, &mut rng);
        assert_eq!(varied.first(), waypoints.first());
        assert_eq!(varied.last(), waypoints.last());
    }
}
