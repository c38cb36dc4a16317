//! Container model and state machine.
//!
//! A container moves through a fixed 14-state cycle from its origin depot
//! back to a destination depot, optionally routing through rail ramps at
//! either end. Transitions outside the valid set are a silent no-op — the
//! scheduler never hard-errors on an unreachable target state.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::LonLat;
use crate::schema::containers;

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::ContainerStateEnum")]
pub enum ContainerState {
    AtOriginDepot,
    InTransitToRailRamp,
    AtOriginRailRamp,
    InTransitRail,
    InTransitToTerminal,
    AtOriginTerminal,
    LoadedOnVessel,
    InTransitOcean,
    AtDestinationTerminal,
    InTransitFromTerminal,
    AtDestinationRailRamp,
    InTransitRailToDepot,
    InTransitToDepot,
    AtDestinationDepot,
}

impl ContainerState {
    /// States a container may move to from the current one. Empty for none.
    pub fn valid_next_states(self) -> &'static [ContainerState] {
        use ContainerState::*;
        match self {
            AtOriginDepot => &[InTransitToTerminal, InTransitToRailRamp],
            InTransitToTerminal => &[AtOriginTerminal],
            AtOriginTerminal => &[LoadedOnVessel],
            LoadedOnVessel => &[InTransitOcean],
            InTransitOcean => &[AtDestinationTerminal],
            AtDestinationTerminal => &[InTransitToDepot, InTransitFromTerminal],
            InTransitToDepot => &[AtDestinationDepot],
            AtDestinationDepot => &[InTransitToTerminal, InTransitToRailRamp],
            InTransitToRailRamp => &[AtOriginRailRamp],
            AtOriginRailRamp => &[InTransitRail],
            InTransitRail => &[InTransitToTerminal],
            InTransitFromTerminal => &[AtDestinationRailRamp],
            AtDestinationRailRamp => &[InTransitRailToDepot],
            InTransitRailToDepot => &[InTransitToDepot],
        }
    }

    pub fn can_transition_to(self, target: ContainerState) -> bool {
        self.valid_next_states().contains(&target)
    }
}

/// A container's full mutable runtime state, one row per tracked container.
/// Mutated only by the scheduler during its tick for this container's slot.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = containers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Container {
    pub container_id: String,
    pub tracker_id: String,
    pub asset_id: i32,
    pub container_type: String,
    pub refrigerated: bool,
    pub cargo_type: String,
    pub state: ContainerState,
    pub report_slot: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub is_moving: bool,
    pub door_open: bool,
    pub current_geofence: Option<String>,
    pub use_rail: bool,
    pub origin_depot: Option<String>,
    pub origin_rail_ramp: Option<String>,
    pub origin_terminal: Option<String>,
    pub destination_terminal: Option<String>,
    pub destination_rail_ramp: Option<String>,
    pub destination_depot: Option<String>,
    pub journey_start_time: DateTime<Utc>,
    pub last_event_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CONTAINER_TYPES: &[&str] = &["20ft", "40ft", "40ft HC", "45ft HC"];
const CARGO_TYPES: &[&str] = &[
    "General Cargo",
    "Electronics",
    "Textiles",
    "Machinery",
    "Food Products",
    "Chemicals",
    "Auto Parts",
    "Furniture",
];
const REEFER_PROBABILITY: f64 = 0.15;

/// Container-ID prefix for Zim-owned equipment, per the ISO 6346 owner code.
const CONTAINER_ID_PREFIX: &str = "ZIMU";

/// Generate a Zim-style container ID, e.g. `ZIMU3170479`.
pub fn generate_container_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let digits: String = (0..7).map(|_| rng.random_range(0..10).to_string()).collect();
    format!("{CONTAINER_ID_PREFIX}{digits}")
}

/// Generate a tracker ID, e.g. `A0000669`.
pub fn generate_tracker_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("A{:07}", rng.random_range(0..10_000_000u32))
}

impl Container {
    /// Build a new container at rest in its origin depot, with freshly
    /// generated identity fields and no journey assigned yet.
    pub fn new_at_rest<R: Rng + ?Sized>(
        report_slot: i32,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        Self {
            container_id: generate_container_id(rng),
            tracker_id: generate_tracker_id(rng),
            asset_id: rng.random_range(30_000..40_000),
            container_type: CONTAINER_TYPES[rng.random_range(0..CONTAINER_TYPES.len())].to_string(),
            refrigerated: rng.random_bool(REEFER_PROBABILITY),
            cargo_type: CARGO_TYPES[rng.random_range(0..CARGO_TYPES.len())].to_string(),
            state: ContainerState::AtOriginDepot,
            report_slot,
            latitude: 0.0,
            longitude: 0.0,
            is_moving: false,
            door_open: false,
            current_geofence: None,
            use_rail: false,
            origin_depot: None,
            origin_rail_ramp: None,
            origin_terminal: None,
            destination_terminal: None,
            destination_rail_ramp: None,
            destination_depot: None,
            journey_start_time: now,
            last_event_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn position(&self) -> LonLat {
        (self.longitude, self.latitude)
    }

    pub fn set_position(&mut self, point: LonLat) {
        self.longitude = point.0;
        self.latitude = point.1;
    }

    /// Attempt a state transition. No-op (returns `false`) if `target` is
    /// not reachable from the current state.
    pub fn transition_to(&mut self, target: ContainerState) -> bool {
        if !self.state.can_transition_to(target) {
            metrics::counter!("simulation_state_transitions_rejected_total").increment(1);
            return false;
        }
        self.state = target;
        metrics::counter!("simulation_state_transitions_total").increment(1);
        true
    }
}

/// A container paired with its current route.
///
/// The route is never a column of the `containers` table — it's owned by
/// the runtime and discarded once the container arrives (§9 design note) —
/// so it lives here rather than on `Container` itself, which maps 1:1 onto
/// persisted columns for its `Insertable`/`Queryable` derive.
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    pub row: Container,
    pub route: Vec<LonLat>,
    pub route_index: usize,
}

impl ContainerRuntime {
    pub fn new(row: Container) -> Self {
        Self {
            row,
            route: Vec::new(),
            route_index: 0,
        }
    }

    /// Install a freshly generated route and reset the cursor to its start.
    pub fn set_route(&mut self, route: Vec<LonLat>) {
        self.route = route;
        self.route_index = 0;
    }

    /// Drop the route, e.g. on arrival at a stationary state.
    pub fn clear_route(&mut self) {
        self.route.clear();
        self.route_index = 0;
    }

    pub fn has_next_waypoint(&self) -> bool {
        self.route_index + 1 < self.route.len()
    }

    /// Advance to the next waypoint and move the container there. No-op if
    /// already at the last waypoint.
    pub fn advance(&mut self) -> bool {
        if !self.has_next_waypoint() {
            return false;
        }
        self.route_index += 1;
        let point = self.route[self.route_index];
        self.row.set_position(point);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn origin_depot_can_go_to_terminal_or_rail_ramp() {
        assert!(ContainerState::AtOriginDepot.can_transition_to(ContainerState::InTransitToTerminal));
        assert!(ContainerState::AtOriginDepot.can_transition_to(ContainerState::InTransitToRailRamp));
        assert!(!ContainerState::AtOriginDepot.can_transition_to(ContainerState::LoadedOnVessel));
    }

    #[test]
    fn full_cycle_is_reachable() {
        use ContainerState::*;
        let cycle = [
            AtOriginDepot,
            InTransitToTerminal,
            AtOriginTerminal,
            LoadedOnVessel,
            InTransitOcean,
            AtDestinationTerminal,
            InTransitToDepot,
            AtDestinationDepot,
        ];
        for pair in cycle.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn rail_detour_round_trips_back_to_main_line() {
        use ContainerState::*;
        assert!(AtOriginDepot.can_transition_to(InTransitToRailRamp));
        assert!(InTransitToRailRamp.can_transition_to(AtOriginRailRamp));
        assert!(AtOriginRailRamp.can_transition_to(InTransitRail));
        assert!(InTransitRail.can_transition_to(InTransitToTerminal));
    }

    #[test]
    fn transition_to_invalid_target_is_silent_noop() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut c = Container::new_at_rest(0, Utc::now(), &mut rng);
        assert_eq!(c.state, ContainerState::AtOriginDepot);
        let applied = c.transition_to(ContainerState::InTransitOcean);
        assert!(!applied);
        assert_eq!(c.state, ContainerState::AtOriginDepot);
    }

    #[test]
    fn transition_to_valid_target_applies() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut c = Container::new_at_rest(0, Utc::now(), &mut rng);
        assert!(c.transition_to(ContainerState::InTransitToTerminal));
        assert_eq!(c.state, ContainerState::InTransitToTerminal);
    }

    #[test]
    fn generated_container_id_matches_zim_pattern() {
        let mut rng = StdRng::seed_from_u64(3);
        let id = generate_container_id(&mut rng);
        assert!(id.starts_with("ZIMU"));
        assert_eq!(id.len(), 11);
        assert!(id[4..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn generated_tracker_id_matches_pattern() {
        let mut rng = StdRng::seed_from_u64(3);
        let id = generate_tracker_id(&mut rng);
        assert!(id.starts_with('A'));
        assert_eq!(id.len(), 8);
    }

    #[test]
    fn runtime_advance_moves_through_route_and_stops_at_end() {
        let mut rng = StdRng::seed_from_u64(1);
        let row = Container::new_at_rest(0, Utc::now(), &mut rng);
        let mut runtime = ContainerRuntime::new(row);
        runtime.set_route(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);

        assert!(runtime.has_next_waypoint());
        assert!(runtime.advance());
        assert_eq!(runtime.row.position(), (1.0, 1.0));
        assert!(runtime.advance());
        assert_eq!(runtime.row.position(), (2.0, 2.0));
        assert!(!runtime.has_next_waypoint());
        assert!(!runtime.advance());
    }

    #[test]
    fn clear_route_resets_cursor() {
        let mut rng = StdRng::seed_from_u64(1);
        let row = Container::new_at_rest(0, Utc::now(), &mut rng);
        let mut runtime = ContainerRuntime::new(row);
        runtime.set_route(vec![(0.0, 0.0), (1.0, 1.0)]);
        runtime.advance();
        runtime.clear_route();
        assert!(runtime.route.is_empty());
        assert_eq!(runtime.route_index, 0);
    }
}
