//! IoT event model and generator.
//!
//! Events model the report a container's tracker would actually send: an
//! `event_time` (when it happened) and a later `report_time` (when the
//! tracker's uplink delivered it), mirroring real satellite/cellular IoT
//! latency rather than assuming instantaneous delivery.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::geofence::{Geofence, GeofenceType};
use crate::schema::{event_log, gate_events, timeseries_events};

/// Minimum and maximum simulated-second delay between an event happening and
/// its report reaching the store, modeling tracker uplink latency.
const REPORT_DELAY_MIN_SECS: i64 = 30;
const REPORT_DELAY_MAX_SECS: i64 = 600;

/// Sentinel `event_location` when a container is not inside any geofence.
const IN_TRANSIT: &str = "In Transit";

/// Kind of IoT report a container tracker emits. Only the types the
/// generator actually produces — other display strings the domain defines
/// (rail loaded/unloaded) are not emitted by this simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::EventTypeEnum")]
pub enum EventType {
    #[db_enum(rename = "In Motion")]
    InMotion,
    #[db_enum(rename = "Motion Stop")]
    MotionStop,
    #[db_enum(rename = "Location Update")]
    LocationUpdate,
    #[db_enum(rename = "Door Opened")]
    DoorOpened,
    #[db_enum(rename = "Door Closed")]
    DoorClosed,
    #[db_enum(rename = "Gate In")]
    GateIn,
    #[db_enum(rename = "Gate Out")]
    GateOut,
}

/// A single IoT report from a container tracker.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = event_log)]
pub struct IotEvent {
    pub tracker_id: String,
    pub asset_name: String,
    pub asset_id: i32,
    pub event_time: DateTime<Utc>,
    pub report_time: DateTime<Utc>,
    pub event_location: String,
    pub event_location_country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub event_type: EventType,
    pub location: postgis_diesel::types::Point,
}

/// Row shape for the append-only timeseries sink — same event, plus the
/// minute bucket used for index locality in place of a native hypertable.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = timeseries_events)]
pub struct TimeseriesEvent {
    pub tracker_id: String,
    pub asset_name: String,
    pub asset_id: i32,
    pub bucket_minute: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub report_time: DateTime<Utc>,
    pub event_location: String,
    pub event_location_country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub event_type: EventType,
    pub location: postgis_diesel::types::Point,
}

/// A geofence crossing (gate in/out), stored separately from general events.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = gate_events)]
pub struct GateEvent {
    pub tracker_id: String,
    pub asset_name: String,
    pub asset_id: i32,
    pub event_time: DateTime<Utc>,
    pub report_time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub event_type: EventType,
    pub geofence_id: uuid::Uuid,
    pub geofence_name: String,
    pub geofence_type: GeofenceType,
}

impl IotEvent {
    fn to_timeseries(&self) -> TimeseriesEvent {
        TimeseriesEvent {
            tracker_id: self.tracker_id.clone(),
            asset_name: self.asset_name.clone(),
            asset_id: self.asset_id,
            bucket_minute: truncate_to_minute(self.event_time),
            timestamp: self.event_time,
            report_time: self.report_time,
            event_location: self.event_location.clone(),
            event_location_country: self.event_location_country.clone(),
            lat: self.lat,
            lon: self.lon,
            event_type: self.event_type,
            location: self.location,
        }
    }
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::seconds(t.timestamp() % 60)
}

/// Generates `IotEvent`s and their timeseries/gate-event counterparts for a
/// container, applying the report-delay and door-event-probability rules.
pub struct EventGenerator {
    pub door_event_probability: f64,
}

impl EventGenerator {
    pub fn new(door_event_probability: f64) -> Self {
        Self {
            door_event_probability,
        }
    }

    fn report_time<R: Rng + ?Sized>(event_time: DateTime<Utc>, rng: &mut R) -> DateTime<Utc> {
        let delay = rng.random_range(REPORT_DELAY_MIN_SECS..=REPORT_DELAY_MAX_SECS);
        event_time + Duration::seconds(delay)
    }

    fn country_from_geofence(geofence: Option<&Geofence>) -> Option<String> {
        geofence.and_then(|g| g.country_code().map(|c| c.to_string()))
    }

    fn base_event<R: Rng + ?Sized>(
        &self,
        container: &Container,
        event_time: DateTime<Utc>,
        event_type: EventType,
        geofence: Option<&Geofence>,
        rng: &mut R,
    ) -> IotEvent {
        IotEvent {
            tracker_id: container.tracker_id.clone(),
            asset_name: container.container_id.clone(),
            asset_id: container.asset_id,
            event_time,
            report_time: Self::report_time(event_time, rng),
            event_location: geofence.map(|g| g.name.clone()).unwrap_or_else(|| IN_TRANSIT.to_string()),
            event_location_country: Self::country_from_geofence(geofence),
            lat: container.latitude,
            lon: container.longitude,
            event_type,
            location: postgis_diesel::types::Point::new(container.longitude, container.latitude, None),
        }
    }

    pub fn location_update<R: Rng + ?Sized>(
        &self,
        container: &Container,
        event_time: DateTime<Utc>,
        geofence: Option<&Geofence>,
        rng: &mut R,
    ) -> IotEvent {
        self.base_event(container, event_time, EventType::LocationUpdate, geofence, rng)
    }

    pub fn motion_event<R: Rng + ?Sized>(
        &self,
        container: &Container,
        event_time: DateTime<Utc>,
        is_start: bool,
        geofence: Option<&Geofence>,
        rng: &mut R,
    ) -> IotEvent {
        let event_type = if is_start {
            EventType::InMotion
        } else {
            EventType::MotionStop
        };
        self.base_event(container, event_time, event_type, geofence, rng)
    }

    pub fn door_event<R: Rng + ?Sized>(
        &self,
        container: &Container,
        event_time: DateTime<Utc>,
        is_open: bool,
        geofence: Option<&Geofence>,
        rng: &mut R,
    ) -> IotEvent {
        let event_type = if is_open {
            EventType::DoorOpened
        } else {
            EventType::DoorClosed
        };
        self.base_event(container, event_time, event_type, geofence, rng)
    }

    /// Build a gate event; `geofence` is required since a gate crossing is
    /// only ever emitted at a known facility boundary.
    pub fn gate_event<R: Rng + ?Sized>(
        &self,
        container: &Container,
        event_time: DateTime<Utc>,
        is_entry: bool,
        geofence: &Geofence,
        rng: &mut R,
    ) -> GateEvent {
        let event_type = if is_entry {
            EventType::GateIn
        } else {
            EventType::GateOut
        };
        GateEvent {
            tracker_id: container.tracker_id.clone(),
            asset_name: container.container_id.clone(),
            asset_id: container.asset_id,
            event_time,
            report_time: Self::report_time(event_time, rng),
            lat: container.latitude,
            lon: container.longitude,
            event_type,
            geofence_id: geofence.id,
            geofence_name: geofence.name.clone(),
            geofence_type: geofence.type_id,
        }
    }

    /// Events for a container coming to a stop: a motion-stop event, plus an
    /// open/close door pair with probability `door_event_probability`.
    pub fn stop_events<R: Rng + ?Sized>(
        &self,
        container: &Container,
        event_time: DateTime<Utc>,
        geofence: Option<&Geofence>,
        include_door_events: bool,
        rng: &mut R,
    ) -> Vec<IotEvent> {
        let mut events = vec![self.motion_event(container, event_time, false, geofence, rng)];

        if include_door_events && rng.random_bool(self.door_event_probability) {
            let door_open_time = event_time + Duration::seconds(rng.random_range(30..=300));
            events.push(self.door_event(container, door_open_time, true, geofence, rng));

            let door_close_time = door_open_time + Duration::seconds(rng.random_range(60..=1800));
            events.push(self.door_event(container, door_close_time, false, geofence, rng));
        }

        events
    }

    /// Convert a batch of events to their timeseries-sink counterparts.
    pub fn to_timeseries(events: &[IotEvent]) -> Vec<TimeseriesEvent> {
        events.iter().map(IotEvent::to_timeseries).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerState;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_container() -> Container {
        let mut rng = StdRng::seed_from_u64(11);
        let mut c = Container::new_at_rest(0, Utc::now(), &mut rng);
        c.state = ContainerState::AtOriginDepot;
        c.set_position((32.5, 30.0));
        c
    }

    #[test]
    fn report_time_is_within_delay_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let event_time = Utc::now();
        for _ in 0..50 {
            let rt = EventGenerator::report_time(event_time, &mut rng);
            let delay = (rt - event_time).num_seconds();
            assert!((REPORT_DELAY_MIN_SECS..=REPORT_DELAY_MAX_SECS).contains(&delay));
        }
    }

    #[test]
    fn stop_events_always_include_motion_stop() {
        let gen = EventGenerator::new(0.0);
        let mut rng = StdRng::seed_from_u64(2);
        let container = sample_container();
        let events = gen.stop_events(&container, Utc::now(), None, true, &mut rng);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::MotionStop);
    }

    #[test]
    fn stop_events_with_certain_door_probability_adds_door_pair() {
        let gen = EventGenerator::new(1.0);
        let mut rng = StdRng::seed_from_u64(2);
        let container = sample_container();
        let events = gen.stop_events(&container, Utc::now(), None, true, &mut rng);
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].event_type, EventType::DoorOpened);
        assert_eq!(events[2].event_type, EventType::DoorClosed);
        assert!(events[2].event_time > events[1].event_time);
    }

    #[test]
    fn door_events_suppressed_when_not_included() {
        let gen = EventGenerator::new(1.0);
        let mut rng = StdRng::seed_from_u64(2);
        let container = sample_container();
        let events = gen.stop_events(&container, Utc::now(), None, false, &mut rng);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn event_location_defaults_to_in_transit_sentinel_when_no_geofence() {
        let gen = EventGenerator::new(0.0);
        let mut rng = StdRng::seed_from_u64(5);
        let container = sample_container();
        let event = gen.location_update(&container, Utc::now(), None, &mut rng);
        assert_eq!(event.event_location, "In Transit");
        assert_eq!(event.event_location_country, None);
    }

    #[test]
    fn timeseries_conversion_preserves_core_fields() {
        let gen = EventGenerator::new(0.0);
        let mut rng = StdRng::seed_from_u64(3);
        let container = sample_container();
        let event = gen.location_update(&container, Utc::now(), None, &mut rng);
        let ts = EventGenerator::to_timeseries(&[event.clone()]);
        assert_eq!(ts.len(), 1);
        assert_eq!(ts[0].asset_name, event.asset_name);
        assert_eq!(ts[0].event_type, event.event_type);
    }
}
