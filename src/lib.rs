//! portflow - a staggered-tick discrete-event simulator for a container's
//! journey between an inland depot and an overseas terminal.
//!
//! Generates synthetic IoT telemetry (position, door, geofence-crossing
//! events) for a simulated fleet of containers as they move through depots,
//! rail ramps, terminals, and ocean legs, persisting both the hot container
//! state and an append-only event/timeseries trail to Postgres.

pub mod bootstrap;
pub mod checkpoint;
pub mod chokepoints;
pub mod cli;
pub mod config;
pub mod container;
pub mod container_repo;
pub mod event;
pub mod event_log_repo;
pub mod gate_events_repo;
pub mod geofence;
pub mod geofence_repo;
pub mod geometry;
pub mod log_format;
pub mod metrics;
pub mod postgis_functions;
pub mod route_generator;
pub mod scheduler;
pub mod schema;
pub mod timeseries_repo;
pub mod water_regions;
