//! Runtime configuration, read once from the environment at startup.
//!
//! `dotenvy::dotenv()` is expected to have already been called by `main` before
//! [`Config::from_env`] runs.

use anyhow::{Context, Result};

/// Immutable configuration for one simulation run.
///
/// Every field here is fixed for the lifetime of the process; nothing in the
/// simulator reloads configuration mid-run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (`DATABASE_URL`). Required, no default.
    pub database_url: String,
    /// Logical database name, used only for log/metric labeling — the actual
    /// target database is whatever `database_url` points at.
    pub db_name: String,
    /// Population size for bootstrap.
    pub num_containers: usize,
    /// Number of staggered scheduler slots (`N_slots`).
    pub stagger_slots: usize,
    /// Simulated seconds advanced per real second.
    pub simulation_speed: f64,
    /// Minimum simulated-seconds gap between events for a single container.
    pub event_interval_seconds: i64,
    /// Probability that a stop event also emits a door event.
    pub door_event_probability: f64,
    /// Probability that an eligible journey routes via rail.
    pub rail_routing_probability: f64,
    /// ISO-3166 alpha-2 country codes whose depots may use rail ramps.
    pub rail_enabled_countries: Vec<String>,
}

impl Config {
    /// Build configuration from environment variables, applying the defaults
    /// from the external interface spec where a variable is unset.
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

        Ok(Self {
            database_url,
            db_name: env_or("DB_NAME", "zim_geofence"),
            num_containers: env_parsed_or("NUM_CONTAINERS", 100_000)?,
            stagger_slots: env_parsed_or("STAGGER_SLOTS", 900)?,
            simulation_speed: env_parsed_or("SIMULATION_SPEED", 60.0)?,
            event_interval_seconds: env_parsed_or("EVENT_INTERVAL_SECONDS", 900)?,
            door_event_probability: env_parsed_or("DOOR_EVENT_PROBABILITY", 0.30)?,
            rail_routing_probability: env_parsed_or("RAIL_ROUTING_PROBABILITY", 0.30)?,
            rail_enabled_countries: env_list_or("RAIL_ENABLED_COUNTRIES", &["US", "CA", "GB"]),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_list_or(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_all() {
        for key in [
            "DATABASE_URL",
            "DB_NAME",
            "NUM_CONTAINERS",
            "STAGGER_SLOTS",
            "SIMULATION_SPEED",
            "EVENT_INTERVAL_SECONDS",
            "DOOR_EVENT_PROBABILITY",
            "RAIL_ROUTING_PROBABILITY",
            "RAIL_ENABLED_COUNTRIES",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        clear_all();
        unsafe { std::env::set_var("DATABASE_URL", "postgres://localhost/test") };

        let config = Config::from_env().unwrap();
        assert_eq!(config.db_name, "zim_geofence");
        assert_eq!(config.num_containers, 100_000);
        assert_eq!(config.stagger_slots, 900);
        assert_eq!(config.simulation_speed, 60.0);
        assert_eq!(config.event_interval_seconds, 900);
        assert_eq!(config.door_event_probability, 0.30);
        assert_eq!(config.rail_routing_probability, 0.30);
        assert_eq!(config.rail_enabled_countries, vec!["US", "CA", "GB"]);

        clear_all();
    }

    #[test]
    #[serial]
    fn missing_database_url_errors() {
        clear_all();
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn overrides_are_parsed() {
        clear_all();
        unsafe { std::env::set_var("DATABASE_URL", "postgres://localhost/test") };
        unsafe { std::env::set_var("NUM_CONTAINERS", "5000") };
        unsafe { std::env::set_var("RAIL_ENABLED_COUNTRIES", "us, de ,fr") };

        let config = Config::from_env().unwrap();
        assert_eq!(config.num_containers, 5000);
        assert_eq!(config.rail_enabled_countries, vec!["US", "DE", "FR"]);

        clear_all();
    }
}
