//! Simulator state checkpointing: a flat JSON snapshot written atomically so
//! a killed writer never leaves a half-written state file behind.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::ContainerState;
use crate::geometry::LonLat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCheckpoint {
    pub container_id: String,
    pub state: ContainerState,
    pub report_slot: i32,
    pub position: LonLat,
    pub is_moving: bool,
    pub route_index: usize,
    pub use_rail: bool,
    pub current_geofence: Option<String>,
    pub journey_start_time: DateTime<Utc>,
    pub last_event_time: Option<DateTime<Utc>>,
}

/// Full simulator state, as written at shutdown and read back on resume.
/// Routes are never persisted here; they're regenerated lazily the next time
/// a container needs one (spec's §4.8 contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub sim_time: DateTime<Utc>,
    pub current_slot: i32,
    pub events_generated: u64,
    pub n_slots: i32,
    pub speed: f64,
    pub containers: Vec<ContainerCheckpoint>,
}

impl Checkpoint {
    /// Load a checkpoint from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
        serde_json::from_str(&contents).with_context(|| format!("failed to parse checkpoint {path:?}"))
    }

    /// Write the checkpoint, writing to a `.tmp` sibling first then renaming
    /// into place so a reader never observes a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("failed to serialize checkpoint")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &contents).with_context(|| format!("failed to write {tmp_path:?}"))?;
        std::fs::rename(&tmp_path, path).with_context(|| format!("failed to rename {tmp_path:?} to {path:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Checkpoint {
        Checkpoint {
            sim_time: Utc::now(),
            current_slot: 12,
            events_generated: 4821,
            n_slots: 900,
            speed: 60.0,
            containers: vec![ContainerCheckpoint {
                container_id: "ZIMU1234567".to_string(),
                state: ContainerState::InTransitOcean,
                report_slot: 12,
                position: (32.5, 30.0),
                is_moving: true,
                route_index: 7,
                use_rail: false,
                current_geofence: None,
                journey_start_time: Utc::now(),
                last_event_time: Some(Utc::now()),
            }],
        }
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let original = sample();

        original.save(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();

        assert_eq!(loaded.sim_time, original.sim_time);
        assert_eq!(loaded.current_slot, original.current_slot);
        assert_eq!(loaded.containers.len(), 1);
        assert_eq!(loaded.containers[0].container_id, "ZIMU1234567");
    }

    #[test]
    fn save_does_not_leave_a_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        sample().save(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        assert!(Checkpoint::load(&path).is_err());
    }
}
