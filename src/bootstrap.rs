//! Population bootstrap: create a fresh set of containers, assign each a
//! journey and a first route, and persist the batch.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::info;

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::container::{Container, ContainerRuntime, ContainerState};
use crate::container_repo::ContainerRepository;
use crate::route_generator::RouteGenerator;

/// Maximum random stagger (simulated) before a freshly bootstrapped
/// container's journey actually starts.
const MAX_JOURNEY_START_JITTER_HOURS: i64 = 4;

/// Random stagger range (simulated hours) before a container that just
/// completed a journey starts its next one.
const NEXT_JOURNEY_START_JITTER_HOURS: std::ops::RangeInclusive<i64> = 1..=12;

/// Create `config.num_containers` containers, each with an assigned journey,
/// initial position at its origin depot, and a precomputed first leg
/// (depot -> rail ramp or terminal). Upserts the batch via `repo`.
pub async fn bootstrap_population<R: Rng + ?Sized>(
    config: &Config,
    route_gen: &RouteGenerator<'_>,
    repo: &ContainerRepository,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<Vec<ContainerRuntime>> {
    let mut runtimes = Vec::with_capacity(config.num_containers);

    for i in 0..config.num_containers {
        let report_slot = (i % config.stagger_slots) as i32;
        let journey_start_time = now + Duration::seconds(rng.random_range(0..=MAX_JOURNEY_START_JITTER_HOURS * 3600));

        let mut row = Container::new_at_rest(report_slot, now, rng);
        row.journey_start_time = journey_start_time;

        let journey = route_gen.select_journey(rng)?;

        row.origin_terminal = Some(journey.origin_terminal.name.clone());
        row.destination_terminal = Some(journey.destination_terminal.name.clone());
        row.origin_depot = journey.origin_depot.as_ref().map(|g| g.name.clone());
        row.destination_depot = journey.destination_depot.as_ref().map(|g| g.name.clone());
        row.origin_rail_ramp = journey.origin_rail_ramp.as_ref().map(|g| g.name.clone());
        row.destination_rail_ramp = journey.destination_rail_ramp.as_ref().map(|g| g.name.clone());
        row.use_rail = journey.use_rail;

        let mut runtime = ContainerRuntime::new(row);

        if let Some(origin_depot) = &journey.origin_depot {
            runtime.row.set_position(route_gen.centroid(origin_depot.id).await?);
            runtime.row.current_geofence = Some(origin_depot.name.clone());

            let first_leg_destination = if journey.origin_rail_ramp.is_some() {
                journey.origin_rail_ramp.as_deref()
            } else {
                Some(journey.origin_terminal.as_ref())
            };

            if let Some(destination) = first_leg_destination {
                let route = route_gen.generate_land_route(origin_depot, destination, rng).await?;
                runtime.set_route(route);
            }
        }

        runtimes.push(runtime);
    }

    let rows: Vec<Container> = runtimes.iter().map(|r| r.row.clone()).collect();
    let upserted = repo.upsert_containers(rows).await?;
    info!("bootstrapped {upserted} containers across {} slots", config.stagger_slots);

    Ok(runtimes)
}

/// Re-bootstrap container rows with fresh journeys: used both on resume
/// (where saved per-container state is overlaid afterward by `container_id`)
/// and when a container completes a full depot-to-depot cycle and starts its
/// next one (§4.6 step 7, `AT_DESTINATION_DEPOT`).
pub async fn assign_new_journey<R: Rng + ?Sized>(
    runtime: &mut ContainerRuntime,
    route_gen: &RouteGenerator<'_>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<()> {
    let journey = route_gen.select_journey(rng)?;

    runtime.row.origin_terminal = Some(journey.origin_terminal.name.clone());
    runtime.row.destination_terminal = Some(journey.destination_terminal.name.clone());
    runtime.row.origin_depot = journey.origin_depot.as_ref().map(|g| g.name.clone());
    runtime.row.destination_depot = journey.destination_depot.as_ref().map(|g| g.name.clone());
    runtime.row.origin_rail_ramp = journey.origin_rail_ramp.as_ref().map(|g| g.name.clone());
    runtime.row.destination_rail_ramp = journey.destination_rail_ramp.as_ref().map(|g| g.name.clone());
    runtime.row.use_rail = journey.use_rail;
    runtime.row.state = ContainerState::AtOriginDepot;
    runtime.row.is_moving = false;
    runtime.clear_route();

    if let Some(origin_depot) = &journey.origin_depot {
        let centroid = route_gen.centroid(origin_depot.id).await?;
        runtime.row.set_position(centroid);
        runtime.row.current_geofence = Some(origin_depot.name.clone());
    }

    let jitter_hours = rng.random_range(NEXT_JOURNEY_START_JITTER_HOURS);
    runtime.row.journey_start_time = now + Duration::hours(jitter_hours);

    Ok(())
}

/// Rebuild runtimes from the persisted population, then overlay the saved
/// per-container fields on top by `container_id` (§4.8 resume contract).
/// Routes are never restored; a container whose saved state left it mid-leg
/// simply regenerates its route on the next tick (the "regenerated lazily"
/// half of the contract), since `route_index` is restored but the route
/// vector it indexes into is not.
pub fn resume_population(rows: Vec<Container>, checkpoint: &Checkpoint) -> Vec<ContainerRuntime> {
    let mut by_id: HashMap<&str, &crate::checkpoint::ContainerCheckpoint> =
        checkpoint.containers.iter().map(|c| (c.container_id.as_str(), c)).collect();

    let runtimes: Vec<ContainerRuntime> = rows
        .into_iter()
        .map(|row| {
            let mut runtime = ContainerRuntime::new(row);
            if let Some(cp) = by_id.remove(runtime.row.container_id.as_str()) {
                runtime.row.state = cp.state;
                runtime.row.report_slot = cp.report_slot;
                runtime.row.set_position(cp.position);
                runtime.row.is_moving = cp.is_moving;
                runtime.route_index = cp.route_index;
                runtime.row.use_rail = cp.use_rail;
                runtime.row.current_geofence = cp.current_geofence.clone();
                runtime.row.journey_start_time = cp.journey_start_time;
                runtime.row.last_event_time = cp.last_event_time;
            }
            runtime
        })
        .collect();

    if !by_id.is_empty() {
        tracing::warn!(unmatched = by_id.len(), "checkpoint entries had no matching persisted container");
    }

    info!("resumed {} containers from checkpoint", runtimes.len());
    runtimes
}

/// Check whether a terminal is populated for at least one of each geofence
/// type needed to run a simulation. Called at setup so a misconfigured or
/// unseeded geofence store fails loudly before the loop starts.
pub fn verify_geofence_population(
    terminals: usize,
    depots: usize,
) -> Result<()> {
    if terminals == 0 {
        anyhow::bail!("no terminal geofences available; cannot bootstrap a population");
    }
    if depots == 0 {
        anyhow::bail!("no depot geofences available; cannot bootstrap a population");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_geofence_population_rejects_missing_terminals() {
        assert!(verify_geofence_population(0, 5).is_err());
    }

    #[test]
    fn verify_geofence_population_rejects_missing_depots() {
        assert!(verify_geofence_population(5, 0).is_err());
    }

    #[test]
    fn verify_geofence_population_accepts_populated_store() {
        assert!(verify_geofence_population(3, 3).is_ok());
    }

    fn sample_row<R: Rng + ?Sized>(rng: &mut R) -> Container {
        Container::new_at_rest(0, Utc::now(), rng)
    }

    #[test]
    fn resume_population_overlays_matching_checkpoint_entry() {
        use crate::checkpoint::ContainerCheckpoint;
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let mut rng = StdRng::seed_from_u64(1);
        let row = sample_row(&mut rng);
        let container_id = row.container_id.clone();

        let checkpoint = Checkpoint {
            sim_time: Utc::now(),
            current_slot: 5,
            events_generated: 10,
            n_slots: 900,
            speed: 60.0,
            containers: vec![ContainerCheckpoint {
                container_id: container_id.clone(),
                state: ContainerState::InTransitOcean,
                report_slot: 42,
                position: (10.0, 20.0),
                is_moving: true,
                route_index: 3,
                use_rail: true,
                current_geofence: Some("USLAX Terminal".to_string()),
                journey_start_time: Utc::now(),
                last_event_time: Some(Utc::now()),
            }],
        };

        let runtimes = resume_population(vec![row], &checkpoint);
        assert_eq!(runtimes.len(), 1);
        let r = &runtimes[0];
        assert_eq!(r.row.container_id, container_id);
        assert_eq!(r.row.state, ContainerState::InTransitOcean);
        assert_eq!(r.row.report_slot, 42);
        assert_eq!(r.row.position(), (10.0, 20.0));
        assert!(r.row.is_moving);
        assert_eq!(r.route_index, 3);
        assert_eq!(r.row.current_geofence, Some("USLAX Terminal".to_string()));
    }

    #[test]
    fn resume_population_leaves_unmatched_row_untouched() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let mut rng = StdRng::seed_from_u64(2);
        let row = sample_row(&mut rng);
        let original_state = row.state;

        let checkpoint = Checkpoint {
            sim_time: Utc::now(),
            current_slot: 0,
            events_generated: 0,
            n_slots: 900,
            speed: 60.0,
            containers: vec![],
        };

        let runtimes = resume_population(vec![row], &checkpoint);
        assert_eq!(runtimes[0].row.state, original_state);
    }
}
