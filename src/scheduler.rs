//! The simulation loop: a staggered tick scheduler that advances one slot of
//! containers per wall-clock second, mutating state, emitting IoT events, and
//! flushing them to the persistence layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration as StdDuration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::bootstrap::assign_new_journey;
use crate::config::Config;
use crate::container::{Container, ContainerRuntime, ContainerState};
use crate::container_repo::ContainerRepository;
use crate::event::{EventGenerator, GateEvent, IotEvent};
use crate::event_log_repo::EventLogRepository;
use crate::gate_events_repo::GateEventsRepository;
use crate::geofence::Geofence;
use crate::geofence_repo::GeofenceStore;
use crate::route_generator::RouteGenerator;
use crate::timeseries_repo::TimeseriesRepository;

/// Wall-clock seconds per tick; one slot is processed per tick.
const LOOP_INTERVAL_SECONDS: f64 = 1.0;
/// How often (wall-clock) to log aggregate status.
const STATUS_INTERVAL: StdDuration = StdDuration::from_secs(10);
/// Delay before the single retry on a failed batch write (§7 transient-DB policy).
const RETRY_BACKOFF: StdDuration = StdDuration::from_millis(200);
/// Backpressure depth of the scheduler -> writer channel. Small on purpose: a
/// full channel means the writer is falling behind, and the scheduler should
/// feel that immediately rather than buffer unboundedly (§5).
const WRITER_QUEUE_CAPACITY: usize = 4;

/// One tick's worth of output, handed to the writer task as a unit so gate
/// events, the event/timeseries batch, and container upserts flush together.
struct EventBatch {
    events: Vec<IotEvent>,
    gate_events: Vec<GateEvent>,
    containers: Vec<Container>,
}

/// Drives the simulation: owns every container's runtime state and the
/// slot partition, and is the sole mutator of that state (§5 scheduling model).
pub struct Scheduler<'a> {
    config: &'a Config,
    store: &'a GeofenceStore,
    event_gen: EventGenerator,
    runtimes: Vec<ContainerRuntime>,
    slots: Vec<Vec<usize>>,
    sim_time: DateTime<Utc>,
    current_slot: i32,
    n_slots: i32,
    events_generated: u64,
    batch_tx: Option<flume::Sender<EventBatch>>,
    writer_handle: Option<tokio::task::JoinHandle<()>>,
}

impl<'a> Scheduler<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a Config,
        store: &'a GeofenceStore,
        container_repo: ContainerRepository,
        event_log_repo: EventLogRepository,
        timeseries_repo: TimeseriesRepository,
        gate_events_repo: GateEventsRepository,
        runtimes: Vec<ContainerRuntime>,
        sim_time: DateTime<Utc>,
        current_slot: i32,
        events_generated: u64,
    ) -> Self {
        let n_slots = config.stagger_slots as i32;
        let slots = partition_by_slot(&runtimes, n_slots);

        let (batch_tx, batch_rx) = flume::bounded::<EventBatch>(WRITER_QUEUE_CAPACITY);
        let writer_handle = tokio::spawn(writer_task(batch_rx, container_repo, event_log_repo, timeseries_repo, gate_events_repo));

        Self {
            config,
            store,
            event_gen: EventGenerator::new(config.door_event_probability),
            runtimes,
            slots,
            sim_time,
            current_slot,
            n_slots,
            events_generated,
            batch_tx: Some(batch_tx),
            writer_handle: Some(writer_handle),
        }
    }

    pub fn sim_time(&self) -> DateTime<Utc> {
        self.sim_time
    }

    pub fn current_slot(&self) -> i32 {
        self.current_slot
    }

    pub fn events_generated(&self) -> u64 {
        self.events_generated
    }

    pub fn runtimes(&self) -> &[ContainerRuntime] {
        &self.runtimes
    }

    /// Drop the writer channel and await the writer task so the final batch
    /// flushes before the process exits (§5 cancellation semantics).
    pub async fn shutdown(&mut self) -> Result<()> {
        self.batch_tx.take();
        if let Some(handle) = self.writer_handle.take() {
            handle.await.context("writer task panicked")?;
        }
        Ok(())
    }

    /// Run until `running` is cleared. Each tick runs to completion before
    /// the flag is re-checked (§5 cancellation semantics: no mid-tick abort).
    pub async fn run(&mut self, running: Arc<AtomicBool>) -> Result<()> {
        let mut rng = rand::rng();
        let mut last_status = Instant::now();
        let loop_interval = StdDuration::from_secs_f64(LOOP_INTERVAL_SECONDS);

        while running.load(Ordering::Relaxed) {
            let tick_start = Instant::now();

            self.tick(&mut rng).await?;

            if last_status.elapsed() >= STATUS_INTERVAL {
                self.log_status();
                last_status = Instant::now();
            }

            let elapsed = tick_start.elapsed();
            if elapsed < loop_interval {
                sleep(loop_interval - elapsed).await;
            }

            let sim_millis = (LOOP_INTERVAL_SECONDS * self.config.simulation_speed * 1000.0).round() as i64;
            self.sim_time += Duration::milliseconds(sim_millis);
            self.current_slot = (self.current_slot + 1) % self.n_slots;
        }

        Ok(())
    }

    /// Process every container in the current slot, then flush the batch.
    async fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let Some(indices) = self.slots.get(self.current_slot as usize).cloned() else {
            return Ok(());
        };
        if indices.is_empty() {
            return Ok(());
        }

        let route_gen = RouteGenerator::new(self.store, &self.config.rail_enabled_countries, self.config.rail_routing_probability);
        let event_interval = Duration::seconds(self.config.event_interval_seconds);

        let mut events = Vec::new();
        let mut gate_events = Vec::new();

        for &idx in &indices {
            let runtime = &mut self.runtimes[idx];
            let container_id = runtime.row.container_id.clone();
            let outcome = update_container(
                runtime,
                self.store,
                &route_gen,
                &self.event_gen,
                event_interval,
                self.sim_time,
                rng,
                &mut events,
                &mut gate_events,
            )
            .await;

            if let Err(cause) = outcome {
                error!(component = "scheduler", container_id = %container_id, %cause, "container update failed, skipping for this tick");
            }
        }

        self.events_generated += events.len() as u64 + gate_events.len() as u64;
        metrics::counter!("simulation_ticks_total").increment(1);
        metrics::counter!("simulation_events_emitted_total").increment(events.len() as u64);
        metrics::counter!("simulation_gate_events_total").increment(gate_events.len() as u64);

        let containers: Vec<_> = indices.iter().map(|&i| self.runtimes[i].row.clone()).collect();
        let batch = EventBatch { events, gate_events, containers };

        // Backpressure: a full channel stalls the scheduler rather than
        // dropping the batch or buffering unboundedly (§5).
        if let Some(tx) = &self.batch_tx {
            if tx.send_async(batch).await.is_err() {
                warn!(component = "scheduler", "writer task gone, dropping batch");
            }
        }

        Ok(())
    }

    fn log_status(&self) {
        let mut moving = 0u64;
        let mut rail = 0u64;
        let mut by_state: std::collections::HashMap<ContainerState, u64> = std::collections::HashMap::new();

        for runtime in &self.runtimes {
            if runtime.row.is_moving {
                moving += 1;
            }
            if runtime.row.use_rail {
                rail += 1;
            }
            *by_state.entry(runtime.row.state).or_insert(0) += 1;
        }

        if let Some(tx) = &self.batch_tx {
            metrics::gauge!("simulation_write_queue_depth").set(tx.len() as f64);
        }
        metrics::gauge!("simulation_containers_active").set(self.runtimes.len() as f64);
        metrics::gauge!("simulation_sim_speed_multiplier").set(self.config.simulation_speed);

        info!(
            sim_time = %self.sim_time,
            slot = self.current_slot,
            containers = self.runtimes.len(),
            moving,
            rail,
            events_generated = self.events_generated,
            ?by_state,
            "simulation status",
        );
    }
}

/// Drains batches off the channel and flushes each to Postgres. Gate events
/// land before the rest of the batch so a reader who observes one can always
/// find its LocationUpdate (§5 ordering). Runs until the sender is dropped,
/// i.e. until `Scheduler::shutdown` is called.
async fn writer_task(
    rx: flume::Receiver<EventBatch>,
    container_repo: ContainerRepository,
    event_log_repo: EventLogRepository,
    timeseries_repo: TimeseriesRepository,
    gate_events_repo: GateEventsRepository,
) {
    while let Ok(batch) = rx.recv_async().await {
        if !batch.gate_events.is_empty() {
            let n = write_batch_with_retry(|| gate_events_repo.insert_events(batch.gate_events.clone()), "gate_events").await;
            if n < batch.gate_events.len() {
                warn!(component = "gate_events_repo", "gate event batch dropped after retry");
            }
        }

        if !batch.events.is_empty() {
            let timeseries = EventGenerator::to_timeseries(&batch.events);
            write_batch_with_retry(|| event_log_repo.insert_events(batch.events.clone()), "event_log").await;
            write_batch_with_retry(|| timeseries_repo.insert_events(timeseries.clone()), "timeseries_events").await;
        }

        if !batch.containers.is_empty() {
            write_batch_with_retry(|| container_repo.upsert_containers(batch.containers.clone()), "container_repo").await;
        }

        metrics::counter!("simulation_write_batches_total").increment(1);
    }
}

/// Group runtime indices by `report_slot mod n_slots`, re-derived every
/// construction so a resume under a different `STAGGER_SLOTS` still partitions
/// correctly (§4.8: "slots are re-derived").
fn partition_by_slot(runtimes: &[ContainerRuntime], n_slots: i32) -> Vec<Vec<usize>> {
    let mut slots = vec![Vec::new(); n_slots.max(1) as usize];
    for (idx, runtime) in runtimes.iter().enumerate() {
        let slot = runtime.row.report_slot.rem_euclid(n_slots.max(1)) as usize;
        slots[slot].push(idx);
    }
    slots
}

/// Run `op` once, retry once after a short backoff on failure, then give up
/// and drop the batch (§7: events are lossy by design, the simulator is a
/// source not a ledger).
async fn write_batch_with_retry<F, Fut>(mut op: F, component: &'static str) -> usize
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<usize>>,
{
    match op().await {
        Ok(n) => n,
        Err(cause) => {
            warn!(component, %cause, "batch write failed, retrying once");
            sleep(RETRY_BACKOFF).await;
            match op().await {
                Ok(n) => n,
                Err(cause) => {
                    error!(component, %cause, "batch write failed twice, dropping batch");
                    0
                }
            }
        }
    }
}

/// Per-container update, §4.6 steps 1-8.
#[allow(clippy::too_many_arguments)]
async fn update_container<R: Rng + ?Sized>(
    runtime: &mut ContainerRuntime,
    store: &GeofenceStore,
    route_gen: &RouteGenerator<'_>,
    event_gen: &EventGenerator,
    event_interval: Duration,
    sim_time: DateTime<Utc>,
    rng: &mut R,
    events: &mut Vec<IotEvent>,
    gate_events: &mut Vec<GateEvent>,
) -> Result<()> {
    // 1. Not started yet.
    if sim_time < runtime.row.journey_start_time {
        return Ok(());
    }

    // 2. Too soon since the last report.
    if let Some(last) = runtime.row.last_event_time {
        if sim_time - last < event_interval {
            return Ok(());
        }
    }

    // 3. Resolve the current geofence.
    let resolved = store.find_containing(runtime.row.position()).await?;
    let new_name = resolved.as_ref().map(|g| g.name.clone());

    // 4. Gate events on entry/exit.
    if new_name != runtime.row.current_geofence {
        if let Some(old_name) = runtime.row.current_geofence.clone() {
            if let Some(old_geofence) = store.by_name(&old_name) {
                gate_events.push(event_gen.gate_event(&runtime.row, sim_time, false, &old_geofence, rng));
            }
        }
        if let Some(new_geofence) = &resolved {
            gate_events.push(event_gen.gate_event(&runtime.row, sim_time, true, new_geofence, rng));
        }
        runtime.row.current_geofence = new_name;
    }

    // 5. Location update.
    events.push(event_gen.location_update(&runtime.row, sim_time, resolved.as_deref(), rng));

    // 6 / 7. Advance the route, or handle arrival.
    if runtime.has_next_waypoint() {
        let was_stationary = runtime.route_index == 0;
        runtime.advance();
        if was_stationary {
            events.push(event_gen.motion_event(&runtime.row, sim_time, true, resolved.as_deref(), rng));
            runtime.row.is_moving = true;
        }
    } else {
        if runtime.row.is_moving {
            events.extend(event_gen.stop_events(&runtime.row, sim_time, resolved.as_deref(), true, rng));
            runtime.row.is_moving = false;
        }
        transition_and_route(runtime, store, route_gen, sim_time, rng).await?;
    }

    // 8.
    runtime.row.last_event_time = Some(sim_time);

    Ok(())
}

/// State-transition rule (§4.4), installing whatever route the new state
/// requires. Grounded on `_transition_container_state` / `_assign_new_journey`.
async fn transition_and_route<R: Rng + ?Sized>(
    runtime: &mut ContainerRuntime,
    store: &GeofenceStore,
    route_gen: &RouteGenerator<'_>,
    sim_time: DateTime<Utc>,
    rng: &mut R,
) -> Result<()> {
    use ContainerState::*;

    match runtime.row.state {
        AtOriginDepot => {
            if runtime.row.use_rail && runtime.row.origin_rail_ramp.is_some() {
                runtime.row.transition_to(InTransitToRailRamp);
                if let (Some(depot), Some(ramp)) = (lookup(store, &runtime.row.origin_depot), lookup(store, &runtime.row.origin_rail_ramp)) {
                    runtime.set_route(route_gen.generate_land_route(&depot, &ramp, rng).await?);
                }
            } else {
                runtime.row.transition_to(InTransitToTerminal);
                if let (Some(depot), Some(terminal)) = (lookup(store, &runtime.row.origin_depot), lookup(store, &runtime.row.origin_terminal)) {
                    runtime.set_route(route_gen.generate_land_route(&depot, &terminal, rng).await?);
                }
            }
        }
        InTransitToRailRamp => {
            runtime.row.transition_to(AtOriginRailRamp);
            runtime.clear_route();
        }
        AtOriginRailRamp => {
            runtime.row.transition_to(InTransitRail);
            if let (Some(ramp), Some(terminal)) = (lookup(store, &runtime.row.origin_rail_ramp), lookup(store, &runtime.row.origin_terminal)) {
                runtime.set_route(route_gen.generate_rail_route(&ramp, &terminal, rng).await?);
            }
        }
        InTransitRail => {
            runtime.row.transition_to(InTransitToTerminal);
            runtime.clear_route();
        }
        InTransitToTerminal => {
            runtime.row.transition_to(AtOriginTerminal);
            runtime.clear_route();
        }
        AtOriginTerminal => {
            runtime.row.transition_to(LoadedOnVessel);
            runtime.clear_route();
        }
        LoadedOnVessel => {
            runtime.row.transition_to(InTransitOcean);
            if let (Some(origin), Some(destination)) = (lookup(store, &runtime.row.origin_terminal), lookup(store, &runtime.row.destination_terminal)) {
                runtime.set_route(route_gen.generate_ocean_route(&origin, &destination, rng).await?);
            }
        }
        InTransitOcean => {
            runtime.row.transition_to(AtDestinationTerminal);
            runtime.clear_route();
        }
        AtDestinationTerminal => {
            if runtime.row.use_rail && runtime.row.destination_rail_ramp.is_some() {
                runtime.row.transition_to(InTransitFromTerminal);
                if let (Some(terminal), Some(ramp)) = (lookup(store, &runtime.row.destination_terminal), lookup(store, &runtime.row.destination_rail_ramp)) {
                    runtime.set_route(route_gen.generate_land_route(&terminal, &ramp, rng).await?);
                }
            } else {
                runtime.row.transition_to(InTransitToDepot);
                if let (Some(terminal), Some(depot)) = (lookup(store, &runtime.row.destination_terminal), lookup(store, &runtime.row.destination_depot)) {
                    runtime.set_route(route_gen.generate_land_route(&terminal, &depot, rng).await?);
                }
            }
        }
        InTransitFromTerminal => {
            runtime.row.transition_to(AtDestinationRailRamp);
            runtime.clear_route();
        }
        AtDestinationRailRamp => {
            runtime.row.transition_to(InTransitRailToDepot);
            if let (Some(ramp), Some(depot)) = (lookup(store, &runtime.row.destination_rail_ramp), lookup(store, &runtime.row.destination_depot)) {
                runtime.set_route(route_gen.generate_rail_route(&ramp, &depot, rng).await?);
            }
        }
        InTransitRailToDepot => {
            runtime.row.transition_to(InTransitToDepot);
            runtime.clear_route();
        }
        InTransitToDepot => {
            runtime.row.transition_to(AtDestinationDepot);
            runtime.clear_route();
        }
        AtDestinationDepot => {
            assign_new_journey(runtime, route_gen, sim_time, rng).await?;
        }
    }

    Ok(())
}

fn lookup(store: &GeofenceStore, name: &Option<String>) -> Option<Arc<Geofence>> {
    name.as_deref().and_then(|n| store.by_name(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_runtime(report_slot: i32) -> ContainerRuntime {
        let mut rng = StdRng::seed_from_u64(9);
        let row = crate::container::Container::new_at_rest(report_slot, Utc::now(), &mut rng);
        ContainerRuntime::new(row)
    }

    #[test]
    fn partition_by_slot_groups_by_report_slot_modulo_n() {
        let runtimes = vec![sample_runtime(0), sample_runtime(1), sample_runtime(3)];
        let slots = partition_by_slot(&runtimes, 3);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0], vec![0, 2]);
        assert_eq!(slots[1], vec![1]);
        assert_eq!(slots[2], Vec::<usize>::new());
    }

    #[test]
    fn partition_by_slot_handles_empty_population() {
        let slots = partition_by_slot(&[], 900);
        assert_eq!(slots.len(), 900);
        assert!(slots.iter().all(|s| s.is_empty()));
    }

    #[tokio::test]
    async fn write_batch_with_retry_returns_count_on_success() {
        let n = write_batch_with_retry(|| async { anyhow::Result::<usize>::Ok(5) }, "test").await;
        assert_eq!(n, 5);
    }

    #[tokio::test]
    async fn write_batch_with_retry_gives_up_after_second_failure() {
        let n = write_batch_with_retry(|| async { Err::<usize, _>(anyhow::anyhow!("boom")) }, "test").await;
        assert_eq!(n, 0);
    }
}
