//! Entry point for the `simulator` binary: wires configuration, the geofence
//! store, the persisted population (fresh or resumed), and the scheduler
//! together, then runs the tick loop until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use portflow::bootstrap::{bootstrap_population, resume_population, verify_geofence_population};
use portflow::checkpoint::Checkpoint;
use portflow::cli::Args;
use portflow::config::Config;
use portflow::container_repo::ContainerRepository;
use portflow::event_log_repo::EventLogRepository;
use portflow::gate_events_repo::GateEventsRepository;
use portflow::geofence::GeofenceType;
use portflow::geofence_repo::GeofenceStore;
use portflow::log_format::TargetFirstFormat;
use portflow::metrics::{init_metrics, initialize_simulation_metrics, process_metrics_task};
use portflow::route_generator::RouteGenerator;
use portflow::scheduler::Scheduler;
use portflow::timeseries_repo::TimeseriesRepository;

/// Maximum number of pooled Postgres connections (§4.5).
const DB_POOL_MAX_SIZE: u32 = 50;
/// Minimum pooled connections kept warm.
const DB_POOL_MIN_IDLE: u32 = 10;
/// Give up waiting for a pooled connection after this long.
const DB_POOL_CONNECTION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .event_format(TargetFirstFormat)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(cause) = run().await {
        error!(component = "main", %cause, "setup failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let config = apply_overrides(Config::from_env()?, &args);

    info!(db_name = %config.db_name, num_containers = config.num_containers, "starting simulator");

    let _prometheus_handle = init_metrics();
    initialize_simulation_metrics();
    tokio::spawn(process_metrics_task());

    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::builder()
        .max_size(DB_POOL_MAX_SIZE)
        .min_idle(Some(DB_POOL_MIN_IDLE))
        .connection_timeout(DB_POOL_CONNECTION_TIMEOUT)
        .build(manager)
        .context("failed to build the database connection pool")?;

    let store = GeofenceStore::new(pool.clone());
    store.verify_indexes().await.context("geofence index check failed")?;
    store.reload().await.context("failed to load geofences")?;
    verify_geofence_population(store.by_type(GeofenceType::Terminal).len(), store.by_type(GeofenceType::Depot).len())?;

    let container_repo = ContainerRepository::new(pool.clone());
    let event_log_repo = EventLogRepository::new(pool.clone());
    let timeseries_repo = TimeseriesRepository::new(pool.clone());
    let gate_events_repo = GateEventsRepository::new(pool.clone());

    let start_date = parse_start_date(args.start_date.as_deref())?;
    let mut rng = rand::rng();

    let (runtimes, sim_time, current_slot, events_generated) = if args.resume {
        let checkpoint = Checkpoint::load(&PathBuf::from(&args.state_file))
            .with_context(|| format!("failed to load checkpoint {}", args.state_file))?;
        let rows = container_repo.load_all().await.context("failed to load persisted containers")?;
        let runtimes = resume_population(rows, &checkpoint);
        (runtimes, checkpoint.sim_time, checkpoint.current_slot, checkpoint.events_generated)
    } else {
        let route_gen = RouteGenerator::new(&store, &config.rail_enabled_countries, config.rail_routing_probability);
        let runtimes = bootstrap_population(&config, &route_gen, &container_repo, start_date, &mut rng)
            .await
            .context("failed to bootstrap the container population")?;
        (runtimes, start_date, 0, 0)
    };

    let mut scheduler = Scheduler::new(
        &config,
        &store,
        container_repo,
        event_log_repo,
        timeseries_repo,
        gate_events_repo,
        runtimes,
        sim_time,
        current_slot,
        events_generated,
    );

    let running = Arc::new(AtomicBool::new(true));
    let signal_flag = running.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, finishing current tick"),
                _ = sigint.recv() => info!("received SIGINT, finishing current tick"),
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal, finishing current tick");
            }
        }

        signal_flag.store(false, Ordering::Relaxed);
    });

    let run_result = scheduler.run(running).await;
    scheduler.shutdown().await.context("writer task failed to flush final batch")?;

    if args.save_state {
        let checkpoint = build_checkpoint(&scheduler, &config);
        checkpoint
            .save(&PathBuf::from(&args.state_file))
            .context("failed to write checkpoint")?;
        info!(path = %args.state_file, "wrote checkpoint");
    }

    run_result
}

fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(n) = args.num_containers {
        config.num_containers = n;
    }
    if let Some(speed) = args.speed {
        config.simulation_speed = speed;
    }
    if let Some(slots) = args.slots {
        config.stagger_slots = slots;
    }
    config
}

fn parse_start_date(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("invalid --start-date {s:?}, expected ISO-8601")),
        None => Ok(Utc::now()),
    }
}

fn build_checkpoint(scheduler: &Scheduler<'_>, config: &Config) -> Checkpoint {
    use portflow::checkpoint::ContainerCheckpoint;

    let containers = scheduler
        .runtimes()
        .iter()
        .map(|r| ContainerCheckpoint {
            container_id: r.row.container_id.clone(),
            state: r.row.state,
            report_slot: r.row.report_slot,
            position: r.row.position(),
            is_moving: r.row.is_moving,
            route_index: r.route_index,
            use_rail: r.row.use_rail,
            current_geofence: r.row.current_geofence.clone(),
            journey_start_time: r.row.journey_start_time,
            last_event_time: r.row.last_event_time,
        })
        .collect();

    Checkpoint {
        sim_time: scheduler.sim_time(),
        current_slot: scheduler.current_slot(),
        events_generated: scheduler.events_generated(),
        n_slots: config.stagger_slots as i32,
        speed: config.simulation_speed,
        containers,
    }
}
