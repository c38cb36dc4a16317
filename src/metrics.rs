use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};

/// Initialize the process-wide Prometheus recorder.
///
/// No HTTP scrape endpoint is started here; exposing `/metrics` is an outer
/// surface this crate doesn't provide.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("tick_duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )
        .expect("failed to set buckets for tick_duration_seconds")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Background task that keeps process-level gauges fresh for the lifetime of the run.
pub async fn process_metrics_task() {
    let start_time = Instant::now();

    loop {
        metrics::gauge!("process.uptime.seconds").set(start_time.elapsed().as_secs() as f64);
        metrics::gauge!("process.is_up").set(1.0);

        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
                for line in status.lines() {
                    if line.starts_with("VmRSS:")
                        && let Some(kb_str) = line.split_whitespace().nth(1)
                        && let Ok(kb) = kb_str.parse::<f64>()
                    {
                        metrics::gauge!("process.memory.bytes").set(kb * 1024.0);
                        break;
                    }
                }
            }
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Initialize simulator-specific metrics to zero so they appear in Prometheus
/// queries even before the first tick runs.
pub fn initialize_simulation_metrics() {
    metrics::counter!("simulation_ticks_total").absolute(0);
    metrics::counter!("simulation_events_emitted_total").absolute(0);
    metrics::counter!("simulation_state_transitions_total").absolute(0);
    metrics::counter!("simulation_state_transitions_rejected_total").absolute(0);
    metrics::counter!("simulation_gate_events_total").absolute(0);
    metrics::counter!("simulation_write_batches_total").absolute(0);
    metrics::gauge!("simulation_containers_active").set(0.0);
    metrics::gauge!("simulation_write_queue_depth").set(0.0);
    metrics::gauge!("simulation_sim_speed_multiplier").set(0.0);
}
