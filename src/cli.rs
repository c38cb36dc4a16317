//! Command-line arguments for the `simulator` binary.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "simulator",
    about = "Container-logistics discrete-event simulator: staggered fleet of tracked containers emitting IoT telemetry."
)]
pub struct Args {
    /// Population size for bootstrap. Overrides NUM_CONTAINERS.
    #[arg(long = "num-containers")]
    pub num_containers: Option<usize>,

    /// Simulated seconds advanced per real second. Overrides SIMULATION_SPEED.
    #[arg(long = "speed")]
    pub speed: Option<f64>,

    /// Number of staggered scheduler slots. Overrides STAGGER_SLOTS.
    #[arg(long = "slots")]
    pub slots: Option<usize>,

    /// ISO-8601 timestamp to use as the simulation's starting sim_time.
    /// Defaults to the current time.
    #[arg(long = "start-date")]
    pub start_date: Option<String>,

    /// Write a checkpoint to `--state-file` on shutdown.
    #[arg(long = "save-state", default_value_t = false)]
    pub save_state: bool,

    /// Resume from `--state-file` instead of bootstrapping a fresh population.
    #[arg(long = "resume", default_value_t = false)]
    pub resume: bool,

    /// Path to the checkpoint file used by `--save-state` / `--resume`.
    #[arg(long = "state-file", default_value = "simulator_state.json")]
    pub state_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_bare_invocation() {
        let args = Args::parse_from(["simulator"]);
        assert_eq!(args.num_containers, None);
        assert!(!args.save_state);
        assert!(!args.resume);
        assert_eq!(args.state_file, "simulator_state.json");
    }

    #[test]
    fn overrides_parse() {
        let args = Args::parse_from([
            "simulator",
            "--num-containers",
            "500",
            "--speed",
            "120",
            "--slots",
            "60",
            "--save-state",
            "--state-file",
            "out.json",
        ]);
        assert_eq!(args.num_containers, Some(500));
        assert_eq!(args.speed, Some(120.0));
        assert_eq!(args.slots, Some(60));
        assert!(args.save_state);
        assert_eq!(args.state_file, "out.json");
    }

    #[test]
    fn resume_flag_parses() {
        let args = Args::parse_from(["simulator", "--resume"]);
        assert!(args.resume);
    }
}
