//! smartcity-sim: run one episode of the smart-city simulator from the shell
//!
//! Prints one JSON object per step on stdout and the episode summary at the
//! end. Logging goes to stderr and is controlled with `RUST_LOG`.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use serde_json::json;

use smartcity_simulator_core_rs::metrics::{class_key, keys};
use smartcity_simulator_core_rs::{
    Action, DeviceKind, Orchestrator, RngManager, SimulationConfig, StepMetrics,
};

#[derive(Parser, Debug)]
#[command(name = "smartcity-sim")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Full configuration as JSON (see --dump-config)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of user devices (ignored with --config)
    #[arg(long = "ues", default_value_t = 5)]
    pub ues: usize,

    /// Number of IoT sensors (ignored with --config)
    #[arg(long = "sensors", default_value_t = 10)]
    pub sensors: usize,

    #[arg(long = "horizon")]
    pub horizon: Option<usize>,

    #[arg(short = 's', long = "seed")]
    pub seed: Option<u64>,

    /// Stop after this many steps (truncates the episode)
    #[arg(short = 'n', long = "steps", value_name = "N")]
    pub steps: Option<usize>,

    /// Bandwidth fraction given to UEs
    #[arg(short = 'b', long = "bandwidth", default_value_t = 0.5)]
    pub bandwidth: f64,

    /// Compute fraction given to UEs
    #[arg(short = 'p', long = "compute", default_value_t = 0.5)]
    pub compute: f64,

    /// Draw a uniform random action every step instead of the fixed split
    #[arg(short = 'r', long = "random")]
    pub random: bool,

    /// Print every metric of each step, not only the summary fields
    #[arg(long = "full-metrics")]
    pub full_metrics: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long = "dump-config")]
    pub dump_config: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let action_seed = args.seed.unwrap_or(config.seed);
    let mut orchestrator = Orchestrator::new(config).context("Invalid configuration")?;
    let (_, reset_info) = orchestrator.reset(args.seed)?;
    info!(
        "episode {} started: {} UEs and {} sensors connected",
        reset_info.episode, reset_info.connections.ue, reset_info.connections.sensor
    );

    let mut action_rng = RngManager::new(action_seed ^ 0x5eed);
    let limit = args.steps.unwrap_or(usize::MAX);
    let mut executed = 0usize;

    loop {
        if executed + 1 >= limit {
            orchestrator.request_truncation()?;
        }

        let action = if args.random {
            Action::new(action_rng.next_f64(), action_rng.next_f64())
        } else {
            Action::new(args.bandwidth, args.compute)
        };

        let result = orchestrator.step(action)?;
        executed += 1;

        let line = if args.full_metrics {
            serde_json::to_value(orchestrator.metrics())?
        } else {
            summarize(orchestrator.metrics())
        };
        println!("{}", line);

        if result.terminated || result.truncated {
            break;
        }
    }

    let summary = json!({
        "steps": executed,
        "episode_reward": orchestrator.episode_reward(),
        "total_delayed_ues": orchestrator.cumulative_drops().ue.delayed(),
        "total_delayed_sensors": orchestrator.cumulative_drops().sensor.delayed(),
        "events": orchestrator.event_log().len(),
    });
    println!("{}", summary);
    Ok(())
}

fn build_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<SimulationConfig>(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => SimulationConfig::smart_city(args.ues, args.sensors),
    };

    if let Some(horizon) = args.horizon {
        config.horizon = horizon;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.steps == Some(0) {
        bail!("--steps must be at least 1");
    }
    Ok(config)
}

fn summarize(metrics: &StepMetrics) -> serde_json::Value {
    let scalar = |key: &str| metrics.scalar(key).unwrap_or(0.0);
    let per_class = |base: &str| {
        json!({
            "ues": scalar(&class_key(base, DeviceKind::Ue)),
            "sensors": scalar(&class_key(base, DeviceKind::Sensor)),
        })
    };

    json!({
        "step": scalar(keys::STEP),
        "reward": scalar(keys::REWARD),
        "action_clamped": metrics.flag(keys::ACTION_CLAMPED).unwrap_or(false),
        "bandwidth_fraction": per_class(keys::BANDWIDTH_FRACTION),
        "compute_fraction": per_class(keys::COMPUTE_FRACTION),
        "throughput_mbit": per_class(keys::THROUGHPUT_MBIT),
        "delayed_packets": per_class(keys::DELAYED_PACKETS),
        "mean_aori": scalar(keys::MEAN_AORI),
        "mean_aosi": scalar(keys::MEAN_AOSI),
    })
}
