//! Checkpoint - Save/Load Episode State
//!
//! Serialises a running episode so it can be paused and resumed.
//!
//! # Critical Invariants
//!
//! - **Determinism**: a restored engine continues with exactly the trajectory
//!   the original would have produced (RNG state and job id counter included)
//! - **Queue Integrity**: no job appears in more than one queue
//! - **Config Matching**: a snapshot can only be loaded into an engine built
//!   from a configuration with the same fingerprint

use crate::core::time::TimeManager;
use crate::jobs::{DropCounters, PerClass, QueueEngine};
use crate::metrics::StepMetrics;
use crate::models::{DeviceKind, EventLog, SimulationState};
use crate::orchestrator::engine::EngineStatus;
use crate::orchestrator::SimulationError;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete engine state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSnapshot {
    /// SHA256 hash of the engine config (for validation)
    pub config_hash: String,

    pub status: EngineStatus,
    pub episode: u64,
    pub time: TimeManager,

    /// RNG state at time of snapshot (CRITICAL for determinism)
    pub rng: RngManager,

    pub state: SimulationState,
    pub queue_engine: QueueEngine,
    pub cumulative_drops: PerClass<DropCounters>,
    pub episode_reward: f64,
    pub truncation_requested: bool,
    pub utilities: Vec<f64>,
    pub metrics: StepMetrics,
    pub event_log: EventLog,
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys to ensure
/// deterministic hashing regardless of map iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    // Recursively sort all object keys for canonical representation
    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validate snapshot integrity
///
/// Checks critical invariants:
/// - Queue bounds (no queue above its capacity)
/// - Queue uniqueness (no job in two queues)
/// - Single attachment to an existing station
pub fn validate_snapshot(snapshot: &EpisodeSnapshot) -> Result<(), SimulationError> {
    let state = &snapshot.state;
    let station_ids: HashSet<u32> = state.stations().iter().map(|s| s.id()).collect();
    let mut seen = HashSet::new();

    for device in state.devices() {
        if let Some(station_id) = device.station() {
            if !station_ids.contains(&station_id) {
                return Err(SimulationError::Serialization(format!(
                    "{} {} attached to unknown station {}",
                    device.kind(),
                    device.id(),
                    station_id
                )));
            }
        }

        let queue = device.uplink();
        if queue.len() > queue.capacity() {
            return Err(SimulationError::Serialization(format!(
                "{} {} uplink queue exceeds capacity",
                device.kind(),
                device.id()
            )));
        }
        for job in queue.iter() {
            if !seen.insert(job.id()) {
                return Err(SimulationError::Serialization(format!(
                    "job {} appears in more than one queue",
                    job.id()
                )));
            }
        }
    }

    for station in state.stations() {
        for kind in DeviceKind::ALL {
            let queue = station.compute_queue(kind);
            if queue.len() > queue.capacity() {
                return Err(SimulationError::Serialization(format!(
                    "station {} {} compute queue exceeds capacity",
                    station.id(),
                    kind
                )));
            }
            for job in queue.iter() {
                if !seen.insert(job.id()) {
                    return Err(SimulationError::Serialization(format!(
                        "job {} appears in more than one queue",
                        job.id()
                    )));
                }
            }
        }
    }

    Ok(())
}
