//! Smart City Simulator Core - Rust Engine
//!
//! Discrete-time simulation of a mobile edge network in which user equipment
//! (UEs) and IoT sensors share the bandwidth and compute of base stations.
//! An external controller chooses the split every step and receives an
//! observation and reward back.
//!
//! # Architecture
//!
//! - **core**: Time management
//! - **models**: Domain types (Device, BaseStation, Job, State, Events)
//! - **channel**: Path loss, SNR and Shannon data rates
//! - **mobility**: Device placement and movement
//! - **connection**: SNR-hysteresis association
//! - **allocation**: Per-class resource split and per-device shares
//! - **jobs**: Job generation, uplink transfer and compute service
//! - **utility**: Bounded logarithmic utility of a data rate
//! - **reward**: Age of information and per-step reward
//! - **observation**: Observation vector and space bounds
//! - **metrics**: Per-step metrics
//! - **orchestrator**: Reset/step controller and checkpoints
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (seeded RNG)
//! 2. Allocated resources never exceed station capacity
//! 3. Every job is delivered or dropped exactly once
//! 4. FFI boundary is minimal and safe

// Module declarations
pub mod allocation;
pub mod channel;
pub mod connection;
pub mod core;
pub mod jobs;
pub mod metrics;
pub mod mobility;
pub mod models;
pub mod observation;
pub mod orchestrator;
pub mod reward;
pub mod rng;
pub mod utility;

// Re-exports for convenience
pub use allocation::{allocate, Action, AllocationPlan, SharePolicy, SharePolicyConfig};
pub use channel::{ChannelConfig, PathLossModel};
pub use connection::{ConnectionConfig, ConnectionManager};
pub use core::time::TimeManager;
pub use jobs::{DropCounters, JobGenerationConfig, PerClass, QueueConfig, QueueEngine, TrafficConfig};
pub use metrics::{MetricValue, StepMetrics};
pub use mobility::{MobilityConfig, MobilityModel, SimulationArea};
pub use models::{
    BaseStation, Device, DeviceKind, DropReason, Event, EventLog, Job, JobError, JobStage,
    Position, SimulationState,
};
pub use observation::{BoxSpace, ObservationConfig};
pub use orchestrator::{
    EngineStatus, Orchestrator, ResetInfo, SimulationConfig, SimulationError, StationConfig,
    StepInfo, StepResult,
};
pub use reward::{RewardBreakdown, RewardWeights};
pub use rng::RngManager;
pub use utility::BoundedLogUtility;

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn smartcity_simulator_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add_class::<ffi::environment::PyEnvironment>()?;
    m.add("InvalidActionError", py.get_type_bound::<ffi::types::InvalidActionError>())?;
    m.add("InvalidStateError", py.get_type_bound::<ffi::types::InvalidStateError>())?;
    m.add("ConfigMismatchError", py.get_type_bound::<ffi::types::ConfigMismatchError>())?;
    Ok(())
}
