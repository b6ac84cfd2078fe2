//! Orchestrator - main simulation loop
//!
//! Owns the simulation state and drives the per-step pipeline.
//!
//! See `engine.rs` for the step loop and `config.rs` for the configuration tree.

pub mod checkpoint;
pub mod config;
pub mod engine;

// Re-export main types for convenience
pub use config::{SimulationConfig, StationConfig};
pub use engine::{
    EngineStatus, Orchestrator, ResetInfo, SimulationError, StepInfo, StepResult,
};

// Re-export checkpoint types
pub use checkpoint::{compute_config_hash, EpisodeSnapshot};
