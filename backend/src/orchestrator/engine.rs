//! Orchestrator Engine
//!
//! Main step loop integrating all components:
//! - Mobility (UE movement)
//! - Channel and connection management (attach / detach with hysteresis)
//! - Resource allocation (control action → per-class and per-device budgets)
//! - Job pipeline (generation, uplink transfer, compute, delay enforcement)
//! - AoI and reward
//! - Event logging and metrics
//!
//! # Architecture
//!
//! ```text
//! For each step t:
//! 1. Validate and clamp the action
//! 2. Move UEs
//! 3. Recompute SNRs and update connections (detach cancels in-flight jobs)
//! 4. Allocate bandwidth and compute
//! 5. Generate, transfer, process and expire jobs
//! 6. Advance AoI counters and compute the reward
//! 7. Publish metrics and the observation
//! 8. Advance time; end the episode at the horizon or on truncation
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──reset──► Running ──horizon / truncation──► Done
//!                   ▲                                 │
//!                   └──────────────reset──────────────┘
//! ```
//!
//! `step` outside `Running` fails with `InvalidState`.
//!
//! # Example
//!
//! ```rust
//! use smartcity_simulator_core_rs::allocation::Action;
//! use smartcity_simulator_core_rs::orchestrator::{Orchestrator, SimulationConfig};
//!
//! let mut engine = Orchestrator::new(SimulationConfig::smart_city(2, 3)).unwrap();
//! let (observation, _info) = engine.reset(None).unwrap();
//! assert_eq!(observation.len(), engine.observation_space().len());
//!
//! for _ in 0..10 {
//!     let result = engine.step(Action::new(0.5, 0.5)).unwrap();
//!     assert!(result.reward.is_finite());
//! }
//! ```

use crate::allocation::{allocate, Action, AllocationPlan, SharePolicy};
use crate::connection::{ConnectionChange, ConnectionManager};
use crate::core::time::TimeManager;
use crate::jobs::{DropCounters, JobStepReport, PerClass, QueueEngine};
use crate::metrics::{self, MetricInputs, StepMetrics};
use crate::models::{
    BaseStation, Device, DeviceKind, DropReason, Event, EventLog, JobError, SimulationState,
};
use crate::observation::{action_space, BoxSpace, ObservationBuilder};
use crate::orchestrator::checkpoint::{validate_snapshot, EpisodeSnapshot};
use crate::orchestrator::config::SimulationConfig;
use crate::reward::{mean_ages, update_ages, RewardBreakdown, RewardInputs};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Result and Error Types
// ============================================================================

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Constructed, never reset
    Idle,
    /// Episode in progress
    Running,
    /// Episode ended; only `reset` is accepted
    Done,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStatus::Idle => "idle",
            EngineStatus::Running => "running",
            EngineStatus::Done => "done",
        };
        f.write_str(name)
    }
}

/// Simulation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Configuration validation error
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Malformed control action (wrong shape or non-finite value)
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Cannot {operation} while the engine is {status}")]
    InvalidState {
        operation: &'static str,
        status: EngineStatus,
    },

    /// Snapshot or config (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot taken with a different configuration
    #[error("Config mismatch: engine has {expected}, snapshot has {found}")]
    ConfigMismatch { expected: String, found: String },

    /// Broken job stage transition
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Diagnostic information returned with every step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Index of the step just executed
    pub step: usize,
    pub requested_action: Action,
    pub applied_action: Action,
    pub action_clamped: bool,
    pub reward: RewardBreakdown,
    pub throughput_mbit: PerClass<f64>,
    pub delivered: PerClass<u64>,
    pub drops: PerClass<DropCounters>,
    /// Sum of rewards over the episode, set on the final step
    pub episode_reward: Option<f64>,
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Vec<f64>,
    pub reward: f64,
    /// Horizon reached
    pub terminated: bool,
    /// Episode stopped early on request
    pub truncated: bool,
    pub info: StepInfo,
}

/// Information returned by `reset`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetInfo {
    /// Episodes started since construction, this one included
    pub episode: u64,
    /// Attached devices per class after the initial association
    pub connections: PerClass<usize>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Main orchestrator managing simulation state and the step loop
///
/// The Orchestrator exclusively owns the simulation state; callers interact
/// only through `reset`, `step` and read-only accessors.
///
/// # Determinism
///
/// All randomness is via `rng` with seeded xorshift64*.
/// Same seed + same config + same actions = identical episodes.
pub struct Orchestrator {
    config: SimulationConfig,
    config_hash: String,
    status: EngineStatus,
    episode: u64,

    /// Devices, stations and their queues
    state: SimulationState,

    time: TimeManager,

    /// Deterministic RNG shared by mobility and job generation
    rng: RngManager,

    connections: ConnectionManager,
    queue_engine: QueueEngine,
    share_policy: Box<dyn SharePolicy>,
    observation_builder: ObservationBuilder,

    /// Scaled utility per device from the latest allocation
    utilities: Vec<f64>,

    cumulative_drops: PerClass<DropCounters>,
    episode_reward: f64,
    truncation_requested: bool,

    /// Metrics of the latest step
    metrics: StepMetrics,

    /// Event log of the current episode
    event_log: EventLog,
}

impl Orchestrator {
    /// Create a new orchestrator from configuration
    ///
    /// The engine starts `Idle`; call `reset` before stepping.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the configuration fails validation.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let device_capacity = config.queues.device_capacity;
        let mut devices: Vec<Device> = (0..config.num_ues)
            .map(|i| Device::new_ue(i as u32, config.ue_velocity, device_capacity))
            .collect();
        devices.extend(
            config
                .sensor_positions
                .iter()
                .enumerate()
                .map(|(i, pos)| Device::new_sensor(i as u32, *pos, device_capacity)),
        );

        let stations: Vec<BaseStation> = config
            .stations
            .iter()
            .map(|s| {
                BaseStation::new(
                    s.id,
                    s.position,
                    s.bandwidth_hz,
                    s.compute_capacity,
                    s.frequency_mhz,
                    s.tx_power_dbm,
                    s.height_m,
                    config.queues.station_capacity,
                )
            })
            .collect();

        let state = SimulationState::new(devices, stations);
        let observation_builder = ObservationBuilder::new(
            &config.observation,
            config.horizon,
            state.num_stations(),
            state.devices().len(),
        );

        Ok(Self {
            config_hash: config.fingerprint()?,
            status: EngineStatus::Idle,
            episode: 0,
            time: TimeManager::new(config.horizon),
            rng: RngManager::new(config.seed),
            connections: ConnectionManager::new(config.connection.clone()),
            queue_engine: QueueEngine::new(
                config.traffic.clone(),
                config.queues.max_delay_steps,
                config.step_duration_s,
            ),
            share_policy: config.share_policy.build(),
            observation_builder,
            utilities: vec![-1.0; state.devices().len()],
            cumulative_drops: PerClass::default(),
            episode_reward: 0.0,
            truncation_requested: false,
            metrics: StepMetrics::new(),
            event_log: EventLog::new(),
            state,
            config,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// SHA-256 fingerprint of the configuration
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Steps executed in the current episode
    pub fn current_step(&self) -> usize {
        self.time.current_step()
    }

    pub fn num_users(&self) -> usize {
        self.state.num_ues()
    }

    pub fn num_sensors(&self) -> usize {
        self.state.num_sensors()
    }

    pub fn num_stations(&self) -> usize {
        self.state.num_stations()
    }

    pub fn action_space(&self) -> BoxSpace {
        action_space()
    }

    pub fn observation_space(&self) -> BoxSpace {
        self.observation_builder.space()
    }

    /// Get reference to simulation state
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Metrics published by the latest step (empty right after reset)
    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    /// Get reference to event log
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Scaled utility per device, by state index
    pub fn utilities(&self) -> &[f64] {
        &self.utilities
    }

    /// Drops per class and cause since reset
    pub fn cumulative_drops(&self) -> &PerClass<DropCounters> {
        &self.cumulative_drops
    }

    pub fn episode_reward(&self) -> f64 {
        self.episode_reward
    }

    /// Observation of the current state
    pub fn observe(&self) -> Vec<f64> {
        self.observation_builder.build(&self.state, &self.utilities)
    }

    // ========================================================================
    // Episode Control
    // ========================================================================

    /// Start a new episode
    ///
    /// With `Some(seed)` the random stream is re-created from `seed`. With
    /// `None` it is re-created from the configured seed when
    /// `reset_rng_episode` is set, and otherwise continues where the previous
    /// episode left off.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<(Vec<f64>, ResetInfo), SimulationError> {
        match seed {
            Some(seed) => self.rng = RngManager::new(seed),
            None if self.config.reset_rng_episode => self.rng = RngManager::new(self.config.seed),
            None => {}
        }

        self.state.reset();
        self.config
            .mobility
            .place_devices(&self.config.area, &mut self.state, &mut self.rng);

        self.time.reset();
        self.queue_engine.reset();
        self.event_log.clear();
        self.cumulative_drops = PerClass::default();
        self.episode_reward = 0.0;
        self.truncation_requested = false;
        self.metrics = StepMetrics::new();
        self.utilities = vec![self.config.utility.scaled_utility(0.0); self.state.devices().len()];

        let mut report = JobStepReport::default();
        let changes = self
            .connections
            .update_connections(&mut self.state, &self.config.channel, 0)?;
        Self::record_connection_changes(changes, 0, &mut report);
        for event in report.events {
            self.event_log.log(event);
        }

        self.status = EngineStatus::Running;
        self.episode += 1;

        let info = ResetInfo {
            episode: self.episode,
            connections: PerClass {
                ue: self.state.num_connected(DeviceKind::Ue),
                sensor: self.state.num_connected(DeviceKind::Sensor),
            },
        };
        log::info!(
            "episode {} reset: {} UEs, {} sensors, {} stations ({} + {} attached)",
            self.episode,
            self.num_users(),
            self.num_sensors(),
            self.num_stations(),
            info.connections.ue,
            info.connections.sensor
        );

        Ok((self.observe(), info))
    }

    /// Ask for the episode to end after the next step
    ///
    /// That step reports `truncated = true`.
    pub fn request_truncation(&mut self) -> Result<(), SimulationError> {
        if self.status != EngineStatus::Running {
            return Err(SimulationError::InvalidState {
                operation: "request truncation",
                status: self.status,
            });
        }
        self.truncation_requested = true;
        Ok(())
    }

    // ========================================================================
    // Step Loop Implementation
    // ========================================================================

    /// Execute one simulation step
    ///
    /// # Errors
    ///
    /// * `InvalidState` - engine is not `Running`
    /// * `InvalidAction` - a component of `action` is not finite
    ///
    /// Out-of-range fractions are clamped into [0, 1]; the correction is
    /// logged, recorded as an `ActionClamped` event and flagged in the info.
    pub fn step(&mut self, action: Action) -> Result<StepResult, SimulationError> {
        if self.status != EngineStatus::Running {
            return Err(SimulationError::InvalidState {
                operation: "step",
                status: self.status,
            });
        }
        action.check_finite()?;

        let step = self.time.current_step();
        let mut report = JobStepReport::default();

        // STEP 1: ACTION
        let (applied, clamped) = action.clamped();
        if clamped {
            log::warn!(
                "step {}: action ({}, {}) clamped to ({}, {})",
                step,
                action.bandwidth_fraction_to_ues,
                action.compute_fraction_to_ues,
                applied.bandwidth_fraction_to_ues,
                applied.compute_fraction_to_ues
            );
            report.events.push(Event::ActionClamped {
                step,
                requested: action.as_array(),
                applied: applied.as_array(),
            });
        }

        // STEP 2: MOBILITY
        self.config
            .mobility
            .move_devices(&self.config.area, &mut self.state, &mut self.rng);

        // STEP 3: CHANNEL + CONNECTIONS
        let changes = self
            .connections
            .update_connections(&mut self.state, &self.config.channel, step)?;
        Self::record_connection_changes(changes, step, &mut report);

        // STEP 4: ALLOCATION
        let plan = allocate(&applied, &self.state, self.share_policy.as_ref());
        let rates = self.link_rates(&plan);
        let utility = &self.config.utility;
        self.utilities = rates.iter().map(|r| utility.scaled_utility(*r)).collect();

        // STEP 5: JOB PIPELINE
        self.queue_engine.advance(
            &mut self.state,
            &plan,
            &self.config.channel,
            step,
            &mut self.rng,
            &mut report,
        )?;

        // STEP 6: AOI + REWARD
        update_ages(&mut self.state, &report);
        let inputs = RewardInputs::from_step(&report, &self.state);
        let reward = self.config.reward.evaluate(&inputs);
        self.episode_reward += reward.total;
        for kind in DeviceKind::ALL {
            self.cumulative_drops
                .get_mut(kind)
                .accumulate(report.drops.get(kind));
        }

        // STEP 7: METRICS
        self.metrics = metrics::collect(&MetricInputs {
            step,
            state: &self.state,
            action: &applied,
            clamped,
            plan: &plan,
            report: &report,
            reward: &reward,
            mean_ages: mean_ages(&self.state),
            cumulative_drops: &self.cumulative_drops,
            utilities: &self.utilities,
            rates: &rates,
        });

        log::debug!(
            "step {}: reward {:.3}, ue {:.1} Mbit / {} delayed, sensor {:.1} Mbit / {} delayed",
            step,
            reward.total,
            inputs.throughput_mbit.ue,
            inputs.delayed.ue,
            inputs.throughput_mbit.sensor,
            inputs.delayed.sensor
        );

        // STEP 8: TIME
        self.time.advance_step();
        let terminated = self.time.is_time_up();
        let truncated = self.truncation_requested;
        let finished = terminated || truncated;
        if finished {
            self.status = EngineStatus::Done;
            log::info!(
                "episode {} finished after {} steps (terminated: {}, truncated: {}), reward {:.3}",
                self.episode,
                self.time.current_step(),
                terminated,
                truncated,
                self.episode_reward
            );
        }

        let info = StepInfo {
            step,
            requested_action: action,
            applied_action: applied,
            action_clamped: clamped,
            reward,
            throughput_mbit: inputs.throughput_mbit,
            delivered: report.delivered,
            drops: report.drops,
            episode_reward: finished.then_some(self.episode_reward),
        };

        for event in report.events {
            self.event_log.log(event);
        }

        Ok(StepResult {
            observation: self.observe(),
            reward: reward.total,
            terminated,
            truncated,
            info,
        })
    }

    /// Convenience wrapper parsing a flat `[bandwidth, compute]` action
    pub fn step_slice(&mut self, action: &[f64]) -> Result<StepResult, SimulationError> {
        if self.status != EngineStatus::Running {
            return Err(SimulationError::InvalidState {
                operation: "step",
                status: self.status,
            });
        }
        self.step(Action::from_slice(action)?)
    }

    /// Achieved rate of every device under `plan`, by state index
    fn link_rates(&self, plan: &AllocationPlan) -> Vec<f64> {
        self.state
            .devices()
            .iter()
            .enumerate()
            .map(|(index, device)| {
                match device.station().and_then(|id| self.state.station(id)) {
                    Some(station) => self.config.channel.data_rate(
                        station,
                        device.position(),
                        plan.device_bandwidth(index),
                    ),
                    None => 0.0,
                }
            })
            .collect()
    }

    fn record_connection_changes(changes: Vec<ConnectionChange>, step: usize, report: &mut JobStepReport) {
        for change in changes {
            match change {
                ConnectionChange::Attached {
                    kind,
                    device_id,
                    station_id,
                    snr_db,
                } => report.events.push(Event::DeviceAttached {
                    step,
                    kind,
                    device_id,
                    station_id,
                    snr_db,
                }),
                ConnectionChange::Detached {
                    kind,
                    device_id,
                    station_id,
                    snr_db,
                    cancelled,
                } => {
                    report.events.push(Event::DeviceDetached {
                        step,
                        kind,
                        device_id,
                        station_id,
                        snr_db,
                    });
                    if let Some(job) = cancelled {
                        report.record_drop(&job, DropReason::Disconnect, step);
                    }
                }
            }
        }
    }

    // ========================================================================
    // Checkpointing
    // ========================================================================

    /// Serialise the current episode to JSON
    pub fn save_state(&self) -> Result<String, SimulationError> {
        if self.status == EngineStatus::Idle {
            return Err(SimulationError::InvalidState {
                operation: "save state",
                status: self.status,
            });
        }

        let snapshot = EpisodeSnapshot {
            config_hash: self.config_hash.clone(),
            status: self.status,
            episode: self.episode,
            time: self.time.clone(),
            rng: self.rng.clone(),
            state: self.state.clone(),
            queue_engine: self.queue_engine.clone(),
            cumulative_drops: self.cumulative_drops,
            episode_reward: self.episode_reward,
            truncation_requested: self.truncation_requested,
            utilities: self.utilities.clone(),
            metrics: self.metrics.clone(),
            event_log: self.event_log.clone(),
        };

        serde_json::to_string(&snapshot)
            .map_err(|e| SimulationError::Serialization(format!("Snapshot serialization failed: {}", e)))
    }

    /// Restore an episode saved by `save_state`
    ///
    /// # Errors
    ///
    /// * `Serialization` - malformed JSON or a snapshot violating queue invariants
    /// * `ConfigMismatch` - snapshot taken with a different configuration
    pub fn load_state(&mut self, json: &str) -> Result<(), SimulationError> {
        let snapshot: EpisodeSnapshot = serde_json::from_str(json)
            .map_err(|e| SimulationError::Serialization(format!("Snapshot parse failed: {}", e)))?;

        if snapshot.config_hash != self.config_hash {
            return Err(SimulationError::ConfigMismatch {
                expected: self.config_hash.clone(),
                found: snapshot.config_hash,
            });
        }
        validate_snapshot(&snapshot)?;

        self.status = snapshot.status;
        self.episode = snapshot.episode;
        self.time = snapshot.time;
        self.rng = snapshot.rng;
        self.state = snapshot.state;
        self.queue_engine = snapshot.queue_engine;
        self.cumulative_drops = snapshot.cumulative_drops;
        self.episode_reward = snapshot.episode_reward;
        self.truncation_requested = snapshot.truncation_requested;
        self.utilities = snapshot.utilities;
        self.metrics = snapshot.metrics;
        self.event_log = snapshot.event_log;

        log::info!(
            "restored episode {} at step {}",
            self.episode,
            self.time.current_step()
        );
        Ok(())
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("status", &self.status)
            .field("episode", &self.episode)
            .field("current_step", &self.time.current_step())
            .field("num_users", &self.num_users())
            .field("num_sensors", &self.num_sensors())
            .field("num_stations", &self.num_stations())
            .field("share_policy", &self.share_policy.name())
            .field("event_count", &self.event_log.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
