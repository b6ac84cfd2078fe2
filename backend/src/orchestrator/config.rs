//! Simulation configuration
//!
//! One serialisable tree holds every tunable of the engine. Each sub-config
//! carries its documented defaults through `Default`; `SimulationConfig::validate`
//! rejects inconsistent values before an engine is built.

use crate::allocation::SharePolicyConfig;
use crate::channel::{ChannelConfig, PathLossModel};
use crate::connection::ConnectionConfig;
use crate::jobs::{JobGenerationConfig, QueueConfig, TrafficConfig};
use crate::mobility::{MobilityConfig, MobilityModel, SimulationArea};
use crate::models::Position;
use crate::observation::ObservationConfig;
use crate::orchestrator::checkpoint::compute_config_hash;
use crate::orchestrator::SimulationError;
use crate::reward::RewardWeights;
use crate::utility::BoundedLogUtility;
use serde::{Deserialize, Serialize};

/// Base station parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: u32,
    pub position: Position,
    /// Total bandwidth in Hz
    pub bandwidth_hz: f64,
    /// Compute units served per step
    pub compute_capacity: f64,
    pub frequency_mhz: f64,
    pub tx_power_dbm: f64,
    pub height_m: f64,
}

impl StationConfig {
    pub fn at(id: u32, position: Position) -> Self {
        Self {
            id,
            position,
            bandwidth_hz: 100e6,
            compute_capacity: 100.0,
            frequency_mhz: 3500.0,
            tx_power_dbm: 40.0,
            height_m: 40.0,
        }
    }
}

/// Complete engine configuration
///
/// # Example
///
/// ```rust
/// use smartcity_simulator_core_rs::orchestrator::SimulationConfig;
///
/// let config = SimulationConfig::smart_city(3, 4);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.sensor_positions.len(), 4);
/// assert_eq!(config.fingerprint().unwrap(), config.clone().fingerprint().unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed of the single random stream
    pub seed: u64,

    /// Re-create the random stream from `seed` on every reset
    pub reset_rng_episode: bool,

    /// Steps per episode
    pub horizon: usize,

    /// Seconds represented by one step
    pub step_duration_s: f64,

    pub area: SimulationArea,
    pub stations: Vec<StationConfig>,

    pub num_ues: usize,
    /// UE speed in metres per step
    pub ue_velocity: f64,
    /// One entry per sensor
    pub sensor_positions: Vec<Position>,

    pub channel: ChannelConfig,
    pub connection: ConnectionConfig,
    pub mobility: MobilityConfig,
    pub traffic: TrafficConfig,
    pub queues: QueueConfig,
    pub share_policy: SharePolicyConfig,
    pub utility: BoundedLogUtility,
    pub reward: RewardWeights,
    pub observation: ObservationConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::smart_city(5, 10)
    }
}

impl SimulationConfig {
    /// One station at the centre of a 200 m × 200 m area, `num_sensors`
    /// sensors on a regular grid and `num_ues` random-waypoint UEs
    pub fn smart_city(num_ues: usize, num_sensors: usize) -> Self {
        let area = SimulationArea::default();

        Self {
            seed: 666,
            reset_rng_episode: false,
            horizon: 100,
            step_duration_s: 1.0,
            area,
            stations: vec![StationConfig::at(0, area.center())],
            num_ues,
            ue_velocity: 1.5,
            sensor_positions: sensor_grid(&area, num_sensors),
            channel: ChannelConfig::default(),
            connection: ConnectionConfig::default(),
            mobility: MobilityConfig::default(),
            traffic: TrafficConfig::default(),
            queues: QueueConfig::default(),
            share_policy: SharePolicyConfig::default(),
            utility: BoundedLogUtility::default(),
            reward: RewardWeights::default(),
            observation: ObservationConfig::default(),
        }
    }

    pub fn num_sensors(&self) -> usize {
        self.sensor_positions.len()
    }

    /// SHA-256 of the canonical JSON form
    pub fn fingerprint(&self) -> Result<String, SimulationError> {
        compute_config_hash(self)
    }

    /// Check every option for consistency
    pub fn validate(&self) -> Result<(), SimulationError> {
        fn invalid(msg: impl Into<String>) -> Result<(), SimulationError> {
            Err(SimulationError::InvalidConfig(msg.into()))
        }

        if self.horizon == 0 {
            return invalid("horizon must be positive");
        }
        if !(self.step_duration_s > 0.0) || !self.step_duration_s.is_finite() {
            return invalid("step_duration_s must be positive");
        }
        if !(self.area.width > 0.0 && self.area.height > 0.0) {
            return invalid("area must have positive width and height");
        }
        if self.stations.is_empty() {
            return invalid("at least one station is required");
        }

        let mut ids = std::collections::HashSet::new();
        for station in &self.stations {
            if !ids.insert(station.id) {
                return invalid(format!("duplicate station id: {}", station.id));
            }
            if !(station.bandwidth_hz >= 0.0 && station.bandwidth_hz.is_finite()) {
                return invalid(format!("station {}: bandwidth must be non-negative", station.id));
            }
            if !(station.compute_capacity >= 0.0 && station.compute_capacity.is_finite()) {
                return invalid(format!("station {}: compute capacity must be non-negative", station.id));
            }
            if !(station.frequency_mhz > 0.0 && station.height_m > 0.0) {
                return invalid(format!("station {}: frequency and height must be positive", station.id));
            }
            if !station.tx_power_dbm.is_finite() {
                return invalid(format!("station {}: tx power must be finite", station.id));
            }
        }

        if !(self.ue_velocity >= 0.0) || !self.ue_velocity.is_finite() {
            return invalid("ue_velocity must be non-negative");
        }
        if let MobilityModel::RandomWalk { max_displacement } = self.mobility.model {
            if !(max_displacement >= 0.0) || !max_displacement.is_finite() {
                return invalid("random walk displacement must be non-negative");
            }
        }

        if !(self.channel.min_distance_m > 0.0) {
            return invalid("channel.min_distance_m must be positive");
        }
        if !self.channel.noise_floor_dbm.is_finite() {
            return invalid("channel.noise_floor_dbm must be finite");
        }
        if let PathLossModel::LogDistance { exponent, reference_loss_db } = self.channel.model {
            if !(exponent > 0.0) || !reference_loss_db.is_finite() {
                return invalid("log-distance exponent must be positive");
            }
        }

        if !(self.connection.detach_threshold_db < self.connection.attach_threshold_db) {
            return invalid(format!(
                "detach threshold ({} dB) must be below attach threshold ({} dB)",
                self.connection.detach_threshold_db, self.connection.attach_threshold_db
            ));
        }

        for (name, traffic) in [("ue", &self.traffic.ue), ("sensor", &self.traffic.sensor)] {
            validate_traffic(name, traffic)?;
        }

        if self.queues.device_capacity == 0 || self.queues.station_capacity == 0 {
            return invalid("queue capacities must be positive");
        }

        if !(self.utility.upper > self.utility.lower) {
            return invalid("utility upper bound must exceed lower bound");
        }

        let weights = [
            self.reward.ue_throughput,
            self.reward.sensor_throughput,
            self.reward.ue_delayed_penalty,
            self.reward.sensor_delayed_penalty,
            self.reward.aori_penalty,
            self.reward.aosi_penalty,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return invalid("reward weights must be finite");
        }

        Ok(())
    }
}

fn validate_traffic(name: &str, traffic: &JobGenerationConfig) -> Result<(), SimulationError> {
    if !(0.0..=1.0).contains(&traffic.probability) {
        return Err(SimulationError::InvalidConfig(format!(
            "{} job probability must be in [0, 1]",
            name
        )));
    }
    if !(traffic.size_mbit_lambda >= 0.0 && traffic.compute_lambda >= 0.0)
        || !traffic.size_mbit_lambda.is_finite()
        || !traffic.compute_lambda.is_finite()
    {
        return Err(SimulationError::InvalidConfig(format!(
            "{} job means must be non-negative",
            name
        )));
    }
    Ok(())
}

/// Cell centres of the smallest square grid holding `count` sensors
fn sensor_grid(area: &SimulationArea, count: usize) -> Vec<Position> {
    if count == 0 {
        return Vec::new();
    }
    let side = (count as f64).sqrt().ceil() as usize;
    let cell_w = area.width / side as f64;
    let cell_h = area.height / side as f64;

    (0..count)
        .map(|i| {
            let (row, col) = (i / side, i % side);
            Position::new((col as f64 + 0.5) * cell_w, (row as f64 + 0.5) * cell_h)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sensor_grid_inside_area() {
        let area = SimulationArea::default();
        let grid = sensor_grid(&area, 10);
        assert_eq!(grid.len(), 10);
        assert!(grid.iter().all(|p| area.contains(*p)));
        // 4 x 4 grid of 50 m cells
        assert_eq!(grid[0], Position::new(25.0, 25.0));
        assert_eq!(grid[5], Position::new(75.0, 75.0));
    }

    #[test]
    fn test_rejects_single_threshold() {
        let mut config = SimulationConfig::default();
        config.connection.detach_threshold_db = config.connection.attach_threshold_db;
        assert!(matches!(config.validate(), Err(SimulationError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_horizon() {
        let config = SimulationConfig {
            horizon: 0,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_probability() {
        let mut config = SimulationConfig::default();
        config.traffic.sensor.probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_station_is_allowed() {
        let mut config = SimulationConfig::default();
        config.stations[0].bandwidth_hz = 0.0;
        config.stations[0].compute_capacity = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let a = SimulationConfig::default();
        let mut b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.queues.max_delay_steps += 1;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
