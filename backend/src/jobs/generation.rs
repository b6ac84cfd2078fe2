//! Job generation
//!
//! Every connected device draws at most one new job per step. All draws go
//! through the shared `RngManager`, so the same seed and configuration yield
//! the same jobs.
//!
//! For each device and step:
//! 1. one Bernoulli draw with the class probability decides whether a job appears
//! 2. if it does, the size (Mbit) and compute requirement are Poisson samples,
//!    each floored at 1 so a job is never empty
//!
//! # Example
//!
//! ```
//! use smartcity_simulator_core_rs::jobs::{JobGenerationConfig, JobGenerator, TrafficConfig};
//! use smartcity_simulator_core_rs::models::DeviceKind;
//! use smartcity_simulator_core_rs::rng::RngManager;
//!
//! let mut rng = RngManager::new(42);
//! let traffic = TrafficConfig {
//!     sensor: JobGenerationConfig { probability: 1.0, size_mbit_lambda: 40.0, compute_lambda: 4.0 },
//!     ..TrafficConfig::default()
//! };
//! let mut generator = JobGenerator::new(traffic);
//!
//! let job = generator.generate_for_device(DeviceKind::Sensor, 3, 0, &mut rng).unwrap();
//! assert_eq!(job.id(), 0);
//! assert_eq!(job.device_id(), 3);
//! ```

use crate::models::{DeviceKind, Job};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Job generation parameters for one device class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobGenerationConfig {
    /// Probability that a connected device generates a job in a step
    pub probability: f64,

    /// Poisson mean of the job size in Mbit
    pub size_mbit_lambda: f64,

    /// Poisson mean of the compute requirement in compute units
    pub compute_lambda: f64,
}

impl JobGenerationConfig {
    pub fn ue_default() -> Self {
        Self {
            probability: 0.7,
            size_mbit_lambda: 100.0,
            compute_lambda: 10.0,
        }
    }

    pub fn sensor_default() -> Self {
        Self {
            probability: 1.0,
            size_mbit_lambda: 40.0,
            compute_lambda: 4.0,
        }
    }
}

/// Generation parameters for both classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficConfig {
    pub ue: JobGenerationConfig,
    pub sensor: JobGenerationConfig,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            ue: JobGenerationConfig::ue_default(),
            sensor: JobGenerationConfig::sensor_default(),
        }
    }
}

impl TrafficConfig {
    pub fn for_kind(&self, kind: DeviceKind) -> &JobGenerationConfig {
        match kind {
            DeviceKind::Ue => &self.ue,
            DeviceKind::Sensor => &self.sensor,
        }
    }
}

/// Generator for jobs across all devices
///
/// Job identifiers are sequential across both classes and restart at zero
/// on `reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobGenerator {
    traffic: TrafficConfig,
    next_job_id: u64,
}

impl JobGenerator {
    pub fn new(traffic: TrafficConfig) -> Self {
        Self {
            traffic,
            next_job_id: 0,
        }
    }

    /// Draw zero or one job for a device in `step`
    pub fn generate_for_device(
        &mut self,
        kind: DeviceKind,
        device_id: u32,
        step: usize,
        rng: &mut RngManager,
    ) -> Option<Job> {
        let config = self.traffic.for_kind(kind);

        if !rng.bernoulli(config.probability) {
            return None;
        }

        let size_mbit = rng.poisson(config.size_mbit_lambda).max(1);
        let compute_units = rng.poisson(config.compute_lambda).max(1);

        let job = Job::new(
            self.next_job_id,
            device_id,
            kind,
            step,
            size_mbit as f64 * 1e6,
            compute_units as f64,
        );
        self.next_job_id += 1;
        Some(job)
    }

    pub fn next_job_id(&self) -> u64 {
        self.next_job_id
    }

    pub fn traffic(&self) -> &TrafficConfig {
        &self.traffic
    }

    pub fn reset(&mut self) {
        self.next_job_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_probability_never_generates() {
        let mut rng = RngManager::new(1);
        let mut generator = JobGenerator::new(TrafficConfig {
            ue: JobGenerationConfig {
                probability: 0.0,
                ..JobGenerationConfig::ue_default()
            },
            ..TrafficConfig::default()
        });
        for step in 0..100 {
            assert!(generator.generate_for_device(DeviceKind::Ue, 0, step, &mut rng).is_none());
        }
        assert_eq!(generator.next_job_id(), 0);
    }

    #[test]
    fn test_sequential_ids_and_floors() {
        let mut rng = RngManager::new(5);
        let mut generator = JobGenerator::new(TrafficConfig {
            sensor: JobGenerationConfig {
                probability: 1.0,
                size_mbit_lambda: 0.0,
                compute_lambda: 0.0,
            },
            ..TrafficConfig::default()
        });

        for expected in 0..5u64 {
            let job = generator
                .generate_for_device(DeviceKind::Sensor, 1, 0, &mut rng)
                .unwrap();
            assert_eq!(job.id(), expected);
            assert_eq!(job.size_bits(), 1e6);
            assert_eq!(job.compute_units(), 1.0);
        }

        generator.reset();
        let job = generator
            .generate_for_device(DeviceKind::Sensor, 1, 0, &mut rng)
            .unwrap();
        assert_eq!(job.id(), 0);
    }

    #[test]
    fn test_determinism() {
        let draw = || {
            let mut rng = RngManager::new(99);
            let mut generator = JobGenerator::new(TrafficConfig::default());
            (0..50)
                .filter_map(|step| generator.generate_for_device(DeviceKind::Ue, 0, step, &mut rng))
                .map(|job| (job.created_step(), job.size_bits(), job.compute_units()))
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(), draw());
    }
}
