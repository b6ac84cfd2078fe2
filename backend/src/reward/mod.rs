//! AoI and reward engine
//!
//! Ages are advanced once per step after the job pipeline has run, then the
//! scalar reward is derived from the step's throughput, delayed packets and
//! the mean ages.
//!
//! # Reward
//!
//! ```text
//! r = w_tp_ue · Mbit_ue + w_tp_s · Mbit_s
//!   - p_ue · delayed_ue - p_s · delayed_s
//!   - w_aori · mean_aori - w_aosi · mean_aosi
//! ```
//!
//! Higher is better. Means are taken over attached devices and are zero when
//! nothing is attached. The reward only looks at the current step; anything
//! older is already encoded in the ages and queues.

use crate::jobs::{JobStepReport, PerClass};
use crate::models::SimulationState;
use serde::{Deserialize, Serialize};

/// Named reward coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    /// Reward per Mbit moved over UE uplinks
    pub ue_throughput: f64,
    /// Reward per Mbit moved over sensor uplinks
    pub sensor_throughput: f64,
    /// Penalty per delayed or lost UE job
    pub ue_delayed_penalty: f64,
    /// Penalty per delayed or lost sensor job
    pub sensor_delayed_penalty: f64,
    /// Penalty per step of mean AoRI
    pub aori_penalty: f64,
    /// Penalty per step of mean AoSI
    pub aosi_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            ue_throughput: 0.01,
            sensor_throughput: 0.01,
            ue_delayed_penalty: 5.0,
            sensor_delayed_penalty: 2.0,
            aori_penalty: 0.5,
            aosi_penalty: 0.5,
        }
    }
}

/// Reward split into its terms
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub throughput: f64,
    pub delay_penalty: f64,
    pub aoi_penalty: f64,
    pub total: f64,
}

/// Inputs of one reward evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardInputs {
    pub throughput_mbit: PerClass<f64>,
    pub delayed: PerClass<u64>,
    pub mean_aori: f64,
    pub mean_aosi: f64,
}

impl RewardInputs {
    pub fn from_step(report: &JobStepReport, state: &SimulationState) -> Self {
        let (mean_aori, mean_aosi) = mean_ages(state);
        Self {
            throughput_mbit: PerClass {
                ue: report.transmitted_bits.ue / 1e6,
                sensor: report.transmitted_bits.sensor / 1e6,
            },
            delayed: PerClass {
                ue: report.drops.ue.delayed(),
                sensor: report.drops.sensor.delayed(),
            },
            mean_aori,
            mean_aosi,
        }
    }
}

impl RewardWeights {
    pub fn evaluate(&self, inputs: &RewardInputs) -> RewardBreakdown {
        let throughput = self.ue_throughput * inputs.throughput_mbit.ue
            + self.sensor_throughput * inputs.throughput_mbit.sensor;
        let delay_penalty = self.ue_delayed_penalty * inputs.delayed.ue as f64
            + self.sensor_delayed_penalty * inputs.delayed.sensor as f64;
        let aoi_penalty = self.aori_penalty * inputs.mean_aori + self.aosi_penalty * inputs.mean_aosi;

        RewardBreakdown {
            throughput,
            delay_penalty,
            aoi_penalty,
            total: throughput - delay_penalty - aoi_penalty,
        }
    }
}

/// Advance the AoI counters of every attached device
///
/// Detached devices keep their counters frozen.
pub fn update_ages(state: &mut SimulationState, report: &JobStepReport) {
    for (index, device) in state.devices_mut().iter_mut().enumerate() {
        if !device.is_connected() {
            continue;
        }
        device.aoi_mut().advance(
            report.transfer_started.contains(&index),
            report.delivered_devices.contains(&index),
        );
    }
}

/// Mean (AoRI, AoSI) over attached devices
pub fn mean_ages(state: &SimulationState) -> (f64, f64) {
    let attached: Vec<_> = state.devices().iter().filter(|d| d.is_connected()).collect();
    if attached.is_empty() {
        return (0.0, 0.0);
    }
    let n = attached.len() as f64;
    let aori = attached.iter().map(|d| d.aoi().aori() as f64).sum::<f64>() / n;
    let aosi = attached.iter().map(|d| d.aoi().aosi() as f64).sum::<f64>() / n;
    (aori, aosi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseStation, Device, Position};

    #[test]
    fn test_default_weights() {
        let inputs = RewardInputs {
            throughput_mbit: PerClass { ue: 100.0, sensor: 50.0 },
            delayed: PerClass { ue: 1, sensor: 2 },
            mean_aori: 2.0,
            mean_aosi: 4.0,
        };
        let r = RewardWeights::default().evaluate(&inputs);
        assert!((r.throughput - 1.5).abs() < 1e-12);
        assert!((r.delay_penalty - 9.0).abs() < 1e-12);
        assert!((r.aoi_penalty - 3.0).abs() < 1e-12);
        assert!((r.total - (1.5 - 9.0 - 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ages_freeze_when_detached() {
        let station = BaseStation::new(0, Position::new(0.0, 0.0), 1e6, 10.0, 3500.0, 40.0, 40.0, 10);
        let mut attached = Device::new_sensor(0, Position::new(1.0, 0.0), 5);
        attached.attach(0);
        let detached = Device::new_sensor(1, Position::new(2.0, 0.0), 5);
        let mut state = SimulationState::new(vec![attached, detached], vec![station]);

        let mut report = JobStepReport::default();
        update_ages(&mut state, &report);
        update_ages(&mut state, &report);
        assert_eq!(state.device(0).unwrap().aoi().aori(), 2);
        assert_eq!(state.device(1).unwrap().aoi().aori(), 0);

        report.delivered_devices.insert(0);
        update_ages(&mut state, &report);
        assert_eq!(state.device(0).unwrap().aoi().aosi(), 0);
        assert_eq!(state.device(0).unwrap().aoi().aori(), 3);

        assert_eq!(mean_ages(&state), (3.0, 0.0));
    }

    #[test]
    fn test_mean_ages_empty() {
        let station = BaseStation::new(0, Position::new(0.0, 0.0), 1e6, 10.0, 3500.0, 40.0, 40.0, 10);
        let state = SimulationState::new(Vec::new(), vec![station]);
        assert_eq!(mean_ages(&state), (0.0, 0.0));
    }
}
