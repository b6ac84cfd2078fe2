//! Observation and space descriptors
//!
//! The observation is a flat vector whose layout is fixed when the engine is
//! built:
//!
//! ```text
//! [ station 0: ue queue fill, sensor queue fill,
//!   station 1: ...,
//!   device 0 features..., device 1 features..., ... ]
//! ```
//!
//! Devices appear UEs first, then sensors, in state order. The per-device
//! feature list is configurable; every feature lies in [-1, 1].

use crate::models::{DeviceKind, SimulationState};
use serde::{Deserialize, Serialize};

/// Per-device observation feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceFeature {
    /// 1 when attached, else 0
    Connected,
    /// Utility scaled to [-1, 1]
    Utility,
    /// Uplink queue length / capacity
    QueueFill,
    /// AoRI / horizon, clamped to [0, 1]
    Aori,
    /// AoSI / horizon, clamped to [0, 1]
    Aosi,
}

impl DeviceFeature {
    fn bounds(&self) -> (f64, f64) {
        match self {
            DeviceFeature::Utility => (-1.0, 1.0),
            _ => (0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationConfig {
    pub device_features: Vec<DeviceFeature>,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            device_features: vec![
                DeviceFeature::Connected,
                DeviceFeature::Utility,
                DeviceFeature::QueueFill,
            ],
        }
    }
}

/// Continuous box space with per-element bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl BoxSpace {
    pub fn uniform(len: usize, low: f64, high: f64) -> Self {
        Self {
            low: vec![low; len],
            high: vec![high; len],
        }
    }

    pub fn len(&self) -> usize {
        self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_empty()
    }

    pub fn shape(&self) -> Vec<usize> {
        vec![self.low.len()]
    }

    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }
}

/// The action is `(bandwidth_fraction_to_ues, compute_fraction_to_ues)`
pub fn action_space() -> BoxSpace {
    BoxSpace::uniform(2, 0.0, 1.0)
}

/// Builds observation vectors with a fixed layout
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    features: Vec<DeviceFeature>,
    horizon: usize,
    num_stations: usize,
    num_devices: usize,
}

impl ObservationBuilder {
    pub fn new(config: &ObservationConfig, horizon: usize, num_stations: usize, num_devices: usize) -> Self {
        Self {
            features: config.device_features.clone(),
            horizon: horizon.max(1),
            num_stations,
            num_devices,
        }
    }

    pub fn len(&self) -> usize {
        2 * self.num_stations + self.features.len() * self.num_devices
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn space(&self) -> BoxSpace {
        let mut low = vec![0.0; 2 * self.num_stations];
        let mut high = vec![1.0; 2 * self.num_stations];
        for _ in 0..self.num_devices {
            for feature in &self.features {
                let (lo, hi) = feature.bounds();
                low.push(lo);
                high.push(hi);
            }
        }
        BoxSpace { low, high }
    }

    /// Assemble the observation
    ///
    /// `utilities` holds the scaled utility of each device by state index.
    pub fn build(&self, state: &SimulationState, utilities: &[f64]) -> Vec<f64> {
        let mut obs = Vec::with_capacity(self.len());

        for station in state.stations() {
            for kind in DeviceKind::ALL {
                obs.push(station.compute_queue(kind).fill_ratio());
            }
        }

        let horizon = self.horizon as f64;
        for (index, device) in state.devices().iter().enumerate() {
            for feature in &self.features {
                let value = match feature {
                    DeviceFeature::Connected => {
                        if device.is_connected() {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    DeviceFeature::Utility => utilities.get(index).copied().unwrap_or(-1.0),
                    DeviceFeature::QueueFill => device.uplink().fill_ratio(),
                    DeviceFeature::Aori => (device.aoi().aori() as f64 / horizon).min(1.0),
                    DeviceFeature::Aosi => (device.aoi().aosi() as f64 / horizon).min(1.0),
                };
                obs.push(value);
            }
        }

        obs
    }
}
