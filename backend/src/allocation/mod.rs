//! Resource allocator
//!
//! Turns the control action into per-station, per-class and per-device
//! resource budgets for the current step.
//!
//! # Critical Invariants
//!
//! 1. **Conservation**: for every station
//!    `bandwidth_for_ues + bandwidth_for_sensors == bandwidth_hz` and
//!    `compute_for_ues + compute_for_sensors == compute_capacity`
//! 2. **Isolated pools**: a class with no connected devices leaves its budget
//!    idle; it is never handed to the other class
//! 3. **No carry-over**: allocations are recomputed from scratch every step
//!
//! Unconnected devices receive zero bandwidth.

pub mod share;

pub use share::{DemandProportional, EqualShare, SharePolicy, SharePolicyConfig};

use crate::models::{DeviceKind, SimulationState};
use crate::orchestrator::SimulationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Control action: fractions of bandwidth and compute given to UEs
///
/// Sensors receive the complement of each fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub bandwidth_fraction_to_ues: f64,
    pub compute_fraction_to_ues: f64,
}

impl Action {
    pub fn new(bandwidth_fraction_to_ues: f64, compute_fraction_to_ues: f64) -> Self {
        Self {
            bandwidth_fraction_to_ues,
            compute_fraction_to_ues,
        }
    }

    /// Parse an action from a flat slice `[bandwidth, compute]`
    ///
    /// # Errors
    /// `InvalidAction` if the slice does not hold exactly two values or if a
    /// value is not finite. Range is not checked here; see [`Action::clamped`].
    pub fn from_slice(values: &[f64]) -> Result<Self, SimulationError> {
        match values {
            [bandwidth, compute] => {
                let action = Self::new(*bandwidth, *compute);
                action.check_finite()?;
                Ok(action)
            }
            _ => Err(SimulationError::InvalidAction(format!(
                "expected 2 values (bandwidth, compute), got {}",
                values.len()
            ))),
        }
    }

    pub fn check_finite(&self) -> Result<(), SimulationError> {
        if self.bandwidth_fraction_to_ues.is_finite() && self.compute_fraction_to_ues.is_finite() {
            Ok(())
        } else {
            Err(SimulationError::InvalidAction(format!(
                "action components must be finite, got ({}, {})",
                self.bandwidth_fraction_to_ues, self.compute_fraction_to_ues
            )))
        }
    }

    /// Clamp both fractions into [0, 1]
    ///
    /// Returns the corrected action and whether anything changed.
    pub fn clamped(&self) -> (Action, bool) {
        let applied = Action::new(
            self.bandwidth_fraction_to_ues.clamp(0.0, 1.0),
            self.compute_fraction_to_ues.clamp(0.0, 1.0),
        );
        (applied, applied != *self)
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.bandwidth_fraction_to_ues, self.compute_fraction_to_ues]
    }

    /// Fraction of bandwidth given to `kind`
    pub fn bandwidth_fraction(&self, kind: DeviceKind) -> f64 {
        match kind {
            DeviceKind::Ue => self.bandwidth_fraction_to_ues,
            DeviceKind::Sensor => 1.0 - self.bandwidth_fraction_to_ues,
        }
    }

    /// Fraction of compute given to `kind`
    pub fn compute_fraction(&self, kind: DeviceKind) -> f64 {
        match kind {
            DeviceKind::Ue => self.compute_fraction_to_ues,
            DeviceKind::Sensor => 1.0 - self.compute_fraction_to_ues,
        }
    }
}

/// Resources assigned to one station's device classes for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub station_id: u32,
    pub bandwidth_for_ues: f64,
    pub bandwidth_for_sensors: f64,
    pub compute_for_ues: f64,
    pub compute_for_sensors: f64,
    /// Bandwidth in Hz per connected device, keyed by state index
    pub device_bandwidth: BTreeMap<usize, f64>,
}

impl ResourceAllocation {
    pub fn bandwidth_for(&self, kind: DeviceKind) -> f64 {
        match kind {
            DeviceKind::Ue => self.bandwidth_for_ues,
            DeviceKind::Sensor => self.bandwidth_for_sensors,
        }
    }

    pub fn compute_for(&self, kind: DeviceKind) -> f64 {
        match kind {
            DeviceKind::Ue => self.compute_for_ues,
            DeviceKind::Sensor => self.compute_for_sensors,
        }
    }
}

/// Allocation of every station for one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub stations: Vec<ResourceAllocation>,
}

impl AllocationPlan {
    /// Bandwidth held by the device at `index` (zero if unconnected)
    pub fn device_bandwidth(&self, index: usize) -> f64 {
        self.stations
            .iter()
            .find_map(|a| a.device_bandwidth.get(&index).copied())
            .unwrap_or(0.0)
    }

    pub fn station(&self, station_id: u32) -> Option<&ResourceAllocation> {
        self.stations.iter().find(|a| a.station_id == station_id)
    }

    /// Bandwidth actually handed to connected devices of `kind`
    pub fn used_bandwidth(&self, state: &SimulationState, kind: DeviceKind) -> f64 {
        self.stations
            .iter()
            .flat_map(|a| a.device_bandwidth.iter())
            .filter(|(idx, _)| state.device(**idx).map(|d| d.kind()) == Some(kind))
            .map(|(_, bw)| *bw)
            .sum()
    }
}

/// Partition every station's capacity according to `action`
///
/// `action` must already be clamped into [0, 1].
pub fn allocate(action: &Action, state: &SimulationState, policy: &dyn SharePolicy) -> AllocationPlan {
    let stations = state
        .stations()
        .iter()
        .map(|station| {
            let bandwidth_for_ues = station.bandwidth_hz() * action.bandwidth_fraction_to_ues;
            let compute_for_ues = station.compute_capacity() * action.compute_fraction_to_ues;

            let mut allocation = ResourceAllocation {
                station_id: station.id(),
                bandwidth_for_ues,
                bandwidth_for_sensors: station.bandwidth_hz() - bandwidth_for_ues,
                compute_for_ues,
                compute_for_sensors: station.compute_capacity() - compute_for_ues,
                device_bandwidth: BTreeMap::new(),
            };

            for kind in DeviceKind::ALL {
                let indices = state.connected_indices(kind, station.id());
                let demands: Vec<f64> = indices
                    .iter()
                    .filter_map(|idx| state.device(*idx))
                    .map(|d| d.uplink().pending_bits())
                    .collect();
                let shares = policy.split(allocation.bandwidth_for(kind), &demands);
                allocation.device_bandwidth.extend(indices.into_iter().zip(shares));
            }

            allocation
        })
        .collect();

    AllocationPlan { stations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseStation, Device, Position};

    fn state() -> SimulationState {
        let station = BaseStation::new(0, Position::new(0.0, 0.0), 100.0, 10.0, 3500.0, 40.0, 40.0, 10);
        let mut devices = vec![
            Device::new_ue(0, 1.5, 5),
            Device::new_ue(1, 1.5, 5),
            Device::new_sensor(0, Position::new(1.0, 1.0), 5),
        ];
        for d in devices.iter_mut() {
            d.attach(0);
        }
        SimulationState::new(devices, vec![station])
    }

    #[test]
    fn test_from_slice_rejects_bad_shape() {
        assert!(matches!(
            Action::from_slice(&[0.5]),
            Err(SimulationError::InvalidAction(_))
        ));
        assert!(matches!(
            Action::from_slice(&[0.5, 0.5, 0.5]),
            Err(SimulationError::InvalidAction(_))
        ));
        assert!(matches!(
            Action::from_slice(&[f64::NAN, 0.5]),
            Err(SimulationError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_clamping() {
        let (applied, clamped) = Action::new(1.4, -0.1).clamped();
        assert!(clamped);
        assert_eq!(applied, Action::new(1.0, 0.0));

        let (applied, clamped) = Action::new(0.3, 0.7).clamped();
        assert!(!clamped);
        assert_eq!(applied, Action::new(0.3, 0.7));
    }

    #[test]
    fn test_class_split() {
        let state = state();
        let plan = allocate(&Action::new(0.6, 0.2), &state, &EqualShare);
        let a = plan.station(0).unwrap();
        assert!((a.bandwidth_for_ues - 60.0).abs() < 1e-9);
        assert!((a.bandwidth_for_sensors - 40.0).abs() < 1e-9);
        assert!((a.compute_for_ues - 2.0).abs() < 1e-9);
        assert!((a.compute_for_sensors - 8.0).abs() < 1e-9);

        assert!((plan.device_bandwidth(0) - 30.0).abs() < 1e-9);
        assert!((plan.device_bandwidth(1) - 30.0).abs() < 1e-9);
        assert!((plan.device_bandwidth(2) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_class_budget_is_idle() {
        let mut state = state();
        state.device_mut(2).unwrap().detach();
        let plan = allocate(&Action::new(0.5, 0.5), &state, &EqualShare);

        assert_eq!(plan.device_bandwidth(2), 0.0);
        assert!((plan.used_bandwidth(&state, DeviceKind::Ue) - 50.0).abs() < 1e-9);
        assert_eq!(plan.used_bandwidth(&state, DeviceKind::Sensor), 0.0);
    }
}
