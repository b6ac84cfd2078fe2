//! Simulation State
//!
//! Represents the complete mutable state of one cell cluster: every device
//! (UEs first, then sensors, each group in id order) and every base station.
//!
//! # Critical Invariants
//!
//! 1. **Stable ordering**: device indices never change after construction,
//!    so observations keep their layout across steps
//! 2. **Single attachment**: a device references at most one station
//! 3. **Bounded queues**: every queue length is at most its capacity
//!
//! The state is owned exclusively by the orchestrator; components receive it
//! by reference for the duration of one operation.

use crate::models::device::{Device, DeviceKind};
use crate::models::station::BaseStation;
use serde::{Deserialize, Serialize};

/// Complete simulation state
///
/// # Example
///
/// ```rust
/// use smartcity_simulator_core_rs::models::{BaseStation, Device, Position, SimulationState};
///
/// let station = BaseStation::new(0, Position::new(100.0, 100.0), 100e6, 100.0, 3500.0, 40.0, 40.0, 50);
/// let devices = vec![
///     Device::new_ue(0, 1.5, 10),
///     Device::new_sensor(0, Position::new(20.0, 20.0), 10),
/// ];
///
/// let state = SimulationState::new(devices, vec![station]);
/// assert_eq!(state.num_ues(), 1);
/// assert_eq!(state.num_sensors(), 1);
/// assert_eq!(state.num_stations(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    devices: Vec<Device>,
    stations: Vec<BaseStation>,
}

impl SimulationState {
    /// Create a state from devices and stations
    ///
    /// Devices are reordered so that UEs precede sensors; within a class the
    /// given order is kept.
    pub fn new(devices: Vec<Device>, stations: Vec<BaseStation>) -> Self {
        let (mut ues, sensors): (Vec<Device>, Vec<Device>) = devices
            .into_iter()
            .partition(|d| d.kind() == DeviceKind::Ue);
        ues.extend(sensors);

        Self {
            devices: ues,
            stations,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [Device] {
        &mut self.devices
    }

    pub fn device(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut Device> {
        self.devices.get_mut(index)
    }

    /// Devices of one class, in id order
    pub fn devices_of(&self, kind: DeviceKind) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(move |d| d.kind() == kind)
    }

    /// Look up a device by class and class-local id
    pub fn find_device(&self, kind: DeviceKind, id: u32) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.kind() == kind && d.id() == id)
    }

    /// State index of the device of `kind` with identifier `id`
    pub fn index_of(&self, kind: DeviceKind, id: u32) -> Option<usize> {
        self.devices
            .iter()
            .position(|d| d.kind() == kind && d.id() == id)
    }

    /// Borrow devices and stations mutably at the same time
    pub fn split_mut(&mut self) -> (&mut [Device], &mut [BaseStation]) {
        (&mut self.devices, &mut self.stations)
    }

    pub fn stations(&self) -> &[BaseStation] {
        &self.stations
    }

    pub fn stations_mut(&mut self) -> &mut [BaseStation] {
        &mut self.stations
    }

    pub fn station(&self, id: u32) -> Option<&BaseStation> {
        self.stations.iter().find(|s| s.id() == id)
    }

    pub fn station_mut(&mut self, id: u32) -> Option<&mut BaseStation> {
        self.stations.iter_mut().find(|s| s.id() == id)
    }

    pub fn num_ues(&self) -> usize {
        self.devices_of(DeviceKind::Ue).count()
    }

    pub fn num_sensors(&self) -> usize {
        self.devices_of(DeviceKind::Sensor).count()
    }

    pub fn num_stations(&self) -> usize {
        self.stations.len()
    }

    /// Indices of devices of `kind` attached to station `station_id`
    pub fn connected_indices(&self, kind: DeviceKind, station_id: u32) -> Vec<usize> {
        self.devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kind() == kind && d.station() == Some(station_id))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Number of attached devices of `kind` across all stations
    pub fn num_connected(&self, kind: DeviceKind) -> usize {
        self.devices_of(kind).filter(|d| d.is_connected()).count()
    }

    /// Total uplink queue occupancy for a class
    pub fn total_uplink_queue(&self, kind: DeviceKind) -> usize {
        self.devices_of(kind).map(|d| d.uplink().len()).sum()
    }

    /// Restore every device and station to its episode-start state
    pub fn reset(&mut self) {
        for device in &mut self.devices {
            device.reset();
        }
        for station in &mut self.stations {
            station.reset();
        }
    }
}
