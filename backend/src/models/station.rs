//! Base station model
//!
//! A station owns its radio parameters, its total bandwidth and compute
//! capacity, and one compute queue per device class holding jobs that have
//! finished their uplink transfer.

use crate::models::device::DeviceKind;
use crate::models::position::Position;
use crate::models::queue::JobQueue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStation {
    id: u32,
    position: Position,
    /// Total bandwidth in Hz
    bandwidth_hz: f64,
    /// Compute units served per step
    compute_capacity: f64,
    frequency_mhz: f64,
    tx_power_dbm: f64,
    height_m: f64,
    ue_compute_queue: JobQueue,
    sensor_compute_queue: JobQueue,
    delivered_ue: u64,
    delivered_sensor: u64,
}

impl BaseStation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        position: Position,
        bandwidth_hz: f64,
        compute_capacity: f64,
        frequency_mhz: f64,
        tx_power_dbm: f64,
        height_m: f64,
        queue_capacity: usize,
    ) -> Self {
        Self {
            id,
            position,
            bandwidth_hz,
            compute_capacity,
            frequency_mhz,
            tx_power_dbm,
            height_m,
            ue_compute_queue: JobQueue::new(queue_capacity),
            sensor_compute_queue: JobQueue::new(queue_capacity),
            delivered_ue: 0,
            delivered_sensor: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn bandwidth_hz(&self) -> f64 {
        self.bandwidth_hz
    }

    pub fn compute_capacity(&self) -> f64 {
        self.compute_capacity
    }

    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_mhz
    }

    pub fn tx_power_dbm(&self) -> f64 {
        self.tx_power_dbm
    }

    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    pub fn compute_queue(&self, kind: DeviceKind) -> &JobQueue {
        match kind {
            DeviceKind::Ue => &self.ue_compute_queue,
            DeviceKind::Sensor => &self.sensor_compute_queue,
        }
    }

    pub fn compute_queue_mut(&mut self, kind: DeviceKind) -> &mut JobQueue {
        match kind {
            DeviceKind::Ue => &mut self.ue_compute_queue,
            DeviceKind::Sensor => &mut self.sensor_compute_queue,
        }
    }

    /// Jobs of `kind` delivered by this station since reset
    pub fn delivered(&self, kind: DeviceKind) -> u64 {
        match kind {
            DeviceKind::Ue => self.delivered_ue,
            DeviceKind::Sensor => self.delivered_sensor,
        }
    }

    pub fn record_delivery(&mut self, kind: DeviceKind) {
        match kind {
            DeviceKind::Ue => self.delivered_ue += 1,
            DeviceKind::Sensor => self.delivered_sensor += 1,
        }
    }

    pub fn reset(&mut self) {
        self.ue_compute_queue.clear();
        self.sensor_compute_queue.clear();
        self.delivered_ue = 0;
        self.delivered_sensor = 0;
    }
}
