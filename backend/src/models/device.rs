//! Device model
//!
//! User equipments (UEs) and sensors share one `Device` type. The class
//! specific fields live in `DeviceProfile`; queueing and AoI bookkeeping are
//! common to both and operate on the tag.

use crate::models::aoi::AoiState;
use crate::models::position::Position;
use crate::models::queue::JobQueue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device class. UEs and sensors draw from separate resource pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    Ue,
    Sensor,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 2] = [DeviceKind::Ue, DeviceKind::Sensor];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Ue => "ue",
            DeviceKind::Sensor => "sensor",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class-specific device data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceProfile {
    /// Mobile user equipment
    Ue {
        /// Speed in metres per step
        velocity: f64,
        /// Current random-waypoint target, if one has been drawn
        waypoint: Option<Position>,
    },

    /// Stationary sensor
    Sensor,
}

/// A UE or sensor with its uplink buffer and AoI counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Identifier, unique within the device's class
    id: u32,
    profile: DeviceProfile,
    position: Position,
    initial_position: Position,
    /// Station the device is attached to, if any
    station: Option<u32>,
    uplink: JobQueue,
    aoi: AoiState,
}

impl Device {
    /// Create a mobile UE; its position is drawn on reset
    pub fn new_ue(id: u32, velocity: f64, queue_capacity: usize) -> Self {
        Self {
            id,
            profile: DeviceProfile::Ue {
                velocity,
                waypoint: None,
            },
            position: Position::default(),
            initial_position: Position::default(),
            station: None,
            uplink: JobQueue::new(queue_capacity),
            aoi: AoiState::new(),
        }
    }

    /// Create a stationary sensor at `position`
    pub fn new_sensor(id: u32, position: Position, queue_capacity: usize) -> Self {
        Self {
            id,
            profile: DeviceProfile::Sensor,
            position,
            initial_position: position,
            station: None,
            uplink: JobQueue::new(queue_capacity),
            aoi: AoiState::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> DeviceKind {
        match self.profile {
            DeviceProfile::Ue { .. } => DeviceKind::Ue,
            DeviceProfile::Sensor => DeviceKind::Sensor,
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut DeviceProfile {
        &mut self.profile
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self.profile, DeviceProfile::Ue { .. })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Move the device. Sensors ignore the request.
    pub fn set_position(&mut self, position: Position) {
        if self.is_mobile() {
            self.position = position;
        }
    }

    /// Place the device at the start of an episode
    ///
    /// For UEs this also becomes the position restored by `reset`.
    pub fn place(&mut self, position: Position) {
        if self.is_mobile() {
            self.initial_position = position;
            self.position = position;
        }
    }

    pub fn initial_position(&self) -> Position {
        self.initial_position
    }

    pub fn station(&self) -> Option<u32> {
        self.station
    }

    pub fn is_connected(&self) -> bool {
        self.station.is_some()
    }

    pub fn attach(&mut self, station_id: u32) {
        self.station = Some(station_id);
    }

    pub fn detach(&mut self) {
        self.station = None;
    }

    pub fn uplink(&self) -> &JobQueue {
        &self.uplink
    }

    pub fn uplink_mut(&mut self) -> &mut JobQueue {
        &mut self.uplink
    }

    pub fn aoi(&self) -> &AoiState {
        &self.aoi
    }

    pub fn aoi_mut(&mut self) -> &mut AoiState {
        &mut self.aoi
    }

    /// Restore episode-start state: position, empty queue, zero ages, detached
    pub fn reset(&mut self) {
        self.position = self.initial_position;
        if let DeviceProfile::Ue { waypoint, .. } = &mut self.profile {
            *waypoint = None;
        }
        self.station = None;
        self.uplink.clear();
        self.aoi.reset();
    }
}
