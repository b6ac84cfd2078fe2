//! Event logging for episode replay and debugging.
//!
//! This module defines the Event enum which captures every significant state
//! change during an episode. Events enable:
//! - Debugging (understand what happened to a job and when)
//! - Auditing (verify that every drop has exactly one cause)
//! - Analysis (extract delays and per-device histories)
//!
//! # Event Types
//!
//! Events are categorized by pipeline stage:
//! - **Connection**: attach / detach
//! - **Control**: action clamped
//! - **Jobs**: generated, transfer started, transfer completed, delivered, dropped
//!
//! # Example
//!
//! ```rust
//! use smartcity_simulator_core_rs::models::{DeviceKind, Event};
//!
//! let event = Event::JobGenerated {
//!     step: 10,
//!     job_id: 42,
//!     kind: DeviceKind::Sensor,
//!     device_id: 3,
//!     size_bits: 4.0e7,
//!     compute_units: 4.0,
//! };
//!
//! assert_eq!(event.step(), 10);
//! assert_eq!(event.event_type(), "JobGenerated");
//! ```

use crate::models::device::DeviceKind;
use crate::models::job::DropReason;
use serde::{Deserialize, Serialize};

/// Engine event capturing a state change.
///
/// Events are logged in the order they occur within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Device attached to a station (SNR reached the attach threshold)
    DeviceAttached {
        step: usize,
        kind: DeviceKind,
        device_id: u32,
        station_id: u32,
        snr_db: f64,
    },

    /// Device left its station (SNR fell below the detach threshold)
    DeviceDetached {
        step: usize,
        kind: DeviceKind,
        device_id: u32,
        station_id: u32,
        snr_db: f64,
    },

    /// An action component was outside [0, 1] and got clamped
    ActionClamped {
        step: usize,
        requested: [f64; 2],
        applied: [f64; 2],
    },

    /// New job entered a device uplink queue
    JobGenerated {
        step: usize,
        job_id: u64,
        kind: DeviceKind,
        device_id: u32,
        size_bits: f64,
        compute_units: f64,
    },

    /// First bits of a job left the device
    TransferStarted {
        step: usize,
        job_id: u64,
        kind: DeviceKind,
        device_id: u32,
    },

    /// Job finished uplink and entered the station compute queue
    TransferCompleted {
        step: usize,
        job_id: u64,
        kind: DeviceKind,
        device_id: u32,
        station_id: u32,
    },

    /// Job finished compute
    JobDelivered {
        step: usize,
        job_id: u64,
        kind: DeviceKind,
        device_id: u32,
        e2e_delay: usize,
    },

    /// Job left the system without delivery
    JobDropped {
        step: usize,
        job_id: u64,
        kind: DeviceKind,
        device_id: u32,
        reason: DropReason,
    },
}

impl Event {
    /// Get the step in which this event occurred
    pub fn step(&self) -> usize {
        match self {
            Event::DeviceAttached { step, .. } => *step,
            Event::DeviceDetached { step, .. } => *step,
            Event::ActionClamped { step, .. } => *step,
            Event::JobGenerated { step, .. } => *step,
            Event::TransferStarted { step, .. } => *step,
            Event::TransferCompleted { step, .. } => *step,
            Event::JobDelivered { step, .. } => *step,
            Event::JobDropped { step, .. } => *step,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::DeviceAttached { .. } => "DeviceAttached",
            Event::DeviceDetached { .. } => "DeviceDetached",
            Event::ActionClamped { .. } => "ActionClamped",
            Event::JobGenerated { .. } => "JobGenerated",
            Event::TransferStarted { .. } => "TransferStarted",
            Event::TransferCompleted { .. } => "TransferCompleted",
            Event::JobDelivered { .. } => "JobDelivered",
            Event::JobDropped { .. } => "JobDropped",
        }
    }

    /// Get job ID if the event relates to a specific job
    pub fn job_id(&self) -> Option<u64> {
        match self {
            Event::JobGenerated { job_id, .. }
            | Event::TransferStarted { job_id, .. }
            | Event::TransferCompleted { job_id, .. }
            | Event::JobDelivered { job_id, .. }
            | Event::JobDropped { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Get (class, id) of the device the event relates to
    pub fn device(&self) -> Option<(DeviceKind, u32)> {
        match self {
            Event::DeviceAttached { kind, device_id, .. }
            | Event::DeviceDetached { kind, device_id, .. }
            | Event::JobGenerated { kind, device_id, .. }
            | Event::TransferStarted { kind, device_id, .. }
            | Event::TransferCompleted { kind, device_id, .. }
            | Event::JobDelivered { kind, device_id, .. }
            | Event::JobDropped { kind, device_id, .. } => Some((*kind, *device_id)),
            Event::ActionClamped { .. } => None,
        }
    }
}

/// Event log for storing and querying engine events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
/// The orchestrator clears it on every reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the history of one job
    pub fn events_for_job(&self, job_id: u64) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.job_id() == Some(job_id))
            .collect()
    }

    /// Get events for one device
    pub fn events_for_device(&self, kind: DeviceKind, device_id: u32) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.device() == Some((kind, device_id)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_job_id() {
        let event = Event::JobDropped {
            step: 4,
            job_id: 9,
            kind: DeviceKind::Ue,
            device_id: 1,
            reason: DropReason::Timeout,
        };
        assert_eq!(event.job_id(), Some(9));
        assert_eq!(event.device(), Some((DeviceKind::Ue, 1)));
    }

    #[test]
    fn test_action_clamped_has_no_device() {
        let event = Event::ActionClamped {
            step: 0,
            requested: [1.5, -0.2],
            applied: [1.0, 0.0],
        };
        assert_eq!(event.device(), None);
        assert_eq!(event.job_id(), None);
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        log.log(Event::TransferStarted {
            step: 1,
            job_id: 5,
            kind: DeviceKind::Sensor,
            device_id: 0,
        });
        log.log(Event::JobDelivered {
            step: 3,
            job_id: 5,
            kind: DeviceKind::Sensor,
            device_id: 0,
            e2e_delay: 3,
        });
        log.log(Event::DeviceDetached {
            step: 3,
            kind: DeviceKind::Ue,
            device_id: 2,
            station_id: 0,
            snr_db: -10.0,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_for_job(5).len(), 2);
        assert_eq!(log.events_of_type("DeviceDetached").len(), 1);
        assert_eq!(log.events_for_device(DeviceKind::Sensor, 0).len(), 2);

        log.clear();
        assert!(log.is_empty());
    }
}
