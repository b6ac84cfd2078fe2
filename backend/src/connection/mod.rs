//! Association / connection manager
//!
//! Decides, once per step, which station each device is attached to.
//!
//! # Hysteresis
//!
//! Two distinct thresholds govern the connection state:
//! - an unattached device attaches when its best SNR is `>= attach_threshold_db`
//! - an attached device detaches when the SNR to its station is `< detach_threshold_db`
//!
//! With `detach_threshold_db < attach_threshold_db` a device whose SNR hovers
//! between the two keeps its current state.
//!
//! # Critical Invariants
//!
//! 1. A device is attached to at most one station at any time
//! 2. Detaching cancels the device's in-flight transfer; the job is dropped
//!    with reason `Disconnect` and handed back to the caller for accounting

use crate::channel::ChannelConfig;
use crate::models::{DeviceKind, DropReason, Job, JobError, SimulationState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Attach when SNR (dB) reaches this value
    pub attach_threshold_db: f64,

    /// Detach when SNR (dB) falls below this value
    pub detach_threshold_db: f64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            attach_threshold_db: 0.0,
            detach_threshold_db: -3.0,
        }
    }
}

/// A connection state transition applied during one update
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionChange {
    Attached {
        kind: DeviceKind,
        device_id: u32,
        station_id: u32,
        snr_db: f64,
    },
    Detached {
        kind: DeviceKind,
        device_id: u32,
        station_id: u32,
        snr_db: f64,
        /// In-flight job cancelled by the detach, already marked dropped
        cancelled: Option<Job>,
    },
}

/// Applies the attach/detach rules to a simulation state
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    config: ConnectionConfig,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Re-evaluate every device's association
    ///
    /// Devices are visited in state order. A device that detaches may attach
    /// to another station in the same pass if that station clears the attach
    /// threshold.
    pub fn update_connections(
        &self,
        state: &mut SimulationState,
        channel: &ChannelConfig,
        step: usize,
    ) -> Result<Vec<ConnectionChange>, JobError> {
        let mut changes = Vec::new();

        for index in 0..state.devices().len() {
            let (kind, device_id, position, current) = match state.device(index) {
                Some(d) => (d.kind(), d.id(), d.position(), d.station()),
                None => continue,
            };

            let mut excluded = None;
            if let Some(station_id) = current {
                let snr_db = state
                    .station(station_id)
                    .map(|s| channel.snr_db(s, position))
                    .unwrap_or(f64::NEG_INFINITY);

                if snr_db >= self.config.detach_threshold_db {
                    continue;
                }

                let cancelled = match state.device_mut(index) {
                    Some(device) => {
                        device.detach();
                        match device.uplink_mut().take_in_flight() {
                            Some(mut job) => {
                                job.drop_with(DropReason::Disconnect, step)?;
                                Some(job)
                            }
                            None => None,
                        }
                    }
                    None => None,
                };

                log::debug!(
                    "step {}: {} {} detached from station {} (snr {:.1} dB)",
                    step, kind, device_id, station_id, snr_db
                );
                changes.push(ConnectionChange::Detached {
                    kind,
                    device_id,
                    station_id,
                    snr_db,
                    cancelled,
                });
                excluded = Some(station_id);
            }

            let best = state
                .stations()
                .iter()
                .filter(|s| Some(s.id()) != excluded)
                .map(|s| (s.id(), channel.snr_db(s, position)))
                .filter(|(_, snr)| *snr >= self.config.attach_threshold_db)
                .fold(None::<(u32, f64)>, |best, candidate| match best {
                    Some(b) if b.1 >= candidate.1 => Some(b),
                    _ => Some(candidate),
                });

            if let Some((station_id, snr_db)) = best {
                if let Some(device) = state.device_mut(index) {
                    device.attach(station_id);
                }
                log::debug!(
                    "step {}: {} {} attached to station {} (snr {:.1} dB)",
                    step, kind, device_id, station_id, snr_db
                );
                changes.push(ConnectionChange::Attached {
                    kind,
                    device_id,
                    station_id,
                    snr_db,
                });
            }
        }

        Ok(changes)
    }
}
