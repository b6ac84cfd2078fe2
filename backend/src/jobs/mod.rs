//! Job / queue engine
//!
//! Moves jobs through the three-stage pipeline once per step:
//!
//! ```text
//! generate ──► device uplink queue ──► station compute queue ──► delivered
//!                  │  (transfer)            │  (compute)
//!                  ▼                        ▼
//!               dropped                  dropped
//! ```
//!
//! # Step order
//!
//! 1. **Delay enforcement**: jobs older than `max_delay_steps` anywhere in the
//!    pipeline are dropped (`Timeout`) before they can use any resources
//! 2. **Generation**: each connected device draws zero or one job; a job that
//!    finds its uplink queue full is dropped (`Overflow`)
//! 3. **Transfer**: each device's bandwidth share × step duration is spent on
//!    its uplink queue head-first; finished jobs move to the station's compute
//!    queue for their class, or are dropped (`Overflow`) if it is full
//! 4. **Compute**: each station spends its per-class compute budget FIFO;
//!    finished jobs are delivered
//!
//! # Critical Invariants
//!
//! 1. Queue lengths never exceed their capacity
//! 2. Each dropped job is counted under exactly one cause
//! 3. A delivered job's end-to-end delay never exceeds `max_delay_steps`
//! 4. Modeled outcomes never produce errors; `JobError` only signals a broken
//!    stage transition

pub mod generation;
pub mod process;
pub mod transfer;

pub use generation::{JobGenerationConfig, JobGenerator, TrafficConfig};

use crate::allocation::AllocationPlan;
use crate::channel::ChannelConfig;
use crate::models::{DeviceKind, DropReason, Event, Job, JobError, SimulationState};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A value kept separately for UEs and sensors
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerClass<T> {
    pub ue: T,
    pub sensor: T,
}

impl<T> PerClass<T> {
    pub fn get(&self, kind: DeviceKind) -> &T {
        match kind {
            DeviceKind::Ue => &self.ue,
            DeviceKind::Sensor => &self.sensor,
        }
    }

    pub fn get_mut(&mut self, kind: DeviceKind) -> &mut T {
        match kind {
            DeviceKind::Ue => &mut self.ue,
            DeviceKind::Sensor => &mut self.sensor,
        }
    }
}

/// Drop counts split by cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounters {
    pub overflow: u64,
    pub timeout: u64,
    pub disconnect: u64,
}

impl DropCounters {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::Overflow => self.overflow += 1,
            DropReason::Timeout => self.timeout += 1,
            DropReason::Disconnect => self.disconnect += 1,
        }
    }

    /// Delayed or lost packets: overflow plus timeout
    pub fn delayed(&self) -> u64 {
        self.overflow + self.timeout
    }

    pub fn total(&self) -> u64 {
        self.overflow + self.timeout + self.disconnect
    }

    pub fn accumulate(&mut self, other: &DropCounters) {
        self.overflow += other.overflow;
        self.timeout += other.timeout;
        self.disconnect += other.disconnect;
    }
}

/// Everything the job pipeline did during one step
#[derive(Debug, Clone, Default)]
pub struct JobStepReport {
    pub generated: PerClass<u64>,
    /// Bits moved over the uplink
    pub transmitted_bits: PerClass<f64>,
    pub delivered: PerClass<u64>,
    pub drops: PerClass<DropCounters>,
    /// End-to-end delays of the jobs delivered this step
    pub e2e_delays: PerClass<Vec<usize>>,
    /// State indices of devices whose job received its first bits
    pub transfer_started: BTreeSet<usize>,
    /// State indices of devices that had a job delivered
    pub delivered_devices: BTreeSet<usize>,
    pub events: Vec<Event>,
}

impl JobStepReport {
    /// Count a dropped job and log it
    pub fn record_drop(&mut self, job: &Job, reason: DropReason, step: usize) {
        self.drops.get_mut(job.kind()).record(reason);
        self.events.push(Event::JobDropped {
            step,
            job_id: job.id(),
            kind: job.kind(),
            device_id: job.device_id(),
            reason,
        });
    }
}

/// Queue sizing and delay limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Uplink queue capacity per device
    pub device_capacity: usize,

    /// Compute queue capacity per class per station
    pub station_capacity: usize,

    /// Jobs older than this many steps are dropped
    pub max_delay_steps: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            device_capacity: 20,
            station_capacity: 100,
            max_delay_steps: 10,
        }
    }
}

/// Drives delay enforcement, generation, transfer and compute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEngine {
    generator: JobGenerator,
    max_delay_steps: usize,
    step_duration_s: f64,
}

impl QueueEngine {
    pub fn new(traffic: TrafficConfig, max_delay_steps: usize, step_duration_s: f64) -> Self {
        Self {
            generator: JobGenerator::new(traffic),
            max_delay_steps,
            step_duration_s,
        }
    }

    pub fn generator(&self) -> &JobGenerator {
        &self.generator
    }

    pub fn reset(&mut self) {
        self.generator.reset();
    }

    /// Run the full pipeline for `step`, recording into `report`
    pub fn advance(
        &mut self,
        state: &mut SimulationState,
        plan: &AllocationPlan,
        channel: &ChannelConfig,
        step: usize,
        rng: &mut RngManager,
        report: &mut JobStepReport,
    ) -> Result<(), JobError> {
        self.enforce_max_delay(state, step, report)?;
        self.generate(state, step, rng, report)?;
        transfer::transfer_uplinks(state, plan, channel, self.step_duration_s, step, report)?;
        process::serve_compute(state, plan, step, report)?;
        Ok(())
    }

    fn generate(
        &mut self,
        state: &mut SimulationState,
        step: usize,
        rng: &mut RngManager,
        report: &mut JobStepReport,
    ) -> Result<(), JobError> {
        for device in state.devices_mut().iter_mut().filter(|d| d.is_connected()) {
            let job = match self
                .generator
                .generate_for_device(device.kind(), device.id(), step, rng)
            {
                Some(job) => job,
                None => continue,
            };

            *report.generated.get_mut(job.kind()) += 1;
            report.events.push(Event::JobGenerated {
                step,
                job_id: job.id(),
                kind: job.kind(),
                device_id: job.device_id(),
                size_bits: job.size_bits(),
                compute_units: job.compute_units(),
            });

            if let Err(mut rejected) = device.uplink_mut().push(job) {
                rejected.drop_with(DropReason::Overflow, step)?;
                report.record_drop(&rejected, DropReason::Overflow, step);
            }
        }
        Ok(())
    }

    /// Drop every job, in any stage, whose age exceeds the delay limit
    pub fn enforce_max_delay(
        &self,
        state: &mut SimulationState,
        step: usize,
        report: &mut JobStepReport,
    ) -> Result<(), JobError> {
        let (devices, stations) = state.split_mut();
        let mut expired: Vec<Job> = Vec::new();

        for device in devices.iter_mut() {
            expired.extend(device.uplink_mut().take_expired(step, self.max_delay_steps));
        }
        for station in stations.iter_mut() {
            for kind in DeviceKind::ALL {
                expired.extend(
                    station
                        .compute_queue_mut(kind)
                        .take_expired(step, self.max_delay_steps),
                );
            }
        }

        for mut job in expired {
            job.drop_with(DropReason::Timeout, step)?;
            report.record_drop(&job, DropReason::Timeout, step);
        }
        Ok(())
    }
}
