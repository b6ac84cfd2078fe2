//! Job model
//!
//! A job is one unit of data produced by a device in a given step.
//! Each job has:
//! - Owning device (class-local id) and device class
//! - Creation step
//! - Uplink size in bits (original and remaining)
//! - Compute requirement in units (original and remaining)
//! - Stage (Generated → Transferring → QueuedForCompute → Processing → Delivered,
//!   or Dropped from any non-terminal stage)

use crate::models::device::DeviceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a job left the system without being delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Queue was full when the job tried to enter it
    Overflow,
    /// Age exceeded the maximum allowed delay
    Timeout,
    /// Device detached while the job was in flight
    Disconnect,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Overflow => "overflow",
            DropReason::Timeout => "timeout",
            DropReason::Disconnect => "disconnect",
        }
    }
}

/// Lifecycle stage of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobStage {
    /// Waiting in the device uplink queue, no bits sent yet
    Generated,

    /// At least one bit sent, uplink not finished
    Transferring,

    /// Fully uploaded, waiting in the station compute queue
    QueuedForCompute,

    /// Received part of its compute requirement
    Processing,

    /// Compute finished; result delivered
    Delivered {
        /// Step in which the job completed
        step: usize,
    },

    /// Removed without delivery
    Dropped {
        /// Step in which the job was dropped
        step: usize,
        /// Cause of the drop
        reason: DropReason,
    },
}

impl JobStage {
    fn name(&self) -> &'static str {
        match self {
            JobStage::Generated => "generated",
            JobStage::Transferring => "transferring",
            JobStage::QueuedForCompute => "queued_for_compute",
            JobStage::Processing => "processing",
            JobStage::Delivered { .. } => "delivered",
            JobStage::Dropped { .. } => "dropped",
        }
    }
}

/// Errors raised by invalid stage transitions
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    #[error("Job {id} cannot transmit in stage {stage}")]
    NotInUplink { id: u64, stage: &'static str },

    #[error("Job {id} cannot be served in stage {stage}")]
    NotAwaitingCompute { id: u64, stage: &'static str },

    #[error("Job {id} already finished")]
    AlreadyFinished { id: u64 },

    #[error("Amount must be non-negative and finite")]
    InvalidAmount,
}

/// One unit of uplink data plus its compute requirement
///
/// # Example
/// ```
/// use smartcity_simulator_core_rs::models::{DeviceKind, Job, JobStage};
///
/// let mut job = Job::new(1, 0, DeviceKind::Ue, 3, 2_000_000.0, 5.0);
/// job.transmit(1_500_000.0, 3).unwrap();
/// assert_eq!(*job.stage(), JobStage::Transferring);
/// job.transmit(1_500_000.0, 4).unwrap();
/// assert_eq!(*job.stage(), JobStage::QueuedForCompute);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: u64,
    device_id: u32,
    kind: DeviceKind,
    created_step: usize,
    size_bits: f64,
    remaining_bits: f64,
    compute_units: f64,
    remaining_compute: f64,
    stage: JobStage,
    transfer_started_step: Option<usize>,
    transferred_step: Option<usize>,
}

impl Job {
    /// Create a new job waiting for uplink
    ///
    /// # Panics
    /// Panics if size or compute requirement is not positive
    pub fn new(
        id: u64,
        device_id: u32,
        kind: DeviceKind,
        created_step: usize,
        size_bits: f64,
        compute_units: f64,
    ) -> Self {
        assert!(size_bits > 0.0, "size must be positive");
        assert!(compute_units > 0.0, "compute requirement must be positive");

        Self {
            id,
            device_id,
            kind,
            created_step,
            size_bits,
            remaining_bits: size_bits,
            compute_units,
            remaining_compute: compute_units,
            stage: JobStage::Generated,
            transfer_started_step: None,
            transferred_step: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn created_step(&self) -> usize {
        self.created_step
    }

    pub fn size_bits(&self) -> f64 {
        self.size_bits
    }

    pub fn remaining_bits(&self) -> f64 {
        self.remaining_bits
    }

    pub fn compute_units(&self) -> f64 {
        self.compute_units
    }

    pub fn remaining_compute(&self) -> f64 {
        self.remaining_compute
    }

    pub fn stage(&self) -> &JobStage {
        &self.stage
    }

    pub fn transfer_started_step(&self) -> Option<usize> {
        self.transfer_started_step
    }

    pub fn transferred_step(&self) -> Option<usize> {
        self.transferred_step
    }

    /// Steps elapsed since creation
    pub fn age(&self, step: usize) -> usize {
        step.saturating_sub(self.created_step)
    }

    /// True when the job's age strictly exceeds `max_delay`
    pub fn is_expired(&self, step: usize, max_delay: usize) -> bool {
        self.age(step) > max_delay
    }

    /// True once the job is delivered or dropped
    pub fn is_finished(&self) -> bool {
        matches!(
            self.stage,
            JobStage::Delivered { .. } | JobStage::Dropped { .. }
        )
    }

    /// True while bits are in flight (partially uploaded)
    pub fn is_in_flight(&self) -> bool {
        self.stage == JobStage::Transferring
    }

    /// End-to-end delay in steps, available once delivered
    pub fn e2e_delay(&self) -> Option<usize> {
        match self.stage {
            JobStage::Delivered { step } => Some(step - self.created_step),
            _ => None,
        }
    }

    /// Send up to `bits` of this job over the uplink
    ///
    /// The first call moves the job to `Transferring` and records the start
    /// step. Once nothing remains the job becomes `QueuedForCompute`.
    ///
    /// # Returns
    /// Number of bits actually consumed (never more than remaining)
    pub fn transmit(&mut self, bits: f64, step: usize) -> Result<f64, JobError> {
        if !(bits >= 0.0) || !bits.is_finite() {
            return Err(JobError::InvalidAmount);
        }

        match self.stage {
            JobStage::Generated | JobStage::Transferring => {}
            ref other => {
                return Err(JobError::NotInUplink {
                    id: self.id,
                    stage: other.name(),
                })
            }
        }

        if bits == 0.0 {
            return Ok(0.0);
        }

        if self.stage == JobStage::Generated {
            self.stage = JobStage::Transferring;
            self.transfer_started_step = Some(step);
        }

        let consumed = bits.min(self.remaining_bits);
        self.remaining_bits -= consumed;

        if self.remaining_bits <= 0.0 {
            self.remaining_bits = 0.0;
            self.stage = JobStage::QueuedForCompute;
            self.transferred_step = Some(step);
        }

        Ok(consumed)
    }

    /// Serve up to `units` of this job's compute requirement
    ///
    /// # Returns
    /// Number of compute units actually consumed
    pub fn serve(&mut self, units: f64, step: usize) -> Result<f64, JobError> {
        if !(units >= 0.0) || !units.is_finite() {
            return Err(JobError::InvalidAmount);
        }

        match self.stage {
            JobStage::QueuedForCompute | JobStage::Processing => {}
            ref other => {
                return Err(JobError::NotAwaitingCompute {
                    id: self.id,
                    stage: other.name(),
                })
            }
        }

        if units == 0.0 {
            return Ok(0.0);
        }

        self.stage = JobStage::Processing;
        let consumed = units.min(self.remaining_compute);
        self.remaining_compute -= consumed;

        if self.remaining_compute <= 0.0 {
            self.remaining_compute = 0.0;
            self.stage = JobStage::Delivered { step };
        }

        Ok(consumed)
    }

    /// Mark the job as dropped
    pub fn drop_with(&mut self, reason: DropReason, step: usize) -> Result<(), JobError> {
        if self.is_finished() {
            return Err(JobError::AlreadyFinished { id: self.id });
        }
        self.stage = JobStage::Dropped { step, reason };
        Ok(())
    }
}
