//! Bounded FIFO job queue
//!
//! Used for device uplink buffers and for the per-class compute queues at
//! each base station. Ordering is FIFO by arrival, which coincides with
//! creation order because jobs only ever enter at the back.
//!
//! # Invariants
//!
//! 1. `len() <= capacity()` at all times
//! 2. A push onto a full queue hands the job back to the caller untouched

use crate::models::job::Job;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a job at the back
    ///
    /// # Errors
    /// Returns the job unchanged when the queue is already full.
    ///
    /// # Example
    /// ```
    /// use smartcity_simulator_core_rs::models::{DeviceKind, Job, JobQueue};
    ///
    /// let mut queue = JobQueue::new(1);
    /// assert!(queue.push(Job::new(1, 0, DeviceKind::Ue, 0, 10.0, 1.0)).is_ok());
    /// let rejected = queue.push(Job::new(2, 0, DeviceKind::Ue, 0, 10.0, 1.0));
    /// assert_eq!(rejected.unwrap_err().id(), 2);
    /// ```
    pub fn push(&mut self, job: Job) -> Result<(), Job> {
        if self.is_full() {
            return Err(job);
        }
        self.jobs.push_back(job);
        Ok(())
    }

    pub fn front(&self) -> Option<&Job> {
        self.jobs.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut Job> {
        self.jobs.front_mut()
    }

    pub fn pop_front(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy as a fraction of capacity (0 for a zero-capacity queue)
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.jobs.len() as f64 / self.capacity as f64
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    /// Remove and return every job whose age exceeds `max_delay`
    ///
    /// Relative order of the remaining jobs is preserved.
    pub fn take_expired(&mut self, step: usize, max_delay: usize) -> Vec<Job> {
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(self.jobs.len());
        for job in self.jobs.drain(..) {
            if job.is_expired(step, max_delay) {
                expired.push(job);
            } else {
                kept.push_back(job);
            }
        }
        self.jobs = kept;
        expired
    }

    /// Remove the head job if it is partially uploaded
    pub fn take_in_flight(&mut self) -> Option<Job> {
        if self.jobs.front().map_or(false, Job::is_in_flight) {
            self.jobs.pop_front()
        } else {
            None
        }
    }

    /// Bits still waiting for uplink across the queue
    pub fn pending_bits(&self) -> f64 {
        self.jobs.iter().map(Job::remaining_bits).sum()
    }

    /// Compute units still outstanding across the queue
    pub fn pending_compute(&self) -> f64 {
        self.jobs.iter().map(Job::remaining_compute).sum()
    }
}
