//! Time management for the simulation
//!
//! The simulation operates in discrete steps. An episode lasts a fixed
//! number of steps (the horizon). This module provides deterministic time
//! advancement and the end-of-episode check.

use serde::{Deserialize, Serialize};

/// Manages simulation time in discrete steps within one episode
///
/// # Example
/// ```
/// use smartcity_simulator_core_rs::TimeManager;
///
/// let mut time = TimeManager::new(100); // 100-step episodes
/// assert_eq!(time.current_step(), 0);
///
/// time.advance_step();
/// assert_eq!(time.current_step(), 1);
/// assert!(!time.is_time_up());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeManager {
    /// Steps elapsed since the last reset
    current_step: usize,
    /// Number of steps in one episode
    horizon: usize,
}

impl TimeManager {
    /// Create a new TimeManager
    ///
    /// # Arguments
    /// * `horizon` - Number of steps in one episode
    ///
    /// # Panics
    /// Panics if `horizon` is zero
    pub fn new(horizon: usize) -> Self {
        assert!(horizon > 0, "horizon must be positive");
        Self {
            current_step: 0,
            horizon,
        }
    }

    /// Advance time by one step
    pub fn advance_step(&mut self) {
        self.current_step += 1;
    }

    /// Rewind to step zero (episode reset)
    pub fn reset(&mut self) {
        self.current_step = 0;
    }

    /// Get the current step (steps since reset)
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Get the episode horizon
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Check whether the episode horizon has been reached
    ///
    /// # Example
    /// ```
    /// use smartcity_simulator_core_rs::TimeManager;
    ///
    /// let mut time = TimeManager::new(2);
    /// time.advance_step();
    /// assert!(!time.is_time_up());
    /// time.advance_step();
    /// assert!(time.is_time_up());
    /// ```
    pub fn is_time_up(&self) -> bool {
        self.current_step >= self.horizon
    }
}
