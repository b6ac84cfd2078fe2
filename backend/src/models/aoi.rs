//! Age-of-information counters
//!
//! Each device tracks two ages, both measured in steps:
//! - **AoRI** (age of request information): steps since one of the device's
//!   jobs last began its uplink transfer
//! - **AoSI** (age of synchronization information): steps since one of the
//!   device's jobs was last delivered
//!
//! Both reset to zero on the step of the corresponding event and otherwise
//! grow by one per step. Counters of detached devices are not advanced.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AoiState {
    aori: u64,
    aosi: u64,
}

impl AoiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aori(&self) -> u64 {
        self.aori
    }

    pub fn aosi(&self) -> u64 {
        self.aosi
    }

    /// Advance both ages by one step, resetting those whose event occurred
    ///
    /// # Example
    /// ```
    /// use smartcity_simulator_core_rs::models::AoiState;
    ///
    /// let mut aoi = AoiState::new();
    /// aoi.advance(false, false);
    /// aoi.advance(false, false);
    /// assert_eq!((aoi.aori(), aoi.aosi()), (2, 2));
    ///
    /// aoi.advance(true, false);
    /// assert_eq!((aoi.aori(), aoi.aosi()), (0, 3));
    /// ```
    pub fn advance(&mut self, transfer_started: bool, delivered: bool) {
        self.aori = if transfer_started { 0 } else { self.aori + 1 };
        self.aosi = if delivered { 0 } else { self.aosi + 1 };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let mut aoi = AoiState::new();
        aoi.advance(false, true);
        assert_eq!((aoi.aori(), aoi.aosi()), (1, 0));
        aoi.advance(true, true);
        assert_eq!((aoi.aori(), aoi.aosi()), (0, 0));
    }

    #[test]
    fn test_reset_zeroes() {
        let mut aoi = AoiState::new();
        for _ in 0..5 {
            aoi.advance(false, false);
        }
        aoi.reset();
        assert_eq!(aoi, AoiState::default());
    }
}
