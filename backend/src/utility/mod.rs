//! Per-device utility
//!
//! Utility maps an achieved data rate to a bounded satisfaction score. It is
//! recomputed every step from the channel and the allocation and never
//! persisted.

use serde::{Deserialize, Serialize};

/// `u = clamp(k1 log10(k2 + rate_mbps / k3), lower, upper)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedLogUtility {
    pub lower: f64,
    pub upper: f64,
    pub coefficients: (f64, f64, f64),
}

impl Default for BoundedLogUtility {
    fn default() -> Self {
        Self {
            lower: -20.0,
            upper: 20.0,
            coefficients: (10.0, 0.0, 10.0),
        }
    }
}

impl BoundedLogUtility {
    /// Raw utility of a rate in bit/s. A zero rate maps to `lower`.
    pub fn utility(&self, rate_bps: f64) -> f64 {
        if !(rate_bps > 0.0) {
            return self.lower;
        }
        let (k1, k2, k3) = self.coefficients;
        let value = k1 * (k2 + rate_bps / 1e6 / k3).log10();
        if value.is_nan() {
            return self.lower;
        }
        value.clamp(self.lower, self.upper)
    }

    /// Map a raw utility into [-1, 1]
    pub fn scale(&self, utility: f64) -> f64 {
        let span = self.upper - self.lower;
        if span <= 0.0 {
            return 0.0;
        }
        (2.0 * (utility - self.lower) / span - 1.0).clamp(-1.0, 1.0)
    }

    pub fn scaled_utility(&self, rate_bps: f64) -> f64 {
        self.scale(self.utility(rate_bps))
    }
}
