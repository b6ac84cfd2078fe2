//! Per-device share policies
//!
//! A class-level budget (bandwidth for UEs or for sensors at one station) is
//! divided among the connected devices of that class by a `SharePolicy`.
//!
//! Available policies:
//! 1. **EqualShare**: every connected device receives `total / n`
//! 2. **DemandProportional**: shares follow each device's pending uplink bits,
//!    falling back to an equal split when nobody has demand
//!
//! Policies are built from a serialisable `SharePolicyConfig`:
//!
//! ```rust
//! use smartcity_simulator_core_rs::allocation::SharePolicyConfig;
//!
//! let policy = SharePolicyConfig::EqualShare.build();
//! assert_eq!(policy.split(90.0, &[1.0, 5.0, 0.0]), vec![30.0, 30.0, 30.0]);
//! ```

use serde::{Deserialize, Serialize};

/// Splits a class budget among connected devices
///
/// `demands` holds one entry per connected device (pending uplink bits), in
/// device order. The returned vector has the same length and, when non-empty,
/// sums to `total`.
pub trait SharePolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn split(&self, total: f64, demands: &[f64]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EqualShare;

impl SharePolicy for EqualShare {
    fn name(&self) -> &'static str {
        "equal_share"
    }

    fn split(&self, total: f64, demands: &[f64]) -> Vec<f64> {
        if demands.is_empty() {
            return Vec::new();
        }
        let share = total / demands.len() as f64;
        vec![share; demands.len()]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DemandProportional;

impl SharePolicy for DemandProportional {
    fn name(&self) -> &'static str {
        "demand_proportional"
    }

    fn split(&self, total: f64, demands: &[f64]) -> Vec<f64> {
        let demand: f64 = demands.iter().map(|d| d.max(0.0)).sum();
        if !(demand > 0.0) || !demand.is_finite() {
            return EqualShare.split(total, demands);
        }
        demands
            .iter()
            .map(|d| total * d.max(0.0) / demand)
            .collect()
    }
}

/// Share policy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SharePolicyConfig {
    #[default]
    EqualShare,
    DemandProportional,
}

impl SharePolicyConfig {
    pub fn build(&self) -> Box<dyn SharePolicy> {
        match self {
            SharePolicyConfig::EqualShare => Box::new(EqualShare),
            SharePolicyConfig::DemandProportional => Box::new(DemandProportional),
        }
    }
}
