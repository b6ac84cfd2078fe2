//! Step metrics
//!
//! After every step the engine publishes a snapshot of named metrics. Keys are
//! stable snake_case strings (see [`keys`]); a monitor pulls the snapshot via
//! `Orchestrator::metrics` and decides what to persist.
//!
//! Class-specific keys end in `_ues` or `_sensors`. Per-device metrics are
//! maps from device id to value, one map per class.

use crate::allocation::{Action, AllocationPlan};
use crate::jobs::{DropCounters, JobStepReport, PerClass};
use crate::models::{DeviceKind, SimulationState};
use crate::reward::RewardBreakdown;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Stable metric keys
pub mod keys {
    pub const STEP: &str = "step";
    pub const REWARD: &str = "reward";
    pub const ACTION_CLAMPED: &str = "action_clamped";
    pub const MEAN_AORI: &str = "mean_aori";
    pub const MEAN_AOSI: &str = "mean_aosi";

    pub const BANDWIDTH_FRACTION: &str = "bandwidth_fraction";
    pub const COMPUTE_FRACTION: &str = "compute_fraction";
    pub const BANDWIDTH_HZ: &str = "bandwidth_hz";
    pub const COMPUTE_UNITS: &str = "compute_units";
    pub const CONNECTIONS: &str = "connections";
    pub const QUEUE_SIZE: &str = "queue_size";
    pub const STATION_QUEUE_SIZE: &str = "station_queue_size";
    pub const THROUGHPUT_MBIT: &str = "throughput_mbit";
    pub const GENERATED: &str = "generated";
    pub const DELIVERED: &str = "delivered";
    pub const DELAYED_PACKETS: &str = "delayed_packets";
    pub const OVERFLOW_DROPS: &str = "overflow_drops";
    pub const TIMEOUT_DROPS: &str = "timeout_drops";
    pub const DISCONNECT_DROPS: &str = "disconnect_drops";
    pub const TOTAL_DELAYED_PACKETS: &str = "total_delayed_packets";
    pub const MEAN_E2E_DELAY: &str = "mean_e2e_delay";
    pub const TRAFFIC_REQUEST_MBIT: &str = "traffic_request_mbit";
    pub const COMPUTATION_REQUEST: &str = "computation_request";

    pub const AORI: &str = "aori";
    pub const AOSI: &str = "aosi";
    pub const UTILITY: &str = "utility";
    pub const DATARATE_MBPS: &str = "datarate_mbps";
}

/// Full key of a class-specific metric, e.g. `queue_size_sensors`
pub fn class_key(base: &str, kind: DeviceKind) -> String {
    match kind {
        DeviceKind::Ue => format!("{}_ues", base),
        DeviceKind::Sensor => format!("{}_sensors", base),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Flag(bool),
    PerEntity(#[serde(deserialize_with = "entity_map")] BTreeMap<u32, f64>),
}

/// Untagged variants are buffered before matching, which loses the integer
/// key hint; JSON keys arrive as strings and are parsed here.
fn entity_map<'de, D>(deserializer: D) -> Result<BTreeMap<u32, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            key.parse::<u32>()
                .map(|id| (id, value))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

/// Named metrics of one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepMetrics {
    values: BTreeMap<String, MetricValue>,
}

impl StepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetricValue) {
        self.values.insert(key.into(), value);
    }

    pub fn insert_scalar(&mut self, key: impl Into<String>, value: f64) {
        self.insert(key, MetricValue::Scalar(value));
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.values.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(MetricValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(MetricValue::Flag(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn per_entity(&self, key: &str) -> Option<&BTreeMap<u32, f64>> {
        match self.values.get(key) {
            Some(MetricValue::PerEntity(map)) => Some(map),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Everything needed to publish one step's metrics
pub struct MetricInputs<'a> {
    pub step: usize,
    pub state: &'a SimulationState,
    pub action: &'a Action,
    pub clamped: bool,
    pub plan: &'a AllocationPlan,
    pub report: &'a JobStepReport,
    pub reward: &'a RewardBreakdown,
    pub mean_ages: (f64, f64),
    pub cumulative_drops: &'a PerClass<DropCounters>,
    /// Scaled utility per device, by state index
    pub utilities: &'a [f64],
    /// Achieved rate in bit/s per device, by state index
    pub rates: &'a [f64],
}

pub fn collect(inputs: &MetricInputs<'_>) -> StepMetrics {
    let state = inputs.state;
    let mut metrics = StepMetrics::new();

    metrics.insert_scalar(keys::STEP, inputs.step as f64);
    metrics.insert_scalar(keys::REWARD, inputs.reward.total);
    metrics.insert(keys::ACTION_CLAMPED, MetricValue::Flag(inputs.clamped));
    metrics.insert_scalar(keys::MEAN_AORI, inputs.mean_ages.0);
    metrics.insert_scalar(keys::MEAN_AOSI, inputs.mean_ages.1);

    for kind in DeviceKind::ALL {
        let key = |base: &str| class_key(base, kind);
        let drops = inputs.report.drops.get(kind);

        metrics.insert_scalar(key(keys::BANDWIDTH_FRACTION), inputs.action.bandwidth_fraction(kind));
        metrics.insert_scalar(key(keys::COMPUTE_FRACTION), inputs.action.compute_fraction(kind));
        metrics.insert_scalar(
            key(keys::BANDWIDTH_HZ),
            inputs.plan.stations.iter().map(|a| a.bandwidth_for(kind)).sum(),
        );
        metrics.insert_scalar(
            key(keys::COMPUTE_UNITS),
            inputs.plan.stations.iter().map(|a| a.compute_for(kind)).sum(),
        );
        metrics.insert_scalar(key(keys::CONNECTIONS), state.num_connected(kind) as f64);
        metrics.insert_scalar(key(keys::QUEUE_SIZE), state.total_uplink_queue(kind) as f64);
        metrics.insert_scalar(
            key(keys::STATION_QUEUE_SIZE),
            state
                .stations()
                .iter()
                .map(|s| s.compute_queue(kind).len())
                .sum::<usize>() as f64,
        );
        metrics.insert_scalar(key(keys::THROUGHPUT_MBIT), inputs.report.transmitted_bits.get(kind) / 1e6);
        metrics.insert_scalar(key(keys::GENERATED), *inputs.report.generated.get(kind) as f64);
        metrics.insert_scalar(key(keys::DELIVERED), *inputs.report.delivered.get(kind) as f64);
        metrics.insert_scalar(key(keys::DELAYED_PACKETS), drops.delayed() as f64);
        metrics.insert_scalar(key(keys::OVERFLOW_DROPS), drops.overflow as f64);
        metrics.insert_scalar(key(keys::TIMEOUT_DROPS), drops.timeout as f64);
        metrics.insert_scalar(key(keys::DISCONNECT_DROPS), drops.disconnect as f64);
        metrics.insert_scalar(
            key(keys::TOTAL_DELAYED_PACKETS),
            inputs.cumulative_drops.get(kind).delayed() as f64,
        );

        let delays = inputs.report.e2e_delays.get(kind);
        let mean_delay = if delays.is_empty() {
            0.0
        } else {
            delays.iter().sum::<usize>() as f64 / delays.len() as f64
        };
        metrics.insert_scalar(key(keys::MEAN_E2E_DELAY), mean_delay);

        metrics.insert_scalar(
            key(keys::TRAFFIC_REQUEST_MBIT),
            state.devices_of(kind).map(|d| d.uplink().pending_bits()).sum::<f64>() / 1e6,
        );
        metrics.insert_scalar(
            key(keys::COMPUTATION_REQUEST),
            state.devices_of(kind).map(|d| d.uplink().pending_compute()).sum(),
        );

        let mut aori = BTreeMap::new();
        let mut aosi = BTreeMap::new();
        let mut utility = BTreeMap::new();
        let mut datarate = BTreeMap::new();
        for (index, device) in state.devices().iter().enumerate() {
            if device.kind() != kind {
                continue;
            }
            aori.insert(device.id(), device.aoi().aori() as f64);
            aosi.insert(device.id(), device.aoi().aosi() as f64);
            utility.insert(device.id(), inputs.utilities.get(index).copied().unwrap_or(-1.0));
            datarate.insert(device.id(), inputs.rates.get(index).copied().unwrap_or(0.0) / 1e6);
        }
        metrics.insert(key(keys::AORI), MetricValue::PerEntity(aori));
        metrics.insert(key(keys::AOSI), MetricValue::PerEntity(aosi));
        metrics.insert(key(keys::UTILITY), MetricValue::PerEntity(utility));
        metrics.insert(key(keys::DATARATE_MBPS), MetricValue::PerEntity(datarate));
    }

    metrics
}
