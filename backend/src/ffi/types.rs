//! Type conversion utilities for FFI boundary
//!
//! Converts between Rust types and PyO3-compatible types (PyDict, PyList, etc.)

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::allocation::SharePolicyConfig;
use crate::jobs::{DropCounters, JobGenerationConfig, PerClass};
use crate::metrics::{MetricValue, StepMetrics};
use crate::observation::{BoxSpace, DeviceFeature};
use crate::orchestrator::{ResetInfo, SimulationConfig, SimulationError, StepInfo};

pyo3::create_exception!(smartcity_simulator_core_rs, InvalidActionError, PyValueError);
pyo3::create_exception!(smartcity_simulator_core_rs, InvalidStateError, PyRuntimeError);
pyo3::create_exception!(smartcity_simulator_core_rs, ConfigMismatchError, PyValueError);

/// Map engine errors onto Python exceptions
pub fn to_py_err(err: SimulationError) -> PyErr {
    match err {
        SimulationError::InvalidAction(_) => InvalidActionError::new_err(err.to_string()),
        SimulationError::InvalidState { .. } => InvalidStateError::new_err(err.to_string()),
        SimulationError::ConfigMismatch { .. } => ConfigMismatchError::new_err(err.to_string()),
        SimulationError::InvalidConfig(_) | SimulationError::Serialization(_) => {
            PyValueError::new_err(err.to_string())
        }
        SimulationError::Job(_) => PyRuntimeError::new_err(err.to_string()),
    }
}

// ========================================================================
// PyDict Extraction Helpers
// ========================================================================

/// Extract an optional field from a Python dict.
///
/// # Returns
/// `Some(value)` if field exists, `None` if missing
///
/// # Errors
/// Returns error only if type conversion fails (not if field is missing)
fn extract_optional<T>(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<Option<T>>
where
    T: for<'py> FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) => Ok(Some(value.extract()?)),
        None => Ok(None),
    }
}

/// Extract a field with a default value if missing.
///
/// # Example
/// ```ignore
/// let horizon: usize = extract_with_default(&py_dict, "horizon", 100)?;
/// ```
fn extract_with_default<T>(dict: &Bound<'_, PyDict>, key: &str, default: T) -> PyResult<T>
where
    T: for<'py> FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) => value.extract(),
        None => Ok(default),
    }
}

/// Extract a nested dict, if present
fn extract_subdict<'py>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Option<Bound<'py, PyDict>>> {
    match dict.get_item(key)? {
        Some(value) => Ok(Some(value.downcast_into::<PyDict>()?)),
        None => Ok(None),
    }
}

/// Overwrite `target` when `key` is present
fn override_field<T>(dict: &Bound<'_, PyDict>, key: &str, target: &mut T) -> PyResult<()>
where
    T: for<'py> FromPyObject<'py>,
{
    if let Some(value) = extract_optional(dict, key)? {
        *target = value;
    }
    Ok(())
}

// ========================================================================
// Configuration Parsers
// ========================================================================

/// Convert a Python dict to SimulationConfig
///
/// Starts from the smart-city preset (`num_ues`, `num_sensors`) and applies
/// every recognised key on top. Missing keys keep their defaults; validation
/// happens when the engine is built.
pub fn parse_simulation_config(py_config: &Bound<'_, PyDict>) -> PyResult<SimulationConfig> {
    let num_ues: usize = extract_with_default(py_config, "num_ues", 5)?;
    let num_sensors: usize = extract_with_default(py_config, "num_sensors", 10)?;
    let mut config = SimulationConfig::smart_city(num_ues, num_sensors);

    override_field(py_config, "seed", &mut config.seed)?;
    override_field(py_config, "reset_rng_episode", &mut config.reset_rng_episode)?;
    override_field(py_config, "horizon", &mut config.horizon)?;
    override_field(py_config, "step_duration_s", &mut config.step_duration_s)?;
    override_field(py_config, "ue_velocity", &mut config.ue_velocity)?;

    if let Some(bandwidth) = extract_optional::<f64>(py_config, "bandwidth_hz")? {
        config.stations.iter_mut().for_each(|s| s.bandwidth_hz = bandwidth);
    }
    if let Some(compute) = extract_optional::<f64>(py_config, "compute_capacity")? {
        config.stations.iter_mut().for_each(|s| s.compute_capacity = compute);
    }

    override_field(py_config, "noise_floor_dbm", &mut config.channel.noise_floor_dbm)?;
    override_field(py_config, "min_distance_m", &mut config.channel.min_distance_m)?;
    override_field(py_config, "attach_threshold_db", &mut config.connection.attach_threshold_db)?;
    override_field(py_config, "detach_threshold_db", &mut config.connection.detach_threshold_db)?;

    override_field(py_config, "device_queue_capacity", &mut config.queues.device_capacity)?;
    override_field(py_config, "station_queue_capacity", &mut config.queues.station_capacity)?;
    override_field(py_config, "max_delay_steps", &mut config.queues.max_delay_steps)?;

    if let Some(py_job) = extract_subdict(py_config, "ue_job")? {
        parse_job_config(&py_job, &mut config.traffic.ue)?;
    }
    if let Some(py_job) = extract_subdict(py_config, "sensor_job")? {
        parse_job_config(&py_job, &mut config.traffic.sensor)?;
    }

    if let Some(policy) = extract_optional::<String>(py_config, "share_policy")? {
        config.share_policy = match policy.as_str() {
            "equal_share" => SharePolicyConfig::EqualShare,
            "demand_proportional" => SharePolicyConfig::DemandProportional,
            other => {
                return Err(PyValueError::new_err(format!(
                    "Unknown share_policy '{}' (expected 'equal_share' or 'demand_proportional')",
                    other
                )))
            }
        };
    }

    if let Some(py_reward) = extract_subdict(py_config, "reward")? {
        let weights = &mut config.reward;
        override_field(&py_reward, "ue_throughput", &mut weights.ue_throughput)?;
        override_field(&py_reward, "sensor_throughput", &mut weights.sensor_throughput)?;
        override_field(&py_reward, "ue_delayed_penalty", &mut weights.ue_delayed_penalty)?;
        override_field(&py_reward, "sensor_delayed_penalty", &mut weights.sensor_delayed_penalty)?;
        override_field(&py_reward, "aori_penalty", &mut weights.aori_penalty)?;
        override_field(&py_reward, "aosi_penalty", &mut weights.aosi_penalty)?;
    }

    if let Some(features) = extract_optional::<Vec<String>>(py_config, "observation_features")? {
        config.observation.device_features = features
            .iter()
            .map(|name| parse_feature(name))
            .collect::<PyResult<Vec<_>>>()?;
    }

    Ok(config)
}

fn parse_job_config(py_job: &Bound<'_, PyDict>, target: &mut JobGenerationConfig) -> PyResult<()> {
    override_field(py_job, "probability", &mut target.probability)?;
    override_field(py_job, "size_mbit_lambda", &mut target.size_mbit_lambda)?;
    override_field(py_job, "compute_lambda", &mut target.compute_lambda)?;
    Ok(())
}

fn parse_feature(name: &str) -> PyResult<DeviceFeature> {
    match name {
        "connected" => Ok(DeviceFeature::Connected),
        "utility" => Ok(DeviceFeature::Utility),
        "queue_fill" => Ok(DeviceFeature::QueueFill),
        "aori" => Ok(DeviceFeature::Aori),
        "aosi" => Ok(DeviceFeature::Aosi),
        other => Err(PyValueError::new_err(format!(
            "Unknown observation feature '{}'",
            other
        ))),
    }
}

// ========================================================================
// Result Converters
// ========================================================================

pub fn observation_to_py(py: Python<'_>, observation: &[f64]) -> PyObject {
    PyList::new_bound(py, observation).into_any().unbind()
}

fn per_class_to_py<'py, T: ToPyObject>(
    py: Python<'py>,
    values: &PerClass<T>,
) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("ue", values.ue.to_object(py))?;
    dict.set_item("sensor", values.sensor.to_object(py))?;
    Ok(dict)
}

fn drops_to_py<'py>(py: Python<'py>, drops: &PerClass<DropCounters>) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new_bound(py);
    for (name, counters) in [("ue", &drops.ue), ("sensor", &drops.sensor)] {
        let inner = PyDict::new_bound(py);
        inner.set_item("overflow", counters.overflow)?;
        inner.set_item("timeout", counters.timeout)?;
        inner.set_item("disconnect", counters.disconnect)?;
        inner.set_item("delayed", counters.delayed())?;
        dict.set_item(name, inner)?;
    }
    Ok(dict)
}

/// Convert StepInfo to a Python dict
pub fn step_info_to_py(py: Python<'_>, info: &StepInfo) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);

    dict.set_item("step", info.step)?;
    dict.set_item("requested_action", info.requested_action.as_array().to_vec())?;
    dict.set_item("applied_action", info.applied_action.as_array().to_vec())?;
    dict.set_item("action_clamped", info.action_clamped)?;

    let reward = PyDict::new_bound(py);
    reward.set_item("throughput", info.reward.throughput)?;
    reward.set_item("delay_penalty", info.reward.delay_penalty)?;
    reward.set_item("aoi_penalty", info.reward.aoi_penalty)?;
    reward.set_item("total", info.reward.total)?;
    dict.set_item("reward", reward)?;

    dict.set_item("throughput_mbit", per_class_to_py(py, &info.throughput_mbit)?)?;
    dict.set_item("delivered", per_class_to_py(py, &info.delivered)?)?;
    dict.set_item("drops", drops_to_py(py, &info.drops)?)?;
    if let Some(total) = info.episode_reward {
        dict.set_item("episode_reward", total)?;
    }

    Ok(dict.unbind())
}

pub fn reset_info_to_py(py: Python<'_>, info: &ResetInfo) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("episode", info.episode)?;
    dict.set_item("connections", per_class_to_py(py, &info.connections)?)?;
    Ok(dict.unbind())
}

/// Convert StepMetrics to a flat Python dict keyed by metric name
pub fn metrics_to_py(py: Python<'_>, metrics: &StepMetrics) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    for (key, value) in metrics.iter() {
        match value {
            MetricValue::Scalar(v) => dict.set_item(key, *v)?,
            MetricValue::Flag(v) => dict.set_item(key, *v)?,
            MetricValue::PerEntity(map) => {
                let inner = PyDict::new_bound(py);
                for (id, v) in map {
                    inner.set_item(*id, *v)?;
                }
                dict.set_item(key, inner)?;
            }
        }
    }
    Ok(dict.unbind())
}

/// Convert a BoxSpace to `{"low": [...], "high": [...], "shape": (n,)}`
pub fn space_to_py(py: Python<'_>, space: &BoxSpace) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("low", space.low.clone())?;
    dict.set_item("high", space.high.clone())?;
    dict.set_item("shape", (space.len(),))?;
    Ok(dict.unbind())
}
