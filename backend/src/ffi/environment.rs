//! PyO3 wrapper for the Orchestrator
//!
//! Exposes the engine to Python as a gym-style `Environment`.

use pyo3::prelude::*;
use pyo3::types::{PyAny, PyDict};

use super::types::{
    metrics_to_py, observation_to_py, parse_simulation_config, reset_info_to_py, space_to_py,
    step_info_to_py, to_py_err, InvalidActionError,
};
use crate::allocation::Action;
use crate::orchestrator::{Orchestrator, SimulationConfig};

/// Python wrapper for the Rust Orchestrator
///
/// # Example (from Python)
///
/// ```python
/// from smartcity_simulator_core_rs import Environment
///
/// env = Environment({"num_ues": 5, "num_sensors": 10, "seed": 666})
/// obs, info = env.reset()
/// obs, reward, terminated, truncated, info = env.step([0.5, 0.5])
/// print(env.metrics()["delayed_packets_sensors"])
/// ```
#[pyclass(name = "Environment")]
pub struct PyEnvironment {
    inner: Orchestrator,
}

#[pymethods]
impl PyEnvironment {
    /// Create an environment; without a config the smart-city defaults apply
    ///
    /// # Errors
    ///
    /// Raises ValueError if a value has the wrong type or fails validation
    #[new]
    #[pyo3(signature = (config=None))]
    fn new(config: Option<&Bound<'_, PyDict>>) -> PyResult<Self> {
        let rust_config = match config {
            Some(dict) => parse_simulation_config(dict)?,
            None => SimulationConfig::default(),
        };
        let inner = Orchestrator::new(rust_config).map_err(to_py_err)?;
        Ok(PyEnvironment { inner })
    }

    /// Start a new episode; returns `(observation, info)`
    #[pyo3(signature = (seed=None))]
    fn reset(&mut self, py: Python<'_>, seed: Option<u64>) -> PyResult<(PyObject, Py<PyDict>)> {
        let (observation, info) = self.inner.reset(seed).map_err(to_py_err)?;
        Ok((observation_to_py(py, &observation), reset_info_to_py(py, &info)?))
    }

    /// Advance one step; returns `(observation, reward, terminated, truncated, info)`
    ///
    /// `action` is any sequence of two floats.
    fn step(
        &mut self,
        py: Python<'_>,
        action: &Bound<'_, PyAny>,
    ) -> PyResult<(PyObject, f64, bool, bool, Py<PyDict>)> {
        let values: Vec<f64> = action.extract().map_err(|e| {
            InvalidActionError::new_err(format!("action must be a sequence of two floats: {}", e))
        })?;
        let action = Action::from_slice(&values).map_err(to_py_err)?;
        let result = self.inner.step(action).map_err(to_py_err)?;

        Ok((
            observation_to_py(py, &result.observation),
            result.reward,
            result.terminated,
            result.truncated,
            step_info_to_py(py, &result.info)?,
        ))
    }

    /// End the episode after the next step
    fn request_truncation(&mut self) -> PyResult<()> {
        self.inner.request_truncation().map_err(to_py_err)
    }

    /// Metrics of the latest step
    fn metrics(&self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        metrics_to_py(py, self.inner.metrics())
    }

    fn observe(&self, py: Python<'_>) -> PyObject {
        observation_to_py(py, &self.inner.observe())
    }

    fn action_space(&self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        space_to_py(py, &self.inner.action_space())
    }

    fn observation_space(&self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        space_to_py(py, &self.inner.observation_space())
    }

    #[getter]
    #[allow(non_snake_case)]
    fn NUM_USERS(&self) -> usize {
        self.inner.num_users()
    }

    #[getter]
    #[allow(non_snake_case)]
    fn NUM_SENSORS(&self) -> usize {
        self.inner.num_sensors()
    }

    #[getter]
    #[allow(non_snake_case)]
    fn NUM_STATIONS(&self) -> usize {
        self.inner.num_stations()
    }

    fn current_step(&self) -> usize {
        self.inner.current_step()
    }

    fn event_count(&self) -> usize {
        self.inner.event_log().len()
    }

    fn config_hash(&self) -> String {
        self.inner.config_hash().to_string()
    }

    // ========================================================================
    // Checkpointing
    // ========================================================================

    /// Serialise the running episode to a JSON string
    fn save_state(&self) -> PyResult<String> {
        self.inner.save_state().map_err(to_py_err)
    }

    /// Restore an episode saved with `save_state`
    ///
    /// Raises ConfigMismatchError if the snapshot came from another config.
    fn load_state(&mut self, state_json: &str) -> PyResult<()> {
        self.inner.load_state(state_json).map_err(to_py_err)
    }
}
