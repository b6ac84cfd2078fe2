//! Python bindings (enabled with the `pyo3` feature)

pub mod environment;
pub mod types;
