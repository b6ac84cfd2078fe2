//! Domain models for the smart-city network simulator

pub mod aoi;
pub mod device;
pub mod event;
pub mod job;
pub mod position;
pub mod queue;
pub mod state;
pub mod station;

// Re-exports
pub use aoi::AoiState;
pub use device::{Device, DeviceKind, DeviceProfile};
pub use event::{Event, EventLog};
pub use job::{DropReason, Job, JobError, JobStage};
pub use position::Position;
pub use queue::JobQueue;
pub use state::SimulationState;
pub use station::BaseStation;
