//! Shared types for the printpush upload pipeline.
//!
//! Everything here is plain data: the configured [`Endpoint`], the
//! payload-free [`JobInfo`] observers see, the session [`Stage`], the unified
//! [`ProgressSnapshot`] and the [`DeviceEvent`]s a session emits.

pub mod constants;
pub mod events;
pub mod filename;
pub mod types;

// Re-export primary types for convenience.
pub use events::DeviceEvent;
pub use filename::{DEFAULT_JOB_NAME, normalize_file_name};
pub use types::{Endpoint, JobInfo, ProgressSnapshot, Stage};
