//! Single-flight G-code upload to an OctoPrint server.
//!
//! [`UploadSession`] owns the stage machine. It serializes the job's lines,
//! wraps them in a multipart request and hands that to an injected
//! [`HttpTransport`]; the `printpush-octoprint` crate provides the `reqwest`
//! implementation, tests use mocks.
//!
//! # Pipeline
//!
//! 1. **Serialize** (0–50 %): lines are concatenated, yielding periodically
//! 2. **Upload** (50–100 %): multipart POST to `{base_url}/api/files/local`
//! 3. **Resolve**: `WriteFinished`, then success, error or cancellation
//!
//! Only one job runs at a time; a second `submit` while busy fails with
//! [`UploadError::DeviceBusy`].

pub mod error;
pub mod job;
pub mod session;
pub mod transport;

// Re-export primary types for convenience.
pub use error::{TransportError, UploadError};
pub use job::{FixedJobName, GcodeSource, JobNameSource, PlateGcode};
pub use session::{InFlightRequest, UploadSession};
pub use transport::{HttpResponse, HttpTransport, TransportSignal, UploadRequest};
