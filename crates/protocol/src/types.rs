use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_REQUEST_TIMEOUT, UPLOAD_PATH};

/// One remote printer-control server.
///
/// Immutable once built; sessions hold it for their whole lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    display_name: String,
    base_url: String,
    api_key: String,
    accept_invalid_certs: bool,
    timeout: Option<Duration>,
}

impl Endpoint {
    /// Creates an endpoint with certificate validation on and the default
    /// request timeout.
    pub fn new(
        display_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            accept_invalid_certs: false,
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Accepts invalid TLS certificates. Uploads to such an endpoint are
    /// reported with a TLS warning.
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Sets the per-request timeout. `None` leaves uploads unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the upload URL (`{base_url}/api/files/local`).
    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), UPLOAD_PATH)
    }

    /// Human-readable description, e.g. `Save to Shop (http://octopi.local)`.
    pub fn description(&self) -> String {
        format!("Save to {} ({})", self.display_name, self.base_url)
    }
}

/// Payload-free identity of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    /// Per-session monotonically increasing job number.
    pub id: u64,
    /// Normalized target file name on the server.
    pub file_name: String,
}

/// Phase of an upload session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "serializing")]
    Serializing,
    #[serde(rename = "uploading")]
    Uploading,
}

impl Stage {
    /// Returns `true` while a job occupies the session.
    pub fn is_busy(self) -> bool {
        self != Stage::Idle
    }
}

/// Overall progress of the active job on a single 0–1 scale.
///
/// Serialization covers `[0, 0.5]`, upload covers `[0.5, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: Stage,
    pub fraction: f64,
}

impl ProgressSnapshot {
    /// Snapshot of an idle session.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Maps serializer progress `p ∈ [0,1]` onto the overall scale.
    pub fn serializing(p: f64) -> Self {
        Self {
            stage: Stage::Serializing,
            fraction: clamp_unit(p) / 2.0,
        }
    }

    /// Maps transferred bytes onto the overall scale.
    pub fn uploading(sent: u64, total: u64) -> Self {
        let p = if total == 0 {
            0.0
        } else {
            sent as f64 / total as f64
        };
        Self {
            stage: Stage::Uploading,
            fraction: 0.5 + clamp_unit(p) / 2.0,
        }
    }

    /// Overall progress as a percentage (0–100).
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
