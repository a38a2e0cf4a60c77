//! Host collaborators a session reads job data from.

use std::collections::HashMap;

use printpush_protocol::DEFAULT_JOB_NAME;

/// Supplies the job name used when a submission has no file name.
pub trait JobNameSource: Send + Sync {
    fn job_name(&self) -> String;
}

/// A job name that never changes.
#[derive(Debug, Clone)]
pub struct FixedJobName(pub String);

impl Default for FixedJobName {
    fn default() -> Self {
        Self(DEFAULT_JOB_NAME.to_string())
    }
}

impl JobNameSource for FixedJobName {
    fn job_name(&self) -> String {
        self.0.clone()
    }
}

impl<F> JobNameSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn job_name(&self) -> String {
        self()
    }
}

/// The host scene's sliced G-code, one line list per build plate.
pub trait GcodeSource {
    /// Build plate currently selected in the host.
    fn active_plate(&self) -> usize;

    /// G-code lines for `plate`, if it has been sliced.
    fn plate_gcode(&self, plate: usize) -> Option<&[String]>;
}

/// Simple in-memory [`GcodeSource`].
#[derive(Debug, Clone, Default)]
pub struct PlateGcode {
    pub active: usize,
    pub plates: HashMap<usize, Vec<String>>,
}

impl PlateGcode {
    /// A single plate (0) holding `lines`.
    pub fn single(lines: Vec<String>) -> Self {
        Self {
            active: 0,
            plates: HashMap::from([(0, lines)]),
        }
    }
}

impl GcodeSource for PlateGcode {
    fn active_plate(&self) -> usize {
        self.active
    }

    fn plate_gcode(&self, plate: usize) -> Option<&[String]> {
        self.plates.get(&plate).map(Vec::as_slice)
    }
}
