use crate::types::JobInfo;

/// Event emitted by an upload session.
///
/// For one job the order is always `WriteStarted`, any number of
/// `WriteProgress`, `WriteFinished`, then exactly one of `WriteSuccess`,
/// `WriteError` or `WriteCancelled`. `TlsWarning` may appear anywhere
/// between `WriteStarted` and `WriteFinished`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A job was accepted and serialization is about to start.
    WriteStarted(JobInfo),
    /// Overall progress, 0–100.
    WriteProgress { job: JobInfo, percent: f64 },
    /// The job left the pipeline; the outcome follows.
    WriteFinished(JobInfo),
    /// The server accepted the file.
    WriteSuccess(JobInfo),
    /// The upload failed.
    WriteError { job: JobInfo, reason: String },
    /// The user aborted the job.
    WriteCancelled(JobInfo),
    /// Certificate problems were reported for the connection.
    TlsWarning { errors: Vec<String> },
}

impl DeviceEvent {
    /// Returns the job the event refers to, if any.
    pub fn job(&self) -> Option<&JobInfo> {
        match self {
            DeviceEvent::WriteStarted(job)
            | DeviceEvent::WriteFinished(job)
            | DeviceEvent::WriteSuccess(job)
            | DeviceEvent::WriteCancelled(job) => Some(job),
            DeviceEvent::WriteProgress { job, .. } | DeviceEvent::WriteError { job, .. } => {
                Some(job)
            }
            DeviceEvent::TlsWarning { .. } => None,
        }
    }

    /// Returns `true` for the events that close a job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeviceEvent::WriteSuccess(_)
                | DeviceEvent::WriteError { .. }
                | DeviceEvent::WriteCancelled(_)
        )
    }
}
