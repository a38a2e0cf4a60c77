//! The upload session state machine.
//!
//! Stage transitions happen under one lock so that the idle check in
//! [`UploadSession::submit`] and the stage flip are atomic; the lock is never
//! held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use printpush_notify::{Notification, NotificationId, NotificationSink, PostAction};
use printpush_protocol::constants::{FILE_FIELD, FORM_FIELDS};
use printpush_protocol::{
    DeviceEvent, Endpoint, JobInfo, ProgressSnapshot, Stage, normalize_file_name,
};
use printpush_transfer::{MultipartForm, Serializer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::job::{FixedJobName, GcodeSource, JobNameSource};
use crate::transport::{HttpTransport, TransportSignal, UploadRequest};

/// Byte counters of the request currently on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InFlightRequest {
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    stage: Stage,
    fraction: f64,
    job: Option<JobInfo>,
    /// Present from submit until the outcome is decided.
    cancel: Option<CancellationToken>,
    in_flight: Option<InFlightRequest>,
    next_job_id: u64,
}

impl SessionState {
    fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.fraction = 0.0;
        self.job = None;
        self.cancel = None;
        self.in_flight = None;
    }
}

/// Uploads one G-code job at a time to a single endpoint.
///
/// Share it through an [`Arc`] to call [`cancel`](Self::cancel) or the
/// query methods while [`submit`](Self::submit) runs on another task.
pub struct UploadSession {
    endpoint: Endpoint,
    transport: Arc<dyn HttpTransport>,
    serializer: Serializer,
    notifier: Option<Arc<dyn NotificationSink>>,
    job_names: Arc<dyn JobNameSource>,
    state: Mutex<SessionState>,
    /// Set by `take_events`; events are discarded until then.
    events_tx: OnceLock<mpsc::UnboundedSender<DeviceEvent>>,
}

impl UploadSession {
    /// Creates an idle session for `endpoint`.
    pub fn new(endpoint: Endpoint, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoint,
            transport,
            serializer: Serializer::new(),
            notifier: None,
            job_names: Arc::new(FixedJobName::default()),
            state: Mutex::new(SessionState::default()),
            events_tx: OnceLock::new(),
        }
    }

    /// Sends user notifications to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Takes default file names from `job_names`.
    pub fn with_job_names(mut self, job_names: Arc<dyn JobNameSource>) -> Self {
        self.job_names = job_names;
        self
    }

    /// Replaces the serializer (e.g. to change its progress interval).
    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events emitted before this call are not buffered. Delivery never
    /// waits on the receiver, so a slow or absent consumer cannot stall a
    /// job.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<DeviceEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events_tx.set(tx).ok().map(|()| rx)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn current_stage(&self) -> Stage {
        self.state().stage
    }

    pub fn current_progress(&self) -> ProgressSnapshot {
        let state = self.state();
        ProgressSnapshot {
            stage: state.stage,
            fraction: state.fraction,
        }
    }

    /// The job occupying the session, if any.
    pub fn active_job(&self) -> Option<JobInfo> {
        self.state().job.clone()
    }

    /// Byte counters of the request on the wire, while uploading.
    pub fn in_flight(&self) -> Option<InFlightRequest> {
        self.state().in_flight
    }

    /// Aborts the active job.
    ///
    /// A no-op when idle or once the job's outcome has been decided. Once
    /// issued, the job resolves as cancelled and never reports success or
    /// failure.
    pub fn cancel(&self) {
        let state = self.state();
        if let Some(token) = &state.cancel {
            if !token.is_cancelled() {
                info!(job = ?state.job.as_ref().map(|j| j.id), "cancelling upload");
            }
            token.cancel();
        }
    }

    /// Serializes `lines` and uploads them as `file_name`.
    ///
    /// The file name gets the G-code extension; without one the host's job
    /// name is used. Fails immediately with [`UploadError::DeviceBusy`] while
    /// another job is active.
    pub async fn submit<S>(
        &self,
        lines: &[S],
        file_name: Option<&str>,
    ) -> Result<JobInfo, UploadError>
    where
        S: AsRef<str> + Sync,
    {
        let file_name = normalize_file_name(file_name, &self.job_names.job_name());
        let (job, cancel) = self.begin(file_name)?;
        let mut guard = ResetGuard::new(&self.state);

        info!(
            job = job.id,
            file = %job.file_name,
            lines = lines.len(),
            endpoint = %self.endpoint.base_url(),
            "upload started"
        );
        self.emit(DeviceEvent::WriteStarted(job.clone()));

        let note = self.notify(Notification::progress(format!(
            "Saving to {}",
            self.endpoint.display_name()
        )));

        let result = self.run(&job, lines, &cancel, note).await;
        let result = self.resolve(&job, result, note);
        guard.disarm();
        result
    }

    /// Uploads the G-code of the scene's active build plate.
    pub async fn submit_scene(
        &self,
        scene: &(dyn GcodeSource + Sync),
        file_name: Option<&str>,
    ) -> Result<JobInfo, UploadError> {
        let plate = scene.active_plate();
        let lines = scene.plate_gcode(plate).ok_or(UploadError::NoGcode(plate))?;
        self.submit(lines, file_name).await
    }

    /// Claims the session for a new job.
    fn begin(&self, file_name: String) -> Result<(JobInfo, CancellationToken), UploadError> {
        let mut state = self.state();
        if state.stage.is_busy() {
            warn!(stage = ?state.stage, file = %file_name, "rejecting upload: device busy");
            return Err(UploadError::DeviceBusy);
        }

        state.next_job_id += 1;
        let job = JobInfo {
            id: state.next_job_id,
            file_name,
        };
        let cancel = CancellationToken::new();

        state.stage = Stage::Serializing;
        state.fraction = 0.0;
        state.job = Some(job.clone());
        state.cancel = Some(cancel.clone());
        state.in_flight = None;

        Ok((job, cancel))
    }

    /// Serializes and uploads. Returns once the transport resolves or the job
    /// is cancelled.
    async fn run<S>(
        &self,
        job: &JobInfo,
        lines: &[S],
        cancel: &CancellationToken,
        note: Option<NotificationId>,
    ) -> Result<(), UploadError>
    where
        S: AsRef<str> + Sync,
    {
        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            payload = self.serializer.serialize(lines, |p| {
                self.report_progress(job, ProgressSnapshot::serializing(p), note);
            }) => payload,
        };

        let mut form = MultipartForm::new();
        for (name, value) in FORM_FIELDS {
            form = form.text(name, value);
        }
        let body = form.file(FILE_FIELD, &job.file_name, &payload).finish();
        drop(payload);

        let request = UploadRequest::for_endpoint(&self.endpoint, body);
        let total = request.body.len() as u64;
        {
            let mut state = self.state();
            state.stage = Stage::Uploading;
            state.in_flight = Some(InFlightRequest {
                bytes_sent: 0,
                bytes_total: total,
            });
        }
        self.report_progress(job, ProgressSnapshot::uploading(0, total), note);
        debug!(job = job.id, url = %request.url, bytes = total, "sending upload request");

        let (signals_tx, mut signals_rx) = mpsc::unbounded_channel();
        let post = self.transport.post(request, signals_tx);
        tokio::pin!(post);

        let response = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Dropping `post` aborts the request.
                    return Err(UploadError::Cancelled);
                }
                Some(signal) = signals_rx.recv() => {
                    self.handle_signal(job, signal, note);
                }
                response = &mut post => break response,
            }
        };
        while let Ok(signal) = signals_rx.try_recv() {
            self.handle_signal(job, signal, note);
        }

        let response = response?;
        debug!(job = job.id, status = response.status, body = %response.body, "upload response");
        if !response.is_success() {
            return Err(UploadError::Http {
                status: response.status,
                reason: response.failure_reason(),
            });
        }
        Ok(())
    }

    fn handle_signal(
        &self,
        job: &JobInfo,
        signal: TransportSignal,
        note: Option<NotificationId>,
    ) {
        match signal {
            TransportSignal::UploadProgress { sent, total } => {
                if total == 0 {
                    return;
                }
                {
                    let mut state = self.state();
                    if let Some(in_flight) = state.in_flight.as_mut() {
                        in_flight.bytes_sent = sent.min(total);
                        in_flight.bytes_total = total;
                    }
                }
                self.report_progress(job, ProgressSnapshot::uploading(sent, total), note);
            }
            TransportSignal::TlsWarning(errors) => {
                let joined = errors.join(", ");
                error!(job = job.id, errors = %joined, "ssl errors");
                self.notify(Notification::warning(format!(
                    "One or more SSL errors has occurred: {joined}"
                )));
                self.emit(DeviceEvent::TlsWarning { errors });
            }
            TransportSignal::AuthChallenge { scheme } => {
                error!(
                    job = job.id,
                    scheme = %scheme,
                    "not supported: OctoPrint authentication other than api-key"
                );
            }
        }
    }

    /// Emits the terminal events for `job` and returns the session to idle.
    fn resolve(
        &self,
        job: &JobInfo,
        result: Result<(), UploadError>,
        note: Option<NotificationId>,
    ) -> Result<JobInfo, UploadError> {
        // Taking the token decides the outcome: a cancel arriving from here
        // on finds nothing to cancel.
        let cancelled = {
            let mut state = self.state();
            state.in_flight = None;
            state.cancel.take().is_some_and(|t| t.is_cancelled())
        };
        let result = if cancelled {
            Err(UploadError::Cancelled)
        } else {
            result
        };

        if let (Some(notifier), Some(id)) = (&self.notifier, note) {
            notifier.hide(id);
        }
        self.emit(DeviceEvent::WriteFinished(job.clone()));

        match &result {
            Ok(()) => {
                info!(job = job.id, file = %job.file_name, "upload complete");
                self.notify(
                    Notification::success(format!(
                        "Saved to {} as {}",
                        self.endpoint.display_name(),
                        base_name(&job.file_name)
                    ))
                    .with_action(PostAction::OpenBrowser {
                        url: self.endpoint.base_url().to_string(),
                    }),
                );
                self.emit(DeviceEvent::WriteSuccess(job.clone()));
            }
            Err(UploadError::Cancelled) => {
                info!(job = job.id, "upload cancelled");
                self.notify(
                    Notification::info(format!(
                        "Saving to {} cancelled",
                        self.endpoint.display_name()
                    ))
                    .with_message(base_name(&job.file_name)),
                );
                self.emit(DeviceEvent::WriteCancelled(job.clone()));
            }
            Err(e) => {
                let reason = e.to_string();
                error!(job = job.id, error = %reason, "upload failed");
                if let UploadError::Transport(t) = e {
                    self.notify(Notification::error(format!(
                        "There was a network error: {t}"
                    )));
                }
                self.notify(Notification::error(format!(
                    "Could not save to {}: {reason}",
                    self.endpoint.display_name()
                )));
                self.emit(DeviceEvent::WriteError {
                    job: job.clone(),
                    reason,
                });
            }
        }

        self.state().reset();
        result.map(|()| job.clone())
    }

    /// Records progress and emits it if it moved forward.
    fn report_progress(
        &self,
        job: &JobInfo,
        snapshot: ProgressSnapshot,
        note: Option<NotificationId>,
    ) {
        {
            let mut state = self.state();
            if snapshot.fraction < state.fraction {
                return;
            }
            let advanced = snapshot.fraction > state.fraction;
            state.fraction = snapshot.fraction;
            if !advanced {
                return;
            }
        }

        let percent = snapshot.percent();
        if let (Some(notifier), Some(id)) = (&self.notifier, note) {
            notifier.set_progress(id, percent);
        }
        let event = DeviceEvent::WriteProgress {
            job: job.clone(),
            percent,
        };
        self.emit(event);
    }

    fn emit(&self, event: DeviceEvent) {
        if let Some(tx) = self.events_tx.get() {
            let _ = tx.send(event);
        }
    }

    fn notify(&self, notification: Notification) -> Option<NotificationId> {
        self.notifier.as_ref().map(|n| n.show(notification))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Returns the session to idle if a `submit` future is dropped mid-job.
struct ResetGuard<'a> {
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl<'a> ResetGuard<'a> {
    fn new(state: &'a Mutex<SessionState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(token) = state.cancel.take() {
                token.cancel();
            }
            state.reset();
        }
    }
}

fn base_name(file_name: &str) -> &str {
    std::path::Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name)
}
