use std::sync::Mutex;

use tracing::debug;

use crate::action::{ActionHandler, PostAction};
use crate::{NotificationSink, NotifyError};

/// Default display duration in milliseconds.
const DEFAULT_DURATION_MS: u64 = 4000;

/// Error display duration in milliseconds (longer for visibility).
const ERROR_DURATION_MS: u64 = 6000;

/// Identifier assigned to a shown notification.
pub type NotificationId = u64;

/// The visual category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Stays until hidden; carries a progress bar.
    Progress,
    Success,
    Error,
    Warning,
    Info,
}

/// A notification for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub actions: Vec<PostAction>,
    /// `None` keeps the notification until it is hidden.
    pub duration_ms: Option<u64>,
    /// Progress (0–100) for [`NotificationKind::Progress`].
    pub progress: Option<f64>,
}

impl Notification {
    fn new(kind: NotificationKind, title: impl Into<String>, duration_ms: Option<u64>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: None,
            actions: Vec::new(),
            duration_ms,
            progress: None,
        }
    }

    /// A persistent notification with a progress bar starting at 0.
    pub fn progress(title: impl Into<String>) -> Self {
        let mut n = Self::new(NotificationKind::Progress, title, None);
        n.progress = Some(0.0);
        n
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, Some(DEFAULT_DURATION_MS))
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, Some(ERROR_DURATION_MS))
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, Some(DEFAULT_DURATION_MS))
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, Some(DEFAULT_DURATION_MS))
    }

    /// Adds body text.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds an action button.
    pub fn with_action(mut self, action: PostAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Looks up an action by its ID.
    pub fn action(&self, action_id: &str) -> Option<&PostAction> {
        self.actions.iter().find(|a| a.id() == action_id)
    }
}

/// In-memory notification queue with monotonic ID assignment.
///
/// Timer-based auto-dismissal is a UI concern. This struct just holds the
/// queue, exposes add/remove, and dispatches action buttons. Wrap it in a
/// [`Mutex`] to use it as a [`NotificationSink`].
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    entries: Vec<(NotificationId, Notification)>,
    next_id: NotificationId,
}

impl NotificationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a notification and returns its ID.
    pub fn push(&mut self, notification: Notification) -> NotificationId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, notification));
        id
    }

    /// Removes a notification. Returns `true` if it was present.
    pub fn remove(&mut self, id: NotificationId) -> bool {
        let len_before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        self.entries.len() != len_before
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.entries.iter().find(|(i, _)| *i == id).map(|(_, n)| n)
    }

    /// Updates the progress of a notification, if present.
    pub fn set_progress(&mut self, id: NotificationId, percent: f64) {
        if let Some((_, n)) = self.entries.iter_mut().find(|(i, _)| *i == id) {
            n.progress = Some(percent.clamp(0.0, 100.0));
        }
    }

    /// Iterates in insertion order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = (NotificationId, &Notification)> {
        self.entries.iter().map(|(i, n)| (*i, n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Runs the action `action_id` of notification `id`.
    ///
    /// The notification is dismissed when the action succeeds.
    pub fn trigger(
        &mut self,
        id: NotificationId,
        action_id: &str,
        handler: &dyn ActionHandler,
    ) -> Result<(), NotifyError> {
        let notification = self.get(id).ok_or(NotifyError::NotFound(id))?;
        let action = notification
            .action(action_id)
            .ok_or_else(|| NotifyError::UnknownAction {
                id,
                action: action_id.to_string(),
            })?
            .clone();

        action.perform(handler)?;
        debug!(id, action = action_id, "notification action performed");
        self.remove(id);
        Ok(())
    }
}

impl NotificationSink for Mutex<NotificationQueue> {
    fn show(&self, notification: Notification) -> NotificationId {
        self.lock().unwrap_or_else(|e| e.into_inner()).push(notification)
    }

    fn hide(&self, id: NotificationId) {
        self.lock().unwrap_or_else(|e| e.into_inner()).remove(id);
    }

    fn set_progress(&self, id: NotificationId, percent: f64) {
        self.lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_progress(id, percent);
    }
}
