//! User-facing notifications for upload sessions.
//!
//! The session talks to a [`NotificationSink`]; how notifications are drawn
//! is up to the host. [`NotificationQueue`] is an in-memory sink a UI can
//! poll, and [`PostAction`] is the closed set of buttons a notification may
//! offer, dispatched through an [`ActionHandler`].

mod action;
mod queue;

pub use action::{ActionHandler, PostAction};
pub use queue::{Notification, NotificationId, NotificationKind, NotificationQueue};

/// Receives notifications from an upload session.
pub trait NotificationSink: Send + Sync {
    /// Shows a notification and returns its ID.
    fn show(&self, notification: Notification) -> NotificationId;

    /// Hides a previously shown notification. Unknown IDs are ignored.
    fn hide(&self, id: NotificationId);

    /// Updates the progress bar (0–100) of a progress notification.
    fn set_progress(&self, _id: NotificationId, _percent: f64) {}
}

/// Errors produced when dispatching notification actions.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification not found: {0}")]
    NotFound(NotificationId),

    #[error("notification {id} has no action '{action}'")]
    UnknownAction { id: NotificationId, action: String },

    #[error("action failed: {0}")]
    Handler(String),
}
