//! User-facing notifications
//!
//! The client reports unrecovered failures through a [`Notifier`]. Rendering is
//! somebody else's job: a UI layer can consume a [`ChannelNotifier`], headless
//! callers get [`TracingNotifier`].

use tokio::sync::mpsc;

/// A notification ready to be shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    /// Whether the user can dismiss it
    pub closable: bool,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, closable: bool) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            closable,
        }
    }

    /// Shown once per failed refresh episode, right after logout
    pub fn session_expired() -> Self {
        Self::new(
            SESSION_EXPIRED_TITLE,
            "Your session has expired. Please log in again.",
            false,
        )
    }

    pub fn is_session_expired(&self) -> bool {
        self.title == SESSION_EXPIRED_TITLE
    }
}

pub const SESSION_EXPIRED_TITLE: &str = "Session Expired";

/// Sink for notifications. Fire-and-forget: implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits notifications as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        tracing::warn!(
            title = %notification.title,
            closable = notification.closable,
            "{}",
            notification.description
        );
    }
}

/// Forwards notifications to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier together with the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("notification dropped, receiver is gone");
        }
    }
}
