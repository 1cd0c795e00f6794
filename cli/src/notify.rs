use tollgate_shared::{Notification, Notifier};

/// Prints notifications to stderr so they are not mixed with response output
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!("{}", render(&notification));
    }
}

fn render(notification: &Notification) -> String {
    if notification.is_session_expired() {
        format!(
            "[!] {}: {} (pass --email or set TOLLGATE_EMAIL to sign in again)",
            notification.title, notification.description
        )
    } else {
        format!("[x] {}: {}", notification.title, notification.description)
    }
}
