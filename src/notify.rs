use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Process-wide surface for user-facing error messages.
///
/// The pipeline publishes here for network failures and for server errors
/// that carry a message. Rendering is up to the consumer.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, message: &str);
}

/// How long [`MessageBoard`] keeps a message visible by default.
pub const DEFAULT_VISIBLE_FOR: Duration = Duration::from_secs(5);

struct Notice {
    message: String,
    shown_at: Instant,
}

/// Keeps the latest message and hides it after a fixed window.
pub struct MessageBoard {
    current: Mutex<Option<Notice>>,
    visible_for: Duration,
}

impl MessageBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::with_visible_for(DEFAULT_VISIBLE_FOR)
    }

    #[must_use]
    pub fn with_visible_for(visible_for: Duration) -> Self {
        Self {
            current: Mutex::new(None),
            visible_for,
        }
    }

    /// Show `message`, replacing whatever was shown before.
    pub fn set_error(&self, message: impl Into<String>) {
        *self.current.lock() = Some(Notice {
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    /// The visible message, if any.
    #[must_use]
    pub fn visible(&self) -> Option<String> {
        let current = self.current.lock();
        current
            .as_ref()
            .filter(|n| n.shown_at.elapsed() < self.visible_for)
            .map(|n| n.message.clone())
    }

    /// The last message, visible or not.
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.current.lock().as_ref().map(|n| n.message.clone())
    }

    pub fn clear(&self) {
        *self.current.lock() = None;
    }
}

impl Default for MessageBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for MessageBoard {
    fn notify(&self, message: &str) {
        self.set_error(message);
    }
}

/// Fans messages out to every subscriber.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<String>,
}

impl BroadcastNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, message: &str) {
        // No subscribers is fine.
        let _ = self.tx.send(message.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_shows_latest_message() {
        let board = MessageBoard::new();
        board.notify("first");
        board.notify("second");
        assert_eq!(board.visible().as_deref(), Some("second"));
    }

    #[test]
    fn board_hides_after_window() {
        let board = MessageBoard::with_visible_for(Duration::ZERO);
        board.notify("gone");
        assert_eq!(board.visible(), None);
        assert_eq!(board.last().as_deref(), Some("gone"));
    }

    #[test]
    fn board_clear() {
        let board = MessageBoard::new();
        board.notify("x");
        board.clear();
        assert_eq!(board.last(), None);
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        notifier.notify("hello");
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        BroadcastNotifier::new(1).notify("nobody listens");
    }
}
