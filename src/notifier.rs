//! Progress relay for observers of the scrape queue
//!
//! Every line is emitted as a `tracing` event and fanned out over a
//! broadcast channel. Observers come and go freely; a dropped receiver is
//! simply no longer served and a slow one skips lines instead of blocking
//! the worker.

use tokio::sync::broadcast;
use tracing::info;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<String>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Register a new observer. Only lines sent after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Number of live observers
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "scrape", "{}", message);
        // No observers is fine: the line already went to tracing.
        let _ = self.sender.send(message);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcasts_to_every_observer() {
        let notifier = Notifier::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.log("hello");

        assert_eq!(first.recv().await.unwrap(), "hello");
        assert_eq!(second.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn dropped_observers_are_forgotten() {
        let notifier = Notifier::new();
        let gone = notifier.subscribe();
        let mut kept = notifier.subscribe();
        drop(gone);

        notifier.log("still delivered");

        assert_eq!(notifier.observer_count(), 1);
        assert_eq!(kept.recv().await.unwrap(), "still delivered");
    }

    #[test]
    fn logging_without_observers_is_harmless() {
        Notifier::new().log("nobody listening");
    }
}
