//! Change notification delivery.

use async_trait::async_trait;
use ratewatch_common::ChangeEvent;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::NotifyError;

/// Receives change events from the write path.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Get the notifier name.
    fn name(&self) -> &str;

    /// Deliver an event.
    async fn notify(&self, event: ChangeEvent) -> Result<(), NotifyError>;
}

/// Writes each change to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChangeNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, event: ChangeEvent) -> Result<(), NotifyError> {
        for change in &event.changes {
            info!(
                event_id = %event.id,
                base = %event.base,
                target = %change.target,
                previous = %change.previous,
                current = %change.current,
                "Rate changed: {}",
                change
            );
        }
        Ok(())
    }
}

/// Queues events for an asynchronous consumer.
///
/// Sending never waits: a full queue is reported as [`NotifyError::QueueFull`].
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ChangeNotifier for ChannelNotifier {
    fn name(&self) -> &str {
        "channel"
    }

    async fn notify(&self, event: ChangeEvent) -> Result<(), NotifyError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotifyError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotifyError::Closed,
        })
    }
}

/// Keeps delivered events in memory.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct RecordingNotifier {
    events: parking_lot::Mutex<Vec<ChangeEvent>>,
    fail: bool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records the attempt and then fails.
    pub fn failing() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Events received so far, including failed attempts.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ChangeNotifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, event: ChangeEvent) -> Result<(), NotifyError> {
        self.events.lock().push(event);
        if self.fail {
            return Err(NotifyError::Delivery("broker unreachable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewatch_common::{Currency, RateChange};
    use rust_decimal_macros::dec;

    fn make_event() -> ChangeEvent {
        ChangeEvent::from_changes(
            Currency::eur(),
            vec![RateChange::new(Currency::usd(), dec!(1.0), dec!(1.2))],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new(4);
        let event = make_event();

        tokio_test::assert_ok!(notifier.notify(event.clone()).await);

        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_channel_notifier_full_and_closed() {
        let (notifier, rx) = ChannelNotifier::new(1);

        notifier.notify(make_event()).await.unwrap();
        assert!(matches!(
            notifier.notify(make_event()).await,
            Err(NotifyError::QueueFull)
        ));

        drop(rx);
        assert!(matches!(
            notifier.notify(make_event()).await,
            Err(NotifyError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_events() {
        tokio_test::assert_ok!(LogNotifier::new().notify(make_event()).await);
    }
}
