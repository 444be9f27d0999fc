//! Fire-and-forget event publication.

use crate::events::BookingEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives lifecycle events after commit
///
/// `publish` must not block; delivery and retries belong to the consumer.
pub trait BookingNotifier: Send + Sync {
    fn publish(&self, event: BookingEvent);
}

/// Writes every event to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl BookingNotifier for LogNotifier {
    fn publish(&self, event: BookingEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => log::info!("{}: {}", event.name(), json),
            Err(e) => log::warn!("{}: unserializable event: {}", event.name(), e),
        }
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<BookingEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BookingEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl BookingNotifier for ChannelNotifier {
    fn publish(&self, event: BookingEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

/// Publishes to several notifiers in order
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn BookingNotifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn BookingNotifier>>) -> Self {
        Self { targets }
    }
}

impl BookingNotifier for FanoutNotifier {
    fn publish(&self, event: BookingEvent) {
        for target in &self.targets {
            target.publish(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fanout_reaches_every_target() {
        let (first, mut first_rx) = ChannelNotifier::new();
        let (second, mut second_rx) = ChannelNotifier::new();
        let fanout = FanoutNotifier::new(vec![Arc::new(first), Arc::new(second), Arc::new(LogNotifier)]);

        fanout.publish(BookingEvent::Released { booking_id: 11 });

        assert_eq!(first_rx.recv().await, Some(BookingEvent::Released { booking_id: 11 }));
        assert_eq!(second_rx.recv().await, Some(BookingEvent::Released { booking_id: 11 }));
    }

    #[test]
    fn test_publish_after_receiver_dropped_is_silent() {
        let (notifier, receiver) = ChannelNotifier::new();
        drop(receiver);
        notifier.publish(BookingEvent::HoldExpired { booking_id: 1 });
    }
}
