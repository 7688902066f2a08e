//! Client event bus
//!
//! Thin wrapper over a `tokio::sync::broadcast` channel. Emitting never
//! blocks and never fails: with no subscribers the event is dropped.

use backstop_domain::constants::EVENT_CHANNEL_CAPACITY;
use backstop_domain::ClientEvent;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: ClientEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "Client event emitted"),
            Err(_) => trace!(event = name, "Client event dropped: no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(ClientEvent::WorkExpired { count: 2 });

        assert!(matches!(first.recv().await.unwrap(), ClientEvent::WorkExpired { count: 2 }));
        assert!(matches!(second.recv().await.unwrap(), ClientEvent::WorkExpired { count: 2 }));
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.emit(ClientEvent::WorkExpired { count: 1 });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
