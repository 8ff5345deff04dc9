//! Async fan-out of `ChatEvent` over a `tokio::sync::broadcast` channel.
//!
//! Complements the synchronous `EventEmitter`: every event the registry
//! publishes is also sent here, so tasks can `recv().await` instead of
//! registering callbacks. Slow receivers lag and skip events; publishers are
//! never blocked.

use tinychat_types::event::ChatEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast channel carrying every registry event.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    /// A capacity of `0` is raised to `1`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    /// Send `event` to every live receiver and return how many there were.
    /// With no receivers the event is dropped.
    pub fn publish(&self, event: ChatEvent) -> usize {
        let topic = event.topic();
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(?topic, delivered, "event broadcast");
        delivered
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages_changed(session: usize) -> ChatEvent {
        ChatEvent::MessagesChanged {
            session_id: format!("session-{session}"),
            messages: vec![],
        }
    }

    fn session_of(event: &ChatEvent) -> &str {
        match event {
            ChatEvent::MessagesChanged { session_id, .. } => session_id,
            ChatEvent::SessionsChanged { .. } => "",
        }
    }

    #[tokio::test]
    async fn receivers_see_events_in_publish_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(messages_changed(1));
        bus.publish(ChatEvent::SessionsChanged { sessions: vec![] });
        bus.publish(messages_changed(2));

        assert_eq!(session_of(&rx.recv().await.unwrap()), "session-1");
        assert!(matches!(
            rx.recv().await.unwrap(),
            ChatEvent::SessionsChanged { .. }
        ));
        assert_eq!(session_of(&rx.recv().await.unwrap()), "session-2");
    }

    #[test]
    fn publish_reports_live_receivers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(messages_changed(1)), 0);

        let _first = bus.subscribe();
        let second = bus.subscribe();
        assert_eq!(bus.publish(messages_changed(2)), 2);

        drop(second);
        assert_eq!(bus.receiver_count(), 1);
        assert_eq!(bus.publish(messages_changed(3)), 1);
    }

    #[test]
    fn late_receiver_misses_earlier_events() {
        let bus = EventBus::new(8);
        let _keepalive = bus.subscribe();
        bus.publish(messages_changed(1));

        let mut late = bus.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn slow_receiver_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for session in 0..5 {
            bus.publish(messages_changed(session));
        }

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(3))
        ));
        assert_eq!(session_of(&rx.try_recv().unwrap()), "session-3");
        assert_eq!(session_of(&rx.try_recv().unwrap()), "session-4");
    }

    #[test]
    fn zero_capacity_is_usable() {
        let bus = EventBus::new(0);
        let mut rx = bus.subscribe();
        bus.publish(messages_changed(1));
        assert_eq!(session_of(&rx.try_recv().unwrap()), "session-1");
    }
}
