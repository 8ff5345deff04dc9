//! Synchronous topic emitter.
//!
//! Handlers are invoked in registration order on the publishing task. The
//! handler table is snapshotted before dispatch, so a handler may subscribe,
//! unsubscribe or publish again without deadlocking.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tinychat_types::event::{ChatEvent, Topic};
use tracing::error;

/// Handle identifying one registration, used to unsubscribe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ChatEvent) + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

/// Topic-keyed handler table.
pub struct EventEmitter {
    handlers: Mutex<HashMap<Topic, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for every event on `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.register(topic, false, Arc::new(handler))
    }

    /// Register `handler` for the next event on `topic` only.
    pub fn subscribe_once<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.register(topic, true, Arc::new(handler))
    }

    /// Remove one registration. Returns `false` if it was not found.
    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) -> bool {
        let mut handlers = self.table();
        let Some(list) = handlers.get_mut(&topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        list.len() != before
    }

    /// Deliver `event` to every handler of its topic. Returns the number of
    /// handlers invoked.
    ///
    /// A panicking handler is logged and skipped; the rest still run.
    pub fn publish(&self, event: &ChatEvent) -> usize {
        let topic = event.topic();
        let snapshot: Vec<(SubscriptionId, Handler)> = {
            let mut handlers = self.table();
            let Some(list) = handlers.get_mut(&topic) else {
                return 0;
            };
            let snapshot = list.iter().map(|r| (r.id, r.handler.clone())).collect();
            list.retain(|r| !r.once);
            snapshot
        };

        for (id, handler) in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(?topic, subscription = ?id, "event handler panicked");
            }
        }
        snapshot.len()
    }

    /// Number of live registrations on `topic`.
    pub fn handler_count(&self, topic: Topic) -> usize {
        self.table().get(&topic).map_or(0, Vec::len)
    }

    fn register(&self, topic: Topic, once: bool, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.table().entry(topic).or_default().push(Registration {
            id,
            once,
            handler,
        });
        id
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Topic, Vec<Registration>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sessions_changed", &self.handler_count(Topic::SessionsChanged))
            .field("messages_changed", &self.handler_count(Topic::MessagesChanged))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sessions_event() -> ChatEvent {
        ChatEvent::SessionsChanged { sessions: vec![] }
    }

    fn messages_event() -> ChatEvent {
        ChatEvent::MessagesChanged {
            session_id: "session-1".to_string(),
            messages: vec![],
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |label: &'static str| -> Handler {
                let log = log.clone();
                Arc::new(move |_: &ChatEvent| log.lock().unwrap().push(label))
            }
        };
        (log, make)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        for label in ["first", "second", "third"] {
            let handler = make(label);
            emitter.subscribe(Topic::SessionsChanged, move |e| handler(e));
        }

        assert_eq!(emitter.publish(&sessions_event()), 3);
        assert_eq!(*log.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn publish_only_reaches_matching_topic() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let handler = make("messages");
        emitter.subscribe(Topic::MessagesChanged, move |e| handler(e));

        assert_eq!(emitter.publish(&sessions_event()), 0);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(emitter.publish(&messages_event()), 1);
    }

    #[test]
    fn once_handler_fires_a_single_time() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let once = make("once");
        let always = make("always");
        emitter.subscribe_once(Topic::SessionsChanged, move |e| once(e));
        emitter.subscribe(Topic::SessionsChanged, move |e| always(e));

        emitter.publish(&sessions_event());
        emitter.publish(&sessions_event());

        assert_eq!(*log.lock().unwrap(), ["once", "always", "always"]);
        assert_eq!(emitter.handler_count(Topic::SessionsChanged), 1);
    }

    #[test]
    fn once_registration_does_not_remove_regular_one_of_same_handler() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let shared = make("shared");
        let a = shared.clone();
        emitter.subscribe(Topic::SessionsChanged, move |e| a(e));
        emitter.subscribe_once(Topic::SessionsChanged, move |e| shared(e));

        emitter.publish(&sessions_event());
        emitter.publish(&sessions_event());
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn unsubscribe_removes_exact_registration() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let keep = make("keep");
        let dropped = make("drop");
        emitter.subscribe(Topic::SessionsChanged, move |e| keep(e));
        let id = emitter.subscribe(Topic::SessionsChanged, move |e| dropped(e));

        assert!(emitter.unsubscribe(Topic::SessionsChanged, id));
        assert!(!emitter.unsubscribe(Topic::SessionsChanged, id));
        assert!(!emitter.unsubscribe(Topic::MessagesChanged, id));

        emitter.publish(&sessions_event());
        assert_eq!(*log.lock().unwrap(), ["keep"]);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_rest() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let before = make("before");
        let after = make("after");
        emitter.subscribe(Topic::SessionsChanged, move |e| before(e));
        emitter.subscribe(Topic::SessionsChanged, |_| panic!("handler failure"));
        emitter.subscribe(Topic::SessionsChanged, move |e| after(e));

        assert_eq!(emitter.publish(&sessions_event()), 3);
        assert_eq!(*log.lock().unwrap(), ["before", "after"]);
    }

    #[test]
    fn handler_may_reenter_emitter() {
        let emitter = Arc::new(EventEmitter::new());
        let inner = emitter.clone();
        emitter.subscribe(Topic::SessionsChanged, move |_| {
            inner.subscribe(Topic::MessagesChanged, |_| {});
        });

        emitter.publish(&sessions_event());
        assert_eq!(emitter.handler_count(Topic::MessagesChanged), 1);
    }
}
