use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Event, InboundRx, Topic, Transport, TransportError};

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Entry {
    id: u64,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    // registration order
    entries: Vec<Entry>,
}

impl Registry {
    fn is_live(&self, id: u64) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }
}

/// Publish/subscribe channel over the host transport.
///
/// Cloning is cheap; every clone shares the same handler registry.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    transport: Arc<dyn Transport>,
}

impl EventBus {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { registry: Arc::new(Mutex::new(Registry::default())), transport }
    }

    /// Registers `handler` for `topic`. Delivery stops as soon as the returned
    /// [`Subscription`] is disposed or dropped.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut reg = self.registry.lock();
        let id = reg.next_id;
        reg.next_id += 1;
        debug!(%topic, id, "subscribe");
        reg.entries.push(Entry { id, topic, handler: Arc::new(handler) });
        Subscription { id, registry: Arc::downgrade(&self.registry) }
    }

    pub fn handler_count(&self, topic: &Topic) -> usize {
        self.registry.lock().entries.iter().filter(|e| &e.topic == topic).count()
    }

    /// Runs every live handler for the event's topic in registration order.
    /// Returns how many handlers ran.
    pub fn deliver(&self, event: &Event) -> usize {
        let handlers: Vec<(u64, Handler)> = self
            .registry
            .lock()
            .entries
            .iter()
            .filter(|e| e.topic == event.topic)
            .map(|e| (e.id, Arc::clone(&e.handler)))
            .collect();

        let mut ran = 0;
        for (id, handler) in handlers {
            // a handler earlier in this round may have disposed this one
            if !self.registry.lock().is_live(id) {
                continue;
            }
            handler(&event.payload);
            ran += 1;
        }
        ran
    }

    /// Sends a value outward. Local subscribers of the topic see it first,
    /// then the transport gets it. Transport failures are logged and
    /// swallowed: publishing never waits for, nor reports, delivery.
    pub fn publish(&self, topic: Topic, payload: Value) {
        let event = Event::new(topic, payload);
        self.deliver(&event);
        if let Err(err) = self.transport.emit(&event.topic, &event.payload) {
            warn!(topic = %event.topic, error = %err, "publish dropped");
        }
    }

    /// Asks the transport to open a session with `addr`. The outcome arrives
    /// later as an inbound `connect-client` event.
    pub fn request_connect(&self, addr: &str) -> Result<(), TransportError> {
        self.transport.connect(addr)
    }

    /// Delivers every event queued by the transport, without blocking.
    pub fn drain(&self, rx: &InboundRx) -> usize {
        let mut count = 0;
        for event in rx.try_iter() {
            self.deliver(&event);
            count += 1;
        }
        count
    }
}

/// Disposer for one handler registration.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dispose(self) {}

    fn release(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.lock().remove(self.id) {
                debug!(id = self.id, "unsubscribe");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// The subscriptions owned by one scope. Dropping the set releases all of
/// them, whichever way the scope ends.
#[derive(Default)]
#[must_use = "dropping Subscriptions unsubscribes every handler"]
pub struct Subscriptions {
    inner: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sub: Subscription) {
        self.inner.push(sub);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn dispose_all(&mut self) {
        self.inner.clear();
    }
}

impl Extend<Subscription> for Subscriptions {
    fn extend<T: IntoIterator<Item = Subscription>>(&mut self, iter: T) {
        self.inner.extend(iter);
    }
}
