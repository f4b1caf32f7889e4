use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use model::{Notification, TelemetrySnapshot};
use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tracing::info;

struct Current {
    snapshot: Arc<TelemetrySnapshot>,
    fresh: bool,
    updates: u64,
}

/// Holder of the latest telemetry snapshot.
///
/// Readers get an `Arc` to a complete value; a replace swaps the pointer, so
/// nobody ever observes a half-written snapshot.
pub struct TelemetryStore {
    current: RwLock<Current>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Current {
                snapshot: Arc::new(TelemetrySnapshot::default()),
                fresh: false,
                updates: 0,
            }),
        }
    }

    pub fn current(&self) -> Arc<TelemetrySnapshot> {
        Arc::clone(&self.current.read().snapshot)
    }

    pub fn replace(&self, snapshot: TelemetrySnapshot) {
        let mut cur = self.current.write();
        cur.snapshot = Arc::new(snapshot);
        cur.fresh = true;
        cur.updates += 1;
    }

    /// Back to session-start defaults; the value is no longer fresh.
    pub fn reset(&self) {
        let mut cur = self.current.write();
        cur.snapshot = Arc::new(TelemetrySnapshot::default());
        cur.fresh = false;
    }

    /// `false` until the first telemetry after a reset.
    pub fn is_fresh(&self) -> bool {
        self.current.read().fresh
    }

    pub fn updates(&self) -> u64 {
        self.current.read().updates
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue of short-lived operator messages.
pub struct Notifier {
    queue: Mutex<VecDeque<Notification>>,
    ttl: Duration,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self { queue: Mutex::new(VecDeque::new()), ttl }
    }

    pub fn raise(&self, message: impl Into<String>) {
        let n = Notification::new(message);
        info!(message = %n.message, "notify");
        self.queue.lock().push_back(n);
    }

    /// Messages that have not expired yet, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let now = OffsetDateTime::now_utc();
        let mut q = self.queue.lock();
        q.retain(|n| !n.is_expired(now, self.ttl));
        q.iter().cloned().collect()
    }

    /// Takes every pending message, expired or not.
    pub fn drain(&self) -> Vec<Notification> {
        self.queue.lock().drain(..).collect()
    }
}
