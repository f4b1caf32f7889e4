use std::sync::Arc;

use analysis::{RollingSample, Summary};
use model::{Notification, SessionOpened, TelemetrySnapshot};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    BridgeConfig, ConnectionState, Dispatcher, EventBus, InboundRx, Lifecycle, LifecycleError, Notifier,
    Subscriptions, TelemetryStore, Topic, Transition, Transport,
};

/// State touched by the inbound handlers.
struct Shared {
    store: Arc<TelemetryStore>,
    rolling: Mutex<RollingSample>,
    lifecycle: Mutex<Lifecycle>,
    notifier: Notifier,
}

impl Shared {
    fn on_telemetry(&self, payload: &Value) {
        if self.lifecycle.lock().state() != ConnectionState::Connected {
            debug!("telemetry outside a session");
            return;
        }
        match serde_json::from_value::<TelemetrySnapshot>(payload.clone()) {
            Ok(snapshot) => {
                self.rolling.lock().push_snapshot(&snapshot);
                self.store.replace(snapshot);
            }
            Err(err) => warn!(error = %err, "telemetry dropped"),
        }
    }

    fn on_notify(&self, payload: &Value) {
        match payload {
            Value::String(msg) => self.notifier.raise(msg.clone()),
            Value::Null => {}
            other => self.notifier.raise(other.to_string()),
        }
    }

    fn on_session_opened(&self, payload: &Value) {
        let transition = match SessionOpened::decode(payload) {
            Ok(opened) => self.lifecycle.lock().on_opened(&opened),
            Err(err) => {
                warn!(error = %err, "bad connect-client payload");
                self.notifier.raise(err.to_string());
                self.lifecycle.lock().abort_attempt();
                return;
            }
        };
        match transition {
            Transition::Opened { addr } => {
                self.reset_session();
                self.notifier.raise(format!("connected: {addr}"));
            }
            Transition::Failed { msg } => self.notifier.raise(msg),
            Transition::Closed | Transition::Ignored => {}
        }
    }

    fn on_session_closed(&self) {
        if self.lifecycle.lock().on_closed() == Transition::Closed {
            self.reset_session();
            self.notifier.raise("connection closed");
        }
    }

    // snapshot and chart history belong to one session
    fn reset_session(&self) {
        self.store.reset();
        self.rolling.lock().clear();
    }
}

/// The operator side of the bridge: owns the bus, the snapshot, the chart
/// buffer, the lifecycle machine and the dispatcher.
pub struct Bridge {
    bus: EventBus,
    shared: Arc<Shared>,
    dispatcher: Dispatcher,
}

impl Bridge {
    pub fn new(config: BridgeConfig, transport: Arc<dyn Transport>) -> Self {
        let bus = EventBus::new(transport);
        let store = Arc::new(TelemetryStore::new());
        let shared = Arc::new(Shared {
            store: Arc::clone(&store),
            rolling: Mutex::new(RollingSample::new(config.rolling_capacity)),
            lifecycle: Mutex::new(Lifecycle::new()),
            notifier: Notifier::new(config.notify_ttl),
        });
        let dispatcher = Dispatcher::new(bus.clone(), store, config.default_brightness);
        Self { bus, shared, dispatcher }
    }

    /// Registers the inbound handlers. They stay active until the returned
    /// set is dropped; mount again after that to resume.
    pub fn mount(&self) -> Subscriptions {
        let mut subs = Subscriptions::new();

        let shared = Arc::clone(&self.shared);
        subs.push(self.bus.subscribe(Topic::Telemetry, move |p| shared.on_telemetry(p)));

        let shared = Arc::clone(&self.shared);
        subs.push(self.bus.subscribe(Topic::Notify, move |p| shared.on_notify(p)));

        let shared = Arc::clone(&self.shared);
        subs.push(self.bus.subscribe(Topic::SessionClosed, move |_| shared.on_session_closed()));

        let shared = Arc::clone(&self.shared);
        subs.push(self.bus.subscribe(Topic::SessionOpened, move |p| shared.on_session_opened(p)));

        subs
    }

    /// Operator connect. The lifecycle enters Connecting and the transport
    /// is asked to open the session; the result arrives on `connect-client`.
    ///
    /// `Ok` means an attempt is in flight. If the transport refuses the
    /// request the attempt is rolled back to Disconnected and
    /// [`LifecycleError::Refused`] is returned; no notification is raised.
    pub fn connect(&self, addr: &str) -> Result<(), LifecycleError> {
        self.shared.lifecycle.lock().begin_connect(addr)?;
        if let Err(err) = self.bus.request_connect(addr) {
            warn!(addr, error = %err, "connect request failed");
            self.shared.lifecycle.lock().abort_attempt();
            return Err(LifecycleError::Refused(err.to_string()));
        }
        Ok(())
    }

    /// Runs the handlers for everything the transport queued so far.
    pub fn pump(&self, rx: &InboundRx) -> usize {
        self.bus.drain(rx)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.shared.store.current()
    }

    /// Whether the snapshot came from the vehicle during this session.
    pub fn snapshot_is_fresh(&self) -> bool {
        self.shared.store.is_fresh()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.lock().state()
    }

    pub fn address(&self) -> Option<String> {
        self.shared.lifecycle.lock().address().map(str::to_owned)
    }

    pub fn chart(&self) -> Value {
        self.shared.rolling.lock().to_chart_json()
    }

    pub fn summary(&self) -> Summary {
        self.shared.rolling.lock().summary()
    }

    pub fn with_rolling<R>(&self, f: impl FnOnce(&RollingSample) -> R) -> R {
        f(&self.shared.rolling.lock())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.shared.notifier.active()
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        self.shared.notifier.drain()
    }
}
