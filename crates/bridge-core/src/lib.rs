//! Telemetry & command bridge between the operator console and the vehicle.
//!
//! The [`EventBus`] is the only part that talks to the host transport. The
//! [`Bridge`] mounts the inbound handlers that keep the telemetry snapshot,
//! the rolling chart buffer and the connection lifecycle up to date, and the
//! [`Dispatcher`] turns operator gestures into published commands.
//!
//! All handlers run on whichever thread drains the inbound channel; the
//! transport only ever enqueues [`Event`]s.

mod bridge;
mod bus;
mod config;
mod dispatcher;
mod error;
mod lifecycle;
mod store;
mod topic;

pub use bridge::Bridge;
pub use bus::{EventBus, Subscription, Subscriptions};
pub use config::BridgeConfig;
pub use dispatcher::{Dispatcher, Key, Rotation};
pub use error::{DispatchError, LifecycleError, TransportError};
pub use lifecycle::{ConnectionState, Lifecycle, Transition};
pub use store::{Notifier, TelemetryStore};
pub use topic::{Event, Topic};

pub type InboundTx = crossbeam_channel::Sender<Event>;
pub type InboundRx = crossbeam_channel::Receiver<Event>;

/// The host side of the bus.
///
/// Implementations must not block: outbound events are queued and the result
/// of a connect request comes back later as an inbound `connect-client`
/// event.
pub trait Transport: Send + Sync {
    fn emit(&self, topic: &Topic, payload: &serde_json::Value) -> Result<(), TransportError>;
    fn connect(&self, addr: &str) -> Result<(), TransportError>;
}

pub fn channel() -> (InboundTx, InboundRx) {
    crossbeam_channel::unbounded()
}
