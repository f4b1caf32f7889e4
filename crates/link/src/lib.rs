//! TCP link to the vehicle, exposed to the bridge as a [`Transport`].
//!
//! Each connect request spawns a session task on the tokio runtime. The task
//! reports the outcome on `connect-client`, forwards statistics frames as
//! `statistics` events, and announces `close-client` when the vehicle hangs
//! up. Outbound commands are framed and queued to the session's writer.

pub mod frame;
mod session;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_core::{InboundTx, Topic, Transport, TransportError};
use bytes::Bytes;
use model::Command;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub connect_timeout: Duration,
    /// Outbound frames buffered per session before commands are dropped.
    pub queue_depth: usize,
    pub read_buffer: usize,
}

impl LinkConfig {
    /// Queue depth as used by a session; tokio channels need at least one slot.
    pub fn effective_queue_depth(&self) -> usize {
        self.queue_depth.max(1)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(5), queue_depth: 64, read_buffer: 1024 }
    }
}

/// Handle on the running session task.
pub(crate) struct ActiveLink {
    pub(crate) id: u64,
    pub(crate) frames: mpsc::Sender<Bytes>,
    pub(crate) shutdown: Arc<Notify>,
}

pub(crate) type ActiveSlot = Arc<Mutex<Option<ActiveLink>>>;

pub struct LinkTransport {
    cfg: LinkConfig,
    runtime: Handle,
    inbound: InboundTx,
    active: ActiveSlot,
    next_id: AtomicU64,
}

impl LinkTransport {
    pub fn new(cfg: LinkConfig, runtime: Handle, inbound: InboundTx) -> Self {
        Self { cfg, runtime, inbound, active: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(1) }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    fn send_command(&self, payload: &Value) -> Result<(), TransportError> {
        let command: Command = serde_json::from_value(payload.clone()).context("bad command payload")?;
        let frame = frame::encode_request(&command);
        let active = self.active.lock();
        let link = active.as_ref().ok_or(TransportError::NotConnected)?;
        match link.frames.try_send(frame) {
            Ok(()) => {
                debug!(kind = command.kind(), "command queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind = command.kind(), "outbound queue full, command dropped");
                Err(TransportError::Msg("outbound queue full".into()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::NotConnected),
        }
    }

    /// Frees the slot at once so a reconnect is not refused while the old
    /// task is still winding down.
    fn close(&self) {
        if let Some(link) = self.active.lock().take() {
            debug!(id = link.id, "closing session");
            link.shutdown.notify_one();
        }
    }
}

impl Transport for LinkTransport {
    fn emit(&self, topic: &Topic, payload: &Value) -> Result<(), TransportError> {
        match topic {
            Topic::Command => self.send_command(payload),
            Topic::CloseServer => {
                self.close();
                Ok(())
            }
            // the rest are announcements for local subscribers only
            _ => Ok(()),
        }
    }

    fn connect(&self, addr: &str) -> Result<(), TransportError> {
        if self.is_active() {
            return Err(TransportError::Msg("a session is already open".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.runtime.spawn(session::run(
            id,
            addr.to_owned(),
            self.cfg.clone(),
            self.inbound.clone(),
            Arc::clone(&self.active),
        ));
        Ok(())
    }
}
