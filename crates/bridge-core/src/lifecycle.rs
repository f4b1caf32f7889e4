use model::SessionOpened;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::LifecycleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// What an input did to the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Connecting -> Connected.
    Opened { addr: String },
    /// Connecting -> Disconnected, or a failure reported while idle.
    Failed { msg: String },
    /// Connected -> Disconnected.
    Closed,
    /// The input is not valid in the current state; nothing changed.
    Ignored,
}

/// Disconnected -> Connecting -> Connected -> Disconnected.
///
/// A failed or aborted connect attempt sends Connecting back to
/// Disconnected. No other edge exists.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: ConnectionState,
    pending: Option<String>,
    addr: Option<String>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Address of the active session, only while connected.
    pub fn address(&self) -> Option<&str> {
        self.addr.as_deref()
    }

    /// Address of the outstanding connect attempt, if any.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn begin_connect(&mut self, addr: &str) -> Result<(), LifecycleError> {
        match self.state {
            ConnectionState::Connecting => return Err(LifecycleError::AttemptPending),
            ConnectionState::Connected => {
                return Err(LifecycleError::AlreadyConnected(self.addr.clone().unwrap_or_default()))
            }
            ConnectionState::Disconnected => {}
        }
        validate_addr(addr)?;
        info!(addr, "connecting");
        self.state = ConnectionState::Connecting;
        self.pending = Some(addr.to_owned());
        Ok(())
    }

    pub fn on_opened(&mut self, opened: &SessionOpened) -> Transition {
        match (self.state, opened) {
            (ConnectionState::Connecting, SessionOpened::Connected { addr }) => {
                info!(addr = %addr, "connected");
                self.state = ConnectionState::Connected;
                self.pending = None;
                self.addr = Some(addr.clone());
                Transition::Opened { addr: addr.clone() }
            }
            (ConnectionState::Connecting, SessionOpened::Failed { msg }) => {
                warn!(msg = %msg, "connect failed");
                self.to_disconnected();
                Transition::Failed { msg: msg.clone() }
            }
            (ConnectionState::Disconnected, SessionOpened::Failed { msg }) => {
                Transition::Failed { msg: msg.clone() }
            }
            (state, opened) => {
                debug!(?state, ?opened, "stray connect result");
                Transition::Ignored
            }
        }
    }

    /// Ends a pending attempt whose result will never arrive in usable form
    /// (undecodable payload, transport refused the request).
    pub fn abort_attempt(&mut self) -> Transition {
        if self.state == ConnectionState::Connecting {
            warn!(addr = ?self.pending, "connect attempt aborted");
            self.to_disconnected();
            Transition::Failed { msg: String::from("connect attempt aborted") }
        } else {
            Transition::Ignored
        }
    }

    pub fn on_closed(&mut self) -> Transition {
        if self.state == ConnectionState::Connected {
            info!(addr = ?self.addr, "session closed");
            self.to_disconnected();
            Transition::Closed
        } else {
            debug!(state = ?self.state, "close without session");
            Transition::Ignored
        }
    }

    fn to_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.pending = None;
        self.addr = None;
    }
}

fn validate_addr(addr: &str) -> Result<(), LifecycleError> {
    let invalid = || LifecycleError::InvalidAddress(addr.to_owned());
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.trim().is_empty() {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(addr: &str) -> Lifecycle {
        let mut lc = Lifecycle::new();
        lc.begin_connect(addr).unwrap();
        lc.on_opened(&SessionOpened::Connected { addr: addr.into() });
        lc
    }

    #[test]
    fn full_cycle() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.state(), ConnectionState::Disconnected);

        lc.begin_connect("192.168.1.10:5000").unwrap();
        assert_eq!(lc.state(), ConnectionState::Connecting);
        assert_eq!(lc.pending(), Some("192.168.1.10:5000"));

        let t = lc.on_opened(&SessionOpened::Connected { addr: "192.168.1.10:5000".into() });
        assert_eq!(t, Transition::Opened { addr: "192.168.1.10:5000".into() });
        assert_eq!(lc.state(), ConnectionState::Connected);
        assert_eq!(lc.address(), Some("192.168.1.10:5000"));

        assert_eq!(lc.on_closed(), Transition::Closed);
        assert_eq!(lc.state(), ConnectionState::Disconnected);
        assert_eq!(lc.address(), None);

        // Disconnected is re-enterable
        assert!(lc.begin_connect("10.0.0.2:5000").is_ok());
    }

    #[test]
    fn failure_returns_to_disconnected() {
        let mut lc = Lifecycle::new();
        lc.begin_connect("127.0.0.1:5000").unwrap();
        let t = lc.on_opened(&SessionOpened::Failed { msg: "timeout".into() });
        assert_eq!(t, Transition::Failed { msg: "timeout".into() });
        assert_eq!(lc.state(), ConnectionState::Disconnected);
        assert_eq!(lc.pending(), None);
    }

    #[test]
    fn aborted_attempt_returns_to_disconnected() {
        let mut lc = Lifecycle::new();
        lc.begin_connect("127.0.0.1:5000").unwrap();
        assert!(matches!(lc.abort_attempt(), Transition::Failed { .. }));
        assert_eq!(lc.state(), ConnectionState::Disconnected);
        assert_eq!(lc.abort_attempt(), Transition::Ignored);
    }

    #[test]
    fn pending_attempt_rejects_a_second_connect() {
        let mut lc = Lifecycle::new();
        lc.begin_connect("127.0.0.1:5000").unwrap();
        assert_eq!(lc.begin_connect("127.0.0.1:5001"), Err(LifecycleError::AttemptPending));
        assert_eq!(lc.pending(), Some("127.0.0.1:5000"));
    }

    #[test]
    fn connected_rejects_connect() {
        let mut lc = connected("127.0.0.1:5000");
        assert_eq!(
            lc.begin_connect("127.0.0.1:5001"),
            Err(LifecycleError::AlreadyConnected("127.0.0.1:5000".into()))
        );
        assert_eq!(lc.state(), ConnectionState::Connected);
    }

    #[test]
    fn unlisted_edges_are_ignored() {
        let mut lc = Lifecycle::new();
        // Disconnected --success--> Connected does not exist
        let t = lc.on_opened(&SessionOpened::Connected { addr: "1.2.3.4:5".into() });
        assert_eq!(t, Transition::Ignored);
        assert_eq!(lc.state(), ConnectionState::Disconnected);
        assert_eq!(lc.on_closed(), Transition::Ignored);

        // Connecting --close--> is not an edge either
        lc.begin_connect("1.2.3.4:5").unwrap();
        assert_eq!(lc.on_closed(), Transition::Ignored);
        assert_eq!(lc.state(), ConnectionState::Connecting);

        // a failure report while connected does not drop the session
        let mut lc = connected("1.2.3.4:5");
        assert_eq!(lc.on_opened(&SessionOpened::Failed { msg: "late".into() }), Transition::Ignored);
        assert_eq!(lc.state(), ConnectionState::Connected);
    }

    #[test]
    fn failure_while_idle_is_reported_without_moving() {
        let mut lc = Lifecycle::new();
        let t = lc.on_opened(&SessionOpened::Failed { msg: "refused".into() });
        assert_eq!(t, Transition::Failed { msg: "refused".into() });
        assert_eq!(lc.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn rejects_malformed_addresses() {
        let mut lc = Lifecycle::new();
        for addr in ["", "localhost", ":5000", "host:port", "host:70000"] {
            assert_eq!(lc.begin_connect(addr), Err(LifecycleError::InvalidAddress(addr.into())));
        }
        assert_eq!(lc.state(), ConnectionState::Disconnected);
        assert!(lc.begin_connect("[::1]:5000").is_ok());
    }
}
