use std::sync::Arc;

use bridge_core::{Bridge, BridgeConfig, ConnectionState, Event, InboundRx, Subscriptions, Transport};
use model::TelemetrySnapshot;
use tracing::warn;

use crate::commands::{Action, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The mounted bridge plus what the terminal last showed.
pub struct ConsoleSession {
    bridge: Bridge,
    inbound: InboundRx,
    subs: Subscriptions,
    default_addr: String,
    shown_state: Option<ConnectionState>,
    shown_snapshot: Option<TelemetrySnapshot>,
}

impl ConsoleSession {
    pub fn new(config: BridgeConfig, transport: Arc<dyn Transport>, inbound: InboundRx, default_addr: String) -> Self {
        let bridge = Bridge::new(config, transport);
        let subs = bridge.mount();
        Self { bridge, inbound, subs, default_addr, shown_state: None, shown_snapshot: None }
    }

    pub fn inbound(&self) -> &InboundRx {
        &self.inbound
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Delivers an event taken off the inbound channel, then whatever queued
    /// up behind it.
    pub fn handle(&self, event: Event) {
        self.bridge.bus().deliver(&event);
        self.bridge.pump(&self.inbound);
    }

    pub fn apply(&self, action: Action) -> Flow {
        let dispatcher = self.bridge.dispatcher();
        let result = match action {
            Action::Key(key) => {
                dispatcher.key_press(key);
                Ok(())
            }
            Action::Speed(speed) => dispatcher.set_speed(speed).map(drop),
            Action::Servo(angle) => dispatcher.set_servo_angle(angle).map(drop),
            Action::Brightness(b) => dispatcher.set_brightness(b).map(drop),
            Action::Nixie(on) => {
                dispatcher.set_nixie(on);
                Ok(())
            }
            Action::Led(on) => {
                dispatcher.set_led(on);
                Ok(())
            }
            Action::Trace(on) => {
                dispatcher.set_trace(on);
                Ok(())
            }
            Action::Ultrasonic(on) => {
                dispatcher.set_ultrasonic(on);
                Ok(())
            }
            Action::Th(on) => {
                dispatcher.set_th(on);
                Ok(())
            }
            Action::Connect(addr) => {
                let addr = addr.unwrap_or_else(|| self.default_addr.clone());
                if let Err(err) = self.bridge.connect(&addr) {
                    println!("! {err}");
                }
                return Flow::Continue;
            }
            Action::Close => {
                if self.bridge.state() == ConnectionState::Connected {
                    dispatcher.close_session();
                } else {
                    println!("! not connected");
                }
                return Flow::Continue;
            }
            Action::Chart => {
                println!("{}", self.bridge.chart());
                return Flow::Continue;
            }
            Action::Status => {
                println!("{}", self.status_line());
                return Flow::Continue;
            }
            Action::Help => {
                println!("{HELP}");
                return Flow::Continue;
            }
            Action::Quit => return Flow::Quit,
        };
        if let Err(err) = result {
            warn!(error = %err, "gesture rejected");
            println!("! {err}");
        }
        Flow::Continue
    }

    /// Prints notifications and anything that changed since the last call.
    pub fn render(&mut self) {
        for note in self.bridge.take_notifications() {
            println!("[{}] {}", note.timestamp(), note.message);
        }
        let state = self.bridge.state();
        let snapshot = *self.bridge.snapshot();
        if self.shown_state != Some(state) || self.shown_snapshot != Some(snapshot) {
            println!("{}", self.status_line());
            self.shown_state = Some(state);
            self.shown_snapshot = Some(snapshot);
        }
    }

    pub fn status_line(&self) -> String {
        let state = match (self.bridge.state(), self.bridge.address()) {
            (ConnectionState::Connected, Some(addr)) => format!("connected {addr}"),
            (state, _) => format!("{state:?}").to_lowercase(),
        };
        format!("{state} | {}", describe(&self.bridge.snapshot()))
    }

    /// Tells the vehicle goodbye when a session is open, and unmounts.
    pub fn shutdown(mut self) {
        if self.bridge.state() == ConnectionState::Connected {
            self.bridge.dispatcher().close_session();
        }
        self.subs.dispose_all();
    }
}

pub fn describe(s: &TelemetrySnapshot) -> String {
    let on = |b: bool| if b { "on" } else { "off" };
    let mut line = format!("speed {}% servo {}° led {} trace {}", s.speed_percent, s.servos, on(s.led), on(s.trace));
    match s.time_brightness {
        Some(b) => line.push_str(&format!(" nixie {b}")),
        None => line.push_str(" nixie off"),
    }
    if let Some(d) = s.distance {
        line.push_str(&format!(" dist {d:.1}cm"));
    }
    if let Some((t, h)) = s.th {
        line.push_str(&format!(" {t:.1}°C {h:.0}%"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{channel, Topic, TransportError};
    use model::SessionOpened;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        emitted: Mutex<Vec<Topic>>,
    }

    impl Transport for Recorder {
        fn emit(&self, topic: &Topic, _payload: &Value) -> Result<(), TransportError> {
            self.emitted.lock().unwrap().push(topic.clone());
            Ok(())
        }

        fn connect(&self, _addr: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn session() -> (ConsoleSession, Arc<Recorder>, bridge_core::InboundTx) {
        let (tx, rx) = channel();
        let rec = Arc::new(Recorder::default());
        let s = ConsoleSession::new(BridgeConfig::default(), rec.clone(), rx, "127.0.0.1:5000".into());
        (s, rec, tx)
    }

    #[test]
    fn connect_uses_default_address() {
        let (s, _rec, tx) = session();
        s.apply(Action::Connect(None));
        assert_eq!(s.bridge().state(), ConnectionState::Connecting);

        tx.send(Event::new(
            Topic::SessionOpened,
            SessionOpened::Connected { addr: "127.0.0.1:5000".into() }.to_payload(),
        ))
        .unwrap();
        let first = s.inbound().recv().unwrap();
        s.handle(first);
        assert!(s.status_line().starts_with("connected 127.0.0.1:5000 |"));
    }

    #[test]
    fn rejected_gesture_publishes_nothing() {
        let (s, rec, _tx) = session();
        assert_eq!(s.apply(Action::Speed(55)), Flow::Continue);
        assert_eq!(s.apply(Action::Brightness(9)), Flow::Continue);
        assert!(rec.emitted.lock().unwrap().is_empty());

        s.apply(Action::Led(true));
        assert_eq!(*rec.emitted.lock().unwrap(), vec![Topic::Command]);
    }

    #[test]
    fn close_without_session_is_local() {
        let (s, rec, _tx) = session();
        s.apply(Action::Close);
        assert!(rec.emitted.lock().unwrap().is_empty());
        assert_eq!(s.apply(Action::Quit), Flow::Quit);
    }

    #[test]
    fn describe_default_snapshot() {
        assert_eq!(
            describe(&TelemetrySnapshot::default()),
            "speed 20% servo 90° led off trace off nixie off"
        );
    }
}
