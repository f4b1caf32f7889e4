use std::sync::Arc;

use model::{Command, Direction, BRIGHTNESS_MAX, BRIGHTNESS_MIN, SERVO_MAX, SERVO_STEP, SPEED_MAX, SPEED_STEP};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{DispatchError, EventBus, TelemetryStore, Topic};

/// Steering servo step. Left raises the angle, right lowers it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Left,
    Right,
}

/// Keyboard shortcuts of the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Navigate(Direction),
    Servo(Rotation),
}

impl Key {
    pub fn from_char(c: char) -> Option<Key> {
        match c.to_ascii_lowercase() {
            'w' => Some(Key::Navigate(Direction::Forward)),
            'a' => Some(Key::Navigate(Direction::Left)),
            's' => Some(Key::Navigate(Direction::BackWard)),
            'd' => Some(Key::Navigate(Direction::Right)),
            ' ' => Some(Key::Navigate(Direction::Brake)),
            'q' => Some(Key::Servo(Rotation::Left)),
            'e' => Some(Key::Servo(Rotation::Right)),
            _ => None,
        }
    }
}

/// Turns operator gestures into commands and publishes each one once.
///
/// Parameters the gesture does not carry (speed for a direction press, the
/// angle to step from, the brightness for a display toggle) come from the
/// current telemetry snapshot.
pub struct Dispatcher {
    bus: EventBus,
    store: Arc<TelemetryStore>,
    direction: Mutex<Direction>,
    default_brightness: u8,
}

impl Dispatcher {
    pub fn new(bus: EventBus, store: Arc<TelemetryStore>, default_brightness: u8) -> Self {
        Self {
            bus,
            store,
            direction: Mutex::new(Direction::Brake),
            default_brightness: default_brightness.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX),
        }
    }

    /// Last direction sent, `Brake` before any.
    pub fn direction(&self) -> Direction {
        *self.direction.lock()
    }

    pub fn navigate(&self, direction: Direction) -> Command {
        *self.direction.lock() = direction;
        let speed = self.store.current().speed_percent;
        self.send(Command::Navigate { direction, speed })
    }

    /// End of a speed drag: re-sends the last direction with the new speed.
    pub fn set_speed(&self, speed: u8) -> Result<Command, DispatchError> {
        if speed > SPEED_MAX || speed % SPEED_STEP != 0 {
            return Err(DispatchError::SpeedOutOfRange(speed));
        }
        let direction = self.direction();
        Ok(self.send(Command::Navigate { direction, speed }))
    }

    pub fn set_trace(&self, enabled: bool) -> Command {
        self.send(Command::Trace { enabled })
    }

    pub fn set_led(&self, enabled: bool) -> Command {
        self.send(Command::Led { enabled })
    }

    pub fn set_ultrasonic(&self, enabled: bool) -> Command {
        self.send(Command::Ultrasonic { enabled })
    }

    pub fn set_th(&self, enabled: bool) -> Command {
        self.send(Command::Th { enabled })
    }

    pub fn set_servo_angle(&self, angle: u8) -> Result<Command, DispatchError> {
        if angle > SERVO_MAX || angle % SERVO_STEP != 0 {
            return Err(DispatchError::AngleOutOfRange(angle));
        }
        Ok(self.send(Command::Servos { angle }))
    }

    /// One 45° step from the reported angle. At the end of the range the
    /// current angle is sent unchanged.
    pub fn rotate_servo(&self, rotation: Rotation) -> Command {
        let angle = self.store.current().servos.min(SERVO_MAX);
        let angle = match rotation {
            Rotation::Left if angle <= SERVO_MAX - SERVO_STEP => angle + SERVO_STEP,
            Rotation::Right if angle >= SERVO_STEP => angle - SERVO_STEP,
            _ => angle,
        };
        self.send(Command::Servos { angle })
    }

    /// Switches the nixie display, keeping the reported brightness.
    pub fn set_nixie(&self, enabled: bool) -> Command {
        let brightness = self
            .store
            .current()
            .time_brightness
            .map(|b| b.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX))
            .unwrap_or(self.default_brightness);
        self.send(Command::Nixie { enabled, brightness })
    }

    /// End of a brightness drag; also turns the display on.
    pub fn set_brightness(&self, brightness: u8) -> Result<Command, DispatchError> {
        if !(BRIGHTNESS_MIN..=BRIGHTNESS_MAX).contains(&brightness) {
            return Err(DispatchError::BrightnessOutOfRange(brightness));
        }
        Ok(self.send(Command::Nixie { enabled: true, brightness }))
    }

    /// Every press publishes at once. Overlapping presses are not merged;
    /// the vehicle acts on whichever arrives last.
    pub fn key_press(&self, key: Key) -> Command {
        match key {
            Key::Navigate(direction) => self.navigate(direction),
            Key::Servo(rotation) => self.rotate_servo(rotation),
        }
    }

    /// Asks the host to drop the vehicle connection, then announces the end
    /// of the session locally.
    pub fn close_session(&self) {
        self.bus.publish(Topic::CloseServer, Value::Null);
        self.bus.publish(Topic::SessionClosed, Value::Null);
    }

    fn send(&self, command: Command) -> Command {
        match serde_json::to_value(command) {
            Ok(payload) => {
                debug!(kind = command.kind(), ?command, "dispatch");
                self.bus.publish(Topic::Command, payload);
            }
            Err(err) => warn!(kind = command.kind(), error = %err, "command not serializable"),
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::tests::RecordingTransport;
    use model::TelemetrySnapshot;
    use serde_json::json;

    fn dispatcher() -> (Dispatcher, Arc<TelemetryStore>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let store = Arc::new(TelemetryStore::new());
        let bus = EventBus::new(transport.clone());
        (Dispatcher::new(bus, Arc::clone(&store), 1), store, transport)
    }

    fn sent(transport: &RecordingTransport) -> Vec<Value> {
        transport
            .emitted
            .lock()
            .iter()
            .filter(|(t, _)| *t == Topic::Command)
            .map(|(_, v)| v.clone())
            .collect()
    }

    #[test]
    fn repeated_navigate_is_published_each_time() {
        let (d, store, transport) = dispatcher();
        store.replace(TelemetrySnapshot { speed_percent: 60, ..Default::default() });

        let a = d.navigate(Direction::Forward);
        let b = d.navigate(Direction::Forward);
        assert_eq!(a, b);
        assert_eq!(a, Command::Navigate { direction: Direction::Forward, speed: 60 });

        let out = sent(&transport);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({"kind": "navigate", "navigate": "Forward", "speed": 60}));
        assert_eq!(out[0], out[1]);
    }

    #[test]
    fn speed_change_reuses_last_direction() {
        let (d, _, transport) = dispatcher();
        assert_eq!(
            d.set_speed(40).unwrap(),
            Command::Navigate { direction: Direction::Brake, speed: 40 }
        );
        d.navigate(Direction::Left);
        assert_eq!(
            d.set_speed(100).unwrap(),
            Command::Navigate { direction: Direction::Left, speed: 100 }
        );
        assert_eq!(d.set_speed(30), Err(DispatchError::SpeedOutOfRange(30)));
        assert_eq!(d.set_speed(120), Err(DispatchError::SpeedOutOfRange(120)));
        assert_eq!(sent(&transport).len(), 3);
    }

    #[test]
    fn overlapping_keys_each_publish() {
        let (d, _, transport) = dispatcher();
        d.key_press(Key::from_char('w').unwrap());
        d.key_press(Key::from_char('a').unwrap());
        let out = sent(&transport);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1]["navigate"], json!("Left"));
        assert_eq!(d.direction(), Direction::Left);
    }

    #[test]
    fn key_map() {
        assert_eq!(Key::from_char(' '), Some(Key::Navigate(Direction::Brake)));
        assert_eq!(Key::from_char('S'), Some(Key::Navigate(Direction::BackWard)));
        assert_eq!(Key::from_char('q'), Some(Key::Servo(Rotation::Left)));
        assert_eq!(Key::from_char('e'), Some(Key::Servo(Rotation::Right)));
        assert_eq!(Key::from_char('x'), None);
    }

    #[test]
    fn servo_steps_stay_in_range() {
        let (d, store, _) = dispatcher();
        assert_eq!(d.rotate_servo(Rotation::Left), Command::Servos { angle: 135 });
        assert_eq!(d.rotate_servo(Rotation::Right), Command::Servos { angle: 45 });

        store.replace(TelemetrySnapshot { servos: 180, ..Default::default() });
        assert_eq!(d.rotate_servo(Rotation::Left), Command::Servos { angle: 180 });
        store.replace(TelemetrySnapshot { servos: 0, ..Default::default() });
        assert_eq!(d.rotate_servo(Rotation::Right), Command::Servos { angle: 0 });
    }

    #[test]
    fn servo_angle_is_validated() {
        let (d, _, transport) = dispatcher();
        assert_eq!(d.set_servo_angle(135), Ok(Command::Servos { angle: 135 }));
        assert_eq!(d.set_servo_angle(100), Err(DispatchError::AngleOutOfRange(100)));
        assert_eq!(d.set_servo_angle(225), Err(DispatchError::AngleOutOfRange(225)));
        assert_eq!(sent(&transport).len(), 1);
    }

    #[test]
    fn nixie_toggle_and_brightness() {
        let (d, store, _) = dispatcher();
        assert_eq!(d.set_nixie(true), Command::Nixie { enabled: true, brightness: 1 });

        store.replace(TelemetrySnapshot { time_brightness: Some(5), ..Default::default() });
        assert_eq!(d.set_nixie(false), Command::Nixie { enabled: false, brightness: 5 });

        assert_eq!(d.set_brightness(7), Ok(Command::Nixie { enabled: true, brightness: 7 }));
        assert_eq!(d.set_brightness(0), Err(DispatchError::BrightnessOutOfRange(0)));
        assert_eq!(d.set_brightness(8), Err(DispatchError::BrightnessOutOfRange(8)));
    }

    #[test]
    fn toggles_map_to_their_kind() {
        let (d, _, transport) = dispatcher();
        d.set_trace(true);
        d.set_led(false);
        d.set_ultrasonic(true);
        d.set_th(true);
        let kinds: Vec<_> = sent(&transport).iter().map(|v| v["kind"].clone()).collect();
        assert_eq!(kinds, vec![json!("trace"), json!("led"), json!("ultrasonic"), json!("th")]);
    }

    #[test]
    fn close_session_publishes_both_topics_in_order() {
        let (d, _, transport) = dispatcher();
        d.close_session();
        let topics: Vec<_> = transport.emitted.lock().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(topics, vec![Topic::CloseServer, Topic::SessionClosed]);
    }
}
