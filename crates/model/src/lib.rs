//! Data model shared by the bridge, the link and the console.
//!
//! Everything here is a plain value: the telemetry snapshot reported by the
//! vehicle, the commands an operator can send, and the payloads that travel
//! on the session lifecycle topics.

use serde::{Deserialize, Serialize};

mod notification;
mod session;

pub use notification::Notification;
pub use session::{DecodeError, SessionOpened};

pub const DEFAULT_SPEED_PERCENT: u8 = 20;
pub const DEFAULT_SERVO_ANGLE: u8 = 90;

pub const SPEED_STEP: u8 = 20;
pub const SPEED_MAX: u8 = 100;

pub const SERVO_STEP: u8 = 45;
pub const SERVO_MAX: u8 = 180;

pub const BRIGHTNESS_MIN: u8 = 1;
pub const BRIGHTNESS_MAX: u8 = 7;

/// Full view of the vehicle state at one point in time.
///
/// A snapshot is never patched: every telemetry event carries a complete
/// value which replaces the previous one wholesale. Values are passed
/// through exactly as the vehicle reports them.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct TelemetrySnapshot {
    /// Nixie display brightness (1..=7), `None` when the display is off.
    pub time_brightness: Option<u8>,
    pub speed_percent: u8,
    /// Ultrasonic distance in cm, `None` when the sensor is off.
    pub distance: Option<f32>,
    pub servos: u8,
    pub led: bool,
    /// (temperature °C, humidity %), `None` when the sensor is off.
    pub th: Option<(f32, f32)>,
    pub trace: bool,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            time_brightness: None,
            speed_percent: DEFAULT_SPEED_PERCENT,
            distance: None,
            servos: DEFAULT_SERVO_ANGLE,
            led: false,
            th: None,
            trace: false,
        }
    }
}

impl TelemetrySnapshot {
    pub fn nixie_enabled(&self) -> bool {
        self.time_brightness.is_some()
    }

    pub fn ultrasonic_enabled(&self) -> bool {
        self.distance.is_some()
    }

    pub fn th_enabled(&self) -> bool {
        self.th.is_some()
    }

    pub fn temperature(&self) -> Option<f32> {
        self.th.map(|(t, _)| t)
    }

    pub fn humidity(&self) -> Option<f32> {
        self.th.map(|(_, h)| h)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    BackWard,
    Left,
    Right,
    Brake,
}

/// One operator intent. Serialized as `{"kind": <tag>, ...fields}`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Command {
    Navigate {
        #[serde(rename = "navigate")]
        direction: Direction,
        speed: u8,
    },
    Trace { enabled: bool },
    Servos { angle: u8 },
    Led { enabled: bool },
    Nixie { enabled: bool, brightness: u8 },
    Ultrasonic { enabled: bool },
    Th { enabled: bool },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Navigate { .. } => "navigate",
            Command::Trace { .. } => "trace",
            Command::Servos { .. } => "servos",
            Command::Led { .. } => "led",
            Command::Nixie { .. } => "nixie",
            Command::Ultrasonic { .. } => "ultrasonic",
            Command::Th { .. } => "th",
        }
    }
}
