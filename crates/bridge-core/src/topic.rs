use std::fmt;

use serde_json::Value;

/// Named channel on the bus. Known topics map to their boundary names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Inbound telemetry snapshot (`statistics`).
    Telemetry,
    /// Inbound operator message (`notify`).
    Notify,
    /// Inbound connect result (`connect-client`).
    SessionOpened,
    /// Session termination (`close-client`), inbound from the host and
    /// announced locally on operator close.
    SessionClosed,
    /// Outbound command (`command-server`).
    Command,
    /// Outbound request to drop the vehicle connection (`close-server`).
    CloseServer,
    Other(String),
}

impl Topic {
    pub fn name(&self) -> &str {
        match self {
            Topic::Telemetry => "statistics",
            Topic::Notify => "notify",
            Topic::SessionOpened => "connect-client",
            Topic::SessionClosed => "close-client",
            Topic::Command => "command-server",
            Topic::CloseServer => "close-server",
            Topic::Other(name) => name.as_str(),
        }
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        match name {
            "statistics" => Topic::Telemetry,
            "notify" => Topic::Notify,
            "connect-client" => Topic::SessionOpened,
            "close-client" => Topic::SessionClosed,
            "command-server" => Topic::Command,
            "close-server" => Topic::CloseServer,
            other => Topic::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub topic: Topic,
    pub payload: Value,
}

impl Event {
    pub fn new(topic: Topic, payload: Value) -> Self {
        Self { topic, payload }
    }

    pub fn bare(topic: Topic) -> Self {
        Self { topic, payload: Value::Null }
    }
}
