use std::env;
use std::time::Duration;

use analysis::DEFAULT_CAPACITY;
use model::BRIGHTNESS_MIN;

#[derive(Clone, Debug, PartialEq)]
pub struct BridgeConfig {
    /// Samples kept per chart series.
    pub rolling_capacity: usize,
    /// How long a notification stays visible.
    pub notify_ttl: Duration,
    /// Brightness sent when the display is switched on from off.
    pub default_brightness: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rolling_capacity: DEFAULT_CAPACITY,
            notify_ttl: Duration::from_millis(1000),
            default_brightness: BRIGHTNESS_MIN,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `CAR_ROLLING_CAPACITY`, `CAR_NOTIFY_TTL_MS` and
    /// `CAR_NIXIE_BRIGHTNESS` when they parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            rolling_capacity: lookup("CAR_ROLLING_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rolling_capacity),
            notify_ttl: lookup("CAR_NOTIFY_TTL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.notify_ttl),
            default_brightness: lookup("CAR_NIXIE_BRIGHTNESS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_brightness),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_and_falls_back() {
        let vars: HashMap<&str, &str> =
            [("CAR_ROLLING_CAPACITY", "25"), ("CAR_NOTIFY_TTL_MS", "not-a-number")].into();
        let cfg = BridgeConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.rolling_capacity, 25);
        assert_eq!(cfg.notify_ttl, Duration::from_millis(1000));
        assert_eq!(cfg.default_brightness, 1);
    }
}
