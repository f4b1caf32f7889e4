use std::time::Duration;

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Short-lived message shown to the operator.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub message: String,
    pub raised_at: OffsetDateTime,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message, OffsetDateTime::now_utc())
    }

    pub fn at(message: impl Into<String>, raised_at: OffsetDateTime) -> Self {
        Self { message: message.into(), raised_at }
    }

    pub fn is_expired(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        now - self.raised_at > ttl
    }

    pub fn timestamp(&self) -> String {
        self.raised_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.raised_at.unix_timestamp().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl() {
        let raised = OffsetDateTime::UNIX_EPOCH;
        let n = Notification::at("connection closed", raised);
        let ttl = Duration::from_millis(1000);
        assert!(!n.is_expired(raised + Duration::from_millis(500), ttl));
        assert!(n.is_expired(raised + Duration::from_millis(1500), ttl));
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let n = Notification::at("x", OffsetDateTime::UNIX_EPOCH);
        assert_eq!(n.timestamp(), "1970-01-01T00:00:00Z");
    }
}
