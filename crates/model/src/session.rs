use serde_json::{json, Map, Value};

/// Outcome of an operator connect attempt, as reported on `connect-client`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOpened {
    Connected { addr: String },
    Failed { msg: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("session payload is not valid JSON: {0}")]
    NotJson(String),
    #[error("session payload is not an object")]
    NotObject,
    #[error("session payload has no boolean `status`")]
    MissingStatus,
    #[error("session payload is missing `{0}`")]
    MissingField(&'static str),
}

impl SessionOpened {
    /// Decodes the discriminated payload.
    ///
    /// The host encodes the record as a JSON string inside the event, so a
    /// string payload is parsed once more before validation. A bare object is
    /// accepted as well.
    pub fn decode(payload: &Value) -> Result<Self, DecodeError> {
        match payload {
            Value::String(text) => {
                let inner: Value =
                    serde_json::from_str(text).map_err(|e| DecodeError::NotJson(e.to_string()))?;
                Self::decode_record(&inner)
            }
            other => Self::decode_record(other),
        }
    }

    fn decode_record(value: &Value) -> Result<Self, DecodeError> {
        let record = value.as_object().ok_or(DecodeError::NotObject)?;
        let status = record
            .get("status")
            .and_then(Value::as_bool)
            .ok_or(DecodeError::MissingStatus)?;

        if status {
            let addr = string_field(record, "addr")?;
            Ok(SessionOpened::Connected { addr })
        } else {
            let msg = string_field(record, "msg")?;
            Ok(SessionOpened::Failed { msg })
        }
    }

    /// Encodes the payload the way the host emits it.
    pub fn to_payload(&self) -> Value {
        let record = match self {
            SessionOpened::Connected { addr } => json!({"status": true, "addr": addr}),
            SessionOpened::Failed { msg } => json!({"status": false, "msg": msg}),
        };
        Value::String(record.to_string())
    }
}

fn string_field(record: &Map<String, Value>, name: &'static str) -> Result<String, DecodeError> {
    record
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(DecodeError::MissingField(name))
}
