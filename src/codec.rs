//! Wire codec for channel events.
//!
//! An event occurrence travels across the bridge as a single JSON string:
//!
//! ```text
//! {"event":"greet","payload":"[\"hello\",42]"}
//! ```
//!
//! The `payload` field is itself JSON text (the argument list encoded a
//! second time). The backend side of the bridge uses the same layout, so
//! both encode steps and both decode steps must stay exactly as they are.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced while encoding or decoding an envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Arguments could not be represented as JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The inbound string is not a valid envelope.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl CodecError {
    fn serialization<E: std::fmt::Display>(err: E) -> Self {
        CodecError::Serialization(err.to_string())
    }

    fn deserialization<E: std::fmt::Display>(err: E) -> Self {
        CodecError::Deserialization(err.to_string())
    }
}

/// One decoded event occurrence: the event name and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event: String,
    pub payload: Vec<Value>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, payload: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Encode this envelope into its wire string.
    pub fn encode(&self) -> Result<String, CodecError> {
        MessageCodec::serialize(&self.event, &self.payload)
    }

    pub fn args(&self) -> &[Value] {
        &self.payload
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    event: &'a str,
    payload: String,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    event: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

/// Stateless encoder/decoder for the channel wire format.
pub struct MessageCodec;

impl MessageCodec {
    /// Serialize an event name and its argument list into one wire string.
    pub fn serialize(event: &str, args: &[Value]) -> Result<String, CodecError> {
        let payload = serde_json::to_string(args).map_err(CodecError::serialization)?;
        Self::wrap(event, payload)
    }

    /// Serialize any value that serializes to a JSON array (tuples, vectors,
    /// slices) as the argument list.
    ///
    /// ```rust,ignore
    /// let wire = MessageCodec::serialize_args("greet", &("hello", 42))?;
    /// ```
    pub fn serialize_args<A>(event: &str, args: &A) -> Result<String, CodecError>
    where
        A: Serialize + ?Sized,
    {
        let value = serde_json::to_value(args).map_err(CodecError::serialization)?;
        match value {
            Value::Array(items) => Self::serialize(event, &items),
            other => Err(CodecError::Serialization(format!(
                "event arguments must serialize to a sequence, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Decode a wire string back into an [`Envelope`].
    ///
    /// A missing or null `payload` yields no arguments. A payload that
    /// decodes to something other than an array becomes the single argument.
    pub fn deserialize(message: &str) -> Result<Envelope, CodecError> {
        let inbound: InboundEnvelope =
            serde_json::from_str(message).map_err(CodecError::deserialization)?;

        let event = inbound
            .event
            .ok_or_else(|| CodecError::Deserialization("envelope has no event name".to_string()))?;

        let payload = match inbound.payload {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(text)) => {
                match serde_json::from_str::<Value>(&text).map_err(CodecError::deserialization)? {
                    Value::Array(items) => items,
                    single => vec![single],
                }
            }
            Some(other) => {
                return Err(CodecError::Deserialization(format!(
                    "envelope payload must be JSON text, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(Envelope { event, payload })
    }

    fn wrap(event: &str, payload: String) -> Result<String, CodecError> {
        serde_json::to_string(&OutboundEnvelope { event, payload })
            .map_err(CodecError::serialization)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_is_encoded_twice() {
        let wire = MessageCodec::serialize("greet", &[json!("hello"), json!(42)]).unwrap();

        let outer: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(outer["event"], json!("greet"));
        assert_eq!(outer["payload"], json!("[\"hello\",42]"));
    }

    #[test]
    fn decodes_what_it_encodes() {
        let args = vec![
            json!("hello"),
            json!(42),
            json!({"nested": [1, 2, {"deep": null}]}),
            json!([true, false]),
            Value::Null,
        ];
        let wire = MessageCodec::serialize("mixed", &args).unwrap();

        let envelope = MessageCodec::deserialize(&wire).unwrap();
        assert_eq!(envelope, Envelope::new("mixed", args));
    }

    #[test]
    fn empty_argument_list() {
        let wire = MessageCodec::serialize("ping", &[]).unwrap();
        assert_eq!(wire, r#"{"event":"ping","payload":"[]"}"#);

        let envelope = MessageCodec::deserialize(&wire).unwrap();
        assert!(envelope.payload.is_empty());
    }

    #[test]
    fn serialize_args_accepts_tuples() {
        let wire = MessageCodec::serialize_args("greet", &("hello", 42)).unwrap();
        let envelope = MessageCodec::deserialize(&wire).unwrap();
        assert_eq!(envelope.payload, vec![json!("hello"), json!(42)]);
    }

    #[test]
    fn serialize_args_rejects_non_sequences() {
        let err = MessageCodec::serialize_args("greet", &json!({"a": 1})).unwrap_err();
        assert!(matches!(err, CodecError::Serialization(_)));
    }

    #[test]
    fn serialize_args_reports_unrepresentable_values() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8, 2], "bytes as key");

        let err = MessageCodec::serialize_args("bad", &(map,)).unwrap_err();
        assert!(matches!(err, CodecError::Serialization(_)), "{err}");
    }

    #[test]
    fn missing_payload_means_no_arguments() {
        let envelope = MessageCodec::deserialize(r#"{"event":"bare"}"#).unwrap();
        assert_eq!(envelope, Envelope::new("bare", Vec::new()));

        let envelope = MessageCodec::deserialize(r#"{"event":"bare","payload":null}"#).unwrap();
        assert!(envelope.payload.is_empty());
    }

    #[test]
    fn scalar_payload_becomes_single_argument() {
        let envelope = MessageCodec::deserialize(r#"{"event":"n","payload":"7"}"#).unwrap();
        assert_eq!(envelope.payload, vec![json!(7)]);
    }

    #[test]
    fn malformed_outer_json_is_rejected() {
        let err = MessageCodec::deserialize("not-json").unwrap_err();
        assert!(matches!(err, CodecError::Deserialization(_)));
    }

    #[test]
    fn malformed_inner_json_is_rejected() {
        let err = MessageCodec::deserialize(r#"{"event":"x","payload":"[1,"}"#).unwrap_err();
        assert!(matches!(err, CodecError::Deserialization(_)));
    }

    #[test]
    fn non_text_payload_is_rejected() {
        let err = MessageCodec::deserialize(r#"{"event":"x","payload":[1,2]}"#).unwrap_err();
        assert!(matches!(err, CodecError::Deserialization(_)));
    }

    #[test]
    fn missing_event_is_rejected() {
        let err = MessageCodec::deserialize(r#"{"payload":"[]"}"#).unwrap_err();
        assert!(matches!(err, CodecError::Deserialization(_)));
    }
}
