//! # Response Envelope
//!
//! A schema-agnostic container for JSON objects returned by the upstream
//! authentication service. The gateway does not know (or care) what fields
//! the upstream puts in a login or logout response; it captures whatever
//! object arrives and re-serializes it losslessly: field order, numeric and
//! string types, nulls, and nested objects/arrays all round-trip unchanged.
//!
//! Order preservation relies on `serde_json`'s `preserve_order` feature,
//! which backs [`serde_json::Map`] with an insertion-ordered map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The upstream body could not be captured as a JSON object
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct MalformedPayload {
    pub reason: String,
}

/// An ordered mapping of upstream response fields
///
/// Decoded from an upstream 2xx body, consumed when re-serializing the
/// response to the client. Arrays, scalars, and invalid JSON are rejected:
/// the proxy contract is object-in, object-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseEnvelope(Map<String, Value>);

impl ResponseEnvelope {
    /// Decode a raw upstream body into an envelope
    ///
    /// Fails with [`MalformedPayload`] when the input is not a well-formed
    /// JSON object.
    pub fn decode(raw: &[u8]) -> Result<Self, MalformedPayload> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| MalformedPayload {
            reason: format!("invalid JSON: {}", e),
        })?;

        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(MalformedPayload {
                reason: format!("expected a JSON object, got {}", json_type_name(&other)),
            }),
        }
    }

    /// Iterate the captured fields in upstream order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a single field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
