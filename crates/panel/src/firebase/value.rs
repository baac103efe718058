//! Firestore typed-value codec.
//!
//! Firestore's REST API wraps every field value in a single-key object
//! naming its type (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...).
//! The rest of the panel works in plain JSON; this module converts between
//! the two shapes.
//!
//! Timestamp convention: a JSON string in RFC 3339 form encodes as a
//! `timestampValue`, and a `timestampValue` decodes back to its RFC 3339
//! string. `chrono` serializes `DateTime<Utc>` as RFC 3339, so records with
//! timestamp fields round-trip through this codec with native Firestore
//! timestamp typing.

use serde_json::{Map, Value, json};

use super::error::FirebaseError;
use crate::services::guard::Fields;

/// Encode a plain-JSON field map into Firestore's `fields` shape.
#[must_use]
pub fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

/// Encode one plain-JSON value as a Firestore typed value.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => n.as_i64().map_or_else(
            || json!({ "doubleValue": n.as_f64() }),
            // Firestore transports 64-bit integers as decimal strings.
            |i| json!({ "integerValue": i.to_string() }),
        ),
        Value::String(s) => {
            if chrono::DateTime::parse_from_rfc3339(s).is_ok() {
                json!({ "timestampValue": s })
            } else {
                json!({ "stringValue": s })
            }
        }
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(key, value)| (key.clone(), encode_value(value)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Decode a Firestore `fields` object into a plain-JSON field map.
///
/// # Errors
///
/// Returns [`FirebaseError::Decode`] on an unknown or malformed typed value.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, FirebaseError> {
    fields
        .iter()
        .map(|(key, value)| decode_value(value).map(|v| (key.clone(), v)))
        .collect()
}

/// Decode one Firestore typed value into plain JSON.
///
/// # Errors
///
/// Returns [`FirebaseError::Decode`] on an unknown or malformed typed value.
pub fn decode_value(value: &Value) -> Result<Value, FirebaseError> {
    let Some(map) = value.as_object() else {
        return Err(FirebaseError::Decode(format!(
            "typed value is not an object: {value}"
        )));
    };
    let Some((kind, inner)) = map.iter().next() else {
        return Err(FirebaseError::Decode("empty typed value".to_owned()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| FirebaseError::Decode(format!("booleanValue: {inner}"))),
        "integerValue" => {
            // Arrives as a decimal string; tolerate a bare number too.
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| FirebaseError::Decode(format!("integerValue: {inner}")))
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| FirebaseError::Decode(format!("doubleValue: {inner}"))),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_owned()))
            .ok_or_else(|| FirebaseError::Decode(format!("{kind}: {inner}"))),
        "arrayValue" => {
            let items = inner.get("values").and_then(Value::as_array);
            items.map_or_else(
                // An empty array arrives as an arrayValue with no values key.
                || Ok(Value::Array(Vec::new())),
                |items| {
                    items
                        .iter()
                        .map(decode_value)
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                },
            )
        }
        "mapValue" => {
            let fields = inner.get("fields").and_then(Value::as_object);
            fields.map_or_else(
                || Ok(Value::Object(Map::new())),
                |fields| decode_fields(fields).map(Value::Object),
            )
        }
        other => Err(FirebaseError::Decode(format!(
            "unsupported value kind: {other}"
        ))),
    }
}
