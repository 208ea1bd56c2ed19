//! Conversion between Firestore values and plain JSON.
//!
//! Repositories read documents as JSON maps so the lenient readers in
//! `storeadmin-models` can be applied regardless of how a field was
//! originally written.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::DocumentRecord;
use crate::types::{ArrayValue, Document, Fields, MapValue, Value};

/// Convert a JSON value into its Firestore representation.
///
/// Whole numbers become `integerValue`, other numbers `doubleValue`.
/// Strings are kept as strings even when they look like timestamps.
pub fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::NullValue(()),
        JsonValue::Bool(b) => Value::BooleanValue(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::IntegerValue(i.to_string())
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Value::StringValue(s.clone()),
        JsonValue::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(json_to_value).collect()),
        }),
        JsonValue::Object(map) => Value::MapValue(MapValue {
            fields: Some(json_map_to_fields(map)),
        }),
    }
}

pub fn json_map_to_fields(map: &Map<String, JsonValue>) -> Fields {
    map.iter()
        .map(|(k, v)| (k.clone(), json_to_value(v)))
        .collect()
}

/// Convert a Firestore value into JSON.
///
/// Timestamps become RFC 3339 strings and references their resource path.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::NullValue(()) => JsonValue::Null,
        Value::BooleanValue(b) => JsonValue::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(s.clone())),
        Value::DoubleValue(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::TimestampValue(s)
        | Value::StringValue(s)
        | Value::BytesValue(s)
        | Value::ReferenceValue(s) => JsonValue::String(s.clone()),
        Value::GeoPointValue(p) => serde_json::json!({
            "latitude": p.latitude,
            "longitude": p.longitude,
        }),
        Value::ArrayValue(a) => JsonValue::Array(
            a.values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(value_to_json)
                .collect(),
        ),
        Value::MapValue(m) => JsonValue::Object(
            m.fields
                .as_ref()
                .map(fields_to_json)
                .unwrap_or_default(),
        ),
    }
}

pub fn fields_to_json(fields: &HashMap<String, Value>) -> Map<String, JsonValue> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect()
}

pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Flatten a REST document into a record keyed by its short id.
pub fn document_to_record(doc: Document) -> FirestoreResult<DocumentRecord> {
    let id = doc
        .id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FirestoreError::InvalidResponse("document without a name".to_string()))?
        .to_string();

    Ok(DocumentRecord {
        id,
        fields: doc.fields.unwrap_or_default(),
        create_time: doc.create_time.as_deref().and_then(parse_time),
        update_time: doc.update_time.as_deref().and_then(parse_time),
    })
}
