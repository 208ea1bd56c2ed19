//! Lenient field readers for documents with inconsistent historical shapes.
//!
//! Documents written by different versions of the storefront disagree on
//! field names and value types (numbers stored as strings, timestamps stored
//! as epoch numbers or `{seconds, nanoseconds}` objects). These helpers read
//! a field from the first key that holds a usable value.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use validator::ValidationError;

/// Epoch values above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Return the first non-null value among `keys`.
pub fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find(|v| !v.is_null())
}

/// Read a number from a JSON number or a numeric string.
///
/// Strings may carry a leading currency sign and thousands separators
/// (`"$1,299.00"`).
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// Read a non-empty, trimmed string. Numbers are rendered as strings.
pub fn parse_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a boolean from a JSON bool, `"true"`/`"yes"`/`"1"`, or a number.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

/// Read a timestamp from any of the shapes found in stored documents.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            s.parse::<f64>().ok().and_then(from_epoch)
        }
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::Object(map) => {
            let seconds = first_present(map, &["seconds", "_seconds"]).and_then(parse_number)?;
            let nanos = first_present(map, &["nanoseconds", "_nanoseconds", "nanos"])
                .and_then(parse_number)
                .unwrap_or(0.0);
            DateTime::from_timestamp(seconds as i64, nanos.clamp(0.0, 999_999_999.0) as u32)
        }
        _ => None,
    }
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        DateTime::from_timestamp(value as i64, 0)
    }
}

/// Round a monetary amount to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Shorthand: first present key parsed as a string.
pub fn string_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find_map(parse_string)
}

/// Shorthand: first present key parsed as a number.
pub fn number_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find_map(parse_number)
}

/// Shorthand: first present key parsed as a timestamp.
pub fn timestamp_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find_map(parse_timestamp)
}

/// Field validator rejecting values made only of whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Name cannot be blank")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_blank() {
        assert!(not_blank("Mug").is_ok());
        assert!(not_blank(" Mug ").is_ok());
        assert!(not_blank("").is_err());
        assert!(not_blank(" \t\n").is_err());
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number(&json!(12.5)), Some(12.5));
        assert_eq!(parse_number(&json!("12.5")), Some(12.5));
        assert_eq!(parse_number(&json!("$1,299.00")), Some(1299.0));
        assert_eq!(parse_number(&json!("abc")), None);
        assert_eq!(parse_number(&json!(null)), None);
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool(&json!(true)), Some(true));
        assert_eq!(parse_bool(&json!("TRUE")), Some(true));
        assert_eq!(parse_bool(&json!("no")), Some(false));
        assert_eq!(parse_bool(&json!(0)), Some(false));
        assert_eq!(parse_bool(&json!("maybe")), None);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(parse_timestamp(&json!("2024-03-01T12:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!(1709294400)), Some(expected));
        assert_eq!(parse_timestamp(&json!(1709294400000i64)), Some(expected));
        assert_eq!(
            parse_timestamp(&json!({"seconds": 1709294400, "nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp(&json!({"_seconds": 1709294400, "_nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!("not a date")), None);
    }

    #[test]
    fn test_first_present_skips_null() {
        let fields = json!({"total": null, "amount": 42});
        let map = fields.as_object().unwrap();
        assert_eq!(first_present(map, &["total", "amount"]), Some(&json!(42)));
    }

    #[test]
    fn test_string_field_skips_blank() {
        let fields = json!({"name": "  ", "productName": "Mug"});
        let map = fields.as_object().unwrap();
        assert_eq!(string_field(map, &["name", "productName"]), Some("Mug".to_string()));
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(10.005 + 0.0001), 10.01);
        assert_eq!(round_cents(3.0), 3.0);
    }
}
