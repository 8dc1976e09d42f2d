//! Assignment-time coercions applied by [`Record::set`](super::Record::set)

use chrono::{DateTime, NaiveDate};

use super::FieldValue;
use crate::error::{Result, SyncError};

/// Transform applied to a value at the moment it is assigned to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Stores `1` or `0`, using loose truthiness
    Boolean,
    Integer,
    /// ISO 8601 date or RFC 3339 timestamp to Unix seconds (UTC)
    Date,
    Trim,
    Lowercase,
}

impl Coercion {
    pub fn apply(self, field: &str, value: FieldValue) -> Result<FieldValue> {
        match self {
            Coercion::Boolean => Ok(FieldValue::Integer(i64::from(truthy(&value)))),
            Coercion::Integer => to_integer(field, value),
            Coercion::Date => to_timestamp(field, value),
            Coercion::Trim => Ok(map_text(value, |s| s.trim().to_string())),
            Coercion::Lowercase => Ok(map_text(value, |s| s.to_lowercase())),
        }
    }
}

/// Loose truthiness: empty text, `"0"`, zero and empty lists are false
fn truthy(value: &FieldValue) -> bool {
    match value {
        FieldValue::Integer(n) => *n != 0,
        FieldValue::Text(s) => !(s.is_empty() || s == "0"),
        FieldValue::List(items) => !items.is_empty(),
    }
}

fn to_integer(field: &str, value: FieldValue) -> Result<FieldValue> {
    match value {
        FieldValue::Integer(_) => Ok(value),
        FieldValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| SyncError::coercion(field, s, "integer")),
        FieldValue::List(_) => Err(SyncError::coercion(field, value.to_string(), "integer")),
    }
}

fn to_timestamp(field: &str, value: FieldValue) -> Result<FieldValue> {
    let text = match value {
        FieldValue::Integer(_) => return Ok(value),
        FieldValue::Text(s) => s,
        FieldValue::List(_) => {
            return Err(SyncError::coercion(field, value.to_string(), "date"));
        }
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(FieldValue::Integer(0));
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(FieldValue::Integer(stamp.timestamp()));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| FieldValue::Integer(midnight.and_utc().timestamp()))
        .ok_or_else(|| SyncError::coercion(field, text.clone(), "date"))
}

fn map_text(value: FieldValue, f: impl Fn(&str) -> String) -> FieldValue {
    match value {
        FieldValue::Text(s) => FieldValue::Text(f(&s)),
        FieldValue::List(items) => FieldValue::List(items.iter().map(|s| f(s)).collect()),
        other => other,
    }
}
