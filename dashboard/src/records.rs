//! Wire rows → canonical [`NormalizedRecord`]s.
//!
//! Rows arrive either positionally (`[id, name, start, delta]`) or as tagged
//! objects (`{"id": 7, "fields": [{"type": "Name", "value": ..}, ..]}`). All
//! times on the wire are nanoseconds since the Unix epoch.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// The one ns → ms conversion factor used anywhere in the dashboard.
pub const NANOS_PER_MILLI: f64 = 1_000_000.0;

const NAME_FIELD: &str = "Name";
const EPOCH_FIELD: &str = "Epoch";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("expected a JSON array of log rows, got {0}")]
    NotAnArray(&'static str),
}

/// Why a single row was skipped.
#[derive(Debug, Error, PartialEq)]
pub enum RowRejection {
    #[error("positional row has {0} elements, expected 4")]
    WrongArity(usize),
    #[error("tagged row has {0} Epoch fields, expected at least 2")]
    MissingTimeFields(usize),
    #[error("row is missing `{0}`")]
    MissingField(&'static str),
    #[error("`{0}` has the wrong type")]
    InvalidField(&'static str),
    #[error("row is neither an array nor an object with `fields`")]
    UnrecognizedShape,
}

/// Which wire layout a row arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// `[id, name, start, delta]`
    Positional,
    /// `{"id", "fields": [{"type", "value"}, ..]}`
    Tagged,
}

/// A row after shape detection but before unit conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub shape: RowShape,
    pub id: i64,
    pub name: String,
    pub start: i64,
    pub delta: i64,
}

impl RawRecord {
    pub fn parse(row: &Value) -> Result<Self, RowRejection> {
        match row {
            Value::Array(items) => Self::parse_positional(items),
            Value::Object(obj) => match obj.get("fields") {
                Some(Value::Array(fields)) => Self::parse_tagged(obj.get("id"), fields),
                _ => Err(RowRejection::UnrecognizedShape),
            },
            _ => Err(RowRejection::UnrecognizedShape),
        }
    }

    fn parse_positional(items: &[Value]) -> Result<Self, RowRejection> {
        if items.len() < 4 {
            return Err(RowRejection::WrongArity(items.len()));
        }
        Ok(RawRecord {
            shape: RowShape::Positional,
            id: integer(&items[0]).ok_or(RowRejection::InvalidField("id"))?,
            name: name(&items[1]).ok_or(RowRejection::InvalidField("name"))?,
            start: time(&items[2]).ok_or(RowRejection::InvalidField("start"))?,
            delta: time(&items[3]).ok_or(RowRejection::InvalidField("delta"))?,
        })
    }

    fn parse_tagged(id: Option<&Value>, fields: &[Value]) -> Result<Self, RowRejection> {
        let id = id.ok_or(RowRejection::MissingField("id"))?;
        let id = integer(id).ok_or(RowRejection::InvalidField("id"))?;

        let epochs: Vec<&Value> = fields
            .iter()
            .filter(|f| field_type(f) == Some(EPOCH_FIELD))
            .collect();
        if epochs.len() < 2 {
            return Err(RowRejection::MissingTimeFields(epochs.len()));
        }
        let (first, last) = (epochs[0], epochs[epochs.len() - 1]);

        // Fall back to the first field when nothing is tagged as a name.
        let name_value = fields
            .iter()
            .find(|f| field_type(f) == Some(NAME_FIELD))
            .or_else(|| fields.first())
            .map(field_value)
            .unwrap_or(&Value::Null);

        Ok(RawRecord {
            shape: RowShape::Tagged,
            id,
            name: name(name_value).ok_or(RowRejection::InvalidField("name"))?,
            start: time(field_value(first)).ok_or(RowRejection::InvalidField("start"))?,
            delta: time(field_value(last)).ok_or(RowRejection::InvalidField("delta"))?,
        })
    }
}

fn field_type(field: &Value) -> Option<&str> {
    field.get("type").and_then(Value::as_str)
}

fn field_value(field: &Value) -> &Value {
    field.get("value").unwrap_or(&Value::Null)
}

fn integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Missing times count as zero, anything non-numeric is rejected.
fn time(value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        other => integer(other),
    }
}

fn name(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// One function call, in canonical units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub id: i64,
    pub function_name: String,
    /// Nanoseconds since the Unix epoch.
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl NormalizedRecord {
    pub fn from_raw(raw: RawRecord, truncate: bool) -> Self {
        let RawRecord {
            id,
            name,
            start,
            delta,
            ..
        } = raw;
        NormalizedRecord {
            id,
            function_name: if truncate {
                truncate_function_name(&name)
            } else {
                name
            },
            start_time: start,
            end_time: start.saturating_add(delta),
            duration_ms: delta as f64 / NANOS_PER_MILLI,
            timestamp: Utc.timestamp_nanos(start),
        }
    }
}

/// Keeps the first two non-empty `/` segments. The result always starts
/// with `/`, so `api/v1/users` and `/api/v1/users` collapse to `/api/v1`.
pub fn truncate_function_name(name: &str) -> String {
    let segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).take(2).collect();
    format!("/{}", segments.join("/"))
}

/// Normalizes a whole response body. Only a non-array body is an error;
/// malformed rows are logged and skipped.
pub fn normalize(body: &Value, truncate: bool) -> Result<Vec<NormalizedRecord>, NormalizeError> {
    let Value::Array(rows) = body else {
        return Err(NormalizeError::NotAnArray(json_kind(body)));
    };
    Ok(normalize_rows(rows, truncate))
}

pub fn normalize_rows(rows: &[Value], truncate: bool) -> Vec<NormalizedRecord> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match RawRecord::parse(row) {
            Ok(raw) => Some(NormalizedRecord::from_raw(raw, truncate)),
            Err(reason) => {
                warn!(index, %reason, "skipping malformed log row");
                None
            }
        })
        .collect()
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
