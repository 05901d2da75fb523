// snapshotrestore/src/restore/transform.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Field names that hold timestamps in every backup produced by the application.
pub const DATE_FIELDS: &[&str] = &[
    "createdAt",
    "updatedAt",
    "publishedAt",
    "completedAt",
    "dueDate",
    "processedAt",
    "expiresAt",
    "lastLoginAt",
    "lockedUntil",
    "startEpoch",
    "endEpoch",
    "answerEpoch",
];

/// One row taken from a table file, keyed by column name.
pub type Record = BTreeMap<String, RecordValue>;

/// A semi-structured field value. Nested lists and maps are carried opaquely.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<RecordValue>),
    Map(BTreeMap<String, RecordValue>),
}

impl From<serde_json::Value> for RecordValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RecordValue::Null,
            Value::Bool(b) => RecordValue::Bool(b),
            Value::Number(n) => RecordValue::Number(n),
            Value::String(s) => RecordValue::String(s),
            Value::Array(items) => {
                RecordValue::List(items.into_iter().map(RecordValue::from).collect())
            }
            Value::Object(map) => RecordValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, RecordValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for RecordValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordValue::Null => serializer.serialize_unit(),
            RecordValue::Bool(b) => serializer.serialize_bool(*b),
            RecordValue::Number(n) => n.serialize(serializer),
            RecordValue::String(s) => serializer.serialize_str(s),
            RecordValue::Date(d) => {
                serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            RecordValue::List(items) => items.serialize(serializer),
            RecordValue::Map(map) => map.serialize(serializer),
        }
    }
}

/// Converts one element of a table file into a record. Anything other than a
/// JSON object is not a row.
pub fn record_from_json(value: serde_json::Value) -> Option<Record> {
    match value {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .map(|(k, v)| (k, RecordValue::from(v)))
                .collect(),
        ),
        _ => None,
    }
}

/// Returns a copy of `record` with the well-known date fields coerced from
/// strings to dates. Strings that do not parse are left as they are; the
/// store rejects them later and the row is counted as skipped.
pub fn transform_record(record: &Record) -> Record {
    record
        .iter()
        .map(|(key, value)| {
            let value = match value {
                RecordValue::String(raw) if DATE_FIELDS.contains(&key.as_str()) => {
                    parse_date(raw).map_or_else(|| value.clone(), RecordValue::Date)
                }
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
