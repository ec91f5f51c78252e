//! # Documents and Field Paths
//!
//! Documents are JSON objects. Fields are addressed by dot paths
//! (`"a.b.c"`); a numeric segment indexes into an array.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::errors::DatabaseError;

/// A stored document.
pub type Document = Map<String, Value>;

/// Primary key field present on every stored document.
pub const ID_FIELD: &str = "_id";

/// Walk a dot path through a document.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set a value at a dot path, creating intermediate objects as needed.
pub fn set_path(document: &mut Document, path: &str, value: Value) -> Result<(), DatabaseError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DatabaseError::InvalidUpdate(format!(
            "empty field name in path {path:?}"
        )));
    }
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| DatabaseError::InvalidUpdate("empty path".to_string()))?;

    let mut current = document;
    for segment in parents {
        let slot = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match slot {
            Value::Object(map) => map,
            other => {
                return Err(DatabaseError::InvalidUpdate(format!(
                    "cannot create field {segment:?} in element {other}"
                )))
            }
        };
    }
    current.insert((*last).to_string(), value);
    Ok(())
}

/// Remove the value at a dot path, returning it if present.
pub fn remove_path(document: &mut Document, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        None => document.remove(path),
        Some((parent, last)) => {
            let mut current = document;
            for segment in parent.split('.') {
                current = current.get_mut(segment)?.as_object_mut()?;
            }
            current.remove(last)
        }
    }
}

/// Encode an instant the way the store persists dates. Full precision, so a
/// stamped date never sorts before the instant it was taken.
pub fn date_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Decode a persisted date.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}
