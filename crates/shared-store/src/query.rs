//! # Filters, Updates and Indexes
//!
//! The subset of the query language the platform uses: equality filters,
//! `$set` / `$unset` / `$currentDate` updates, unique and expiring indexes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::document::{date_value, get_path, remove_path, set_path, Document, ID_FIELD};
use crate::errors::DatabaseError;

// =============================================================================
// FILTER
// =============================================================================

/// Conjunction of equality conditions on field paths.
///
/// A `Null` condition matches documents where the field is absent or null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::eq(ID_FIELD, id)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(path, expected)| match (get_path(document, path), expected) {
                (None, Value::Null) => true,
                (Some(actual), expected) => actual == expected,
                (None, _) => false,
            })
    }

    /// The document an upsert starts from: the filter's equality fields.
    pub(crate) fn seed(&self) -> Result<Document, DatabaseError> {
        let mut document = Document::new();
        for (path, value) in &self.conditions {
            set_path(&mut document, path, value.clone())?;
        }
        Ok(document)
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Field-level modifications applied atomically to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(String, Value)>,
    unset: Vec<String>,
    current_date: Vec<String>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$set` a field path.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    /// `$set` every top-level entry of a document.
    pub fn set_all(mut self, fields: Document) -> Self {
        self.set.extend(fields);
        self
    }

    /// `$unset` a field path.
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// `$currentDate`: set a field to the server's current time.
    pub fn current_date(mut self, field: impl Into<String>) -> Self {
        self.current_date.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.current_date.is_empty()
    }

    /// Field paths this update touches.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.set
            .iter()
            .map(|(p, _)| p.as_str())
            .chain(self.unset.iter().map(String::as_str))
            .chain(self.current_date.iter().map(String::as_str))
    }

    /// Reject updates the server would refuse before touching any document.
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.is_empty() {
            return Err(DatabaseError::InvalidUpdate(
                "update document must contain at least one operator".to_string(),
            ));
        }
        let mut seen = Vec::new();
        for path in self.paths() {
            if path.is_empty() || path.split('.').any(|s| s.is_empty() || s.starts_with('$')) {
                return Err(DatabaseError::InvalidUpdate(format!(
                    "invalid field path {path:?}"
                )));
            }
            if path == ID_FIELD || path.starts_with("_id.") {
                return Err(DatabaseError::InvalidUpdate(
                    "the _id field cannot be modified".to_string(),
                ));
            }
            if seen.contains(&path) {
                return Err(DatabaseError::InvalidUpdate(format!(
                    "updating the path {path:?} would create a conflict"
                )));
            }
            seen.push(path);
        }
        Ok(())
    }

    /// Apply to a document in place. Returns whether anything changed.
    pub fn apply(&self, document: &mut Document, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let before = document.clone();
        for (path, value) in &self.set {
            set_path(document, path, value.clone())?;
        }
        for path in &self.unset {
            remove_path(document, path);
        }
        for path in &self.current_date {
            set_path(document, path, date_value(now))?;
        }
        Ok(*document != before)
    }
}

/// Outcome of an update call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// `_id` of the document created by an upsert.
    pub upserted_id: Option<Value>,
}

// =============================================================================
// INDEXES
// =============================================================================

/// A single-field index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub field: String,
    pub unique: bool,
    /// Documents whose date in `field` is older than this are removed by the
    /// server's expiry monitor.
    pub expire_after: Option<Duration>,
}

impl IndexSpec {
    pub fn unique(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: format!("{field}_1"),
            field,
            unique: true,
            expire_after: None,
        }
    }

    pub fn expiring(field: impl Into<String>, after: Duration) -> Self {
        let field = field.into();
        Self {
            name: format!("{field}_1"),
            field,
            unique: false,
            expire_after: Some(after),
        }
    }
}
