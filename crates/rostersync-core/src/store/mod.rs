//! Persistence boundary
//!
//! The reconcilers need four operations from whatever holds persisted state;
//! [`RecordStore`] names them. [`MemoryStore`] is an in-memory implementation
//! used by tests and by embedders that keep state elsewhere.

pub mod memory;

use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

use crate::record::{FieldValue, Record, RecordId, RecordKind};

pub use memory::MemoryStore;

/// Failure reported by a [`RecordStore`] implementation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no {kind} row with id {id}")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Field/value pairs identifying a row, in candidate order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalKey {
    parts: Vec<(String, FieldValue)>,
}

impl NaturalKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: FieldValue) -> Self {
        self.parts.push((field.to_string(), value));
        self
    }

    pub fn parts(&self) -> &[(String, FieldValue)] {
        &self.parts
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.parts
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .parts
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

/// Query and write contract consumed by the reconcilers
pub trait RecordStore {
    /// Row whose fields equal every part of the key
    fn find_by_natural_key(
        &self,
        kind: RecordKind,
        key: &NaturalKey,
    ) -> Result<Option<Record>, StoreError>;

    /// Write a new row and return its identity
    fn insert(&mut self, kind: RecordKind, record: &Record) -> Result<RecordId, StoreError>;

    /// Rewrite every core field of an existing row
    fn update(&mut self, kind: RecordKind, id: RecordId, record: &Record) -> Result<(), StoreError>;

    /// Persisted members of an owning group, keyed by [`Record::member_key`]
    fn find_members_of(
        &self,
        member_kind: RecordKind,
        owner: RecordId,
    ) -> Result<IndexMap<String, Record>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_display_and_lookup() {
        let key = NaturalKey::new()
            .with("sdid", FieldValue::from("A0001"))
            .with("sdidsource", FieldValue::from("Banner"));
        assert_eq!(key.to_string(), "sdid=A0001, sdidsource=Banner");
        assert_eq!(key.get("sdidsource"), Some(&FieldValue::from("Banner")));
        assert!(key.get("crosslistid").is_none());
    }
}
