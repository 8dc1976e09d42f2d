//! Normalized data records
//!
//! A [`Record`] is the internal representation of one logical entity. Its
//! fields split into *core* fields (the kind's fixed allow-list, persisted
//! individually) and *extra* fields (an open bag persisted as one serialized
//! core field, [`ADDITIONAL_DATA`]). Values pass through the kind's coercion
//! for the field at the moment they are set, whoever sets them.

pub mod coerce;
pub mod schema;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SyncError};

pub use coerce::Coercion;
pub use schema::{ADDITIONAL_DATA, AUDIT_FIELD, KindSchema, RecordKind};

/// Storage-assigned identity of a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A field value: integer, text or an ordered list of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Empty text and empty lists count as blank
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Integer(_) => false,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// One normalized entity built from a feed message
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: RecordKind,
    id: Option<RecordId>,
    core: IndexMap<String, FieldValue>,
    extra: IndexMap<String, FieldValue>,
}

impl Record {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            id: None,
            core: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn schema(&self) -> &'static KindSchema {
        self.kind.schema()
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    /// Assign a field, applying its coercion first
    ///
    /// Setting [`ADDITIONAL_DATA`] replaces the whole extra bag with the
    /// decoded JSON object.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        let schema = self.schema();

        if field == ADDITIONAL_DATA {
            return self.set_additional_data(&value.to_string());
        }

        let value = match schema.coercion(field) {
            Some(coercion) => coercion.apply(field, value)?,
            None => value,
        };

        if schema.is_core(field) {
            self.core.insert(field.to_string(), value);
        } else {
            self.extra.insert(field.to_string(), value);
        }
        Ok(())
    }

    /// Store a value read back from persisted state, skipping coercion
    pub(crate) fn restore(&mut self, field: &str, value: FieldValue) {
        if self.schema().is_core(field) {
            self.core.insert(field.to_string(), value);
        } else {
            self.extra.insert(field.to_string(), value);
        }
    }

    /// Append to a list field, creating it on first use
    ///
    /// A scalar already stored under the field becomes the first element.
    pub fn append(&mut self, field: &str, item: impl Into<String>) -> Result<()> {
        let item = item.into();
        let mut items = match self.value(field) {
            Some(FieldValue::List(items)) => items.clone(),
            Some(other) => vec![other.to_string()],
            None => Vec::new(),
        };
        items.push(item);
        self.set(field, FieldValue::List(items))
    }

    /// Value of a field, falling back to the kind's default for core fields
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        if field == ADDITIONAL_DATA {
            return Some(FieldValue::Text(self.additional_data()));
        }
        if let Some(value) = self.value(field) {
            return Some(value.clone());
        }
        if self.schema().is_core(field) {
            return self.schema().default_for(field).cloned();
        }
        None
    }

    /// Text of a field, for fields that hold text or integers
    pub fn get_text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(|value| match value {
            FieldValue::List(_) => None,
            other => Some(other.to_string()),
        })
    }

    /// Explicitly stored value, without defaults
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.core.get(field).or_else(|| self.extra.get(field))
    }

    /// Whether a value was explicitly stored for the field
    pub fn has(&self, field: &str) -> bool {
        if field == ADDITIONAL_DATA {
            return !self.extra.is_empty();
        }
        self.core.contains_key(field) || self.extra.contains_key(field)
    }

    /// Whether the field has a stored, non-blank value
    pub fn has_value(&self, field: &str) -> bool {
        self.value(field).is_some_and(|value| !value.is_blank())
    }

    pub fn clear(&mut self, field: &str) {
        if field == ADDITIONAL_DATA {
            self.extra.clear();
            return;
        }
        self.core.shift_remove(field);
        self.extra.shift_remove(field);
    }

    /// Extra fields not in the kind's allow-list
    pub fn extra_fields(&self) -> &IndexMap<String, FieldValue> {
        &self.extra
    }

    /// Serialized extra bag, computed on demand
    pub fn additional_data(&self) -> String {
        if self.extra.is_empty() {
            return String::new();
        }
        // A map of plain values always serializes
        serde_json::to_string(&self.extra).unwrap_or_default()
    }

    fn set_additional_data(&mut self, raw: &str) -> Result<()> {
        self.extra.clear();
        if raw.trim().is_empty() {
            return Ok(());
        }
        let bag: IndexMap<String, FieldValue> =
            serde_json::from_str(raw).map_err(|_| SyncError::coercion(ADDITIONAL_DATA, raw, "JSON object"))?;
        self.extra = bag;
        Ok(())
    }

    /// Fill every unset core field that has a default
    pub fn apply_defaults(&mut self) {
        for (field, value) in self.schema().defaults() {
            if !self.core.contains_key(field) {
                self.core.insert(field.to_string(), value.clone());
            }
        }
    }

    /// Identity of a member within its owning group
    ///
    /// Built from the primary natural key without the owner field, so two
    /// members of the same group never share it. `None` when a part is blank.
    pub fn member_key(&self) -> Option<String> {
        let schema = self.schema();
        let primary = schema.natural_keys().first()?;
        let parts: Option<Vec<String>> = primary
            .iter()
            .filter(|field| Some(**field) != schema.owner_field)
            .map(|field| self.get(field).filter(|v| !v.is_blank()).map(|v| v.to_string()))
            .collect();
        parts.map(|parts| parts.join("|"))
    }

    /// Persistence representation: core fields with the extra bag serialized
    pub fn to_row(&self) -> IndexMap<String, FieldValue> {
        let mut row = IndexMap::new();
        for field in self.schema().core_fields() {
            if let Some(value) = self.get(field) {
                if *field == ADDITIONAL_DATA && value.is_blank() {
                    continue;
                }
                row.insert(field.to_string(), value);
            }
        }
        row
    }

    /// Rebuild a record from its persistence representation
    pub fn from_row(
        kind: RecordKind,
        id: RecordId,
        row: &IndexMap<String, FieldValue>,
    ) -> Result<Self> {
        let mut record = Record::new(kind);
        record.set_id(id);
        for (field, value) in row {
            if field == ADDITIONAL_DATA {
                record.set_additional_data(&value.to_string())?;
            } else {
                record.core.insert(field.clone(), value.clone());
            }
        }
        Ok(record)
    }
}
