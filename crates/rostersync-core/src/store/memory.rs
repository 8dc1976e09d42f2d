//! In-memory record store

use indexmap::IndexMap;
use tracing::trace;

use super::{NaturalKey, RecordStore, StoreError};
use crate::record::{FieldValue, Record, RecordId, RecordKind};

type Row = IndexMap<String, FieldValue>;

/// Rows held in memory, one table per record kind
///
/// Identities are assigned from a single counter shared by all kinds, so an
/// id is unique across the store. Tables keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: IndexMap<RecordKind, IndexMap<RecordId, Row>>,
    next_id: i64,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a row by identity
    pub fn get(&self, kind: RecordKind, id: RecordId) -> Option<Record> {
        let row = self.tables.get(&kind)?.get(&id)?;
        Record::from_row(kind, id, row).ok()
    }

    /// All rows of a kind, in insertion order
    pub fn records(&self, kind: RecordKind) -> Vec<Record> {
        self.tables
            .get(&kind)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(id, row)| Record::from_row(kind, *id, row).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, kind: RecordKind) -> usize {
        self.tables.get(&kind).map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(IndexMap::is_empty)
    }

    /// Number of inserts and updates performed so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn table(&self, kind: RecordKind) -> impl Iterator<Item = (&RecordId, &Row)> {
        self.tables.get(&kind).into_iter().flat_map(IndexMap::iter)
    }
}

impl RecordStore for MemoryStore {
    fn find_by_natural_key(
        &self,
        kind: RecordKind,
        key: &NaturalKey,
    ) -> Result<Option<Record>, StoreError> {
        let found = self.table(kind).find(|(_, row)| {
            key.parts()
                .iter()
                .all(|(field, value)| row.get(field) == Some(value))
        });

        match found {
            Some((id, row)) => {
                trace!("Found {} row {} for {}", kind, id, key);
                Record::from_row(kind, *id, row)
                    .map(Some)
                    .map_err(|e| StoreError::Rejected(e.to_string()))
            }
            None => Ok(None),
        }
    }

    fn insert(&mut self, kind: RecordKind, record: &Record) -> Result<RecordId, StoreError> {
        self.next_id += 1;
        let id = RecordId(self.next_id);
        self.tables
            .entry(kind)
            .or_default()
            .insert(id, record.to_row());
        self.writes += 1;
        Ok(id)
    }

    fn update(&mut self, kind: RecordKind, id: RecordId, record: &Record) -> Result<(), StoreError> {
        let row = self
            .tables
            .get_mut(&kind)
            .and_then(|table| table.get_mut(&id))
            .ok_or(StoreError::NotFound { kind, id })?;
        *row = record.to_row();
        self.writes += 1;
        Ok(())
    }

    fn find_members_of(
        &self,
        member_kind: RecordKind,
        owner: RecordId,
    ) -> Result<IndexMap<String, Record>, StoreError> {
        let Some(owner_field) = member_kind.schema().owner_field else {
            return Err(StoreError::Rejected(format!(
                "{member_kind} records do not belong to a group"
            )));
        };
        let owner_value = FieldValue::Integer(owner.0);

        let mut members = IndexMap::new();
        for (id, row) in self.table(member_kind) {
            if row.get(owner_field) != Some(&owner_value) {
                continue;
            }
            let record = Record::from_row(member_kind, *id, row)
                .map_err(|e| StoreError::Rejected(e.to_string()))?;
            if let Some(key) = record.member_key() {
                members.insert(key, record);
            }
        }
        Ok(members)
    }
}
