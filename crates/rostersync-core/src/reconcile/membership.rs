//! Membership set reconciliation
//!
//! Membership feeds send the complete current member list of a group. A
//! member that was persisted before but is missing now has been removed;
//! removal is recorded by flipping its status field to inactive, never by
//! deleting it.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::record::{Record, RecordKind};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct SetReconciler;

impl SetReconciler {
    pub fn new() -> Self {
        Self
    }

    /// The complete member set to persist for `owner`
    ///
    /// Incoming members are returned as given. Every persisted member absent
    /// from `incoming` is added as an inactive copy that keeps its storage
    /// identity. Nothing is written; the caller reconciles each returned
    /// record, after the owner itself has been reconciled.
    pub fn reconcile_members(
        &self,
        store: &dyn RecordStore,
        owner: &Record,
        member_kind: RecordKind,
        incoming: IndexMap<String, Record>,
    ) -> Result<IndexMap<String, Record>> {
        let owner_id = owner.id().ok_or_else(|| SyncError::BadRecord {
            kind: owner.kind(),
            field: "id".to_string(),
        })?;
        let status_field = member_kind.schema().status_field.ok_or_else(|| {
            SyncError::mapping(format!("{member_kind} records have no status field"))
        })?;

        let existing = store
            .find_members_of(member_kind, owner_id)
            .map_err(|e| SyncError::UpdateFailure {
                kind: member_kind,
                message: e.to_string(),
            })?;

        let mut result = incoming;
        let mut dropped = 0;
        for (key, member) in existing {
            if result.contains_key(&key) {
                continue;
            }
            let mut tombstone = member;
            tombstone.set(status_field, 0_i64)?;
            debug!("Tombstoning {} {} of {} {}", member_kind, key, owner.kind(), owner_id);
            result.insert(key, tombstone);
            dropped += 1;
        }

        if dropped > 0 {
            info!(
                "{} {} member(s) of {} {} marked inactive",
                dropped,
                member_kind,
                owner.kind(),
                owner_id
            );
        }
        Ok(result)
    }
}
