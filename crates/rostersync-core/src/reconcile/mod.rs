//! Single-record reconciliation against persisted state
//!
//! A freshly transduced record is matched to its persisted row by natural
//! key, merged, and written only when something actually changed:
//!
//! - no row: the record is inserted with its kind's defaults
//! - a row: the record adopts the row's identity, and every do-not-blank
//!   field it left blank is copied forward from the row
//! - the merged record is compared with the row over every core field except
//!   the audit field; a difference means [`Action::Update`]
//! - otherwise a differing audit value means [`Action::AuditOnlyRefresh`],
//!   and no difference at all means [`Action::NoOp`]

pub mod keys;
pub mod membership;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::record::{AUDIT_FIELD, Record, RecordId};
use crate::store::{RecordStore, StoreError};

pub use keys::{NaturalKeyStrategy, OrderedKeys};
pub use membership::SetReconciler;

/// What reconciliation decided for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Insert,
    /// At least one core field differs from the persisted row
    Update,
    /// Only the audit field differs
    AuditOnlyRefresh,
    NoOp,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::AuditOnlyRefresh => "audit-only-refresh",
            Action::NoOp => "no-op",
        };
        f.write_str(name)
    }
}

/// Write policy for reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Persist a record whose only change is a newer audit value
    pub write_audit_refresh: bool,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            write_audit_refresh: true,
        }
    }
}

/// Result of reconciling one record through a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub action: Action,
    pub id: RecordId,
    /// Whether the store was written
    pub written: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Decide what to do with `incoming` given the persisted row, if any
    ///
    /// When a row exists, `incoming` adopts its identity and receives the
    /// do-not-blank backfill, so it is exactly what an update would write.
    pub fn reconcile(&self, incoming: &mut Record, existing: Option<&Record>) -> Action {
        let Some(existing) = existing else {
            return Action::Insert;
        };

        if let Some(id) = existing.id() {
            incoming.set_id(id);
        }
        backfill_protected(incoming, existing);

        let schema = incoming.schema();
        let changed: Vec<&str> = schema
            .core_fields()
            .iter()
            .copied()
            .filter(|field| *field != AUDIT_FIELD)
            .filter(|field| incoming.get(field) != existing.get(field))
            .collect();

        if !changed.is_empty() {
            debug!("{} record changed in: {}", incoming.kind(), changed.join(", "));
            return Action::Update;
        }

        let audit_differs = incoming
            .value(AUDIT_FIELD)
            .is_some_and(|audit| existing.value(AUDIT_FIELD) != Some(audit));
        if audit_differs {
            Action::AuditOnlyRefresh
        } else {
            Action::NoOp
        }
    }

    /// Find the persisted row, decide, and write
    pub fn reconcile_with(
        &self,
        store: &mut dyn RecordStore,
        incoming: &mut Record,
        keys: &dyn NaturalKeyStrategy,
    ) -> Result<Outcome> {
        let kind = incoming.kind();
        let candidates = keys.candidates(incoming)?;

        let mut existing = None;
        for key in &candidates {
            existing = store
                .find_by_natural_key(kind, key)
                .map_err(|e| update_failure(incoming, e))?;
            if existing.is_some() {
                debug!("Matched {} record on {}", kind, key);
                break;
            }
        }

        let action = self.reconcile(incoming, existing.as_ref());
        let (id, written) = match action {
            Action::Insert => {
                incoming.apply_defaults();
                let id = store
                    .insert(kind, incoming)
                    .map_err(|e| update_failure(incoming, e))?;
                incoming.set_id(id);
                (id, true)
            }
            Action::Update => (self.write(store, incoming)?, true),
            Action::AuditOnlyRefresh if self.policy.write_audit_refresh => {
                (self.write(store, incoming)?, true)
            }
            Action::AuditOnlyRefresh | Action::NoOp => (persisted_id(incoming)?, false),
        };

        info!("{} {} record {} ({})", action, kind, id, describe(incoming));
        Ok(Outcome {
            action,
            id,
            written,
        })
    }

    fn write(&self, store: &mut dyn RecordStore, incoming: &Record) -> Result<RecordId> {
        let id = persisted_id(incoming)?;
        store
            .update(incoming.kind(), id, incoming)
            .map_err(|e| update_failure(incoming, e))?;
        Ok(id)
    }
}

/// Copy forward every protected field the incoming record left blank
fn backfill_protected(incoming: &mut Record, existing: &Record) {
    for field in incoming.schema().do_not_blank() {
        if incoming.has_value(field) {
            continue;
        }
        if let Some(value) = existing.value(field).filter(|v| !v.is_blank()) {
            debug!("Keeping persisted {} for {}", field, incoming.kind());
            incoming.restore(field, value.clone());
        }
    }
}

fn persisted_id(record: &Record) -> Result<RecordId> {
    record.id().ok_or_else(|| SyncError::BadRecord {
        kind: record.kind(),
        field: "id".to_string(),
    })
}

fn update_failure(record: &Record, error: StoreError) -> SyncError {
    SyncError::UpdateFailure {
        kind: record.kind(),
        message: error.to_string(),
    }
}

fn describe(record: &Record) -> String {
    record
        .schema()
        .natural_keys()
        .first()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|field| record.get_text(field))
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}
