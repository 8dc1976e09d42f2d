//! Message processing: document → messages → records → persisted state
//!
//! [`MessageProcessor`] drives one document at a time:
//!
//! 1. the document is split into messages (see [`crate::dialect`])
//! 2. each message is dispatched to record kinds and fully transduced
//! 3. the records are reconciled against the store one by one, crosslist
//!    owners before their members
//! 4. once every record of the message is reconciled, they are handed to the
//!    [`Provisioner`] in the same order
//!
//! A failing message is logged and recorded in the [`BatchReport`] together
//! with whatever it had already written; the rest of the document is still
//! processed. Configuration and mapping errors stop the batch instead, and
//! the report up to that point is returned with the error in
//! [`BatchReport::aborted`].

use chrono::Utc;
use indexmap::IndexMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::TermCache;
use crate::config::{ProcessingConfig, SyncConfig};
use crate::dialect::{Dialect, Message, MessageType, split_members, split_messages};
use crate::error::{Result, SyncError};
use crate::kinds::ProfileSet;
use crate::mapping::{MappingLoader, MappingSet};
use crate::reconcile::{Action, ReconcilePolicy, Reconciler, SetReconciler};
use crate::record::{AUDIT_FIELD, FieldValue, Record, RecordId, RecordKind};
use crate::store::RecordStore;
use crate::transducer::{Dispatcher, TransduceContext};
use crate::tree::{TreeNode, parse_document};

static ENTERPRISE_GROUP: LazyLock<Dispatcher> = LazyLock::new(|| {
    Dispatcher::new("grouptype/typevalue")
        .route("Term", RecordKind::Term)
        .route("CourseSection", RecordKind::Section)
});

static ENTERPRISE_MEMBER: LazyLock<Dispatcher> = LazyLock::new(|| {
    Dispatcher::new("member/idtype")
        .route("1", RecordKind::PersonMember)
        .route("2", RecordKind::CrosslistMember)
});

static LIS_GROUP: LazyLock<Dispatcher> = LazyLock::new(|| {
    Dispatcher::new("grouprecord/group/grouptype/typevalue/id")
        .route("Term", RecordKind::Term)
        .route("CrossListSet", RecordKind::Crosslist)
});

// ============================================================================
// Provisioning boundary
// ============================================================================

/// Failure reported by a [`Provisioner`]
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Downstream consumer of reconciled records
pub trait Provisioner {
    fn provision(&mut self, kind: RecordKind, record: &Record) -> std::result::Result<(), ProvisionError>;
}

impl<F> Provisioner for F
where
    F: FnMut(RecordKind, &Record) -> std::result::Result<(), ProvisionError>,
{
    fn provision(&mut self, kind: RecordKind, record: &Record) -> std::result::Result<(), ProvisionError> {
        self(kind, record)
    }
}

/// Provisioner that accepts everything and does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvisioner;

impl Provisioner for NoopProvisioner {
    fn provision(&mut self, _kind: RecordKind, _record: &Record) -> std::result::Result<(), ProvisionError> {
        Ok(())
    }
}

// ============================================================================
// Reports
// ============================================================================

/// What happened to one reconciled record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub kind: RecordKind,
    pub id: RecordId,
    pub action: Action,
    pub written: bool,
}

#[derive(Debug, Clone)]
pub struct MessageReport {
    pub dialect: Dialect,
    pub message_type: MessageType,
    pub outcomes: Vec<RecordOutcome>,
}

#[derive(Debug)]
pub struct MessageFailure {
    /// Position of the message in its document
    pub index: usize,
    /// Element name of the message
    pub element: String,
    pub error: SyncError,
    /// Records the message had already reconciled into the store
    pub outcomes: Vec<RecordOutcome>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub messages: Vec<MessageReport>,
    pub failures: Vec<MessageFailure>,
    /// Mapping or configuration error that stopped the batch
    pub aborted: Option<MessageFailure>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.messages.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.aborted.is_none()
    }

    /// Every record reconciled into the store, failed messages included
    pub fn outcomes(&self) -> impl Iterator<Item = &RecordOutcome> {
        let succeeded = self.messages.iter().flat_map(|m| m.outcomes.iter());
        let failed = self
            .failures
            .iter()
            .chain(self.aborted.as_ref())
            .flat_map(|f| f.outcomes.iter());
        succeeded.chain(failed)
    }

    /// Number of records that ended with the given action
    pub fn count(&self, action: Action) -> usize {
        self.outcomes().filter(|o| o.action == action).count()
    }
}

// ============================================================================
// Planning: transduce every record of a message before touching the store
// ============================================================================

#[derive(Debug, Default)]
struct Plan {
    records: Vec<Record>,
    crosslist: Option<CrosslistPlan>,
}

#[derive(Debug)]
struct CrosslistPlan {
    owner: Record,
    members: Vec<Record>,
}

struct Planner<'a> {
    dialect: Dialect,
    mappings: &'a MappingSet,
    profiles: &'a ProfileSet,
}

impl Planner<'_> {
    fn plan(
        &self,
        node: &TreeNode,
        message_type: MessageType,
        ctx: &mut TransduceContext<'_>,
    ) -> Result<Plan> {
        let kind = match (self.dialect, message_type) {
            (_, MessageType::Person) => RecordKind::Person,
            (_, MessageType::Section) => RecordKind::Section,
            (Dialect::Lis2, MessageType::Membership) => RecordKind::PersonMember,
            (Dialect::Enterprise, MessageType::Group) => ENTERPRISE_GROUP.discriminate(node)?,
            (Dialect::Lis2, MessageType::Group) => LIS_GROUP.discriminate(node)?,
            (Dialect::Enterprise, MessageType::Membership) => {
                return self.plan_enterprise_membership(node, ctx);
            }
        };

        if kind == RecordKind::Crosslist {
            return self.plan_lis_crosslist(node, ctx);
        }

        Ok(Plan {
            records: vec![self.transduce(kind, node, ctx)?],
            crosslist: None,
        })
    }

    fn transduce(
        &self,
        kind: RecordKind,
        node: &TreeNode,
        ctx: &mut TransduceContext<'_>,
    ) -> Result<Record> {
        let spec = self.mappings.require(self.dialect, kind)?;
        self.profiles.transducer(kind)?.transduce_with(spec, node, ctx)
    }

    /// One record per `member`; crosslist members also yield their owner
    fn plan_enterprise_membership(
        &self,
        node: &TreeNode,
        ctx: &mut TransduceContext<'_>,
    ) -> Result<Plan> {
        let mut plan = Plan::default();
        let mut crosslist_members = Vec::new();

        for split in split_members(node) {
            match ENTERPRISE_MEMBER.discriminate(&split)? {
                RecordKind::CrosslistMember => {
                    crosslist_members.push(self.transduce(RecordKind::CrosslistMember, &split, ctx)?)
                }
                kind => plan.records.push(self.transduce(kind, &split, ctx)?),
            }
        }

        if !crosslist_members.is_empty() {
            let shell = node.without_children_named("member");
            plan.crosslist = Some(CrosslistPlan {
                owner: self.transduce(RecordKind::Crosslist, &shell, ctx)?,
                members: crosslist_members,
            });
        }
        Ok(plan)
    }

    /// A LIS crosslist group lists its member sections in `membersdids`
    fn plan_lis_crosslist(&self, node: &TreeNode, ctx: &mut TransduceContext<'_>) -> Result<Plan> {
        let mut owner = self.transduce(RecordKind::Crosslist, node, ctx)?;
        let sdids = match owner.value("membersdids") {
            Some(FieldValue::List(items)) => items.clone(),
            Some(FieldValue::Text(single)) => vec![single.clone()],
            _ => Vec::new(),
        };
        owner.clear("membersdids");

        let mut members = Vec::with_capacity(sdids.len());
        for sdid in sdids {
            let mut member = Record::new(RecordKind::CrosslistMember);
            member.set("sdid", sdid)?;
            if let Some(source) = owner.get_text("sdidsource") {
                member.set("sdidsource", source)?;
            }
            member.set("status", 1_i64)?;
            members.push(member);
        }

        Ok(Plan {
            records: Vec::new(),
            crosslist: Some(CrosslistPlan { owner, members }),
        })
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Drives documents through transduction, reconciliation and provisioning
pub struct MessageProcessor<S, P> {
    mappings: MappingSet,
    profiles: ProfileSet,
    reconciler: Reconciler,
    set_reconciler: SetReconciler,
    terms: TermCache,
    options: ProcessingConfig,
    store: S,
    provisioner: P,
}

impl<S: RecordStore, P: Provisioner> MessageProcessor<S, P> {
    pub fn new(mappings: MappingSet, store: S, provisioner: P) -> Self {
        Self {
            mappings,
            profiles: ProfileSet::standard(),
            reconciler: Reconciler::default(),
            set_reconciler: SetReconciler::new(),
            terms: TermCache::new(),
            options: ProcessingConfig::default(),
            store,
            provisioner,
        }
    }

    /// Built-in mappings, overridden from the configured directory if any
    pub fn from_config(config: &SyncConfig, store: S, provisioner: P) -> Result<Self> {
        config.processing.validate()?;
        let mut mappings = MappingSet::builtin()?;
        if let Some(dir) = &config.mappings.directory {
            let stats = MappingLoader::new().load_into_set(dir, &mut mappings)?;
            if stats.errors > 0 {
                warn!(
                    "{} mapping file(s) in {} failed to load; built-in mappings used instead",
                    stats.errors,
                    dir.display()
                );
            }
        }

        Ok(Self::new(mappings, store, provisioner)
            .with_policy(ReconcilePolicy::from(&config.reconcile))
            .with_options(config.processing.clone()))
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.reconciler = Reconciler::new(policy);
        self
    }

    pub fn with_options(mut self, options: ProcessingConfig) -> Self {
        self.options = options;
        self
    }

    pub fn with_profiles(mut self, profiles: ProfileSet) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// The term cache; call `invalidate` after changing terms behind the processor's back
    pub fn term_cache_mut(&mut self) -> &mut TermCache {
        &mut self.terms
    }

    pub fn into_parts(self) -> (S, P) {
        (self.store, self.provisioner)
    }

    /// Parse XML text and process the resulting document
    pub fn process_xml(&mut self, xml: &str) -> Result<BatchReport> {
        let root = parse_document(xml)?;
        self.process_document(&root)
    }

    /// Process every message of a document
    ///
    /// Only document-level problems (unknown dialect, no messages) are
    /// returned as `Err`; everything else ends up in the report.
    pub fn process_document(&mut self, root: &TreeNode) -> Result<BatchReport> {
        let messages = split_messages(root)?;
        let mut report = BatchReport::default();

        for (index, message) in messages.iter().enumerate() {
            let mut committed = Vec::new();
            let error = match self.run_message(message, &mut committed) {
                Ok(message_type) => {
                    report.messages.push(MessageReport {
                        dialect: message.dialect,
                        message_type,
                        outcomes: committed,
                    });
                    continue;
                }
                Err(error) => error,
            };

            let failure = MessageFailure {
                index,
                element: message.node.name().to_string(),
                error,
                outcomes: committed,
            };
            if failure.error.is_message_scoped() {
                warn!("Message {} <{}> failed: {}", index, failure.element, failure.error);
                report.failures.push(failure);
            } else {
                error!(
                    "Stopping at message {} <{}>: {}",
                    index, failure.element, failure.error
                );
                report.aborted = Some(failure);
                break;
            }
        }

        info!(
            "Processed {} message(s): {} inserted, {} updated, {} refreshed, {} unchanged, {} failed",
            report.processed(),
            report.count(Action::Insert),
            report.count(Action::Update),
            report.count(Action::AuditOnlyRefresh),
            report.count(Action::NoOp),
            report.failed()
        );
        Ok(report)
    }

    pub fn process_message(&mut self, message: &Message) -> Result<MessageReport> {
        let mut outcomes = Vec::new();
        let message_type = self.run_message(message, &mut outcomes)?;
        Ok(MessageReport {
            dialect: message.dialect,
            message_type,
            outcomes,
        })
    }

    /// Reconcile every record of the message, then provision them in order
    ///
    /// `outcomes` gains an entry as soon as a record is in the store, so it
    /// still lists the written records when a later step fails.
    fn run_message(
        &mut self,
        message: &Message,
        outcomes: &mut Vec<RecordOutcome>,
    ) -> Result<MessageType> {
        let message_type = message.message_type()?;
        debug!("Processing {} {} message", message.dialect, message_type);

        let plan = {
            let planner = Planner {
                dialect: message.dialect,
                mappings: &self.mappings,
                profiles: &self.profiles,
            };
            let mut ctx = TransduceContext::with_terms(&mut self.terms, &self.store);
            planner.plan(&message.node, message_type, &mut ctx)?
        };

        let mut reconciled = Vec::new();
        for mut record in plan.records {
            outcomes.push(self.commit(&mut record)?);
            reconciled.push(record);
        }
        if let Some(crosslist) = plan.crosslist {
            self.commit_crosslist(crosslist, outcomes, &mut reconciled)?;
        }

        for record in &reconciled {
            let kind = record.kind();
            self.provisioner
                .provision(kind, record)
                .map_err(|source| SyncError::Provision { kind, source })?;
        }
        Ok(message_type)
    }

    /// Reconcile one record against the store
    fn commit(&mut self, record: &mut Record) -> Result<RecordOutcome> {
        let kind = record.kind();
        if self.options.stamp_audit {
            record.set(AUDIT_FIELD, Utc::now().timestamp())?;
        }

        let profile = self.profiles.get(kind)?;
        let outcome = self
            .reconciler
            .reconcile_with(&mut self.store, record, profile.key_strategy())?;

        if kind == RecordKind::Term
            && outcome.written
            && let (Some(sdid), Some(source)) = (record.get_text("sdid"), record.get_text("sdidsource"))
        {
            self.terms.invalidate_key(&sdid, &source);
        }

        Ok(RecordOutcome {
            kind,
            id: outcome.id,
            action: outcome.action,
            written: outcome.written,
        })
    }

    /// Owner first, then the complete member set including tombstones
    fn commit_crosslist(
        &mut self,
        crosslist: CrosslistPlan,
        outcomes: &mut Vec<RecordOutcome>,
        reconciled: &mut Vec<Record>,
    ) -> Result<()> {
        let CrosslistPlan { mut owner, members } = crosslist;
        if !owner.has_value("type") {
            self.options.validate()?;
            owner.set("type", self.options.crosslist_type.as_str())?;
        }
        let owner_outcome = self.commit(&mut owner)?;
        outcomes.push(owner_outcome);

        let mut incoming = IndexMap::with_capacity(members.len());
        for mut member in members {
            member.set("crosslistid", owner_outcome.id.0)?;
            if let Some(sdid) = owner.get_text("sdid") {
                member.set("crosslistsdid", sdid)?;
            }
            if !member.has_value("type")
                && let Some(kind) = owner.get_text("type")
            {
                member.set("type", kind)?;
            }
            let key = member.member_key().ok_or_else(|| SyncError::BadRecord {
                kind: RecordKind::CrosslistMember,
                field: "sdid".to_string(),
            })?;
            incoming.insert(key, member);
        }

        let members = self.set_reconciler.reconcile_members(
            &self.store,
            &owner,
            RecordKind::CrosslistMember,
            incoming,
        )?;
        reconciled.push(owner);
        for (_, mut member) in members {
            outcomes.push(self.commit(&mut member)?);
            reconciled.push(member);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    fn processor() -> MessageProcessor<MemoryStore, NoopProvisioner> {
        MessageProcessor::new(MappingSet::builtin().unwrap(), MemoryStore::new(), NoopProvisioner)
            .with_options(ProcessingConfig {
                stamp_audit: false,
                ..Default::default()
            })
    }

    const PERSON: &str = r#"<enterprise>
        <person>
            <sourcedid><source>Banner</source><id>A0001</id></sourcedid>
            <userid useridtype="Logon ID">jroe</userid>
            <name><fn>Jane Roe</fn><n><family>Roe</family><given>Jane</given></n></name>
            <email>jroe@example.edu</email>
        </person>
    </enterprise>"#;

    #[test]
    fn test_insert_then_no_op() {
        let mut processor = processor();
        let first = processor.process_xml(PERSON).unwrap();
        assert_eq!(first.count(Action::Insert), 1);

        let second = processor.process_xml(PERSON).unwrap();
        assert_eq!(second.count(Action::NoOp), 1);
        assert_eq!(processor.store().len(RecordKind::Person), 1);
    }

    #[test]
    fn test_stamped_resend_is_audit_only_refresh() {
        let mut processor = processor().with_options(ProcessingConfig::default());
        processor.process_xml(PERSON).unwrap();

        let id = processor.store().records(RecordKind::Person)[0].id().unwrap();
        let mut row = processor.store().get(RecordKind::Person, id).unwrap();
        row.set(AUDIT_FIELD, 1_i64).unwrap();
        processor
            .store_mut()
            .update(RecordKind::Person, id, &row)
            .unwrap();

        let report = processor.process_xml(PERSON).unwrap();
        assert_eq!(report.count(Action::AuditOnlyRefresh), 1);
    }

    #[test]
    fn test_failing_message_does_not_stop_batch() {
        let xml = r#"<enterprise>
            <group>
                <sourcedid><source>Banner</source><id>ENGL</id></sourcedid>
                <grouptype><typevalue level="1">Department</typevalue></grouptype>
            </group>
            <group>
                <sourcedid><source>Banner</source><id>202410</id></sourcedid>
                <grouptype><typevalue level="1">Term</typevalue></grouptype>
                <description><long>Fall 2024</long></description>
            </group>
        </enterprise>"#;
        let mut processor = processor();
        let report = processor.process_xml(xml).unwrap();

        assert_eq!(report.processed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].index, 0);
        assert!(matches!(
            report.failures[0].error,
            SyncError::Discriminator { value: Some(ref v), .. } if v == "Department"
        ));
        assert_eq!(processor.store().len(RecordKind::Term), 1);
    }

    #[test]
    fn test_provisioner_sees_reconciled_records() {
        let mut seen = Vec::new();
        let mut processor = MessageProcessor::new(
            MappingSet::builtin().unwrap(),
            MemoryStore::new(),
            |kind: RecordKind, record: &Record| -> std::result::Result<(), ProvisionError> {
                seen.push((kind, record.id()));
                Ok(())
            },
        );
        processor.process_xml(PERSON).unwrap();
        drop(processor);

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, RecordKind::Person);
        assert!(seen[0].1.is_some());
    }

    #[test]
    fn test_provision_failure_is_reported() {
        let mut processor = MessageProcessor::new(
            MappingSet::builtin().unwrap(),
            MemoryStore::new(),
            |_: RecordKind, _: &Record| -> std::result::Result<(), ProvisionError> {
                Err(ProvisionError::Rejected("LMS offline".to_string()))
            },
        );
        let report = processor.process_xml(PERSON).unwrap();
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.failures[0].error,
            SyncError::Provision { kind: RecordKind::Person, .. }
        ));
    }

    #[test]
    fn test_missing_mapping_stops_batch() {
        let mut processor =
            MessageProcessor::new(MappingSet::new(), MemoryStore::new(), NoopProvisioner);
        let report = processor.process_xml(PERSON).unwrap();

        assert_eq!(report.processed(), 0);
        assert!(report.failures.is_empty());
        assert!(!report.is_clean());
        let aborted = report.aborted.as_ref().unwrap();
        assert_eq!(aborted.index, 0);
        assert!(matches!(aborted.error, SyncError::Mapping { .. }));
    }

    #[test]
    fn test_abort_keeps_earlier_messages() {
        let builtin = MappingSet::builtin().unwrap();
        let mut mappings = MappingSet::new();
        mappings.insert(
            Dialect::Enterprise,
            RecordKind::Person,
            builtin
                .get(Dialect::Enterprise, RecordKind::Person)
                .cloned()
                .unwrap(),
        );
        let xml = r#"<enterprise>
            <person>
                <sourcedid><source>Banner</source><id>A0001</id></sourcedid>
                <email>jroe@example.edu</email>
            </person>
            <group>
                <sourcedid><source>Banner</source><id>202410</id></sourcedid>
                <grouptype><typevalue level="1">Term</typevalue></grouptype>
            </group>
        </enterprise>"#;

        let mut seen = Vec::new();
        let mut processor = MessageProcessor::new(
            mappings,
            MemoryStore::new(),
            |kind: RecordKind, _: &Record| -> std::result::Result<(), ProvisionError> {
                seen.push(kind);
                Ok(())
            },
        );
        let report = processor.process_xml(xml).unwrap();

        assert_eq!(report.processed(), 1);
        assert_eq!(report.count(Action::Insert), 1);
        let aborted = report.aborted.as_ref().unwrap();
        assert_eq!(aborted.index, 1);
        assert_eq!(aborted.element, "group");
        assert!(matches!(aborted.error, SyncError::Mapping { .. }));
        assert_eq!(processor.store().len(RecordKind::Person), 1);
        assert_eq!(processor.store().len(RecordKind::Term), 0);
        drop(processor);
        assert_eq!(seen, vec![RecordKind::Person]);
    }

    const CROSSLIST: &str = r#"<enterprise>
        <membership>
            <sourcedid><source>Banner</source><id>XLSAB202410</id></sourcedid>
            <member>
                <sourcedid><source>Banner</source><id>10001.202410</id></sourcedid>
                <idtype>2</idtype>
                <role roletype="01"><status>1</status></role>
            </member>
            <member>
                <sourcedid><source>Banner</source><id>10002.202410</id></sourcedid>
                <idtype>2</idtype>
                <role roletype="01"><status>1</status></role>
            </member>
        </membership>
    </enterprise>"#;

    /// Memory store that refuses to insert one section's crosslist membership
    struct RefusingStore {
        inner: MemoryStore,
        refuse: &'static str,
    }

    impl RecordStore for RefusingStore {
        fn find_by_natural_key(
            &self,
            kind: RecordKind,
            key: &crate::store::NaturalKey,
        ) -> std::result::Result<Option<Record>, StoreError> {
            self.inner.find_by_natural_key(kind, key)
        }

        fn insert(
            &mut self,
            kind: RecordKind,
            record: &Record,
        ) -> std::result::Result<RecordId, StoreError> {
            if kind == RecordKind::CrosslistMember
                && record.get_text("sdid").as_deref() == Some(self.refuse)
            {
                return Err(StoreError::Rejected("constraint violation".to_string()));
            }
            self.inner.insert(kind, record)
        }

        fn update(
            &mut self,
            kind: RecordKind,
            id: RecordId,
            record: &Record,
        ) -> std::result::Result<(), StoreError> {
            self.inner.update(kind, id, record)
        }

        fn find_members_of(
            &self,
            member_kind: RecordKind,
            owner: RecordId,
        ) -> std::result::Result<IndexMap<String, Record>, StoreError> {
            self.inner.find_members_of(member_kind, owner)
        }
    }

    #[test]
    fn test_nothing_provisioned_until_message_reconciles() {
        let store = RefusingStore {
            inner: MemoryStore::new(),
            refuse: "10002.202410",
        };
        let mut seen = Vec::new();
        let mut processor = MessageProcessor::new(
            MappingSet::builtin().unwrap(),
            store,
            |kind: RecordKind, _: &Record| -> std::result::Result<(), ProvisionError> {
                seen.push(kind);
                Ok(())
            },
        );
        let report = processor.process_xml(CROSSLIST).unwrap();

        assert_eq!(report.processed(), 0);
        assert_eq!(report.failed(), 1);
        let failure = &report.failures[0];
        assert!(matches!(
            failure.error,
            SyncError::UpdateFailure { kind: RecordKind::CrosslistMember, .. }
        ));
        let kinds: Vec<RecordKind> = failure.outcomes.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, vec![RecordKind::Crosslist, RecordKind::CrosslistMember]);
        assert_eq!(report.count(Action::Insert), 2);
        assert_eq!(processor.store().inner.len(RecordKind::CrosslistMember), 1);
        drop(processor);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_provision_failure_lists_committed_records() {
        let mut provisioned = Vec::new();
        let mut processor = MessageProcessor::new(
            MappingSet::builtin().unwrap(),
            MemoryStore::new(),
            |kind: RecordKind, record: &Record| -> std::result::Result<(), ProvisionError> {
                if record.get_text("sdid").as_deref() == Some("10002.202410") {
                    return Err(ProvisionError::Rejected("LMS refused section".to_string()));
                }
                provisioned.push(kind);
                Ok(())
            },
        );
        let report = processor.process_xml(CROSSLIST).unwrap();

        assert_eq!(report.processed(), 0);
        let failure = &report.failures[0];
        assert!(matches!(
            failure.error,
            SyncError::Provision { kind: RecordKind::CrosslistMember, .. }
        ));
        assert_eq!(failure.outcomes.len(), 3);
        assert!(failure.outcomes.iter().all(|o| o.action == Action::Insert));
        assert_eq!(processor.store().len(RecordKind::Crosslist), 1);
        assert_eq!(processor.store().len(RecordKind::CrosslistMember), 2);
        drop(processor);
        assert_eq!(
            provisioned,
            vec![RecordKind::Crosslist, RecordKind::CrosslistMember]
        );
    }

    #[test]
    fn test_unknown_crosslist_type_stops_batch() {
        let mut processor = processor().with_options(ProcessingConfig {
            stamp_audit: false,
            crosslist_type: "blend".to_string(),
        });
        let report = processor.process_xml(CROSSLIST).unwrap();

        let aborted = report.aborted.as_ref().unwrap();
        assert!(matches!(aborted.error, SyncError::Config { .. }));
        assert!(aborted.outcomes.is_empty());
        assert_eq!(processor.store().len(RecordKind::Crosslist), 0);

        let config = SyncConfig {
            processing: ProcessingConfig {
                stamp_audit: false,
                crosslist_type: "blend".to_string(),
            },
            ..Default::default()
        };
        let result = MessageProcessor::from_config(&config, MemoryStore::new(), NoopProvisioner);
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }

    #[test]
    fn test_unknown_dialect() {
        let err = processor().process_xml("<catalog/>").unwrap_err();
        assert!(matches!(err, SyncError::Discriminator { .. }));
    }
}
