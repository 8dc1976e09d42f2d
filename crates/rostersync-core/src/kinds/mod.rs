//! Record profiles
//!
//! A [`RecordProfile`] supplies what is specific to one record kind beyond
//! its field schema: the custom handlers its mappings may name, the
//! post-processing hook run after transduction, and how natural keys are
//! resolved during reconciliation.

pub mod crosslist;
pub mod member;
pub mod person;
pub mod section;
pub mod term;

use indexmap::IndexMap;
use std::sync::LazyLock;

use crate::error::{Result, SyncError};
use crate::reconcile::keys::{NaturalKeyStrategy, OrderedKeys};
use crate::record::{Record, RecordKind};
use crate::transducer::{HandlerRegistry, TransduceContext, Transducer};

pub use crosslist::CrosslistProfile;
pub use member::{CrosslistMemberProfile, PersonMemberProfile};
pub use person::PersonProfile;
pub use section::SectionProfile;
pub use term::TermProfile;

static NO_HANDLERS: LazyLock<HandlerRegistry> = LazyLock::new(HandlerRegistry::new);

/// Kind-specific behavior plugged into the transducer and reconciler
pub trait RecordProfile: Send + Sync {
    fn kind(&self) -> RecordKind;

    /// Handlers that mapping descriptors may name in `function`
    fn handlers(&self) -> &HandlerRegistry {
        &NO_HANDLERS
    }

    /// Runs once after the structural walk; may read and overwrite fields
    fn post_process(&self, _record: &mut Record, _ctx: &mut TransduceContext<'_>) -> Result<()> {
        Ok(())
    }

    fn key_strategy(&self) -> &dyn NaturalKeyStrategy {
        &OrderedKeys
    }
}

/// One profile per record kind
pub struct ProfileSet {
    profiles: IndexMap<RecordKind, Box<dyn RecordProfile>>,
}

impl ProfileSet {
    pub fn empty() -> Self {
        Self {
            profiles: IndexMap::new(),
        }
    }

    /// The profiles for every built-in record kind
    pub fn standard() -> Self {
        let mut set = Self::empty();
        set.register(Box::new(TermProfile));
        set.register(Box::new(SectionProfile));
        set.register(Box::new(PersonProfile::new()));
        set.register(Box::new(PersonMemberProfile::new()));
        set.register(Box::new(CrosslistProfile));
        set.register(Box::new(CrosslistMemberProfile));
        set
    }

    /// Add or replace the profile for its kind
    pub fn register(&mut self, profile: Box<dyn RecordProfile>) {
        self.profiles.insert(profile.kind(), profile);
    }

    pub fn get(&self, kind: RecordKind) -> Result<&dyn RecordProfile> {
        self.profiles
            .get(&kind)
            .map(|profile| profile.as_ref())
            .ok_or_else(|| SyncError::mapping(format!("no profile registered for {kind} records")))
    }

    pub fn transducer(&self, kind: RecordKind) -> Result<Transducer<'_>> {
        self.get(kind).map(Transducer::new)
    }
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self::standard()
    }
}
