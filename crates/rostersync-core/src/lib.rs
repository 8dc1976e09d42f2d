//! Rostersync Core
//!
//! Mapping-driven ingestion of IMS enrollment feeds (Enterprise 1.1 and
//! LIS 2.0). Documents are parsed into [`TreeNode`] trees, transduced into
//! typed [`Record`]s by declarative mapping specifications, and reconciled
//! against a [`RecordStore`] so that repeated feeds converge on one
//! persisted state.

pub mod cache;
pub mod config;
pub mod dialect;
pub mod error;
pub mod kinds;
pub mod mapping;
pub mod processor;
pub mod reconcile;
pub mod record;
pub mod store;
pub mod transducer;
pub mod tree;

// Re-export commonly used types
pub use cache::TermCache;
pub use config::{ConfigLoader, MappingsConfig, ProcessingConfig, ReconcileConfig, SyncConfig};
pub use dialect::{Dialect, Message, MessageType, split_members, split_messages};
pub use error::{ErrorKind, Result, SyncError};
pub use kinds::{ProfileSet, RecordProfile};
pub use mapping::{FieldDescriptor, MappingLoader, MappingRule, MappingSet, MappingSpec, ValueType};
pub use processor::{
    BatchReport, MessageFailure, MessageProcessor, MessageReport, NoopProvisioner, ProvisionError,
    Provisioner, RecordOutcome,
};
pub use reconcile::{
    Action, NaturalKeyStrategy, OrderedKeys, Outcome, ReconcilePolicy, Reconciler, SetReconciler,
};
pub use record::{FieldValue, KindSchema, Record, RecordId, RecordKind};
pub use store::{MemoryStore, NaturalKey, RecordStore, StoreError};
pub use transducer::{Dispatcher, HandlerRegistry, TransduceContext, Transducer};
pub use tree::{TreeNode, parse_document};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rostersync=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
