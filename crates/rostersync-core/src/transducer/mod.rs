//! Mapping-driven transduction of tree nodes into records
//!
//! The [`Transducer`] walks a [`MappingSpec`] alongside a [`TreeNode`]:
//!
//! - rules are visited in the order the mapping declares them, and
//!   each rule applies to every child of that name, in document order
//! - children the mapping does not mention are ignored, and rules
//!   without a matching child do nothing (transduction never clears fields)
//! - after the walk the record profile's post-processing hook runs once
//!
//! Value coercion happens in [`Record::set`], so a field is coerced the
//! same way whether the transducer or a handler sets it.

pub mod dispatch;
pub mod handlers;

use tracing::trace;

use crate::cache::TermCache;
use crate::error::{Result, SyncError};
use crate::kinds::RecordProfile;
use crate::mapping::{FieldDescriptor, MappingRule, MappingSpec, ValueType};
use crate::record::{Record, RecordKind};
use crate::store::RecordStore;
use crate::tree::TreeNode;

pub use dispatch::Dispatcher;
pub use handlers::{FieldHandler, HandlerRegistry};

/// Shared state available to post-processing hooks
pub struct TransduceContext<'a> {
    terms: Option<(&'a mut TermCache, &'a dyn RecordStore)>,
}

impl<'a> TransduceContext<'a> {
    /// A context with no access to persisted state; term lookups find nothing
    pub fn detached() -> Self {
        Self { terms: None }
    }

    pub fn with_terms(cache: &'a mut TermCache, store: &'a dyn RecordStore) -> Self {
        Self {
            terms: Some((cache, store)),
        }
    }

    /// Look up a persisted term through the cache
    pub fn term(&mut self, sdid: &str, source: &str) -> Result<Option<Record>> {
        let Some((cache, store)) = self.terms.as_mut() else {
            return Ok(None);
        };
        cache
            .get(*store, sdid, source)
            .map_err(|e| SyncError::UpdateFailure {
                kind: RecordKind::Term,
                message: format!("term lookup for {source}/{sdid} failed: {e}"),
            })
    }
}

/// Interpreter of mapping specifications for one record profile
pub struct Transducer<'p> {
    profile: &'p dyn RecordProfile,
}

impl<'p> Transducer<'p> {
    pub fn new(profile: &'p dyn RecordProfile) -> Self {
        Self { profile }
    }

    pub fn kind(&self) -> RecordKind {
        self.profile.kind()
    }

    /// Transduce without access to persisted state
    pub fn transduce(&self, spec: &MappingSpec, node: &TreeNode) -> Result<Record> {
        self.transduce_with(spec, node, &mut TransduceContext::detached())
    }

    pub fn transduce_with(
        &self,
        spec: &MappingSpec,
        node: &TreeNode,
        ctx: &mut TransduceContext<'_>,
    ) -> Result<Record> {
        let mut record = Record::new(self.profile.kind());
        self.walk(spec, node, &mut record)?;
        self.profile.post_process(&mut record, ctx)?;
        Ok(record)
    }

    fn walk(&self, spec: &MappingSpec, node: &TreeNode, record: &mut Record) -> Result<()> {
        for (source, rule) in spec.rules() {
            for child in node.children(source) {
                self.apply(rule, child, record)?;
            }
        }
        Ok(())
    }

    fn apply(&self, rule: &MappingRule, node: &TreeNode, record: &mut Record) -> Result<()> {
        match rule {
            MappingRule::Field(field) => {
                if let Some(value) = node.data() {
                    record.set(field, value)?;
                }
                Ok(())
            }
            MappingRule::Nested(inner) => self.walk(inner, node, record),
            MappingRule::Descriptor(descriptor) => {
                self.apply_descriptor(descriptor, node, record)
            }
        }
    }

    fn apply_descriptor(
        &self,
        descriptor: &FieldDescriptor,
        node: &TreeNode,
        record: &mut Record,
    ) -> Result<()> {
        if !descriptor.matches(node) {
            trace!("Rule on <{}> skipped: required attributes differ", node.name());
            return Ok(());
        }

        if let Some(name) = &descriptor.function {
            let handler = self.profile.handlers().get(name).ok_or_else(|| {
                SyncError::mapping(format!(
                    "unknown handler '{name}' for {} records",
                    self.profile.kind()
                ))
            })?;
            return handler(node, descriptor, record);
        }

        if !descriptor.fields.is_empty() {
            for rule in &descriptor.fields {
                self.apply(rule, node, record)?;
            }
            return Ok(());
        }

        let Some(field) = descriptor.field.as_deref() else {
            return Ok(());
        };
        let raw = match &descriptor.attribute_source {
            Some(attribute) => node
                .attribute(attribute)
                .map(str::trim)
                .filter(|v| !v.is_empty()),
            None => node.data(),
        };
        let Some(raw) = raw else {
            return Ok(());
        };

        match descriptor.value_type {
            ValueType::Scalar => record.set(field, raw),
            ValueType::Boolean => record.set(field, strict_boolean(field, raw)?),
            ValueType::Array => record.append(field, raw),
        }
    }
}

/// `1`/`true` → 1 and `0`/`false` → 0, case-insensitive; anything else fails
pub fn strict_boolean(field: &str, raw: &str) -> Result<i64> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(1),
        "0" | "false" => Ok(0),
        _ => Err(SyncError::coercion(field, raw, "boolean")),
    }
}
