//! Custom field handlers
//!
//! A descriptor naming a `function` hands its source node to a handler
//! registered by the record profile under that name. Handlers may write any
//! number of fields.

use indexmap::IndexMap;

use crate::error::Result;
use crate::mapping::FieldDescriptor;
use crate::record::Record;
use crate::tree::TreeNode;

/// Signature of a custom field handler
pub type FieldHandler = fn(&TreeNode, &FieldDescriptor, &mut Record) -> Result<()>;

/// Name → handler table owned by a record profile
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: IndexMap<&'static str, FieldHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, handler: FieldHandler) -> Self {
        self.register(name, handler);
        self
    }

    pub fn register(&mut self, name: &'static str, handler: FieldHandler) {
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<FieldHandler> {
        self.handlers.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &TreeNode, _: &FieldDescriptor, _: &mut Record) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_registry_lookup() {
        let registry = HandlerRegistry::new().with("lisRole", noop);
        assert!(registry.get("lisRole").is_some());
        assert!(registry.get("lisrole").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["lisRole"]);
    }
}
