//! Discriminator dispatch
//!
//! Some messages only reveal their record kind several levels down (a group
//! is a term or a course section depending on its type value). A
//! [`Dispatcher`] reads that value and picks the kind; anything it has no
//! route for fails the message.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::record::RecordKind;
use crate::tree::TreeNode;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    path: String,
    attribute: Option<String>,
    routes: IndexMap<String, RecordKind>,
}

impl Dispatcher {
    /// Dispatch on the value found at a slash-separated child path
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            attribute: None,
            routes: IndexMap::new(),
        }
    }

    /// Read an attribute of the node at the path instead of its value
    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    /// Add a route; discriminator values compare case-insensitively
    pub fn route(mut self, value: &str, kind: RecordKind) -> Self {
        self.routes.insert(value.to_lowercase(), kind);
        self
    }

    pub fn discriminate(&self, node: &TreeNode) -> Result<RecordKind> {
        let value = node.descend(&self.path).and_then(|target| match &self.attribute {
            Some(attribute) => target
                .attribute(attribute)
                .map(str::trim)
                .filter(|v| !v.is_empty()),
            None => target.data(),
        });

        let Some(value) = value else {
            return Err(self.unrecognized(None));
        };

        match self.routes.get(&value.to_lowercase()) {
            Some(kind) => {
                debug!("Dispatched '{}' at {} to {}", value, self.location(), kind);
                Ok(*kind)
            }
            None => Err(self.unrecognized(Some(value.to_string()))),
        }
    }

    fn location(&self) -> String {
        match &self.attribute {
            Some(attribute) => format!("{}@{}", self.path, attribute),
            None => self.path.clone(),
        }
    }

    fn unrecognized(&self, value: Option<String>) -> SyncError {
        SyncError::Discriminator {
            path: self.location(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(type_value: &str) -> TreeNode {
        TreeNode::new("group").with_child(
            TreeNode::new("grouptype")
                .with_child(TreeNode::leaf("scheme", "Luminis"))
                .with_child(TreeNode::leaf("typevalue", type_value).with_attribute("level", "1")),
        )
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new("grouptype/typevalue")
            .route("Term", RecordKind::Term)
            .route("CourseSection", RecordKind::Section)
    }

    #[test]
    fn test_routes_by_value() {
        assert_eq!(dispatcher().discriminate(&group("Term")).unwrap(), RecordKind::Term);
        assert_eq!(
            dispatcher().discriminate(&group("coursesection")).unwrap(),
            RecordKind::Section
        );
    }

    #[test]
    fn test_unknown_value_names_path_and_value() {
        let err = dispatcher().discriminate(&group("Department")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unrecognized discriminator at 'grouptype/typevalue': Department"
        );
    }

    #[test]
    fn test_missing_discriminator() {
        let err = dispatcher().discriminate(&TreeNode::new("group")).unwrap_err();
        assert!(matches!(err, SyncError::Discriminator { value: None, .. }));
    }

    #[test]
    fn test_attribute_discriminator() {
        let by_level = Dispatcher::new("grouptype/typevalue")
            .with_attribute("level")
            .route("1", RecordKind::Section);
        assert_eq!(by_level.discriminate(&group("x")).unwrap(), RecordKind::Section);

        let err = Dispatcher::new("grouptype/scheme")
            .with_attribute("level")
            .discriminate(&group("x"))
            .unwrap_err();
        assert!(err.to_string().contains("grouptype/scheme@level"));
    }
}
