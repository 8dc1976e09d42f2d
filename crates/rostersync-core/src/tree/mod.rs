//! Tree nodes: the parsed-document abstraction consumed by the transducer
//!
//! A [`TreeNode`] is a named element with an optional scalar value, a map of
//! attributes and an ordered multi-map of children. Element and attribute
//! names are lower-cased on the way in, so lookups are case-insensitive while
//! values keep their original case.

pub mod xml;

use indexmap::IndexMap;

pub use xml::parse_document;

/// A node of a parsed hierarchical document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    name: String,
    value: Option<String>,
    attributes: IndexMap<String, String>,
    children: IndexMap<String, Vec<TreeNode>>,
    data_bearing: bool,
}

impl TreeNode {
    /// Create an empty node with the given (case-normalized) name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            ..Default::default()
        }
    }

    /// Create a leaf node carrying a value
    pub fn leaf(name: &str, value: impl Into<String>) -> Self {
        Self::new(name).with_value(value)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.push_child(child);
        self
    }

    /// Mark the node as carrying data even when it also has children
    pub fn data_bearing(mut self) -> Self {
        self.data_bearing = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_lowercase(), value.into());
    }

    /// Append a child, keeping document order among children of the same name
    pub fn push_child(&mut self, child: TreeNode) {
        self.children
            .entry(child.name.clone())
            .or_default()
            .push(child);
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// All children with the given name, in document order
    ///
    /// Returns an empty slice when there is no such child.
    pub fn children(&self, name: &str) -> &[TreeNode] {
        self.children
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children(name).first()
    }

    pub fn has_child(&self, name: &str) -> bool {
        !self.children(name).is_empty()
    }

    /// Child groups in first-seen order
    pub fn child_groups(&self) -> impl Iterator<Item = (&str, &[TreeNode])> {
        self.children
            .iter()
            .map(|(name, nodes)| (name.as_str(), nodes.as_slice()))
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Walk a slash-separated child path, taking the first match at each step
    pub fn descend(&self, path: &str) -> Option<&TreeNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Whether the node carries a usable scalar value
    ///
    /// Whitespace-only values never count. A node with children only counts
    /// when it has been marked data-bearing.
    pub fn has_data(&self) -> bool {
        let has_text = self
            .value
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());
        has_text && (self.children.is_empty() || self.data_bearing)
    }

    /// The trimmed value, when the node has data
    pub fn data(&self) -> Option<&str> {
        if self.has_data() {
            self.value.as_deref().map(str::trim)
        } else {
            None
        }
    }

    /// Copy of this node without the named child group
    pub(crate) fn without_children_named(&self, name: &str) -> TreeNode {
        let name = name.to_lowercase();
        TreeNode {
            name: self.name.clone(),
            value: self.value.clone(),
            attributes: self.attributes.clone(),
            children: self
                .children
                .iter()
                .filter(|(child, _)| **child != *name)
                .map(|(child, nodes)| (child.clone(), nodes.clone()))
                .collect(),
            data_bearing: self.data_bearing,
        }
    }
}
