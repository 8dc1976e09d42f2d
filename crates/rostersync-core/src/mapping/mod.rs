//! Mapping specifications
//!
//! A mapping specification is a declarative JSON tree describing how to walk
//! a [`TreeNode`](crate::tree::TreeNode) and where to put the values it finds.
//! Each key names a child element; its rule is one of:
//!
//! - a string: the destination field for the child's value
//! - a descriptor object (keys drawn from `field`, `function`, `fields`,
//!   `requiredAttributes`, `attributeSource`, `valueType`)
//! - any other object: a nested specification applied to the child
//!
//! ```json
//! {
//!   "sourcedid": { "source": "sdidsource", "id": "sdid" },
//!   "userid": { "field": "logonid", "requiredAttributes": { "useridtype": "Logon ID" } },
//!   "timeframe": {
//!     "begin": {
//!       "fields": [
//!         "begindate",
//!         { "field": "beginrestrict", "attributeSource": "restrict", "valueType": "boolean" }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Specifications are loaded once and shared read-only across messages.

pub mod loader;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::tree::TreeNode;

pub use loader::{MappingLoader, MappingSet};

const DESCRIPTOR_KEYS: [&str; 6] = [
    "field",
    "function",
    "fields",
    "requiredAttributes",
    "attributeSource",
    "valueType",
];

/// How an extracted value is coerced and stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueType {
    #[default]
    Scalar,
    /// Strict `1`/`true`/`0`/`false`, stored as `1` or `0`
    Boolean,
    /// Each occurrence is appended to a list field
    Array,
}

impl ValueType {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "scalar" => Ok(ValueType::Scalar),
            "boolean" => Ok(ValueType::Boolean),
            "array" => Ok(ValueType::Array),
            other => Err(SyncError::mapping(format!("unknown valueType '{other}'"))),
        }
    }
}

/// Terminal rule with options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDescriptor {
    pub field: Option<String>,
    /// Name of a custom handler supplied by the record profile
    pub function: Option<String>,
    /// Several rules applied to the same source node
    ///
    /// Entries are usually field names or descriptors; a nested map walks the
    /// node's own children, which lets one element feed both an attribute
    /// and its sub-elements.
    pub fields: Vec<MappingRule>,
    /// Attribute name → expected value; all must match for the rule to apply
    pub required_attributes: IndexMap<String, String>,
    /// Read this attribute instead of the node value
    pub attribute_source: Option<String>,
    pub value_type: ValueType,
}

impl FieldDescriptor {
    pub fn for_field(field: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            ..Default::default()
        }
    }

    /// Whether every required attribute is present on the node with the expected value
    pub fn matches(&self, node: &TreeNode) -> bool {
        self.required_attributes
            .iter()
            .all(|(name, expected)| node.attribute(name) == Some(expected.as_str()))
    }

    fn from_object(map: Map<String, Value>) -> Result<Self> {
        let mut descriptor = FieldDescriptor::default();

        for (key, value) in map {
            match key.as_str() {
                "field" => descriptor.field = Some(expect_string(&key, value)?),
                "function" => descriptor.function = Some(expect_string(&key, value)?),
                "attributeSource" => {
                    descriptor.attribute_source = Some(expect_string(&key, value)?)
                }
                "valueType" => {
                    descriptor.value_type = ValueType::parse(&expect_string(&key, value)?)?
                }
                "requiredAttributes" => {
                    let Value::Object(attrs) = value else {
                        return Err(SyncError::mapping("requiredAttributes must be an object"));
                    };
                    for (name, expected) in attrs {
                        let expected = expect_string(&name, expected)?;
                        descriptor.required_attributes.insert(name.to_lowercase(), expected);
                    }
                }
                "fields" => {
                    let Value::Array(items) = value else {
                        return Err(SyncError::mapping("fields must be an array"));
                    };
                    for item in items {
                        descriptor.fields.push(MappingRule::try_from(item)?);
                    }
                }
                _ => unreachable!("descriptor keys are checked before parsing"),
            }
        }

        if descriptor.function.is_none()
            && descriptor.fields.is_empty()
            && descriptor.field.is_none()
        {
            return Err(SyncError::mapping(
                "descriptor needs a 'field', 'function' or 'fields' entry",
            ));
        }
        Ok(descriptor)
    }
}

/// One rule of a mapping specification
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum MappingRule {
    /// Destination field name
    Field(String),
    Descriptor(Box<FieldDescriptor>),
    /// Structural recursion into the child
    Nested(MappingSpec),
}

impl TryFrom<Value> for MappingRule {
    type Error = SyncError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(field) => Ok(MappingRule::Field(field)),
            Value::Object(map) if is_descriptor(&map) => {
                FieldDescriptor::from_object(map).map(|d| MappingRule::Descriptor(Box::new(d)))
            }
            Value::Object(map) => MappingSpec::from_object(map).map(MappingRule::Nested),
            other => Err(SyncError::mapping(format!(
                "a rule must be a string or an object, found {other}"
            ))),
        }
    }
}

/// Ordered map of source child name → rule
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct MappingSpec {
    rules: IndexMap<String, MappingRule>,
}

impl MappingSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule (builder style, mostly for tests and embedded specs)
    pub fn with_rule(mut self, source: &str, rule: MappingRule) -> Self {
        self.rules.insert(source.to_lowercase(), rule);
        self
    }

    /// Rules in declaration order
    pub fn rules(&self) -> impl Iterator<Item = (&str, &MappingRule)> {
        self.rules.iter().map(|(source, rule)| (source.as_str(), rule))
    }

    pub fn get(&self, source: &str) -> Option<&MappingRule> {
        self.rules.get(&source.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::try_from(value)
    }

    /// Load a specification from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content).map_err(|e| SyncError::Parse {
            file: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn from_object(map: Map<String, Value>) -> Result<Self> {
        let mut rules = IndexMap::with_capacity(map.len());
        for (source, value) in map {
            let rule = MappingRule::try_from(value)
                .map_err(|e| SyncError::mapping(format!("under '{source}': {e}")))?;
            rules.insert(source.to_lowercase(), rule);
        }
        Ok(Self { rules })
    }
}

impl TryFrom<Value> for MappingSpec {
    type Error = SyncError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_object(map),
            other => Err(SyncError::mapping(format!(
                "a mapping specification must be an object, found {other}"
            ))),
        }
    }
}

fn is_descriptor(map: &Map<String, Value>) -> bool {
    let only_descriptor_keys = map.keys().all(|key| DESCRIPTOR_KEYS.contains(&key.as_str()));
    let names_target = ["field", "function", "fields"]
        .iter()
        .any(|key| map.contains_key(*key));
    only_descriptor_keys && names_target
}

fn expect_string(key: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(SyncError::mapping(format!("'{key}' must be a string, found {other}"))),
    }
}
