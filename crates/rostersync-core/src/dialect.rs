//! Feed dialect detection and message splitting
//!
//! Two dialects are understood:
//!
//! - **IMS Enterprise 1.1**: an `<enterprise>` document holding any number of
//!   `person`, `group` and `membership` messages.
//! - **IMS LIS 2.0**: one `replace*Request` per document, either bare or
//!   wrapped in a SOAP `Envelope/Body`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::tree::TreeNode;

const LIS_NAMESPACE: &str = "imsglobal.org/services/lis";

const LIS_REQUESTS: [(&str, MessageType); 4] = [
    ("replacepersonrequest", MessageType::Person),
    ("replacecoursesectionrequest", MessageType::Section),
    ("replacemembershiprequest", MessageType::Membership),
    ("replacegrouprequest", MessageType::Group),
];

/// Schema dialect of an incoming document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Enterprise,
    Lis2,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Enterprise, Dialect::Lis2];

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Enterprise => "enterprise",
            Dialect::Lis2 => "lis2",
        }
    }

    /// Inspect a document root and decide its dialect
    pub fn detect(root: &TreeNode) -> Result<Dialect> {
        if root.name() == "enterprise" {
            return Ok(Dialect::Enterprise);
        }
        if lis_request_type(root.name()).is_some()
            || soap_body(root).is_some()
            || declares_lis_namespace(root)
        {
            return Ok(Dialect::Lis2);
        }
        Err(SyncError::Discriminator {
            path: "dialect".to_string(),
            value: Some(root.name().to_string()),
        })
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single message describes, before any finer discrimination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Person,
    /// A group whose kind depends on a nested type value
    Group,
    Section,
    Membership,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Person => "person",
            MessageType::Group => "group",
            MessageType::Section => "section",
            MessageType::Membership => "membership",
        };
        f.write_str(name)
    }
}

/// One message of a document: the unit of error isolation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub dialect: Dialect,
    pub node: TreeNode,
}

impl Message {
    /// Classify the message by its element name
    pub fn message_type(&self) -> Result<MessageType> {
        let name = self.node.name();
        let found = match self.dialect {
            Dialect::Enterprise => match name {
                "person" => Some(MessageType::Person),
                "group" => Some(MessageType::Group),
                "membership" => Some(MessageType::Membership),
                _ => None,
            },
            Dialect::Lis2 => lis_request_type(name),
        };
        found.ok_or_else(|| SyncError::Discriminator {
            path: "message".to_string(),
            value: Some(name.to_string()),
        })
    }
}

/// Split a document into its messages, in document order per element name
///
/// Enterprise `properties` blocks carry no records and are skipped.
pub fn split_messages(root: &TreeNode) -> Result<Vec<Message>> {
    let dialect = Dialect::detect(root)?;
    let messages: Vec<Message> = match dialect {
        Dialect::Enterprise => root
            .child_groups()
            .filter(|(name, _)| *name != "properties")
            .flat_map(|(_, nodes)| nodes.iter())
            .map(|node| Message {
                dialect,
                node: node.clone(),
            })
            .collect(),
        Dialect::Lis2 => {
            let container = soap_body(root);
            let requests: Vec<&TreeNode> = match container {
                Some(body) => body
                    .child_groups()
                    .flat_map(|(_, nodes)| nodes.iter())
                    .collect(),
                None => vec![root],
            };
            requests
                .into_iter()
                .map(|node| Message {
                    dialect,
                    node: node.clone(),
                })
                .collect()
        }
    };
    debug!("Split {} document into {} message(s)", dialect, messages.len());
    Ok(messages)
}

/// Split an Enterprise membership into one node per `member`
///
/// Each result keeps every other child of the membership (its `sourcedid`
/// in particular) and exactly one member.
pub fn split_members(membership: &TreeNode) -> Vec<TreeNode> {
    let shell = membership.without_children_named("member");
    membership
        .children("member")
        .iter()
        .map(|member| shell.clone().with_child(member.clone()))
        .collect()
}

fn lis_request_type(name: &str) -> Option<MessageType> {
    LIS_REQUESTS
        .iter()
        .find(|(request, _)| *request == name)
        .map(|(_, message_type)| *message_type)
}

fn soap_body(root: &TreeNode) -> Option<&TreeNode> {
    if root.name() == "envelope" {
        root.child("body")
    } else {
        None
    }
}

fn declares_lis_namespace(root: &TreeNode) -> bool {
    root.attributes()
        .iter()
        .any(|(name, value)| name.starts_with("xmlns") && value.contains(LIS_NAMESPACE))
}
