//! Group membership: enrollments and crosslist members

use tracing::debug;

use super::RecordProfile;
use crate::error::{Result, SyncError};
use crate::mapping::FieldDescriptor;
use crate::record::{Record, RecordKind};
use crate::transducer::{HandlerRegistry, TransduceContext};
use crate::tree::TreeNode;

/// LIS 2 role names and the Enterprise role codes they stand for
const LIS_ROLES: [(&str, &str); 8] = [
    ("learner", "01"),
    ("instructor", "02"),
    ("contentdeveloper", "03"),
    ("member", "04"),
    ("manager", "05"),
    ("mentor", "06"),
    ("administrator", "07"),
    ("teachingassistant", "08"),
];

const COMPOSITE_FIELDS: [&str; 3] = ["membersdid", "groupsdid", "roletype"];

/// A person's membership in a section or group
pub struct PersonMemberProfile {
    handlers: HandlerRegistry,
}

impl PersonMemberProfile {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new()
                .with("lisRole", lis_role)
                .with("lisStatus", lis_status),
        }
    }
}

impl Default for PersonMemberProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordProfile for PersonMemberProfile {
    fn kind(&self) -> RecordKind {
        RecordKind::PersonMember
    }

    fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Fill the composite key from a legacy message reference
    fn post_process(&self, record: &mut Record, _ctx: &mut TransduceContext<'_>) -> Result<()> {
        let complete = COMPOSITE_FIELDS.iter().all(|field| record.has_value(field));
        if complete {
            return Ok(());
        }
        let Some(reference) = record.get_text("messageref") else {
            return Ok(());
        };
        match parse_legacy_reference(&reference) {
            Some(parts) => {
                for (field, value) in COMPOSITE_FIELDS.iter().zip(parts) {
                    if !record.has_value(field) {
                        record.set(field, value)?;
                    }
                }
            }
            None => debug!("Message reference '{}' is not a legacy reference", reference),
        }
        Ok(())
    }
}

/// Split `membersdid|groupsdid|roletype`; every part must be non-empty
pub fn parse_legacy_reference(reference: &str) -> Option<[String; 3]> {
    let mut parts = reference.split('|').map(str::trim);
    let member = parts.next().filter(|p| !p.is_empty())?;
    let group = parts.next().filter(|p| !p.is_empty())?;
    let role = parts.next().filter(|p| !p.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some([member.to_string(), group.to_string(), role.to_string()])
}

/// LIS role name (or an existing two-digit code) to a role code
fn lis_role(node: &TreeNode, rule: &FieldDescriptor, record: &mut Record) -> Result<()> {
    let field = rule.field.as_deref().unwrap_or("roletype");
    let Some(raw) = node.data() else {
        return Ok(());
    };
    let code = if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_digit()) {
        raw.to_string()
    } else {
        let name = raw.to_ascii_lowercase();
        let name = name.rsplit('/').next().unwrap_or(&name);
        LIS_ROLES
            .iter()
            .find(|(role, _)| *role == name)
            .map(|(_, code)| code.to_string())
            .ok_or_else(|| SyncError::coercion(field, raw, "LIS role"))?
    };
    record.set(field, code)
}

/// `Active` → 1, `Inactive` → 0
fn lis_status(node: &TreeNode, rule: &FieldDescriptor, record: &mut Record) -> Result<()> {
    let field = rule.field.as_deref().unwrap_or("status");
    let Some(raw) = node.data() else {
        return Ok(());
    };
    let status: i64 = match raw.to_ascii_lowercase().as_str() {
        "active" => 1,
        "inactive" => 0,
        _ => return Err(SyncError::coercion(field, raw, "membership status")),
    };
    record.set(field, status)
}

/// A section's membership in a crosslist
pub struct CrosslistMemberProfile;

impl RecordProfile for CrosslistMemberProfile {
    fn kind(&self) -> RecordKind {
        RecordKind::CrosslistMember
    }
}
