//! People
//!
//! Enterprise feeds describe institution roles as attributes of one element;
//! LIS feeds spread names, contact details and roles over typed
//! `instanceName`/`instanceValue` pairs. Both end up in the same fields.

use tracing::trace;

use super::RecordProfile;
use crate::error::Result;
use crate::mapping::FieldDescriptor;
use crate::record::{Record, RecordKind};
use crate::transducer::{HandlerRegistry, TransduceContext};
use crate::tree::TreeNode;

pub struct PersonProfile {
    handlers: HandlerRegistry,
}

impl PersonProfile {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new()
                .with("institutionRole", institution_role)
                .with("lisInstitutionRole", lis_institution_role)
                .with("lisName", lis_name)
                .with("lisContact", lis_contact),
        }
    }
}

impl Default for PersonProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordProfile for PersonProfile {
    fn kind(&self) -> RecordKind {
        RecordKind::Person
    }

    fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    fn post_process(&self, record: &mut Record, _ctx: &mut TransduceContext<'_>) -> Result<()> {
        // A lone name part may be backfilled with the other one later
        if !record.has_value("fullname")
            && let (Some(given), Some(family)) = (
                record.get_text("givenname").filter(|part| !part.is_empty()),
                record.get_text("familyname").filter(|part| !part.is_empty()),
            )
        {
            record.set("fullname", format!("{given} {family}"))?;
        }
        Ok(())
    }
}

/// Role flag field for an institution role name
fn role_field(role: &str) -> Option<&'static str> {
    let normalized: String = role
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "student" | "learner" => Some("rolestudent"),
        "staff" => Some("rolestaff"),
        "faculty" | "instructor" => Some("rolefaculty"),
        "prospectivestudent" => Some("roleprospectivestudent"),
        "alumni" | "alum" => Some("rolealumni"),
        _ => None,
    }
}

fn apply_role(record: &mut Record, role: &str, primary: bool) -> Result<()> {
    match role_field(role) {
        Some(field) => record.set(field, 1_i64)?,
        None => trace!("Ignoring unknown institution role '{}'", role),
    }
    if primary {
        record.set("primaryrole", role)?;
    }
    Ok(())
}

/// `<institutionrole institutionroletype="Student" primaryrole="Yes"/>`
fn institution_role(node: &TreeNode, _rule: &FieldDescriptor, record: &mut Record) -> Result<()> {
    let Some(role) = node
        .attribute("institutionroletype")
        .map(str::trim)
        .filter(|r| !r.is_empty())
    else {
        return Ok(());
    };
    let primary = node
        .attribute("primaryrole")
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("yes"));
    apply_role(record, role, primary)
}

/// `<institutionRole><institutionRoleType>…<primaryRoleType>true</primaryRoleType>`
fn lis_institution_role(
    node: &TreeNode,
    _rule: &FieldDescriptor,
    record: &mut Record,
) -> Result<()> {
    let Some(role) = node
        .descend("institutionroletype/instancevalue/textstring")
        .and_then(TreeNode::data)
    else {
        return Ok(());
    };
    let primary = node
        .child("primaryroletype")
        .and_then(TreeNode::data)
        .is_some_and(|p| p.eq_ignore_ascii_case("true"));
    apply_role(record, role, primary)
}

/// One `<partName>` of a LIS name
fn lis_name(node: &TreeNode, _rule: &FieldDescriptor, record: &mut Record) -> Result<()> {
    let name = node.descend("instancename/textstring").and_then(TreeNode::data);
    let value = node.descend("instancevalue/textstring").and_then(TreeNode::data);
    let (Some(name), Some(value)) = (name, value) else {
        return Ok(());
    };
    let field = match name.to_ascii_lowercase().as_str() {
        "first" | "given" => "givenname",
        "last" | "family" => "familyname",
        "nickname" | "preferred" => "nickname",
        "middle" => "middlename",
        other => {
            trace!("Ignoring name part '{}'", other);
            return Ok(());
        }
    };
    record.set(field, value)
}

/// One `<contactinfo>` entry of a LIS person
fn lis_contact(node: &TreeNode, rule: &FieldDescriptor, record: &mut Record) -> Result<()> {
    let kind = node
        .descend("contactinfotype/instancevalue/textstring")
        .and_then(TreeNode::data);
    let value = node
        .descend("contactinfovalue/textstring")
        .and_then(TreeNode::data);
    let (Some(kind), Some(value)) = (kind, value) else {
        return Ok(());
    };
    let field = match kind.to_ascii_lowercase().as_str() {
        "email" | "emailprimary" => "email",
        "telephone" | "phone" | "telephoneprimary" => "telephone",
        _ => match rule.field.as_deref() {
            Some(fallback) => fallback,
            None => return Ok(()),
        },
    };
    record.set(field, value)
}
