//! Per-kind field schemas
//!
//! A [`KindSchema`] fixes, for one record kind, which fields are core fields,
//! their defaults and coercions, which fields must never be blanked during
//! reconciliation, and the ordered natural-key candidates used to find the
//! persisted row.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::FieldValue;
use super::coerce::Coercion;

/// Core field holding the serialized extra-field bag
pub const ADDITIONAL_DATA: &str = "additionaldata";

/// Audit field, excluded from change detection
pub const AUDIT_FIELD: &str = "timemodified";

/// The kinds of entity a feed message can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Term,
    Section,
    Person,
    PersonMember,
    Crosslist,
    CrosslistMember,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Term,
        RecordKind::Section,
        RecordKind::Person,
        RecordKind::PersonMember,
        RecordKind::Crosslist,
        RecordKind::CrosslistMember,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Term => "term",
            RecordKind::Section => "section",
            RecordKind::Person => "person",
            RecordKind::PersonMember => "person_member",
            RecordKind::Crosslist => "crosslist",
            RecordKind::CrosslistMember => "crosslist_member",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn schema(self) -> &'static KindSchema {
        match self {
            RecordKind::Term => &TERM,
            RecordKind::Section => &SECTION,
            RecordKind::Person => &PERSON,
            RecordKind::PersonMember => &PERSON_MEMBER,
            RecordKind::Crosslist => &CROSSLIST,
            RecordKind::CrosslistMember => &CROSSLIST_MEMBER,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field model of one record kind
#[derive(Debug)]
pub struct KindSchema {
    pub kind: RecordKind,
    core_fields: Vec<&'static str>,
    defaults: IndexMap<&'static str, FieldValue>,
    do_not_blank: Vec<&'static str>,
    coercions: IndexMap<&'static str, Coercion>,
    natural_keys: Vec<Vec<&'static str>>,
    /// Field flipped to `0` when a member is tombstoned
    pub status_field: Option<&'static str>,
    /// Field linking a member to its owning group's storage identity
    pub owner_field: Option<&'static str>,
}

impl KindSchema {
    fn new(kind: RecordKind, fields: &[&'static str]) -> Self {
        let mut core_fields = fields.to_vec();
        core_fields.extend([ADDITIONAL_DATA, AUDIT_FIELD]);
        let mut coercions = IndexMap::new();
        coercions.insert(AUDIT_FIELD, Coercion::Integer);
        Self {
            kind,
            core_fields,
            defaults: IndexMap::new(),
            do_not_blank: Vec::new(),
            coercions,
            natural_keys: Vec::new(),
            status_field: None,
            owner_field: None,
        }
    }

    fn default_int(mut self, field: &'static str, value: i64) -> Self {
        self.defaults.insert(field, FieldValue::Integer(value));
        self
    }

    fn default_text(mut self, field: &'static str, value: &str) -> Self {
        self.defaults.insert(field, FieldValue::Text(value.to_string()));
        self
    }

    fn protect(mut self, fields: &[&'static str]) -> Self {
        self.do_not_blank.extend_from_slice(fields);
        self
    }

    fn coerce(mut self, coercion: Coercion, fields: &[&'static str]) -> Self {
        for field in fields {
            self.coercions.insert(*field, coercion);
        }
        self
    }

    fn key(mut self, fields: &[&'static str]) -> Self {
        self.natural_keys.push(fields.to_vec());
        self
    }

    fn status(mut self, field: &'static str) -> Self {
        self.status_field = Some(field);
        self
    }

    fn owner(mut self, field: &'static str) -> Self {
        self.owner_field = Some(field);
        self
    }

    pub fn core_fields(&self) -> &[&'static str] {
        &self.core_fields
    }

    pub fn is_core(&self, field: &str) -> bool {
        self.core_fields.iter().any(|core| *core == field)
    }

    pub fn default_for(&self, field: &str) -> Option<&FieldValue> {
        self.defaults.get(field)
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.defaults.iter().map(|(field, value)| (*field, value))
    }

    pub fn do_not_blank(&self) -> &[&'static str] {
        &self.do_not_blank
    }

    pub fn is_protected(&self, field: &str) -> bool {
        self.do_not_blank.iter().any(|protected| *protected == field)
    }

    pub fn coercion(&self, field: &str) -> Option<Coercion> {
        self.coercions.get(field).copied()
    }

    /// Natural-key candidates in lookup priority order
    pub fn natural_keys(&self) -> &[Vec<&'static str>] {
        &self.natural_keys
    }
}

static TERM: LazyLock<KindSchema> = LazyLock::new(|| {
    KindSchema::new(
        RecordKind::Term,
        &[
            "sdid",
            "sdidsource",
            "description",
            "shortdescription",
            "begindate",
            "enddate",
            "sortorder",
            "active",
        ],
    )
    .key(&["sdid", "sdidsource"])
    .protect(&["description"])
    .default_int("active", 1)
    .coerce(Coercion::Date, &["begindate", "enddate"])
    .coerce(Coercion::Integer, &["sortorder"])
    .coerce(Coercion::Boolean, &["active"])
});

static SECTION: LazyLock<KindSchema> = LazyLock::new(|| {
    KindSchema::new(
        RecordKind::Section,
        &[
            "sdid",
            "sdidsource",
            "crn",
            "title",
            "rubric",
            "description",
            "termsdid",
            "termsdidsource",
            "deptname",
            "begindate",
            "beginrestrict",
            "enddate",
            "endrestrict",
        ],
    )
    .key(&["sdid", "sdidsource"])
    .protect(&["title", "termsdid"])
    .default_int("beginrestrict", 0)
    .default_int("endrestrict", 0)
    .default_int("begindate", 0)
    .default_int("enddate", 0)
    .coerce(Coercion::Date, &["begindate", "enddate"])
    .coerce(Coercion::Boolean, &["beginrestrict", "endrestrict"])
    .coerce(Coercion::Trim, &["title", "rubric"])
});

static PERSON: LazyLock<KindSchema> = LazyLock::new(|| {
    KindSchema::new(
        RecordKind::Person,
        &[
            "sdid",
            "sdidsource",
            "logonid",
            "sctid",
            "emailid",
            "fullname",
            "nickname",
            "familyname",
            "givenname",
            "email",
            "telephone",
            "primaryrole",
            "rolestudent",
            "rolestaff",
            "rolefaculty",
            "roleprospectivestudent",
            "rolealumni",
        ],
    )
    .key(&["sdid", "sdidsource"])
    .protect(&["email", "givenname", "familyname", "logonid", "sctid"])
    .default_int("rolestudent", 0)
    .default_int("rolestaff", 0)
    .default_int("rolefaculty", 0)
    .default_int("roleprospectivestudent", 0)
    .default_int("rolealumni", 0)
    .coerce(
        Coercion::Boolean,
        &[
            "rolestudent",
            "rolestaff",
            "rolefaculty",
            "roleprospectivestudent",
            "rolealumni",
        ],
    )
    .coerce(Coercion::Lowercase, &["email"])
    .coerce(Coercion::Trim, &["logonid", "givenname", "familyname"])
});

static PERSON_MEMBER: LazyLock<KindSchema> = LazyLock::new(|| {
    KindSchema::new(
        RecordKind::PersonMember,
        &[
            "messageref",
            "membersdid",
            "membersdidsource",
            "groupsdid",
            "groupsdidsource",
            "roletype",
            "status",
            "begindate",
            "beginrestrict",
            "enddate",
            "endrestrict",
            "gradable",
            "midtermgrademode",
            "finalgrademode",
        ],
    )
    .key(&["messageref"])
    .key(&[
        "membersdid",
        "membersdidsource",
        "groupsdid",
        "groupsdidsource",
        "roletype",
    ])
    .default_int("status", 1)
    .default_int("beginrestrict", 0)
    .default_int("endrestrict", 0)
    .default_int("gradable", 0)
    .coerce(Coercion::Date, &["begindate", "enddate"])
    .coerce(
        Coercion::Boolean,
        &["status", "beginrestrict", "endrestrict", "gradable"],
    )
    .status("status")
});

static CROSSLIST: LazyLock<KindSchema> = LazyLock::new(|| {
    KindSchema::new(RecordKind::Crosslist, &["sdid", "sdidsource", "type"])
        .key(&["sdid", "sdidsource"])
        .default_text("type", "merge")
        .coerce(Coercion::Lowercase, &["type"])
});

static CROSSLIST_MEMBER: LazyLock<KindSchema> = LazyLock::new(|| {
    KindSchema::new(
        RecordKind::CrosslistMember,
        &[
            "sdid",
            "sdidsource",
            "crosslistid",
            "crosslistsdid",
            "status",
            "type",
        ],
    )
    .key(&["sdid", "crosslistid"])
    .default_int("status", 1)
    .coerce(Coercion::Boolean, &["status"])
    .coerce(Coercion::Integer, &["crosslistid"])
    .status("status")
    .owner("crosslistid")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_shared_core_fields() {
        for kind in RecordKind::ALL {
            let schema = kind.schema();
            assert_eq!(schema.kind, kind);
            assert!(schema.is_core(ADDITIONAL_DATA), "{kind}");
            assert!(schema.is_core(AUDIT_FIELD), "{kind}");
            assert!(!schema.natural_keys().is_empty(), "{kind}");
        }
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::from_name("department"), None);
    }

    #[test]
    fn test_member_kinds_declare_status() {
        assert_eq!(RecordKind::CrosslistMember.schema().status_field, Some("status"));
        assert_eq!(RecordKind::CrosslistMember.schema().owner_field, Some("crosslistid"));
        assert_eq!(RecordKind::Section.schema().status_field, None);
    }

    #[test]
    fn test_membership_key_fallback_order() {
        let keys = RecordKind::PersonMember.schema().natural_keys();
        assert_eq!(keys[0], vec!["messageref"]);
        assert_eq!(keys[1].len(), 5);
    }
}
