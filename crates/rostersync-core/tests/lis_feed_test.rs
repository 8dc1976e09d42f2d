//! End-to-end processing of IMS LIS 2.0 requests

use std::fs;
use std::path::Path;

use rostersync_core::{
    Action, BatchReport, FieldValue, MemoryStore, MessageProcessor, NoopProvisioner, Record,
    RecordKind, SyncConfig, SyncError,
};

type Processor = MessageProcessor<MemoryStore, NoopProvisioner>;

fn processor() -> Processor {
    let mut config = SyncConfig::default();
    config.processing.stamp_audit = false;
    MessageProcessor::from_config(&config, MemoryStore::new(), NoopProvisioner).unwrap()
}

fn run(processor: &mut Processor, name: &str) -> BatchReport {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let xml = fs::read_to_string(path).unwrap();
    processor.process_xml(&xml).unwrap()
}

fn only(store: &MemoryStore, kind: RecordKind) -> Record {
    let mut records = store.records(kind);
    assert_eq!(records.len(), 1, "expected exactly one {kind} record");
    records.remove(0)
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_string()))
}

#[test]
fn test_soap_wrapped_person() {
    let mut processor = processor();
    let report = run(&mut processor, "lis_person.xml");
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.count(Action::Insert), 1);

    let ada = only(processor.store(), RecordKind::Person);
    assert_eq!(ada.get("sdid"), text("A0003"));
    assert_eq!(ada.get("sdidsource"), text("Banner"));
    assert_eq!(ada.get("givenname"), text("Ada"));
    assert_eq!(ada.get("familyname"), text("Lovelace"));
    assert_eq!(ada.get("fullname"), text("Ada Lovelace"));
    assert_eq!(ada.get("email"), text("alovelace@example.edu"));
    assert_eq!(ada.get("logonid"), text("alovelace"));
    assert_eq!(ada.get("rolefaculty"), Some(FieldValue::Integer(1)));
    assert_eq!(ada.get("primaryrole"), text("Faculty"));
}

#[test]
fn test_section_picks_up_term_name() {
    let mut processor = processor();
    run(&mut processor, "lis_term.xml");
    let report = run(&mut processor, "lis_section.xml");
    assert!(report.is_clean());

    let term = only(processor.store(), RecordKind::Term);
    assert_eq!(term.get("shortdescription"), text("Spring 25"));
    assert_eq!(term.get("begindate"), Some(FieldValue::Integer(1736726400)));

    let section = only(processor.store(), RecordKind::Section);
    assert_eq!(section.get("crn"), text("20001"));
    assert_eq!(section.get("rubric"), text("MATH-201-01"));
    assert_eq!(section.get("title"), text("Linear Algebra"));
    assert_eq!(section.get("deptname"), text("Mathematics"));
    assert_eq!(section.get("termsdid"), text("202520"));
    assert_eq!(section.get("termsdidsource"), text("Banner"));
    assert_eq!(section.get("enddate"), Some(FieldValue::Integer(1746748800)));
    assert_eq!(
        section.extra_fields().get("termname"),
        Some(&FieldValue::Text("Spring 2025".to_string()))
    );
}

#[test]
fn test_section_without_term_has_no_term_name() {
    let mut processor = processor();
    run(&mut processor, "lis_section.xml");

    let section = only(processor.store(), RecordKind::Section);
    assert!(section.extra_fields().get("termname").is_none());
}

#[test]
fn test_membership_role_names_become_codes() {
    let mut processor = processor();
    run(&mut processor, "lis_membership.xml");

    let member = only(processor.store(), RecordKind::PersonMember);
    assert_eq!(member.get("messageref"), text("A0003|20001.202520|Instructor"));
    assert_eq!(member.get("membersdid"), text("A0003"));
    assert_eq!(member.get("membersdidsource"), text("Banner"));
    assert_eq!(member.get("groupsdid"), text("20001.202520"));
    assert_eq!(member.get("groupsdidsource"), text("Banner"));
    assert_eq!(member.get("roletype"), text("02"));
    assert_eq!(member.get("status"), Some(FieldValue::Integer(1)));
}

#[test]
fn test_membership_resend_matches_on_reference() {
    let mut processor = processor();
    run(&mut processor, "lis_membership.xml");
    let report = run(&mut processor, "lis_membership.xml");

    assert_eq!(report.count(Action::NoOp), 1);
    assert_eq!(processor.store().len(RecordKind::PersonMember), 1);
}

#[test]
fn test_legacy_reference_fills_the_composite_key() {
    let xml = r#"<replaceMembershipRequest>
        <sourcedId>A0004|20001.202520|01</sourcedId>
        <membershipRecord>
            <membership>
                <member><role><status>Inactive</status></role></member>
            </membership>
        </membershipRecord>
    </replaceMembershipRequest>"#;
    let mut processor = processor();
    let report = processor.process_xml(xml).unwrap();
    assert!(report.is_clean());

    let member = only(processor.store(), RecordKind::PersonMember);
    assert_eq!(member.get("membersdid"), text("A0004"));
    assert_eq!(member.get("groupsdid"), text("20001.202520"));
    assert_eq!(member.get("roletype"), text("01"));
    assert_eq!(member.get("status"), Some(FieldValue::Integer(0)));
}

#[test]
fn test_unknown_status_is_a_coercion_error() {
    let xml = r#"<replaceMembershipRequest>
        <sourcedId>A0004|20001.202520|01</sourcedId>
        <membershipRecord>
            <membership>
                <member><role><status>Pending</status></role></member>
            </membership>
        </membershipRecord>
    </replaceMembershipRequest>"#;
    let mut processor = processor();
    let report = processor.process_xml(xml).unwrap();

    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.failures[0].error,
        SyncError::Coercion { ref field, ref value, .. } if field == "status" && value == "Pending"
    ));
    assert_eq!(processor.store().len(RecordKind::PersonMember), 0);
}

#[test]
fn test_crosslist_members_from_relationships() {
    let mut processor = processor();
    let report = run(&mut processor, "lis_crosslist.xml");
    assert!(report.is_clean());
    assert_eq!(report.count(Action::Insert), 3);

    let store = processor.store();
    let crosslist = only(store, RecordKind::Crosslist);
    assert_eq!(crosslist.get("sdid"), text("XLSCD202520"));
    assert_eq!(crosslist.get("type"), text("merge"));
    assert!(crosslist.extra_fields().is_empty());

    let members = store.records(RecordKind::CrosslistMember);
    let sdids: Vec<String> = members
        .iter()
        .filter_map(|member| member.get_text("sdid"))
        .collect();
    assert_eq!(sdids, vec!["20001.202520", "20002.202520"]);
    for member in &members {
        assert_eq!(member.get("sdidsource"), text("Banner"));
        assert_eq!(member.get("crosslistsdid"), text("XLSCD202520"));
        assert_eq!(
            member.get("crosslistid"),
            Some(FieldValue::Integer(crosslist.id().unwrap().0))
        );
        assert_eq!(member.get("status"), Some(FieldValue::Integer(1)));
    }
}

#[test]
fn test_configured_crosslist_type() {
    let mut config = SyncConfig::default();
    config.processing.crosslist_type = "meta".to_string();
    let mut processor =
        MessageProcessor::from_config(&config, MemoryStore::new(), NoopProvisioner).unwrap();
    run(&mut processor, "lis_crosslist.xml");

    let crosslist = only(processor.store(), RecordKind::Crosslist);
    assert_eq!(crosslist.get("type"), text("meta"));
}
