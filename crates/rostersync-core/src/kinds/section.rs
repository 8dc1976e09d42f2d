//! Course sections
//!
//! Post-processing fills in what Banner-style feeds leave implicit:
//!
//! - a section source id of the form `CRN.TERM` (for example `10001.202410`)
//!   yields `crn` and, when the feed gave none, `termsdid`
//! - a title that repeats the rubric (`ENG-101-01 Intro to Writing`) loses
//!   the repeated prefix
//! - the term's description is looked up and kept as extra field `termname`

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::RecordProfile;
use crate::error::Result;
use crate::record::{Record, RecordKind};
use crate::transducer::TransduceContext;

static COMPOSITE_SDID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\w+)$").unwrap());

pub struct SectionProfile;

impl RecordProfile for SectionProfile {
    fn kind(&self) -> RecordKind {
        RecordKind::Section
    }

    fn post_process(&self, record: &mut Record, ctx: &mut TransduceContext<'_>) -> Result<()> {
        if let Some(sdid) = record.get_text("sdid")
            && let Some(captures) = COMPOSITE_SDID.captures(&sdid)
        {
            if !record.has_value("crn") {
                record.set("crn", &captures[1])?;
            }
            if !record.has_value("termsdid") {
                record.set("termsdid", &captures[2])?;
            }
        }

        if !record.has_value("termsdidsource")
            && record.has_value("termsdid")
            && let Some(source) = record.get_text("sdidsource")
        {
            record.set("termsdidsource", source)?;
        }

        if let (Some(title), Some(rubric)) = (record.get_text("title"), record.get_text("rubric"))
            && let Some(stripped) = strip_rubric(&title, &rubric)
        {
            record.set("title", stripped)?;
        }

        if let (Some(termsdid), Some(source)) =
            (record.get_text("termsdid"), record.get_text("termsdidsource"))
        {
            match ctx.term(&termsdid, &source)? {
                Some(term) => {
                    if let Some(name) = term.get_text("description") {
                        record.set("termname", name)?;
                    }
                }
                None => debug!("Term {}/{} not known yet", source, termsdid),
            }
        }

        Ok(())
    }
}

/// Title with a leading rubric and its separators removed
///
/// `None` when the title does not start with the rubric or nothing would be
/// left of it.
fn strip_rubric(title: &str, rubric: &str) -> Option<String> {
    if rubric.is_empty() || title.len() <= rubric.len() {
        return None;
    }
    let (head, rest) = title.split_at_checked(rubric.len())?;
    if !head.eq_ignore_ascii_case(rubric) {
        return None;
    }
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '_'));
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TermCache;
    use crate::store::{MemoryStore, RecordStore};

    fn section(sdid: &str) -> Record {
        let mut record = Record::new(RecordKind::Section);
        record.set("sdid", sdid).unwrap();
        record.set("sdidsource", "Banner").unwrap();
        record
    }

    #[test]
    fn test_composite_sdid_split() {
        let mut record = section("10001.202410");
        SectionProfile
            .post_process(&mut record, &mut TransduceContext::detached())
            .unwrap();
        assert_eq!(record.get_text("crn").as_deref(), Some("10001"));
        assert_eq!(record.get_text("termsdid").as_deref(), Some("202410"));
        assert_eq!(record.get_text("termsdidsource").as_deref(), Some("Banner"));
    }

    #[test]
    fn test_explicit_term_is_kept() {
        let mut record = section("10001.202410");
        record.set("termsdid", "202420").unwrap();
        SectionProfile
            .post_process(&mut record, &mut TransduceContext::detached())
            .unwrap();
        assert_eq!(record.get_text("termsdid").as_deref(), Some("202420"));
    }

    #[test]
    fn test_plain_sdid_derives_nothing() {
        let mut record = section("ENG101");
        SectionProfile
            .post_process(&mut record, &mut TransduceContext::detached())
            .unwrap();
        assert!(!record.has("crn"));
        assert!(!record.has("termsdidsource"));
    }

    #[test]
    fn test_strip_rubric() {
        assert_eq!(
            strip_rubric("ENG-101-01 Intro to Writing", "ENG-101-01").as_deref(),
            Some("Intro to Writing")
        );
        assert_eq!(
            strip_rubric("eng-101-01: Intro", "ENG-101-01").as_deref(),
            Some("Intro")
        );
        assert_eq!(strip_rubric("Intro to Writing", "ENG-101-01"), None);
        assert_eq!(strip_rubric("ENG-101-01", "ENG-101-01"), None);
        assert_eq!(strip_rubric("ENG-101-01 - ", "ENG-101-01"), None);
    }

    #[test]
    fn test_term_name_from_cache() {
        let mut store = MemoryStore::new();
        let mut term = Record::new(RecordKind::Term);
        term.set("sdid", "202410").unwrap();
        term.set("sdidsource", "Banner").unwrap();
        term.set("description", "Fall 2024").unwrap();
        store.insert(RecordKind::Term, &term).unwrap();

        let mut cache = TermCache::new();
        let mut record = section("10001.202410");
        let mut ctx = TransduceContext::with_terms(&mut cache, &store);
        SectionProfile.post_process(&mut record, &mut ctx).unwrap();

        assert_eq!(record.get_text("termname").as_deref(), Some("Fall 2024"));
        assert!(record.extra_fields().contains_key("termname"));
    }
}
