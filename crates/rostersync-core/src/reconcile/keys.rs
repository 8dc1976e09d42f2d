//! Natural-key resolution strategies

use crate::error::{Result, SyncError};
use crate::record::Record;
use crate::store::NaturalKey;

/// Produces the lookup keys for a record, most specific first
pub trait NaturalKeyStrategy: Send + Sync {
    /// Complete candidate keys in lookup order
    ///
    /// Fails with [`SyncError::BadRecord`] when the record cannot be
    /// identified at all.
    fn candidates(&self, record: &Record) -> Result<Vec<NaturalKey>>;
}

/// The kind schema's candidates in declared order, skipping incomplete ones
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedKeys;

impl NaturalKeyStrategy for OrderedKeys {
    fn candidates(&self, record: &Record) -> Result<Vec<NaturalKey>> {
        let schema = record.schema();
        let mut keys = Vec::new();

        for fields in schema.natural_keys() {
            let mut key = NaturalKey::new();
            let mut complete = true;
            for field in fields {
                match record.get(field).filter(|value| !value.is_blank()) {
                    Some(value) => key = key.with(field, value),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            let missing = schema
                .natural_keys()
                .first()
                .and_then(|fields| {
                    fields
                        .iter()
                        .find(|field| record.get(field).is_none_or(|v| v.is_blank()))
                })
                .copied()
                .unwrap_or("id");
            return Err(SyncError::BadRecord {
                kind: record.kind(),
                field: missing.to_string(),
            });
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    #[test]
    fn test_first_missing_field_is_named() {
        let mut record = Record::new(RecordKind::Section);
        record.set("sdid", "10001.202410").unwrap();
        let err = OrderedKeys.candidates(&record).unwrap_err();
        assert!(matches!(
            err,
            SyncError::BadRecord { kind: RecordKind::Section, ref field } if field == "sdidsource"
        ));
    }

    #[test]
    fn test_blank_values_do_not_complete_a_key() {
        let mut record = Record::new(RecordKind::Term);
        record.set("sdid", "").unwrap();
        record.set("sdidsource", "Banner").unwrap();
        let err = OrderedKeys.candidates(&record).unwrap_err();
        assert!(matches!(err, SyncError::BadRecord { ref field, .. } if field == "sdid"));
    }

    #[test]
    fn test_membership_candidates_in_priority_order() {
        let mut record = Record::new(RecordKind::PersonMember);
        for (field, value) in [
            ("messageref", "A0001|10001.202410|01"),
            ("membersdid", "A0001"),
            ("membersdidsource", "Banner"),
            ("groupsdid", "10001.202410"),
            ("groupsdidsource", "Banner"),
            ("roletype", "01"),
        ] {
            record.set(field, value).unwrap();
        }

        let keys = OrderedKeys.candidates(&record).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].get("messageref").is_some());
        assert_eq!(keys[1].parts().len(), 5);

        record.clear("messageref");
        let keys = OrderedKeys.candidates(&record).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].get("messageref").is_none());
    }
}
