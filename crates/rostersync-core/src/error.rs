//! Error types for feed processing

use std::path::PathBuf;
use thiserror::Error;

use crate::record::RecordKind;

/// Main error type for transduction and reconciliation
///
/// Every variant aborts the single message (or record) that raised it. The
/// batch driver in [`crate::processor`] catches per message and continues.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A type discriminator was missing or had no route
    #[error("Unrecognized discriminator at '{path}': {}", value.as_deref().unwrap_or("<missing>"))]
    Discriminator { path: String, value: Option<String> },

    /// A value could not be converted to the declared type of a field
    #[error("Cannot coerce '{value}' to {expected} for field '{field}'")]
    Coercion {
        field: String,
        value: String,
        expected: &'static str,
    },

    /// A record lacks a field needed to identify it
    #[error("{kind} record is missing required key field '{field}'")]
    BadRecord { kind: RecordKind, field: String },

    /// The persistence boundary rejected a lookup or write
    #[error("Failed to write {kind} record: {message}")]
    UpdateFailure { kind: RecordKind, message: String },

    /// Mapping specification is malformed or references an unknown handler
    #[error("Mapping error: {message}")]
    Mapping { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Downstream provisioning failed after reconciliation
    #[error("Provisioning of {kind} record failed: {source}")]
    Provision {
        kind: RecordKind,
        #[source]
        source: crate::processor::ProvisionError,
    },

    #[error("Failed to parse {file}: {message}")]
    Parse { file: PathBuf, message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Discriminator,
    Coercion,
    BadRecord,
    UpdateFailure,
    Mapping,
    Config,
    Provision,
    Input,
}

impl SyncError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Discriminator { .. } => ErrorKind::Discriminator,
            SyncError::Coercion { .. } => ErrorKind::Coercion,
            SyncError::BadRecord { .. } => ErrorKind::BadRecord,
            SyncError::UpdateFailure { .. } => ErrorKind::UpdateFailure,
            SyncError::Mapping { .. } => ErrorKind::Mapping,
            SyncError::Config { .. } => ErrorKind::Config,
            SyncError::Provision { .. } => ErrorKind::Provision,
            SyncError::Parse { .. }
            | SyncError::Xml(_)
            | SyncError::Io(_)
            | SyncError::Json(_) => ErrorKind::Input,
        }
    }

    /// Whether the error is confined to one message, so a batch may go on
    ///
    /// Configuration and mapping errors affect every message that follows and
    /// stop the batch.
    pub fn is_message_scoped(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Config | ErrorKind::Mapping)
    }

    pub(crate) fn coercion(field: &str, value: impl Into<String>, expected: &'static str) -> Self {
        Self::Coercion {
            field: field.to_string(),
            value: value.into(),
            expected,
        }
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_message_names_value() {
        let err = SyncError::Discriminator {
            path: "grouptype/typevalue".to_string(),
            value: Some("Department".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Unrecognized discriminator at 'grouptype/typevalue': Department"
        );

        let missing = SyncError::Discriminator {
            path: "member/idtype".to_string(),
            value: None,
        };
        assert!(missing.to_string().contains("<missing>"));
    }

    #[test]
    fn test_bad_record_names_field() {
        let err = SyncError::BadRecord {
            kind: RecordKind::Section,
            field: "sdidsource".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "section record is missing required key field 'sdidsource'"
        );
        assert_eq!(err.kind(), ErrorKind::BadRecord);
        assert!(err.is_message_scoped());
    }

    #[test]
    fn test_mapping_errors_stop_the_batch() {
        assert!(!SyncError::mapping("unknown handler").is_message_scoped());
        assert!(
            !SyncError::Config {
                message: "bad".to_string()
            }
            .is_message_scoped()
        );
        assert!(SyncError::coercion("status", "maybe", "boolean").is_message_scoped());
    }
}
