use super::RecordProfile;
use crate::error::{Result, SyncError};
use crate::record::{Record, RecordKind};
use crate::transducer::TransduceContext;

/// Crosslist types an LMS knows how to build
pub const CROSSLIST_TYPES: [&str; 2] = ["merge", "meta"];

/// Crosslisted section groups
pub struct CrosslistProfile;

impl RecordProfile for CrosslistProfile {
    fn kind(&self) -> RecordKind {
        RecordKind::Crosslist
    }

    fn post_process(&self, record: &mut Record, _ctx: &mut TransduceContext<'_>) -> Result<()> {
        if let Some(kind) = record.get_text("type")
            && !CROSSLIST_TYPES.contains(&kind.as_str())
        {
            return Err(SyncError::coercion("type", kind, "crosslist type (merge or meta)"));
        }
        Ok(())
    }
}
