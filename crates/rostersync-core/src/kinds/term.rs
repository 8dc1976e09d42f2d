use super::RecordProfile;
use crate::error::Result;
use crate::record::{Record, RecordKind};
use crate::transducer::TransduceContext;

/// Academic terms
pub struct TermProfile;

impl RecordProfile for TermProfile {
    fn kind(&self) -> RecordKind {
        RecordKind::Term
    }

    fn post_process(&self, record: &mut Record, _ctx: &mut TransduceContext<'_>) -> Result<()> {
        // Feeds often send only the long description
        if !record.has_value("shortdescription")
            && let Some(sdid) = record.get_text("sdid")
        {
            record.set("shortdescription", sdid)?;
        }
        Ok(())
    }
}
