//! Multi-document aggregation
//!
//! Fans extraction out over every archive entry at once, then joins the
//! results in archive order (not completion order) with a visible
//! separator. There is no concurrency cap: an archive's entry count bounds
//! the number of in-flight model calls.

use crate::classifier::MediaKind;
use crate::extractor::TextExtractor;
use crate::models::ArchiveEntry;
use crate::Result;
use futures::future::try_join_all;
use tracing::{debug, info};

/// Separator placed between the text of consecutive entries.
pub const SEGMENT_SEPARATOR: &str = "\n\n---\n\n";

pub struct Aggregator<'a> {
    extractor: &'a TextExtractor,
}

impl<'a> Aggregator<'a> {
    pub fn new(extractor: &'a TextExtractor) -> Self {
        Self { extractor }
    }

    pub async fn aggregate(&self, entries: &[ArchiveEntry]) -> Result<String> {
        info!(entries = entries.len(), "Aggregating archive entries");

        let extractions = entries.iter().map(|entry| async move {
            if entry.payload.kind() == MediaKind::PlainText {
                debug!(path = %entry.path, "Decoding text entry");
                return Ok(entry.payload.decode_text());
            }
            debug!(path = %entry.path, media_type = entry.payload.media_type(), "Extracting entry");
            self.extractor.extract(&entry.payload).await
        });

        let segments = try_join_all(extractions).await?;

        Ok(segments.join(SEGMENT_SEPARATOR))
    }
}
