//! Text extraction for a single document
//!
//! Plain text is decoded locally. Every other media type is sent to the
//! model's multimodal extraction prompt under the retry policy; if the
//! retry budget runs out the document contributes an empty string.

use crate::classifier::MediaKind;
use crate::error::AnalysisError;
use crate::generation::{generate_structured, Generator};
use crate::models::{DocumentPayload, ExtractedContent};
use crate::prompts::PromptBook;
use crate::retry::RetryPolicy;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TextExtractor {
    generator: Arc<dyn Generator>,
    prompts: Arc<PromptBook>,
    retry: RetryPolicy,
}

impl TextExtractor {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<PromptBook>, retry: RetryPolicy) -> Self {
        Self {
            generator,
            prompts,
            retry,
        }
    }

    pub async fn extract(&self, payload: &DocumentPayload) -> Result<String> {
        if payload.kind() == MediaKind::PlainText {
            debug!(media_type = payload.media_type(), "Decoding plain text locally");
            return Ok(payload.decode_text());
        }

        let request = self.prompts.extraction_request(payload);
        let schema = &self.prompts.extraction.schema;

        let outcome = self
            .retry
            .run("text extraction", || async {
                let extracted: ExtractedContent =
                    generate_structured(self.generator.as_ref(), &request, schema).await?;
                if extracted.content.trim().is_empty() {
                    // An empty extraction is retried like a transient failure.
                    return Err(AnalysisError::EmptyResponse);
                }
                Ok(extracted.content)
            })
            .await;

        match outcome {
            Ok(text) => {
                debug!(
                    media_type = payload.media_type(),
                    chars = text.len(),
                    "Extracted document text"
                );
                Ok(text)
            }
            Err(AnalysisError::AnalysisUnavailable { attempts, reason }) => {
                warn!(
                    media_type = payload.media_type(),
                    attempts,
                    reason = %reason,
                    "Extraction produced no content"
                );
                Ok(String::new())
            }
            Err(err) => Err(err),
        }
    }
}
