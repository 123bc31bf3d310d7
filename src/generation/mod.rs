//! Structured generation boundary
//!
//! The remote model is reached only through the [`Generator`] trait. It
//! accepts an ordered list of prompt parts (text or inline media) plus an
//! optional response schema and returns raw text. Schema enforcement lives
//! here, on our side of the boundary.

use crate::error::AnalysisError;
use crate::schema::OutputSchema;
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub mod mock;
pub use mock::{MockGenerator, RecordedCall};

/// One piece of a multimodal prompt
#[derive(Debug, Clone)]
pub enum Part<'a> {
    Text(String),
    InlineData { mime_type: &'a str, data: &'a [u8] },
}

#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub parts: Vec<Part<'a>>,
    pub response_schema: Option<&'a OutputSchema>,
    pub temperature: f32,
}

impl<'a> GenerationRequest<'a> {
    /// Concatenated text parts, used for logging and test inspection.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(text) => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn media_types(&self) -> Vec<String> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::InlineData { mime_type, .. } => Some(mime_type.to_string()),
                Part::Text(_) => None,
            })
            .collect()
    }
}

/// Trait for the remote text generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

/// Run a request and validate the response against `schema` before
/// deserializing it. Mismatches surface as transient `SchemaMismatch`.
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &dyn Generator,
    request: &GenerationRequest<'_>,
    schema: &OutputSchema,
) -> Result<T> {
    let raw = generator.generate(request).await?;
    parse_structured(&raw, schema)
}

pub fn parse_structured<T: DeserializeOwned>(raw: &str, schema: &OutputSchema) -> Result<T> {
    let cleaned = strip_code_fence(raw);
    if cleaned.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| AnalysisError::SchemaMismatch(format!("response is not JSON: {}", e)))?;

    schema
        .validate(&value)
        .map_err(|v| AnalysisError::SchemaMismatch(v.to_string()))?;

    debug!("Structured response passed schema validation");

    serde_json::from_value(value).map_err(|e| AnalysisError::SchemaMismatch(e.to_string()))
}

fn strip_code_fence(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
