//! Error types for the financial report analyzer

use serde::Serialize;
use thiserror::Error;

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {

    // =============================
    // Caller-facing failures
    // =============================

    #[error("Archive could not be opened: {0}")]
    ArchiveCorrupt(String),

    #[error("No text could be extracted from the document")]
    NoContentExtracted,

    #[error("Analysis unavailable after {attempts} attempt(s): {reason}")]
    AnalysisUnavailable { attempts: u32, reason: String },

    #[error("Processing error: {0}")]
    Processing(String),

    // =============================
    // Transient remote failures
    // =============================

    #[error("Model service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Model output does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    // =============================
    // Other internal failures
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Invalid document payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Stable error classification exposed to callers.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ArchiveCorrupt,
    NoContentExtracted,
    AnalysisUnavailable,
    ProcessingError,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ArchiveCorrupt => "ARCHIVE_CORRUPT",
            ErrorKind::NoContentExtracted => "NO_CONTENT_EXTRACTED",
            ErrorKind::AnalysisUnavailable => "ANALYSIS_UNAVAILABLE",
            ErrorKind::ProcessingError => "PROCESSING_ERROR",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::ArchiveCorrupt => {
                "Failed to process the uploaded file. It might be corrupted or in an unsupported format."
            }
            ErrorKind::NoContentExtracted => {
                "Could not extract any text from the uploaded document(s). Please check the file format and content."
            }
            ErrorKind::AnalysisUnavailable => {
                "The AI model is currently busy. Please try again in a few moments."
            }
            ErrorKind::ProcessingError => {
                "An unexpected error occurred while processing the document."
            }
        }
    }
}

impl AnalysisError {
    /// Collapse any failure into one of the four caller-facing kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::ArchiveCorrupt(_) => ErrorKind::ArchiveCorrupt,
            AnalysisError::NoContentExtracted => ErrorKind::NoContentExtracted,
            AnalysisError::AnalysisUnavailable { .. } => ErrorKind::AnalysisUnavailable,
            _ => ErrorKind::ProcessingError,
        }
    }

    /// Whether the retry policy may attempt the call again.
    pub fn is_transient(&self) -> bool {
        match self {
            AnalysisError::ServiceUnavailable(_)
            | AnalysisError::SchemaMismatch(_)
            | AnalysisError::EmptyResponse => true,
            AnalysisError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}
