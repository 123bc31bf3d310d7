//! Financial Report Analyzer
//!
//! Turns an uploaded financial document into a structured analysis:
//! - Expands zip archives and classifies every entry by content type
//! - Extracts text locally (plain text) or through a multimodal model
//! - Aggregates many documents concurrently while preserving archive order
//! - Requests a schema-validated analysis (summary, metrics, charts,
//!   forecasts, risks) under a linear-backoff retry policy
//! - Answers follow-up questions against a prior analysis
//!
//! FLOW:
//! CLASSIFY → EXPAND → EXTRACT → AGGREGATE → ANALYZE → VALIDATE

pub mod agent;
pub mod aggregator;
pub mod api;
pub mod archive;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod generation;
pub mod models;
pub mod prompts;
pub mod retry;
pub mod schema;

pub use error::{AnalysisError, ErrorKind, Result};

// Re-export common types
pub use agent::Orchestrator;
pub use classifier::{ContentClassifier, MediaKind};
pub use models::*;
