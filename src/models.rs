//! Core data models for the financial report analyzer

use crate::classifier::{ContentClassifier, MediaKind};
use crate::error::AnalysisError;
use crate::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

//
// ================= Document Payload =================
//

/// Raw input document plus its declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    bytes: Vec<u8>,
    media_type: String,
}

impl DocumentPayload {
    pub fn new(bytes: Vec<u8>, media_type: impl AsRef<str>) -> Self {
        Self {
            bytes,
            media_type: normalize_media_type(media_type.as_ref()),
        }
    }

    /// Decode a `data:<mime>;base64,<data>` identifier.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri.trim().strip_prefix("data:").ok_or_else(|| {
            AnalysisError::InvalidPayload("data URI must start with 'data:'".to_string())
        })?;

        let (header, data) = rest.split_once(',').ok_or_else(|| {
            AnalysisError::InvalidPayload("data URI is missing the ',' separator".to_string())
        })?;

        let mut params = header.split(';');
        let media_type = params.next().unwrap_or_default();
        if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(AnalysisError::InvalidPayload(
                "only base64-encoded data URIs are supported".to_string(),
            ));
        }
        if media_type.trim().is_empty() {
            return Err(AnalysisError::InvalidPayload(
                "data URI does not declare a media type".to_string(),
            ));
        }

        let bytes = BASE64.decode(data.trim()).map_err(|e| {
            AnalysisError::InvalidPayload(format!("data URI is not valid base64: {}", e))
        })?;

        Ok(Self::new(bytes, media_type))
    }

    /// Read a local file, inferring its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let media_type = ContentClassifier::media_type_for_path(&path.to_string_lossy());
        Ok(Self::new(bytes, media_type))
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn kind(&self) -> MediaKind {
        ContentClassifier::kind_of_mime(&self.media_type)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 of the payload bytes, used to identify documents in logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Lossy UTF-8 decode of the payload.
    pub fn decode_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl fmt::Debug for DocumentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentPayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn normalize_media_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_lowercase()
}

//
// ================= Archive Entry =================
//

/// One file expanded from a compressed container.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub payload: DocumentPayload,
}

//
// ================= Metric Request =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricRequest {
    pub metrics: Vec<String>,
    pub forecast_horizon: String,
}

impl MetricRequest {
    pub fn new(metrics: Vec<String>, forecast_horizon: impl Into<String>) -> Self {
        Self {
            metrics,
            forecast_horizon: forecast_horizon.into(),
        }
    }
}

//
// ================= Analysis Result =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SummarySection {
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyMetric {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(default)]
    pub pnl: Vec<TimeSeriesPoint>,
    #[serde(default)]
    pub cash_flow: Vec<TimeSeriesPoint>,
    #[serde(default)]
    pub stock_price: Vec<TimeSeriesPoint>,
    /// Set when the stock price series was generated rather than read from the document.
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock_price_is_estimated: bool,
}

/// Optional schema fields may come back as `null`; treat that like absence.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    pub metric: String,
    pub value: String,
    pub commentary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Predictions {
    #[serde(default)]
    pub forecasts: Vec<Forecast>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    #[serde(default)]
    pub risks: Vec<String>,
}

/// Structured financial analysis of one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: SummarySection,
    #[serde(default)]
    pub key_metrics: Vec<KeyMetric>,
    #[serde(default)]
    pub chart_data: ChartData,
    #[serde(default)]
    pub predictions: Predictions,
    #[serde(default)]
    pub risk_assessment: RiskAssessment,
}

impl AnalysisResult {
    /// Flatten the result into context text for follow-up questions.
    pub fn to_context_text(&self) -> String {
        let metrics = self
            .key_metrics
            .iter()
            .map(|m| format!("{}: {}", m.name, m.value))
            .collect::<Vec<_>>()
            .join(", ");

        let forecasts = self
            .predictions
            .forecasts
            .iter()
            .map(|f| format!("{}: {} ({})", f.metric, f.value, f.commentary))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Summary: {}\nKey Metrics: {}\nForecasts: {}\nRisks: {}",
            self.summary.summary,
            metrics,
            forecasts,
            self.risk_assessment.risks.join(", ")
        )
    }
}

//
// ================= Question Answering =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
}

/// Model output of the text extraction prompt.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExtractedContent {
    #[serde(default)]
    pub content: String,
}
