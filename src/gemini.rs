//! Gemini API client
//!
//! Implements the structured generation boundary over Gemini's
//! `generateContent` endpoint. Uses a long-lived reqwest::Client for
//! connection pooling.

use crate::config::AppConfig;
use crate::error::AnalysisError;
use crate::generation::{GenerationRequest, Generator, Part};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const MAX_OUTPUT_TOKENS: i32 = 8192;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, base_url: &str, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", base_url.trim_end_matches('/'), model),
        })
    }

    pub fn from_config(config: &AppConfig) -> crate::Result<Self> {
        Self::new(
            config.gemini_api_key.clone(),
            &config.gemini_model,
            &config.gemini_base_url,
            config.gemini_timeout,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let body = build_request(request);

        info!(parts = request.parts.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!("Gemini API request failed: {}", e);
                if e.is_timeout() || e.is_connect() {
                    AnalysisError::ServiceUnavailable(format!("Gemini API unreachable: {}", e))
                } else {
                    AnalysisError::LlmError(format!("Gemini API error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gemini API error response: {}", error_text);
            return Err(classify_status(status, &error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            error!("Failed to parse Gemini response: {}", e);
            AnalysisError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let answer = extract_text(gemini_response)?;
        debug!(chars = answer.len(), "Gemini response received");

        Ok(answer)
    }
}

/// 503 and 429 mean the service is busy; everything else is final.
fn classify_status(status: StatusCode, body: &str) -> AnalysisError {
    match status {
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS => {
            AnalysisError::ServiceUnavailable(format!("{} {}", status, body))
        }
        _ => AnalysisError::LlmError(format!("Gemini API error ({}): {}", status, body)),
    }
}

fn build_request(request: &GenerationRequest<'_>) -> GeminiRequest {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => GeminiPart::Text { text: text.clone() },
            Part::InlineData { mime_type, data } => GeminiPart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.to_string(),
                    data: BASE64.encode(data),
                },
            },
        })
        .collect();

    let schema = request.response_schema.map(|s| s.as_json().clone());

    GeminiRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            response_mime_type: schema.as_ref().map(|_| "application/json".to_string()),
            response_schema: schema,
        },
    }
}

fn extract_text(response: GeminiResponse) -> crate::Result<String> {
    if let Some(err) = response.error {
        return Err(AnalysisError::LlmError(format!(
            "Gemini API error: {}",
            err.message
        )));
    }

    let candidate = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or(AnalysisError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    Ok(text)
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{object, string, OutputSchema};

    fn client(api_key: &str) -> GeminiClient {
        GeminiClient::new(
            api_key.to_string(),
            "gemini-2.0-flash",
            "https://example.invalid/v1beta/models/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client("k").endpoint(),
            "https://example.invalid/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_serialization() {
        let schema = OutputSchema::new(object(vec![("content", string("text"), true)]));
        let data = b"%PDF-1.4".to_vec();
        let request = GenerationRequest {
            parts: vec![
                Part::Text("Extract all text".into()),
                Part::InlineData {
                    mime_type: "application/pdf",
                    data: &data,
                },
            ],
            response_schema: Some(&schema),
            temperature: 0.0,
        };

        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Extract all text");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "application/pdf"
        );
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["data"],
            BASE64.encode(b"%PDF-1.4")
        );
        assert_eq!(
            json["generation_config"]["response_mime_type"],
            "application/json"
        );
        assert_eq!(json["generation_config"]["response_schema"]["type"], "OBJECT");
    }

    #[test]
    fn test_plain_request_has_no_schema() {
        let request = GenerationRequest {
            parts: vec![Part::Text("hi".into())],
            response_schema: None,
            temperature: 0.3,
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert!(json["generation_config"].get("response_schema").is_none());
        assert!(json["generation_config"].get("response_mime_type").is_none());
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "quota").is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "bad").is_transient());
        assert!(!classify_status(StatusCode::FORBIDDEN, "key").is_transient());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extract_text_without_candidates_is_empty_response() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(AnalysisError::EmptyResponse)
        ));

        let response: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(AnalysisError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let request = GenerationRequest {
            parts: vec![Part::Text("What is EBITDA?".into())],
            response_schema: None,
            temperature: 0.3,
        };

        let result = client("").generate(&request).await;

        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(!error.is_transient());
        assert!(error.to_string().to_lowercase().contains("api_key"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_error_hides_api_key() {
        let client = GeminiClient::new(
            "SECRET123".to_string(),
            "m",
            "http://127.0.0.1:1/models",
            Duration::from_secs(2),
        )
        .unwrap();
        let request = GenerationRequest {
            parts: vec![Part::Text("Summarize".into())],
            response_schema: None,
            temperature: 0.2,
        };

        let error = client.generate(&request).await.unwrap_err();

        assert!(error.is_transient());
        assert!(!error.to_string().contains("SECRET123"));
        assert!(!client.endpoint().contains("SECRET123"));
    }
}
