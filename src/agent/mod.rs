//! Analysis orchestrator
//!
//! CLASSIFY → EXTRACT/AGGREGATE → ANALYZE → SUCCEEDED | FAILED
//!
//! Images go straight to the structured-analysis prompt. Archives are
//! expanded and aggregated; every other document goes through the text
//! extractor once. Remote calls run under the retry policy.

use crate::aggregator::Aggregator;
use crate::archive::ArchiveExpander;
use crate::classifier::MediaKind;
use crate::config::AppConfig;
use crate::error::{AnalysisError, ErrorKind};
use crate::extractor::TextExtractor;
use crate::generation::{generate_structured, Generator};
use crate::models::{AnalysisResult, Answer, DocumentPayload, MetricRequest};
use crate::prompts::{DocumentInput, PromptBook};
use crate::retry::RetryPolicy;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of one `analyze` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Classifying,
    Extracting,
    Aggregating,
    Analyzing,
    Succeeded,
    Failed(ErrorKind),
}

/// Entry point coordinating extraction and structured analysis
pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    prompts: Arc<PromptBook>,
    retry: RetryPolicy,
    extractor: TextExtractor,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<PromptBook>, retry: RetryPolicy) -> Self {
        let extractor = TextExtractor::new(generator.clone(), prompts.clone(), retry);
        Self {
            generator,
            prompts,
            retry,
            extractor,
        }
    }

    pub fn from_config(config: &AppConfig, generator: Arc<dyn Generator>) -> Self {
        Self::new(
            generator,
            Arc::new(PromptBook::new(config.allow_synthetic_stock_prices)),
            config.retry,
        )
    }

    /// Run the full analysis of one document.
    pub async fn analyze(
        &self,
        payload: &DocumentPayload,
        request: &MetricRequest,
    ) -> Result<AnalysisResult> {
        let start_time = Instant::now();
        let fingerprint = payload.fingerprint();

        info!(
            fingerprint = %fingerprint,
            media_type = payload.media_type(),
            bytes = payload.len(),
            metrics = request.metrics.len(),
            "Orchestrator: starting analysis"
        );

        let outcome = self.run_stages(payload, request, &fingerprint).await;

        match &outcome {
            Ok(result) => {
                enter(AnalysisStage::Succeeded, &fingerprint);
                info!(
                    fingerprint = %fingerprint,
                    key_metrics = result.key_metrics.len(),
                    forecasts = result.predictions.forecasts.len(),
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Orchestrator: analysis complete"
                );
            }
            Err(err) => {
                let kind = err.kind();
                enter(AnalysisStage::Failed(kind), &fingerprint);
                if kind == ErrorKind::ProcessingError {
                    error!(fingerprint = %fingerprint, cause = %err, "Orchestrator: processing failure");
                } else {
                    warn!(fingerprint = %fingerprint, code = kind.code(), error = %err, "Orchestrator: analysis failed");
                }
            }
        }

        outcome
    }

    /// Aggregated report text for a non-image document.
    ///
    /// Fails with `NoContentExtracted` when nothing but whitespace remains.
    pub async fn report_text(&self, payload: &DocumentPayload) -> Result<String> {
        let fingerprint = payload.fingerprint();
        self.collect_text(payload, payload.kind(), &fingerprint).await
    }

    /// Answer a free-form question against flattened analysis context.
    pub async fn answer_question(&self, question: &str, context: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnalysisError::InvalidPayload(
                "question must not be empty".to_string(),
            ));
        }

        info!(
            question_chars = question.len(),
            context_chars = context.len(),
            "Orchestrator: answering question"
        );

        let rendered = self.prompts.question_request(question, context);
        let schema = &self.prompts.question.schema;

        self.retry
            .run("question answering", || {
                generate_structured::<Answer>(self.generator.as_ref(), &rendered, schema)
            })
            .await
    }

    async fn run_stages(
        &self,
        payload: &DocumentPayload,
        request: &MetricRequest,
        fingerprint: &str,
    ) -> Result<AnalysisResult> {
        enter(AnalysisStage::Classifying, fingerprint);
        let kind = payload.kind();
        debug!(fingerprint, kind = ?kind, "Orchestrator: classified payload");

        if kind == MediaKind::Image {
            enter(AnalysisStage::Analyzing, fingerprint);
            return self
                .structured_analysis(DocumentInput::Media(payload), request)
                .await;
        }

        let text = self.collect_text(payload, kind, fingerprint).await?;

        enter(AnalysisStage::Analyzing, fingerprint);
        self.structured_analysis(DocumentInput::Text(&text), request)
            .await
    }

    async fn collect_text(
        &self,
        payload: &DocumentPayload,
        kind: MediaKind,
        fingerprint: &str,
    ) -> Result<String> {
        let text = if kind == MediaKind::Archive {
            enter(AnalysisStage::Extracting, fingerprint);
            let entries = ArchiveExpander::expand(payload.bytes())?;
            enter(AnalysisStage::Aggregating, fingerprint);
            Aggregator::new(&self.extractor).aggregate(&entries).await?
        } else {
            enter(AnalysisStage::Extracting, fingerprint);
            self.extractor.extract(payload).await?
        };

        if text.trim().is_empty() {
            return Err(AnalysisError::NoContentExtracted);
        }

        debug!(fingerprint, chars = text.len(), "Orchestrator: report text ready");
        Ok(text)
    }

    async fn structured_analysis(
        &self,
        document: DocumentInput<'_>,
        request: &MetricRequest,
    ) -> Result<AnalysisResult> {
        let rendered = self.prompts.analysis_request(document, request);
        let schema = &self.prompts.analysis.schema;

        self.retry
            .run("financial analysis", || {
                generate_structured::<AnalysisResult>(self.generator.as_ref(), &rendered, schema)
            })
            .await
    }
}

fn enter(stage: AnalysisStage, fingerprint: &str) {
    debug!(stage = ?stage, fingerprint, "Orchestrator: stage transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::build_zip;
    use crate::generation::MockGenerator;
    use std::time::Duration;
    use tokio_test::assert_ok;

    const ANALYSIS_JSON: &str = r#"{
        "summary": {"summary": "Revenue of $100 with $20 profit."},
        "keyMetrics": [{"name": "Net Margin", "value": "20%"}],
        "chartData": {
            "pnl": [{"period": "FY1", "revenue": 100, "profit": 20}],
            "cashFlow": [],
            "stockPrice": []
        },
        "predictions": {"forecasts": [{"metric": "revenue growth", "value": "8%", "commentary": "Modest growth."}]},
        "riskAssessment": {"risks": ["Thin data history"]}
    }"#;

    fn orchestrator(mock: Arc<MockGenerator>) -> Orchestrator {
        Orchestrator::new(mock, Arc::new(PromptBook::default()), RetryPolicy::default())
    }

    fn metric_request() -> MetricRequest {
        MetricRequest::new(vec!["revenue growth".into()], "1 year")
    }

    fn text_payload(text: &str) -> DocumentPayload {
        DocumentPayload::new(text.as_bytes().to_vec(), "text/plain")
    }

    #[tokio::test]
    async fn test_plain_text_single_analysis_call() {
        let mock = Arc::new(MockGenerator::always(ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());
        let payload = text_payload("Revenue: $100. Profit: $20.");

        let report = assert_ok!(orchestrator.report_text(&payload).await);
        assert_eq!(report, "Revenue: $100. Profit: $20.");
        assert_eq!(mock.call_count(), 0);

        let result = assert_ok!(orchestrator.analyze(&payload, &metric_request()).await);
        assert_eq!(result.summary.summary, "Revenue of $100 with $20 profit.");
        assert_eq!(result.key_metrics[0].change, None);

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Revenue: $100. Profit: $20."));
        assert!(calls[0].prompt.contains("revenue growth over a 1 year horizon"));
        assert!(calls[0].media_types.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_back_off_linearly() {
        let mock = Arc::new(MockGenerator::unavailable_then(2, ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());

        let result = orchestrator
            .analyze(&text_payload("Revenue: $5M"), &metric_request())
            .await;

        assert_ok!(result);
        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1].at - calls[0].at;
        let second_gap = calls[2].at - calls[1].at;
        assert!(first_gap >= Duration::from_millis(1000));
        assert!(second_gap >= Duration::from_millis(2000));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_unavailability_is_reported() {
        let mock = Arc::new(MockGenerator::unavailable_then(usize::MAX, ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());

        let err = orchestrator
            .analyze(&text_payload("Revenue: $5M"), &metric_request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AnalysisUnavailable);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schema_mismatch_is_retried() {
        let mock = Arc::new(MockGenerator::scripted(vec![
            Ok(r#"{"summary": "not an object"}"#.into()),
            Ok(format!("```json\n{}\n```", ANALYSIS_JSON)),
        ]));
        let orchestrator = orchestrator(mock.clone());

        let result = orchestrator
            .analyze(&text_payload("Revenue: $5M"), &metric_request())
            .await;

        assert_ok!(result);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_null_optional_flag_is_accepted_first_time() {
        let response = ANALYSIS_JSON.replace(
            r#""stockPrice": []"#,
            r#""stockPrice": [], "stockPriceIsEstimated": null"#,
        );
        assert!(response.contains("null"));
        let mock = Arc::new(MockGenerator::always(response));
        let orchestrator = orchestrator(mock.clone());

        let result = assert_ok!(
            orchestrator
                .analyze(&text_payload("Revenue: $5M"), &metric_request())
                .await
        );

        assert!(!result.chart_data.stock_price_is_estimated);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_archive_never_reaches_model() {
        let mock = Arc::new(MockGenerator::always(ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());
        let payload = DocumentPayload::new(b"PK\x03\x04 definitely not a zip".to_vec(), "application/zip");

        let err = orchestrator
            .analyze(&payload, &metric_request())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::ArchiveCorrupt(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_archive_without_eligible_entries() {
        let mock = Arc::new(MockGenerator::always(ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());
        let zip = build_zip(&[
            ("reports/", ""),
            ("__MACOSX/._q1.txt", "resource fork"),
            (".DS_Store", "finder"),
        ]);
        let payload = DocumentPayload::new(zip, "application/zip");

        let err = orchestrator
            .analyze(&payload, &metric_request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoContentExtracted);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_archive_text_is_aggregated_in_order() {
        let mock = Arc::new(MockGenerator::always(ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());
        let zip = build_zip(&[
            ("q1.txt", "Q1 revenue $10"),
            ("__MACOSX/._q1.txt", "resource fork"),
            ("q2.csv", "period,revenue\nQ2,12"),
        ]);
        let payload = DocumentPayload::new(zip, "application/x-zip-compressed");

        let report = assert_ok!(orchestrator.report_text(&payload).await);
        assert_eq!(report, "Q1 revenue $10\n\n---\n\nperiod,revenue\nQ2,12");
        assert!(!report.contains("resource fork"));

        assert_ok!(orchestrator.analyze(&payload, &metric_request()).await);
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Q1 revenue $10\n\n---\n\nperiod,revenue"));
    }

    #[tokio::test]
    async fn test_image_is_analyzed_directly() {
        let mock = Arc::new(MockGenerator::always(ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());
        let payload = DocumentPayload::new(vec![0x89, b'P', b'N', b'G'], "image/png");

        assert_ok!(orchestrator.analyze(&payload, &metric_request()).await);

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].media_types, vec!["image/png".to_string()]);
        assert!(calls[0].prompt.contains("Financial Document Image:"));
    }

    #[tokio::test]
    async fn test_whitespace_text_has_no_content() {
        let mock = Arc::new(MockGenerator::always(ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());

        let err = orchestrator
            .analyze(&text_payload("  \n\t "), &metric_request())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::NoContentExtracted));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent() {
        let mock = Arc::new(MockGenerator::always(ANALYSIS_JSON));
        let orchestrator = orchestrator(mock.clone());
        let payload = text_payload("Revenue: $100. Profit: $20.");

        let first = assert_ok!(orchestrator.analyze(&payload, &metric_request()).await);
        let second = assert_ok!(orchestrator.analyze(&payload, &metric_request()).await);

        assert_eq!(first, second);
        let calls = mock.calls();
        assert_eq!(calls[0].prompt, calls[1].prompt);
    }

    #[tokio::test]
    async fn test_answer_question_uses_context() {
        let mock = Arc::new(MockGenerator::always(r#"{"answer": "Net margin is 20%."}"#));
        let orchestrator = orchestrator(mock.clone());

        let answer = assert_ok!(
            orchestrator
                .answer_question("What is the net margin?", "Key Metrics: Net Margin: 20%")
                .await
        );

        assert_eq!(answer.answer, "Net margin is 20%.");
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Key Metrics: Net Margin: 20%"));
        assert!(calls[0].prompt.contains("What is the net margin?"));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let mock = Arc::new(MockGenerator::always(r#"{"answer": "unused"}"#));
        let orchestrator = orchestrator(mock.clone());

        let err = orchestrator.answer_question("   ", "context").await.unwrap_err();

        assert!(matches!(err, AnalysisError::InvalidPayload(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
