//! Prompt definitions
//!
//! Each definition pairs a template with its output schema. The whole book
//! is built once at startup and shared by reference with the orchestrator.
//!
//! Templates use `{{name}}` placeholders, substituted in a single pass so
//! that user-provided text is never re-scanned for placeholders. The
//! `{{document}}` placeholder marks where the document is spliced in as its
//! own prompt part (text or inline media).

use crate::generation::{GenerationRequest, Part};
use crate::models::{DocumentPayload, MetricRequest};
use crate::schema::{array, boolean, number, object, string, OutputSchema};

const DOCUMENT_PLACEHOLDER: &str = "document";

const ANALYSIS_TEMPLATE: &str = r#"You are an expert financial analyst. Based on the provided financial document(s), perform a comprehensive analysis.

1. **Summary**: Generate a concise summary of the key financial information.
2. **Key Metrics**: Extract the most important financial KPIs. Include the value and any period-over-period change if available.
3. **Chart Data**: Extract time-series data for P&L (revenue, profit), Cash Flow, and Stock Price. Provide at least 4-6 data points if possible to create meaningful charts. The period should be consistent (e.g., monthly or quarterly). {{stockPriceGuidance}}
4. **Predictions**: Forecast future financial performance for the following metrics: {{metrics}} over a {{forecastHorizon}} horizon. Provide a forecasted value and a brief commentary for each.
5. **Risk Assessment**: Identify and list potential financial risks.

{{documentHeading}}{{document}}

Return the entire analysis in a single JSON object with keys for summary, keyMetrics, chartData, predictions, and riskAssessment."#;

const SYNTHETIC_STOCK_GUIDANCE: &str = "If stock price is not available, generate realistic sample data for it based on the company's overall performance and set chartData.stockPriceIsEstimated to true. Otherwise set it to false.";

const STRICT_STOCK_GUIDANCE: &str = "If stock price is not available in the document, leave chartData.stockPrice empty. Never invent stock prices. Set chartData.stockPriceIsEstimated to false.";

const EXTRACTION_TEMPLATE: &str = r#"Extract all text content from the following document.
Return a JSON object with a single "content" field holding the extracted text.
Document: {{document}}"#;

const QUESTION_TEMPLATE: &str = r#"You are an AI-powered CFO assistant. Use the provided financial report to answer the user's question.

Financial Report:
{{financialReport}}

Question:
{{question}}

Answer:"#;

/// Document slot content for a rendered prompt
#[derive(Debug, Clone, Copy)]
pub enum DocumentInput<'a> {
    Text(&'a str),
    Media(&'a DocumentPayload),
}

/// A named template bound to its output schema
#[derive(Debug, Clone)]
pub struct PromptDefinition {
    pub name: &'static str,
    template: String,
    pub schema: OutputSchema,
    pub temperature: f32,
}

impl PromptDefinition {
    pub fn new(
        name: &'static str,
        template: impl Into<String>,
        schema: OutputSchema,
        temperature: f32,
    ) -> Self {
        Self {
            name,
            template: template.into(),
            schema,
            temperature,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the template into prompt parts.
    pub fn render<'a>(
        &'a self,
        vars: &[(&str, &str)],
        document: Option<DocumentInput<'a>>,
    ) -> GenerationRequest<'a> {
        let mut parts = Vec::new();
        let mut buffer = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            let name = rest[start + 2..start + 2 + len].trim();
            buffer.push_str(&rest[..start]);

            if name == DOCUMENT_PLACEHOLDER {
                match document {
                    Some(DocumentInput::Text(text)) => buffer.push_str(text),
                    Some(DocumentInput::Media(payload)) => {
                        if !buffer.is_empty() {
                            parts.push(Part::Text(std::mem::take(&mut buffer)));
                        }
                        parts.push(Part::InlineData {
                            mime_type: payload.media_type(),
                            data: payload.bytes(),
                        });
                    }
                    None => {}
                }
            } else if let Some((_, value)) = vars.iter().find(|(key, _)| *key == name) {
                buffer.push_str(value);
            } else {
                // Unknown placeholders are left verbatim.
                buffer.push_str(&rest[start..start + 4 + len]);
            }

            rest = &rest[start + 4 + len..];
        }

        buffer.push_str(rest);
        if !buffer.is_empty() {
            parts.push(Part::Text(buffer));
        }

        GenerationRequest {
            parts,
            response_schema: Some(&self.schema),
            temperature: self.temperature,
        }
    }
}

/// All prompt definitions used by the analyzer
#[derive(Debug, Clone)]
pub struct PromptBook {
    pub analysis: PromptDefinition,
    pub extraction: PromptDefinition,
    pub question: PromptDefinition,
}

impl Default for PromptBook {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PromptBook {
    pub fn new(allow_synthetic_stock_prices: bool) -> Self {
        let guidance = if allow_synthetic_stock_prices {
            SYNTHETIC_STOCK_GUIDANCE
        } else {
            STRICT_STOCK_GUIDANCE
        };

        Self {
            analysis: PromptDefinition::new(
                "financialAnalysis",
                ANALYSIS_TEMPLATE.replace("{{stockPriceGuidance}}", guidance),
                analysis_schema(),
                0.2,
            ),
            extraction: PromptDefinition::new(
                "extractTextFromDocument",
                EXTRACTION_TEMPLATE,
                extraction_schema(),
                0.0,
            ),
            question: PromptDefinition::new(
                "answerFinancialQuestion",
                QUESTION_TEMPLATE,
                answer_schema(),
                0.3,
            ),
        }
    }

    /// Structured-analysis request over report text or a raw image.
    pub fn analysis_request<'a>(
        &'a self,
        document: DocumentInput<'a>,
        request: &MetricRequest,
    ) -> GenerationRequest<'a> {
        let metrics = request.metrics.join(", ");
        let heading = match document {
            DocumentInput::Text(_) => "Financial Document Content:\n",
            DocumentInput::Media(_) => "Financial Document Image:\n",
        };

        self.analysis.render(
            &[
                ("metrics", metrics.as_str()),
                ("forecastHorizon", request.forecast_horizon.as_str()),
                ("documentHeading", heading),
            ],
            Some(document),
        )
    }

    pub fn extraction_request<'a>(&'a self, payload: &'a DocumentPayload) -> GenerationRequest<'a> {
        self.extraction
            .render(&[], Some(DocumentInput::Media(payload)))
    }

    pub fn question_request<'a>(&'a self, question: &str, context: &str) -> GenerationRequest<'a> {
        self.question.render(
            &[("financialReport", context), ("question", question)],
            None,
        )
    }
}

//
// ================= Schemas =================
//

fn time_series_point() -> serde_json::Value {
    object(vec![
        (
            "period",
            string("The time period for the data point (e.g., 'Q1 2023', 'Jan', '2022')."),
            true,
        ),
        ("revenue", number("The revenue for the period."), false),
        ("profit", number("The net profit for the period."), false),
        ("cashFlow", number("The cash flow for the period."), false),
        ("stockPrice", number("The stock price for the period."), false),
    ])
}

pub fn analysis_schema() -> OutputSchema {
    let key_metric = object(vec![
        (
            "name",
            string("The name of the Key Performance Indicator (e.g., 'Gross Profit Margin')."),
            true,
        ),
        (
            "value",
            string("The value of the KPI (e.g., '60%' or '$1.35M')."),
            true,
        ),
        (
            "change",
            string("The period-over-period change, if available (e.g., '+5.2%' or '-$50k')."),
            false,
        ),
    ]);

    let forecast = object(vec![
        (
            "metric",
            string("The name of the financial metric being forecasted."),
            true,
        ),
        (
            "value",
            string("The forecasted value for the metric (e.g., '18 months', '20%', '$1.5M')."),
            true,
        ),
        (
            "commentary",
            string("A brief commentary on the forecast."),
            true,
        ),
    ]);

    let chart_data = object(vec![
        (
            "pnl",
            array(
                time_series_point(),
                "Data points for the Profit & Loss chart, containing period, revenue, and profit.",
            ),
            true,
        ),
        (
            "cashFlow",
            array(
                time_series_point(),
                "Data points for the Cash Flow chart, containing period and cash flow values.",
            ),
            true,
        ),
        (
            "stockPrice",
            array(
                time_series_point(),
                "Data points for the Stock Price chart, containing period and stock price values.",
            ),
            true,
        ),
        (
            "stockPriceIsEstimated",
            boolean("True when the stock price series was generated rather than taken from the document."),
            false,
        ),
    ]);

    OutputSchema::new(object(vec![
        (
            "summary",
            object(vec![(
                "summary",
                string("A concise summary of the financial report, highlighting the most critical insights."),
                true,
            )]),
            true,
        ),
        (
            "keyMetrics",
            array(
                key_metric,
                "The most important key financial metrics derived from the report.",
            ),
            true,
        ),
        ("chartData", chart_data, true),
        (
            "predictions",
            object(vec![(
                "forecasts",
                array(forecast, "Financial metric forecasts."),
                true,
            )]),
            true,
        ),
        (
            "riskAssessment",
            object(vec![(
                "risks",
                array(
                    string("A potential financial risk."),
                    "Potential financial risks identified from the report.",
                ),
                true,
            )]),
            true,
        ),
    ]))
}

pub fn extraction_schema() -> OutputSchema {
    OutputSchema::new(object(vec![(
        "content",
        string("All text content extracted from the document."),
        true,
    )]))
}

pub fn answer_schema() -> OutputSchema {
    OutputSchema::new(object(vec![(
        "answer",
        string("The answer to the question about the financial data."),
        true,
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analysis_request_embeds_text_and_metrics() {
        let book = PromptBook::default();
        let request = MetricRequest::new(
            vec!["revenue growth".into(), "burn rate".into()],
            "1 year",
        );
        let rendered = book.analysis_request(
            DocumentInput::Text("Revenue: $100. Profit: $20."),
            &request,
        );

        assert_eq!(rendered.parts.len(), 1);
        let prompt = rendered.prompt_text();
        assert!(prompt.contains("following metrics: revenue growth, burn rate over a 1 year horizon"));
        assert!(prompt.contains("Financial Document Content:\nRevenue: $100. Profit: $20."));
        assert!(prompt.contains("generate realistic sample data"));
        assert!(rendered.media_types().is_empty());
        assert!(rendered.response_schema.is_some());
    }

    #[test]
    fn test_analysis_request_with_image_uses_inline_part() {
        let book = PromptBook::default();
        let image = DocumentPayload::new(vec![0x89, b'P', b'N', b'G'], "image/png");
        let request = MetricRequest::new(vec!["runway".into()], "5 years");
        let rendered = book.analysis_request(DocumentInput::Media(&image), &request);

        assert_eq!(rendered.parts.len(), 3);
        assert!(matches!(rendered.parts[1], Part::InlineData { mime_type: "image/png", .. }));
        match &rendered.parts[0] {
            Part::Text(text) => assert!(text.ends_with("Financial Document Image:\n")),
            _ => panic!("expected leading text part"),
        }
        assert!(rendered.prompt_text().contains("Return the entire analysis"));
    }

    #[test]
    fn test_user_text_is_not_rescanned_for_placeholders() {
        let book = PromptBook::default();
        let rendered = book.question_request("What about {{financialReport}}?", "Summary: ok");
        let prompt = rendered.prompt_text();
        assert!(prompt.contains("Question:\nWhat about {{financialReport}}?"));
        assert!(prompt.contains("Financial Report:\nSummary: ok"));
    }

    #[test]
    fn test_strict_stock_guidance() {
        let book = PromptBook::new(false);
        assert!(book.analysis.template().contains("Never invent stock prices"));
        assert!(!book.analysis.template().contains("{{stockPriceGuidance}}"));
    }

    #[test]
    fn test_extraction_request_carries_media() {
        let book = PromptBook::default();
        let pdf = DocumentPayload::new(b"%PDF-1.4".to_vec(), "application/pdf");
        let rendered = book.extraction_request(&pdf);
        assert_eq!(rendered.media_types(), vec!["application/pdf".to_string()]);
        assert!(rendered.prompt_text().starts_with("Extract all text content"));
    }

    #[test]
    fn test_analysis_schema_accepts_well_formed_result() {
        let value = json!({
            "summary": {"summary": "Revenue grew."},
            "keyMetrics": [{"name": "Revenue", "value": "$100", "change": "+5%"}],
            "chartData": {
                "pnl": [{"period": "Q1", "revenue": 100, "profit": 20}],
                "cashFlow": [],
                "stockPrice": [{"period": "Q1", "stockPrice": 12.5}],
                "stockPriceIsEstimated": true
            },
            "predictions": {"forecasts": [{"metric": "revenue growth", "value": "10%", "commentary": "steady"}]},
            "riskAssessment": {"risks": ["Customer concentration"]}
        });
        assert!(analysis_schema().validate(&value).is_ok());
    }

    #[test]
    fn test_analysis_schema_rejects_string_numbers() {
        let value = json!({
            "summary": {"summary": "Revenue grew."},
            "keyMetrics": [],
            "chartData": {"pnl": [{"period": "Q1", "revenue": "100"}], "cashFlow": [], "stockPrice": []},
            "predictions": {"forecasts": []},
            "riskAssessment": {"risks": []}
        });
        let err = analysis_schema().validate(&value).unwrap_err();
        assert_eq!(err.path, "$.chartData.pnl[0].revenue");
    }
}
