use clap::Parser;
use financial_report_analyzer::{
    agent::Orchestrator, config::AppConfig, gemini::GeminiClient, models::DocumentPayload,
    models::MetricRequest, AnalysisError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Analyze a financial report (PDF, image, office document, text or zip archive).
#[derive(Debug, Parser)]
#[command(name = "analyze", version, about)]
struct Cli {
    /// Document to analyze
    file: PathBuf,

    /// Metric to forecast (repeatable)
    #[arg(short, long = "metric", default_values_t = vec!["revenue growth".to_string()])]
    metrics: Vec<String>,

    /// Forecast horizon, e.g. "1 year"
    #[arg(long, default_value = "1 year")]
    horizon: String,

    /// Print the extracted report text instead of running the analysis
    #[arg(long)]
    extract_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e.user_message());
            eprintln!("Cause: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AnalysisError> {
    let config = AppConfig::from_env()?;
    let generator = Arc::new(GeminiClient::from_config(&config)?);
    let orchestrator = Orchestrator::from_config(&config, generator);

    let payload = DocumentPayload::from_path(&cli.file).await?;
    info!(
        file = %cli.file.display(),
        media_type = payload.media_type(),
        bytes = payload.len(),
        "Loaded document"
    );

    if cli.extract_only {
        let text = orchestrator.report_text(&payload).await?;
        println!("{}", text);
        return Ok(());
    }

    let request = MetricRequest::new(cli.metrics, cli.horizon);
    let result = orchestrator.analyze(&payload, &request).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
