use financial_report_analyzer::{
    agent::Orchestrator, api::start_server, config::AppConfig, gemini::GeminiClient,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration (.env included)
    let config = AppConfig::from_env()?;

    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; every analysis will fail until it is configured");
    }

    info!("Financial Report Analyzer - API Server");
    info!(
        port = config.api_port,
        model = %config.gemini_model,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let generator = Arc::new(GeminiClient::from_config(&config)?);
    let orchestrator = Arc::new(Orchestrator::from_config(&config, generator));

    info!("Orchestrator initialized");

    start_server(orchestrator, config.api_port, config.max_upload_bytes).await?;

    Ok(())
}
