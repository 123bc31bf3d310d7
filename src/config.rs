//! Runtime configuration
//!
//! Loaded once at process start from the environment (and `.env` via dotenv).

use crate::error::AnalysisError;
use crate::retry::RetryPolicy;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout: Duration,
    pub api_port: u16,
    pub retry: RetryPolicy,
    pub allow_synthetic_stock_prices: bool,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_timeout: Duration::from_secs(120),
            api_port: 8080,
            retry: RetryPolicy::default(),
            allow_synthetic_stock_prices: true,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_attempts = parse_or(&get, "RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?;
        if max_attempts == 0 {
            return Err(AnalysisError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let base_delay_ms: u64 = parse_or(
            &get,
            "RETRY_BASE_DELAY_MS",
            defaults.retry.base_delay.as_millis() as u64,
        )?;
        let attempt_timeout = match get("ATTEMPT_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value("ATTEMPT_TIMEOUT_SECS", &raw)?)),
            None => None,
        };

        let api_port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.api_port,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: get("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_base_url),
            gemini_timeout: Duration::from_secs(parse_or(
                &get,
                "GEMINI_TIMEOUT_SECS",
                defaults.gemini_timeout.as_secs(),
            )?),
            api_port,
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(base_delay_ms),
                attempt_timeout,
            },
            allow_synthetic_stock_prices: parse_bool_or(
                &get,
                "ALLOW_SYNTHETIC_STOCK_PRICES",
                defaults.allow_synthetic_stock_prices,
            )?,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AnalysisError::Config(format!("{} has invalid value '{}'", key, raw)))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AnalysisError::Config(format!(
                "{} has invalid value '{}'",
                key, v
            ))),
        },
    }
}
