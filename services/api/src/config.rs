//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// API key for the OpenAI-compatible completion endpoint.
    pub completion_api_key: Option<String>,
    /// Base URL of the completion endpoint. Groq by default.
    pub completion_api_base: String,
    pub completion_model: String,
    pub completion_temperature: f32,
    pub completion_max_tokens: u32,
    pub completion_timeout_secs: u64,
    /// Server key for the payment gateway's Snap-style API.
    pub payment_server_key: Option<String>,
    pub payment_base_url: String,
    /// Length of the entitlement window granted per paid order.
    pub subscription_days: i64,
    /// Platform cut of the gross amount, in percent.
    pub platform_fee_percent: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Completion Service Settings ---
        let completion_api_key = std::env::var("GROQ_API_KEY")
            .or_else(|_| std::env::var("COMPLETION_API_KEY"))
            .ok();
        let completion_api_base = std::env::var("COMPLETION_API_BASE")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());
        let completion_model = std::env::var("COMPLETION_MODEL")
            .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());
        let completion_temperature = parse_var("COMPLETION_TEMPERATURE", 0.1)?;
        let completion_max_tokens = parse_var("COMPLETION_MAX_TOKENS", 4_500)?;
        let completion_timeout_secs = parse_var("COMPLETION_TIMEOUT_SECS", 30)?;

        // --- Load Payment Gateway Settings ---
        let payment_server_key = std::env::var("PAYMENT_SERVER_KEY").ok();
        let payment_base_url = std::env::var("PAYMENT_BASE_URL")
            .unwrap_or_else(|_| "https://app.sandbox.midtrans.com".to_string());
        let subscription_days = parse_var("SUBSCRIPTION_DAYS", 30)?;
        let platform_fee_percent = parse_var("PLATFORM_FEE_PERCENT", 10)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            completion_api_key,
            completion_api_base,
            completion_model,
            completion_temperature,
            completion_max_tokens,
            completion_timeout_secs,
            payment_server_key,
            payment_base_url,
            subscription_days,
            platform_fee_percent,
        })
    }
}

/// Reads an optional numeric variable, falling back to the given default.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
