//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;
use trhovisko_core::GenerationConfig;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which generative-model provider the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAi,
    Gemini,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub provider: ModelProvider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub generation: GenerationConfig,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub model_timeout: Duration,
    pub chat_history_window: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
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

        // --- Load Provider Settings ---
        let provider_str =
            std::env::var("MODEL_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => ModelProvider::OpenAi,
            "gemini" => ModelProvider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "MODEL_PROVIDER".to_string(),
                    format!("'{}' is not a supported provider", other),
                ))
            }
        };

        // API keys are loaded as optional; the startup code checks that the
        // key for the selected provider is actually present.
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let model = std::env::var("MODEL_ID").unwrap_or_else(|_| match provider {
            ModelProvider::OpenAi => "gpt-4o-mini".to_string(),
            ModelProvider::Gemini => "gemini-2.5-flash".to_string(),
        });

        // --- Load Generation Defaults ---
        let generation = GenerationConfig {
            temperature: parse_or_default("MODEL_TEMPERATURE", 0.7)?,
            max_output_tokens: parse_or_default("MODEL_MAX_OUTPUT_TOKENS", 1024)?,
            top_p: parse_or_default("MODEL_TOP_P", 0.95)?,
            top_k: match std::env::var("MODEL_TOP_K") {
                Ok(raw) => Some(raw.parse::<u32>().map_err(|e| {
                    ConfigError::InvalidValue("MODEL_TOP_K".to_string(), e.to_string())
                })?),
                Err(_) => None,
            },
        };

        // --- Load Retry / Timeout / History Settings ---
        let max_retries: u32 = parse_or_default("MODEL_MAX_RETRIES", 2)?;
        let retry_base_delay =
            Duration::from_millis(parse_or_default("MODEL_RETRY_BASE_DELAY_MS", 500)?);
        let model_timeout = Duration::from_secs(parse_or_default("MODEL_TIMEOUT_SECS", 30)?);
        let chat_history_window: usize = parse_or_default("CHAT_HISTORY_WINDOW", 20)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            provider,
            openai_api_key,
            gemini_api_key,
            model,
            generation,
            max_retries,
            retry_base_delay,
            model_timeout,
            chat_history_window,
        })
    }
}

/// Parses an environment variable, falling back to `default` when the
/// variable is unset and failing loudly when it is set but malformed.
fn parse_or_default<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
