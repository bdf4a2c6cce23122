//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;
use training_plan_core::{session::DEFAULT_DISPLAY_EVERY_N_TOKENS, LookbackWindow};

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
    pub allowed_origin: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub plan_model: String,
    pub plan_temperature: f32,
    pub max_output_tokens: u32,
    pub display_every_n_tokens: usize,
    pub workout_history_path: PathBuf,
    pub heart_rate_path: Option<PathBuf>,
    pub lookback_days: i64,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server Settings ---
        let bind_address: SocketAddr =
            parse_or(&lookup, "BIND_ADDRESS", Some(SocketAddr::from(([0, 0, 0, 0], 3000))))?;
        let allowed_origin = lookup("ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Model Backend Settings ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let openai_api_base = lookup("OPENAI_API_BASE");
        let plan_model = lookup("PLAN_MODEL").unwrap_or_else(|| "llama3.2:3b".to_string());
        let plan_temperature = parse_or(&lookup, "PLAN_TEMPERATURE", Some(1.0))?;
        let max_output_tokens = parse_or(&lookup, "MAX_OUTPUT_TOKENS", Some(4096))?;
        let display_every_n_tokens = parse_or(
            &lookup,
            "DISPLAY_EVERY_N_TOKENS",
            Some(DEFAULT_DISPLAY_EVERY_N_TOKENS),
        )?;
        if display_every_n_tokens == 0 {
            return Err(ConfigError::InvalidValue(
                "DISPLAY_EVERY_N_TOKENS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Load Workout History Settings ---
        let workout_history_path = lookup("WORKOUT_HISTORY_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingVar("WORKOUT_HISTORY_PATH".to_string()))?;
        let heart_rate_path = lookup("HEART_RATE_PATH").map(PathBuf::from);
        let lookback_days: i64 =
            parse_or(&lookup, "LOOKBACK_DAYS", Some(LookbackWindow::DEFAULT_DAYS))?;
        if lookback_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "LOOKBACK_DAYS".to_string(),
                "must be a positive number of days".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            allowed_origin,
            log_level,
            openai_api_key,
            openai_api_base,
            plan_model,
            plan_temperature,
            max_output_tokens,
            display_every_n_tokens,
            workout_history_path,
            heart_rate_path,
            lookback_days,
        })
    }
}

/// Parses `key` when present, otherwise falls back to `default`.
fn parse_or<F, T>(lookup: &F, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}
