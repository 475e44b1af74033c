//! Probe configuration
//!
//! Values come from the environment (after loading `.env` via dotenvy),
//! mirroring how the agents in this workspace pick up their API settings.

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://openapi.dp.tech/openapi/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_TOKENS: u32 = 10;

/// Models probed when `DPTECH_MODELS` is not set
pub const DEFAULT_MODELS: &[&str] = &[
    "qwen-plus",
    "qwen-turbo",
    "qwen-max",
    "qwen2-72b-instruct",
    "qwen2-7b-instruct",
    "qwen-long",
    "deepseek-chat",
    "gpt-3.5-turbo",
    "gpt-4",
    "gpt-4-turbo",
    "gpt-4o",
    "gpt-4o-mini",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing access key: set DPTECH_ACCESS_KEY or DPTECH_API_KEY")]
    MissingAccessKey,

    #[error("DPTECH_MODELS is set but contains no model identifiers")]
    NoModels,

    #[error("Invalid DPTECH_BASE_URL {value:?} (expected an http:// or https:// URL)")]
    InvalidBaseUrl { value: String },

    #[error("Invalid value for {name}: {value:?} (expected a positive integer)")]
    InvalidNumber { name: &'static str, value: String },
}

/// Everything a probe run needs, passed explicitly to the prober
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub access_key: String,
    pub base_url: String,
    pub models: Vec<String>,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl ProbeConfig {
    pub fn new(
        access_key: impl Into<String>,
        base_url: impl Into<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            base_url: normalize_base_url(&base_url.into()),
            models,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Load configuration from `.env` and the process environment
    ///
    /// Supports both DPTECH_ACCESS_KEY and DPTECH_API_KEY for the credential.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let access_key = env::var("DPTECH_ACCESS_KEY")
            .or_else(|_| env::var("DPTECH_API_KEY"))
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingAccessKey)?;

        let base_url = env::var("DPTECH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        validate_base_url(&base_url)?;

        let models = match env::var("DPTECH_MODELS") {
            Ok(raw) => {
                let models = parse_model_list(&raw);
                if models.is_empty() {
                    return Err(ConfigError::NoModels);
                }
                models
            }
            Err(_) => default_models(),
        };

        let timeout_secs = read_positive("DPTECH_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let max_tokens = read_positive("DPTECH_MAX_TOKENS", DEFAULT_MAX_TOKENS as u64)?;
        let max_tokens = u32::try_from(max_tokens).map_err(|_| ConfigError::InvalidNumber {
            name: "DPTECH_MAX_TOKENS",
            value: max_tokens.to_string(),
        })?;

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            max_tokens,
            ..Self::new(access_key, base_url, models)
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Target endpoint for every probe
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// First 8 characters of the key, safe to print
    pub fn masked_access_key(&self) -> String {
        let prefix: String = self.access_key.chars().take(8).collect();
        format!("{}...", prefix)
    }
}

pub fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}

/// Split a comma-separated model list, dropping blank entries
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Reject URLs reqwest could not post to, before any model is probed
fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidBaseUrl {
        value: raw.to_string(),
    };
    let url = reqwest::Url::parse(&normalize_base_url(raw)).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        _ => Err(invalid()),
    }
}

fn read_positive(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { name, value: raw }),
        },
        Err(_) => Ok(default),
    }
}
