// src/config.rs

use std::{env, net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

use crate::{
    pipeline::llm_client::{DEFAULT_API_URL, DEFAULT_MODEL},
    utils::pdf::DEFAULT_FONT_PATH,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,

    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,

    pub max_upload_mb: usize,
    pub default_question_count: NonZeroU32,
    pub max_question_count: NonZeroU32,

    /// TrueType font embedded in PDF exports; `None` means standard fonts.
    pub pdf_font_path: Option<PathBuf>,

    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let jwt_expiration = parsed(&lookup, "JWT_EXPIRATION", 86_400)?;

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let llm_api_key = lookup("LLM_API_KEY")
            .or_else(|| lookup("MISTRAL_API_KEY"))
            .ok_or(ConfigError::Missing("LLM_API_KEY"))?;

        let llm_api_url = lookup("LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Url::parse(&llm_api_url).map_err(|e| ConfigError::Invalid {
            key: "LLM_API_URL",
            value: llm_api_url.clone(),
            reason: e.to_string(),
        })?;

        let llm_model = lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let llm_timeout_secs = parsed(&lookup, "LLM_TIMEOUT_SECS", 60)?;

        let max_upload_mb = parsed(&lookup, "MAX_UPLOAD_MB", 50)?;
        let default_question_count = parsed(&lookup, "DEFAULT_QUESTION_COUNT", nonzero(10))?;
        let max_question_count = parsed(&lookup, "MAX_QUESTION_COUNT", nonzero(50))?;

        if default_question_count > max_question_count {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_QUESTION_COUNT",
                value: default_question_count.to_string(),
                reason: format!("exceeds MAX_QUESTION_COUNT ({max_question_count})"),
            });
        }

        // An empty value opts out of the embedded font.
        let pdf_font_path = match lookup("PDF_FONT_PATH") {
            None => Some(PathBuf::from(DEFAULT_FONT_PATH)),
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path.trim())),
        };

        let bind_addr = parsed(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)))?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            llm_api_url,
            llm_api_key,
            llm_model,
            llm_timeout_secs,
            max_upload_mb,
            default_question_count,
            max_question_count,
            pdf_font_path,
            bind_addr,
        })
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn nonzero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}
