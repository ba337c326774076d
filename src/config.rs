use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MAX_TOKENS: u32 = 100;
const DEFAULT_JPEG_QUALITY: u8 = 85;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_MAX_SESSIONS: usize = 64;
const DEFAULT_STATIC_DIR: &str = "static";

/// What to do with a parsed category that is not in the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryPolicy {
    /// Return the model's first line as-is.
    #[default]
    Passthrough,
    /// Canonicalise known labels, replace unknown ones with the fallback category.
    Strict,
}

impl CategoryPolicy {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "passthrough" | "pass" | "off" => Some(CategoryPolicy::Passthrough),
            "strict" | "validate" => Some(CategoryPolicy::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,
    pub request_timeout: Option<Duration>,
    pub jpeg_quality: u8,
    pub category_policy: CategoryPolicy,
    pub bind_addr: String,
    pub max_frame_bytes: usize,
    pub max_sessions: usize,
    pub static_dir: String,
}

impl Config {
    /// Reads configuration from the process environment. Call `dotenv()` first
    /// so values from a local `.env` file are visible.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GROQ_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let max_tokens = parse_or("MAX_TOKENS", get("MAX_TOKENS"), DEFAULT_MAX_TOKENS)?;
        if max_tokens == 0 {
            return Err(invalid("MAX_TOKENS", "0", "must be at least 1"));
        }

        let jpeg_quality = parse_or("JPEG_QUALITY", get("JPEG_QUALITY"), DEFAULT_JPEG_QUALITY)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(invalid(
                "JPEG_QUALITY",
                &jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse_or("REQUEST_TIMEOUT_SECS", Some(raw), 0)?;
                Some(Duration::from_secs(secs)).filter(|d| !d.is_zero())
            }
            None => None,
        };

        let category_policy = match get("CATEGORY_POLICY") {
            Some(raw) => CategoryPolicy::from_string(&raw)
                .ok_or_else(|| invalid("CATEGORY_POLICY", &raw, "expected passthrough or strict"))?,
            None => CategoryPolicy::default(),
        };

        let max_sessions = parse_or("MAX_SESSIONS", get("MAX_SESSIONS"), DEFAULT_MAX_SESSIONS)?;
        if max_sessions == 0 {
            return Err(invalid("MAX_SESSIONS", "0", "must be at least 1"));
        }

        Ok(Self {
            api_key,
            model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: get("GROQ_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            max_tokens,
            request_timeout,
            jpeg_quality,
            category_policy,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            max_frame_bytes: parse_or(
                "MAX_FRAME_BYTES",
                get("MAX_FRAME_BYTES"),
                DEFAULT_MAX_FRAME_BYTES,
            )?,
            max_sessions,
            static_dir: get("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
