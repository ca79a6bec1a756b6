use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context, Result};

use crate::{prompts::default_variations, retry::RetryPolicy};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
/// Matches Gemini's ceiling for inline request data.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Everything the service reads from the environment at startup.
/// Built once in `main`, then shared behind an `Arc` and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Request body limit; plot photos arrive inline as base64.
    pub max_upload_bytes: usize,
    pub gemini: GeminiSettings,
    pub design: DesignSettings,
    pub feng_shui: FengShuiSettings,
    pub edit_policy: EditPolicy,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub image_model: String,
    pub text_model: String,
    pub timeout: Duration,
}

/// Knobs for the batch generator and the edit path.
#[derive(Debug, Clone)]
pub struct DesignSettings {
    pub variation_count: usize,
    pub variations: Vec<String>,
    pub aspect_ratio: String,
    pub retry: RetryPolicy,
}

impl Default for DesignSettings {
    fn default() -> Self {
        Self {
            variation_count: 3,
            variations: default_variations(),
            aspect_ratio: "9:16".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FengShuiSettings {
    pub target_year: i32,
    pub language: String,
}

impl Default for FengShuiSettings {
    fn default() -> Self {
        Self { target_year: 2026, language: "Vietnamese".to_string() }
    }
}

/// How overlapping edits on the same suggestion are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPolicy {
    /// No guard; whichever response lands last wins.
    #[default]
    Concurrent,
    /// One in-flight edit per suggestion, later requests are rejected.
    Single,
}

impl FromStr for EditPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "single" => Ok(Self::Single),
            other => Err(anyhow!("unknown edit policy '{other}' (expected 'concurrent' or 'single')")),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // load .env if present; ignore if missing
        dotenv::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY")
            .with_context(|| "Required environment variable 'GEMINI_API_KEY' is not set")?;

        let variations = match get("DESIGN_VARIATIONS") {
            Some(raw) => raw
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => default_variations(),
        };
        if variations.is_empty() {
            bail!("DESIGN_VARIATIONS must contain at least one fragment");
        }

        let retry = RetryPolicy {
            max_retries: parse_or(&get, "GENERATION_MAX_RETRIES", 2)?,
            delay: Duration::from_millis(parse_or(&get, "GENERATION_RETRY_DELAY_MS", 2000)?),
        };

        Ok(Config {
            port: parse_or(&get, "PORT", 8080)?,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            gemini: GeminiSettings {
                api_key,
                base_url: get("GEMINI_API_BASE")
                    .map(|b| b.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                image_model: get("GEMINI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
                text_model: get("GEMINI_TEXT_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
                timeout: Duration::from_secs(parse_or(&get, "GEMINI_TIMEOUT_SECS", 120)?),
            },
            design: DesignSettings {
                variation_count: parse_or(&get, "DESIGN_VARIATION_COUNT", 3)?,
                variations,
                aspect_ratio: get("DESIGN_ASPECT_RATIO").unwrap_or_else(|| "9:16".to_string()),
                retry,
            },
            feng_shui: FengShuiSettings {
                target_year: parse_or(&get, "FENG_SHUI_TARGET_YEAR", 2026)?,
                language: get("FENG_SHUI_LANGUAGE").unwrap_or_else(|| "Vietnamese".to_string()),
            },
            edit_policy: match get("EDIT_POLICY") {
                Some(raw) => raw.parse::<EditPolicy>().context("EDIT_POLICY is invalid")?,
                None => EditPolicy::default(),
            },
        })
    }

    /// API key with everything past the first few characters masked, for logs.
    pub fn redacted_key(&self) -> String {
        let key = &self.gemini.api_key;
        let visible: String = key.chars().take(4).collect();
        format!("{visible}***")
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
