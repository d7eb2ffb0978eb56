//! Configuration types.
//!
//! Everything is read from environment variables (a `.env` file is not
//! loaded automatically).

use std::path::PathBuf;

use chrono::{Duration, TimeDelta};
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

pub const DEFAULT_DB_PATH: &str = "./data/job-tracker.db";
const DEFAULT_CLASSIFIER_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SIMILARITY_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Upper bounds on the matching windows. `now ± window` must stay
/// representable as a `DateTime<Utc>`.
const MAX_WINDOW_HOURS: i64 = 24 * 3650;
const MAX_LOOKBACK_DAYS: i64 = 3650;

/// Matching windows used by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// How far back an exact match may have been applied.
    pub exact_window: Duration,
    /// How far back the fallback search reaches.
    pub lookback: Duration,
    /// How far past now the fallback search reaches (clock skew).
    pub lookahead: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            exact_window: Duration::hours(24),
            lookback: Duration::days(180), // 6 x 30 days
            lookahead: Duration::hours(24),
        }
    }
}

/// Full runtime configuration of the binary.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    /// Model for email classification.
    pub classifier: LlmConfig,
    /// Model for job title ranking. Deliberately a different model.
    pub similarity: LlmConfig,
    pub reconcile: ReconcileConfig,
}

impl TrackerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = db_path(&get);

        let classifier = llm_config(
            &get,
            "JOB_TRACKER_CLASSIFIER_MODEL",
            "JOB_TRACKER_CLASSIFIER_BACKEND",
            DEFAULT_CLASSIFIER_MODEL,
        )?;
        let similarity = llm_config(
            &get,
            "JOB_TRACKER_SIMILARITY_MODEL",
            "JOB_TRACKER_SIMILARITY_BACKEND",
            DEFAULT_SIMILARITY_MODEL,
        )?;

        let defaults = ReconcileConfig::default();
        let reconcile = ReconcileConfig {
            exact_window: window(
                &get,
                "JOB_TRACKER_EXACT_WINDOW_HOURS",
                MAX_WINDOW_HOURS,
                TimeDelta::try_hours,
            )?
            .unwrap_or(defaults.exact_window),
            lookback: window(
                &get,
                "JOB_TRACKER_LOOKBACK_DAYS",
                MAX_LOOKBACK_DAYS,
                TimeDelta::try_days,
            )?
            .unwrap_or(defaults.lookback),
            lookahead: window(
                &get,
                "JOB_TRACKER_LOOKAHEAD_HOURS",
                MAX_WINDOW_HOURS,
                TimeDelta::try_hours,
            )?
            .unwrap_or(defaults.lookahead),
        };

        Ok(Self {
            db_path,
            classifier,
            similarity,
            reconcile,
        })
    }
}

fn db_path<G>(get: &G) -> PathBuf
where
    G: Fn(&str) -> Option<String>,
{
    get("JOB_TRACKER_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

fn llm_config<G>(
    get: &G,
    model_key: &str,
    backend_key: &str,
    default_model: &str,
) -> Result<LlmConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let model = get(model_key).unwrap_or_else(|| default_model.to_string());

    let backend = match get(backend_key) {
        Some(raw) => parse_backend(&raw).ok_or_else(|| ConfigError::InvalidValue {
            key: backend_key.to_string(),
            message: format!("expected 'openai' or 'anthropic', got '{raw}'"),
        })?,
        None => infer_backend(&model),
    };

    let key_var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    let api_key = get(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

    Ok(LlmConfig {
        backend,
        api_key: SecretString::from(api_key),
        model,
    })
}

fn parse_backend(raw: &str) -> Option<LlmBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "openai" => Some(LlmBackend::OpenAi),
        "anthropic" => Some(LlmBackend::Anthropic),
        _ => None,
    }
}

/// Claude models go to Anthropic, everything else to OpenAI.
fn infer_backend(model: &str) -> LlmBackend {
    if model.starts_with("claude") {
        LlmBackend::Anthropic
    } else {
        LlmBackend::OpenAi
    }
}

/// Parse a window length in `0..=max` units and convert it with `to_delta`.
fn window<G>(
    get: &G,
    key: &str,
    max: i64,
    to_delta: fn(i64) -> Option<TimeDelta>,
) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .ok()
                .filter(|n| (0..=max).contains(n))
                .and_then(to_delta)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected an integer between 0 and {max}, got '{raw}'"),
                })
        })
        .transpose()
}
