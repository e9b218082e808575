//! Configuration (§6), loaded from environment variables prefixed `TH_`
//! with `__` denoting nesting — `TH_RETRY_POLICY__MAX_ATTEMPTS`, etc.
//!
//! Mirrors the teacher's `Lazy<AppConfig>` + `env::var` style (root
//! `src/config.rs`), generalized from a single `DATABASE_URL` read to the
//! full option table below, and turned into a fallible constructor instead
//! of an `expect`-or-die static so misconfiguration surfaces as a
//! `ConfigurationError` the caller can report.

use std::env;
use std::time::Duration;

use th_core::ConfigurationError;

#[derive(Debug, Clone)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff: Duration::from_secs(1), max_backoff: Duration::from_secs(30) }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub maxsize: usize,
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { maxsize: 10_000, ttl: Duration::from_secs(24 * 3600) }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiterSettings {
    pub capacity: u64,
    pub refill_rate: f64,
}

/// Output encoding for the `tracing` subscriber the binary installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub active_engine: String,
    pub database_url: String,
    pub source_lang: Option<String>,
    pub batch_size: u32,
    pub gc_retention_days: i64,
    pub retry_policy: RetryPolicyConfig,
    pub cache_config: CacheSettings,
    pub rate_limiter: Option<RateLimiterSettings>,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads `.env` (if present) then reads `TH_`-prefixed environment
    /// variables. Fields without a sensible default are required.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let _ = dotenvy::dotenv();

        let active_engine = required("TH_ACTIVE_ENGINE")?;
        let database_url = required("TH_DATABASE_URL")?;
        let source_lang = env::var("TH_SOURCE_LANG").ok();
        let batch_size = parse_or("TH_BATCH_SIZE", 10u32)?;
        let gc_retention_days = parse_or("TH_GC_RETENTION_DAYS", 90i64)?;

        let retry_policy = RetryPolicyConfig {
            max_attempts: parse_or("TH_RETRY_POLICY__MAX_ATTEMPTS", 3u32)?,
            initial_backoff: Duration::from_secs_f64(parse_or("TH_RETRY_POLICY__INITIAL_BACKOFF", 1.0f64)?),
            max_backoff: Duration::from_secs_f64(parse_or("TH_RETRY_POLICY__MAX_BACKOFF", 30.0f64)?),
        };

        let cache_config = CacheSettings {
            maxsize: parse_or("TH_CACHE_CONFIG__MAXSIZE", 10_000usize)?,
            ttl: Duration::from_secs(parse_or("TH_CACHE_CONFIG__TTL", 86_400u64)?),
        };

        let rate_limiter = match (env::var("TH_RATE_LIMITER__CAPACITY").ok(), env::var("TH_RATE_LIMITER__REFILL_RATE").ok()) {
            (Some(capacity), Some(refill_rate)) => Some(RateLimiterSettings {
                capacity: capacity.parse().map_err(|_| invalid("TH_RATE_LIMITER__CAPACITY", "must be an integer"))?,
                refill_rate: refill_rate.parse().map_err(|_| invalid("TH_RATE_LIMITER__REFILL_RATE", "must be a number"))?,
            }),
            _ => None,
        };

        let logging = LoggingConfig {
            level: env::var("TH_LOGGING__LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("TH_LOGGING__FORMAT").ok().as_deref() {
                Some("json") => LogFormat::Json,
                Some("compact") | None => LogFormat::Compact,
                Some(other) => return Err(invalid("TH_LOGGING__FORMAT", &format!("unknown format '{other}', expected 'compact' or 'json'"))),
            },
        };

        Ok(Self { active_engine, database_url, source_lang, batch_size, gc_retention_days, retry_policy, cache_config, rate_limiter, logging })
    }
}

fn required(key: &str) -> Result<String, ConfigurationError> {
    env::var(key).map_err(|_| ConfigurationError::MissingKey(key.to_string()))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigurationError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| invalid(key, "failed to parse")),
        Err(_) => Ok(default),
    }
}

fn invalid(key: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue { key: key.to_string(), reason: reason.to_string() }
}
