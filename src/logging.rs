//! Structured logging setup (ambient stack). The format and level are
//! driven by `LoggingConfig` (`TH_LOGGING__LEVEL` / `TH_LOGGING__FORMAT`),
//! matching the way the rest of `Config` reads its `TH_`-prefixed tree.

use tracing_subscriber::EnvFilter;

use th_coordinator::{LogFormat, LoggingConfig};

/// Installs a `tracing` subscriber filtered at `config.level` and encoded
/// either as human-readable compact lines or one JSON object per record.
/// Idempotent-ish: a second call is a no-op, since `tracing` only allows one
/// global default subscriber per process.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let _ = match config.format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Compact => tracing_subscriber::fmt().with_env_filter(filter).compact().try_init(),
    };
}
