//! trans-hub: wires configuration, migrations, the engine registry, and the
//! Coordinator into one deployable unit. Each concern it touches — hashing,
//! errors, persistence, engines, caching, rate limiting, policy, the
//! coordinator itself — lives in its own crate under `crates/`; this crate
//! is the composition root.

pub mod logging;

pub use th_coordinator::{CacheSettings, Config, Coordinator, LogFormat, LoggingConfig, RateLimiterSettings, RequestText, RetryPolicyConfig};
pub use th_engine::EngineRegistry;
