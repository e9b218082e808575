//! th-coordinator: the Coordinator (§4.8), trans-hub's single public
//! entrypoint tying persistence, the engine registry, the cache, the rate
//! limiter, and the processing policy together.

pub mod config;
pub mod coordinator;

pub use config::{CacheSettings, Config, LogFormat, LoggingConfig, RateLimiterSettings, RetryPolicyConfig};
pub use coordinator::{Coordinator, RequestText};
