//! th-providers: engine registration (§4.4). Concrete third-party engines
//! (OpenAI, Translators, ...) are out of scope here; this crate wires the
//! reference `DebugEngine` and documents the graceful-degradation contract
//! that real engine modules follow at their own module-import time.

use std::sync::Arc;

use th_engine::{DebugEngine, EngineRegistry};

/// Registers every engine this crate ships. Real deployments compose this
/// with additional `registry.register_engine(...)` calls from engine
/// modules compiled in behind feature flags; a missing optional dependency
/// there is reported as `Err(reason)` to `register_engine`, which logs and
/// omits it rather than aborting (§4.4).
pub fn register_default_engines(registry: &EngineRegistry) {
    registry.register_engine("debug", Ok(Arc::new(DebugEngine::default())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_engine_is_registered() {
        let registry = EngineRegistry::new();
        register_default_engines(&registry);
        assert!(registry.contains("debug"));
    }
}
