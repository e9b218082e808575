//! Engine Registry (§4.4): process-scoped, populated by each engine module
//! at startup. Missing optional engine dependencies degrade gracefully
//! instead of aborting the process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::Engine;

#[derive(Default)]
pub struct EngineRegistry {
    entries: RwLock<HashMap<String, Arc<dyn Engine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a successfully constructed engine, or — if construction of
    /// an optional engine failed (e.g. a missing credential or an optional
    /// dependency that wasn't compiled in) — logs a warning and omits it
    /// rather than aborting registry setup.
    pub fn register_engine(&self, name: &str, engine: Result<Arc<dyn Engine>, String>) {
        let key = name.to_ascii_lowercase();
        match engine {
            Ok(engine) => {
                let mut entries = self.entries.write().expect("engine registry lock poisoned");
                if entries.contains_key(&key) {
                    warn!(engine = %key, "engine registration overwrites an existing entry");
                }
                entries.insert(key, engine);
            }
            Err(reason) => {
                warn!(engine = %key, reason = %reason, "skipping engine registration");
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Engine>> {
        let key = name.to_ascii_lowercase();
        self.entries.read().expect("engine registry lock poisoned").get(&key).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().expect("engine registry lock poisoned").contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().expect("engine registry lock poisoned").keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DebugEngine;

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = EngineRegistry::new();
        registry.register_engine("Debug", Ok(Arc::new(DebugEngine::default())));
        assert!(registry.get("debug").is_some());
        assert!(registry.get("DEBUG").is_some());
    }

    #[test]
    fn failed_construction_is_omitted_not_fatal() {
        let registry = EngineRegistry::new();
        registry.register_engine("openai", Err("missing OPENAI_API_KEY".to_string()));
        assert!(registry.get("openai").is_none());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn duplicate_registration_overwrites() {
        let registry = EngineRegistry::new();
        registry.register_engine("debug", Ok(Arc::new(DebugEngine::new(crate::debug_engine::DebugMode::Success))));
        registry.register_engine("debug", Ok(Arc::new(DebugEngine::new(crate::debug_engine::DebugMode::Fail))));
        assert_eq!(registry.names().len(), 1);
    }
}
