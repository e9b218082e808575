//! The Coordinator (§4.8) — the crate's single public entrypoint. Binds a
//! `correlation_id` span around each call (§4.8 Observability) that
//! propagates into every log record emitted by the layers it drives.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use th_cache::{CachedTranslation, TranslationCache};
use th_core::{context_hash, hash_str, validate_lang_code, validate_target_langs, ConfigurationError, TransHubError, ValidationError};
use th_engine::{Engine, EngineRegistry};
use th_persistence::{connect_any, run_migrations, GcCounts, PersistenceHandler, SqlPersistence};
use th_policies::{process_batch, ProcessingContext, RetryConfig};
use th_runtime::{NullRateLimiter, RateLimiter, TokenBucketLimiter};
use th_types::{TranslationResult, TranslationStatus};

use crate::config::Config;

/// `Coordinator::request` accepts either a plain string (wrapped as
/// `{text: ...}`) or an already-structured payload (§9 open question: the
/// normalization rule is our best inference from the source repo).
pub enum RequestText {
    Plain(String),
    Structured(Value),
}

pub struct Coordinator {
    config: Config,
    registry: Arc<EngineRegistry>,
    persistence: Arc<dyn PersistenceHandler>,
    cache: Arc<TranslationCache>,
    rate_limiter: Arc<dyn RateLimiter>,
    active_engine: RwLock<Arc<dyn Engine>>,
}

impl Coordinator {
    /// Opens persistence, runs pending migrations, and instantiates the
    /// configured active engine from `registry`. Does not yet call any
    /// engine lifecycle hook — that's `initialize()`'s job.
    pub async fn connect(config: Config, registry: Arc<EngineRegistry>) -> Result<Self, TransHubError> {
        let pool = connect_any(&config.database_url).await?;
        run_migrations(&pool).await?;
        let persistence: Arc<dyn PersistenceHandler> = Arc::new(SqlPersistence::new(pool));

        let engine = registry.get(&config.active_engine).ok_or_else(|| ConfigurationError::EngineNotRegistered(config.active_engine.clone()))?;

        let cache = Arc::new(TranslationCache::new(config.cache_config.maxsize, config.cache_config.ttl));
        let rate_limiter: Arc<dyn RateLimiter> = match &config.rate_limiter {
            Some(settings) => Arc::new(TokenBucketLimiter::new(settings.capacity, settings.refill_rate)),
            None => Arc::new(NullRateLimiter),
        };

        Ok(Self { config, registry, persistence, cache, rate_limiter, active_engine: RwLock::new(engine) })
    }

    pub async fn initialize(&self) -> Result<(), TransHubError> {
        self.persistence.connect().await?;
        self.active_engine.read().await.initialize().await.map_err(TransHubError::Internal)?;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), TransHubError> {
        self.active_engine.read().await.close().await.map_err(TransHubError::Internal)?;
        self.persistence.close().await?;
        Ok(())
    }

    pub async fn request(&self, target_langs: &[String], text: RequestText, business_id: Option<String>, context_payload: Option<Value>, source_lang: Option<String>, force_retranslate: bool) -> Result<String, TransHubError> {
        let correlation_id = Uuid::new_v4().to_string();
        let span = info_span!("coordinator_request", correlation_id = %correlation_id);
        async move {
            validate_target_langs(target_langs)?;
            let payload = match text {
                RequestText::Plain(t) => {
                    th_core::validate_text(&t)?;
                    serde_json::json!({ "text": t })
                }
                RequestText::Structured(v) => {
                    let has_text = v.get("text").and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false);
                    if !has_text {
                        return Err(TransHubError::Validation(ValidationError::EmptyText));
                    }
                    v
                }
            };

            let business_id = business_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let content_id = self.persistence.upsert_content(&business_id, &payload).await?;
            let context_id = self.persistence.ensure_context(context_payload.as_ref()).await?;
            self.persistence.touch_job(&content_id).await?;
            let source_lang = source_lang.or_else(|| self.config.source_lang.clone());
            self.persistence.ensure_pending_translations(&content_id, context_id.as_deref(), target_langs, source_lang.as_deref(), force_retranslate).await?;
            Ok(business_id)
        }
        .instrument(span)
        .await
    }

    pub async fn get_translation(&self, business_id: &str, target_lang: &str, context_payload: Option<&Value>) -> Result<Option<TranslationResult>, TransHubError> {
        validate_lang_code(target_lang)?;
        let hash = context_hash(context_payload);
        let lookup_key = hash_str(&format!("lookup:{business_id}:{target_lang}:{hash}"));

        if let Some(cached) = self.cache.get(&lookup_key).await {
            return Ok(Some(TranslationResult {
                business_id: Some(business_id.to_string()),
                original_text: String::new(),
                translated_text: Some(cached.translated_text),
                target_lang: target_lang.to_string(),
                status: TranslationStatus::Translated,
                engine: Some(cached.engine),
                engine_version: Some(cached.engine_version),
                error: None,
                from_cache: true,
                context_hash: hash,
            }));
        }

        let result = self.persistence.get_translation(business_id, target_lang, context_payload).await?;
        if let Some(r) = &result {
            if r.status == TranslationStatus::Translated {
                if let Some(text) = &r.translated_text {
                    self.cache
                        .put(
                            lookup_key,
                            CachedTranslation { translated_text: text.clone(), engine: r.engine.clone().unwrap_or_default(), engine_version: r.engine_version.clone().unwrap_or_default(), stored_at: std::time::Instant::now() },
                        )
                        .await;
                }
            }
        }
        Ok(result)
    }

    /// Repeatedly claims a batch from persistence, groups it by
    /// `context_hash` into sub-batches, and runs each through the
    /// Processing Policy — yielding results as soon as each sub-batch
    /// finishes rather than waiting for the whole claim to drain.
    pub fn process_pending<'a>(&'a self, target_lang: String, batch_size: Option<u32>, limit: Option<usize>, max_retries: Option<u32>, initial_backoff: Option<Duration>) -> impl Stream<Item = TranslationResult> + 'a {
        let batch_size = batch_size.unwrap_or(self.config.batch_size);
        let retry = RetryConfig {
            max_attempts: max_retries.unwrap_or(self.config.retry_policy.max_attempts),
            initial_backoff: initial_backoff.unwrap_or(self.config.retry_policy.initial_backoff),
            max_backoff: self.config.retry_policy.max_backoff,
        };

        async_stream::stream! {
            let mut produced = 0usize;
            loop {
                if let Some(limit) = limit {
                    if produced >= limit {
                        break;
                    }
                }
                let claimed = match self.persistence.claim_pending_batch(&target_lang, batch_size, false).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        tracing::error!(error = %err, "claim_pending_batch failed");
                        break;
                    }
                };
                if claimed.is_empty() {
                    break;
                }

                let mut grouped: BTreeMap<String, Vec<_>> = BTreeMap::new();
                for item in claimed {
                    grouped.entry(item.context_hash.clone()).or_default().push(item);
                }

                let engine = self.active_engine.read().await.clone();
                let ctx = ProcessingContext { engine, cache: self.cache.clone(), rate_limiter: self.rate_limiter.clone(), persistence: self.persistence.clone(), retry };

                for (_context_hash, sub_batch) in grouped {
                    let results = process_batch(&ctx, sub_batch).await;
                    for result in results {
                        if let Some(limit) = limit {
                            if produced >= limit {
                                return;
                            }
                        }
                        produced += 1;
                        yield result;
                    }
                }
            }
        }
    }

    pub async fn switch_engine(&self, name: &str) -> Result<(), TransHubError> {
        let new_engine = self.registry.get(name).ok_or_else(|| ValidationError::UnknownEngine(name.to_string()))?;
        let mut active = self.active_engine.write().await;
        active.close().await.map_err(TransHubError::Internal)?;
        new_engine.initialize().await.map_err(TransHubError::Internal)?;
        *active = new_engine;
        Ok(())
    }

    pub async fn run_garbage_collection(&self, retention_days: Option<i64>, dry_run: bool) -> Result<GcCounts, TransHubError> {
        let retention_days = retention_days.unwrap_or(self.config.gc_retention_days);
        Ok(self.persistence.garbage_collect(retention_days, dry_run).await?)
    }

    /// Resets TRANSLATING rows abandoned by a cancelled worker back to
    /// PENDING (§5 Cancellation — the optional recovery sweep).
    pub async fn recover_stale_translating(&self, older_than_seconds: i64) -> Result<u64, TransHubError> {
        Ok(self.persistence.recover_stale_translating(older_than_seconds).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use th_engine::debug_engine::DebugMode;
    use th_engine::DebugEngine;

    use crate::config::{CacheSettings, LoggingConfig, RetryPolicyConfig};

    use super::*;

    fn test_config(active_engine: &str) -> Config {
        Config {
            active_engine: active_engine.to_string(),
            database_url: "sqlite::memory:".to_string(),
            source_lang: None,
            batch_size: 10,
            gc_retention_days: 90,
            retry_policy: RetryPolicyConfig { max_attempts: 2, initial_backoff: Duration::from_millis(1), max_backoff: Duration::from_millis(5) },
            cache_config: CacheSettings { maxsize: 100, ttl: Duration::from_secs(3600) },
            rate_limiter: None,
            logging: LoggingConfig::default(),
        }
    }

    async fn connected(mode: DebugMode) -> Coordinator {
        let registry = Arc::new(EngineRegistry::new());
        registry.register_engine("debug", Ok(Arc::new(DebugEngine::new(mode))));
        Coordinator::connect(test_config("debug"), registry).await.expect("connect")
    }

    #[tokio::test]
    async fn request_then_process_then_get_translation_round_trips() {
        let coordinator = connected(DebugMode::Success).await;
        coordinator.initialize().await.unwrap();

        let business_id = coordinator
            .request(&["fr".to_string()], RequestText::Plain("hello".to_string()), None, None, None, false)
            .await
            .unwrap();

        let mut stream = Box::pin(coordinator.process_pending("fr".to_string(), None, None, None, None));
        let processed: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].status, TranslationStatus::Translated);

        let fetched = coordinator.get_translation(&business_id, "fr", None).await.unwrap().expect("translation present");
        assert_eq!(fetched.translated_text.as_deref(), Some("[fr]hello"));
        assert!(!fetched.from_cache);

        let cached = coordinator.get_translation(&business_id, "fr", None).await.unwrap().expect("translation present");
        assert!(cached.from_cache);

        coordinator.close().await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_failures_land_in_dlq_and_report_failed_status() {
        let coordinator = connected(DebugMode::Fail).await;
        coordinator.initialize().await.unwrap();

        coordinator.request(&["fr".to_string()], RequestText::Plain("hello".to_string()), None, None, None, false).await.unwrap();

        let mut stream = Box::pin(coordinator.process_pending("fr".to_string(), None, None, Some(1), Some(Duration::from_millis(1))));
        let processed: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].status, TranslationStatus::Failed);

        coordinator.close().await.unwrap();
    }

    #[tokio::test]
    async fn distinct_contexts_are_tracked_independently() {
        let coordinator = connected(DebugMode::Success).await;
        coordinator.initialize().await.unwrap();

        let business_id = coordinator
            .request(&["fr".to_string()], RequestText::Plain("hello".to_string()), None, None, None, false)
            .await
            .unwrap();
        coordinator
            .request(
                &["fr".to_string()],
                RequestText::Plain("hello".to_string()),
                Some(business_id.clone()),
                Some(serde_json::json!({"screen": "checkout"})),
                None,
                false,
            )
            .await
            .unwrap();

        let mut stream = Box::pin(coordinator.process_pending("fr".to_string(), None, None, None, None));
        let processed: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(processed.len(), 2);

        let global = coordinator.get_translation(&business_id, "fr", None).await.unwrap().expect("global translation present");
        let scoped = coordinator.get_translation(&business_id, "fr", Some(&serde_json::json!({"screen": "checkout"}))).await.unwrap().expect("scoped translation present");
        assert_ne!(global.context_hash, scoped.context_hash);

        coordinator.close().await.unwrap();
    }

    #[tokio::test]
    async fn switch_engine_changes_subsequent_translations() {
        let registry = Arc::new(EngineRegistry::new());
        registry.register_engine("debug", Ok(Arc::new(DebugEngine::new(DebugMode::Success))));
        registry.register_engine("debug-fail", Ok(Arc::new(DebugEngine::new(DebugMode::Fail))));
        let coordinator = Coordinator::connect(test_config("debug"), registry).await.unwrap();
        coordinator.initialize().await.unwrap();

        coordinator.switch_engine("debug-fail").await.unwrap();

        coordinator.request(&["fr".to_string()], RequestText::Plain("hello".to_string()), None, None, None, false).await.unwrap();
        let mut stream = Box::pin(coordinator.process_pending("fr".to_string(), None, None, Some(1), Some(Duration::from_millis(1))));
        let processed: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(processed[0].status, TranslationStatus::Failed);

        coordinator.close().await.unwrap();
    }

    #[tokio::test]
    async fn garbage_collection_dry_run_reports_without_mutating() {
        let coordinator = connected(DebugMode::Success).await;
        coordinator.initialize().await.unwrap();
        let business_id = coordinator.request(&["fr".to_string()], RequestText::Plain("hello".to_string()), None, None, None, false).await.unwrap();

        // Negative retention pushes the cutoff into tomorrow, so the job
        // touched moments ago already counts as stale, and its only
        // reference to this content goes with it: the content and its
        // still-pending translation are both orphaned by the same sweep.
        let dry = coordinator.run_garbage_collection(Some(-1), true).await.unwrap();
        assert_eq!(dry.deleted_jobs, 1, "dry run should still report what would be deleted");
        assert_eq!(dry.deleted_content, 1, "content whose only job is about to be pruned should be reported as orphaned");
        assert_eq!(dry.deleted_translations, 1, "the pending translation under that content should be reported too");

        let still_present = coordinator.get_translation(&business_id, "fr", None).await.unwrap();
        assert!(still_present.is_none(), "not yet translated, but row should be untouched either way");

        let real = coordinator.run_garbage_collection(Some(-1), false).await.unwrap();
        assert_eq!(real.deleted_jobs, dry.deleted_jobs, "a following real run must match the dry run's counts");
        assert_eq!(real.deleted_content, dry.deleted_content);
        assert_eq!(real.deleted_translations, dry.deleted_translations);

        coordinator.close().await.unwrap();
    }
}

