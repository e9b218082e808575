//! Demo entrypoint: wires config, the engine registry, and the Coordinator,
//! then drives one request through to a processed translation. Exercises
//! the same public API a real deployment would use.

use std::sync::Arc;

use futures::StreamExt;
use trans_hub::{Config, Coordinator, EngineRegistry, RequestText};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };
    trans_hub::logging::init(&config.logging);

    let registry = Arc::new(EngineRegistry::new());
    th_providers::register_default_engines(&registry);

    let coordinator = Coordinator::connect(config, registry).await.expect("failed to connect coordinator");
    coordinator.initialize().await.expect("failed to initialize coordinator");

    let business_id = coordinator
        .request(&["fr".to_string()], RequestText::Plain("hello, world".to_string()), None, None, None, false)
        .await
        .expect("request failed");
    tracing::info!(business_id = %business_id, "queued translation request");

    let mut stream = Box::pin(coordinator.process_pending("fr".to_string(), None, None, None, None));
    while let Some(result) = stream.next().await {
        println!("{} -> {:?} ({:?})", result.original_text, result.translated_text, result.status);
    }

    coordinator.close().await.expect("failed to close coordinator");
}
