//! The iceOS MCP server binary: loads `ServerConfig` once, wires the
//! registry, event bus, engine, and draft store, then serves the control
//! plane.

mod config;

use std::sync::Arc;

use config::{PricingSource, RuntimeMode, ServerConfig};
use ice_draftstore::{DraftStore, InMemoryDraftStore};
use ice_engine::EngineConfig;
use ice_eventbus::EventBus;
use ice_mcp::AppState;
use ice_registry::Registry;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        runtime_mode = ?config.runtime_mode,
        default_llm_provider = %config.default_llm_provider,
        "starting ice-server",
    );
    if let Some(pricing) = &config.pricing_source {
        tracing::info!(?pricing, "pricing source configured");
    }
    if !config.optional_packs.is_empty() {
        tracing::info!(packs = ?config.optional_packs, "optional packs requested");
    }

    let event_bus = Arc::new(build_event_bus(&config));
    let draft_store: Arc<dyn DraftStore> = build_draft_store(&config);

    let engine_config = EngineConfig {
        max_tokens: config.max_tokens,
        org_budget_usd: config.org_budget_usd,
        depth_ceiling: config.max_depth,
        ..EngineConfig::default()
    };

    let state = AppState::new(
        config.bearer_token.clone(),
        Arc::new(Registry::new()),
        event_bus,
        engine_config,
        draft_store,
    );
    let app = ice_mcp::build_router(state);

    let addr = "0.0.0.0:8000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {addr}: {err}"));
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|err| panic!("server error: {err}"));
}

fn build_event_bus(config: &ServerConfig) -> EventBus {
    match (&config.redis_url, config.runtime_mode) {
        (Some(url), mode) if mode != RuntimeMode::Demo => {
            match ice_eventbus::RedisEventSink::new(url, 10_000) {
                Ok(sink) => EventBus::with_sink(Arc::new(sink)),
                Err(err) => {
                    tracing::warn!(%err, "failed to connect to Redis for events, falling back to in-memory");
                    EventBus::new()
                }
            }
        }
        _ => EventBus::new(),
    }
}

fn build_draft_store(config: &ServerConfig) -> Arc<dyn DraftStore> {
    match (&config.redis_url, config.runtime_mode) {
        (Some(url), mode) if mode != RuntimeMode::Demo => {
            match ice_draftstore::RedisDraftStore::new(url) {
                Ok(store) => Arc::new(store),
                Err(err) => {
                    tracing::warn!(%err, "failed to connect to Redis for drafts, falling back to in-memory");
                    Arc::new(InMemoryDraftStore::new())
                }
            }
        }
        _ => Arc::new(InMemoryDraftStore::new()),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
