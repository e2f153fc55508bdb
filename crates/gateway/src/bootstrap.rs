//! AppState construction and background-task spawning.
//!
//! `serve` boots through [`build_app_state`]; tests inject their own
//! providers through [`build_app_state_with`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use rc_domain::config::{Config, ConfigSeverity};
use rc_providers::{ModelCatalog, PricingCatalog, ProviderRegistry};
use rc_store::Store;

use crate::runtime::resumable::StreamRegistry;
use crate::session::SessionKeys;
use crate::state::AppState;
use crate::tools;

/// Validate config, initialize providers from it and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── LLM providers ────────────────────────────────────────────────
    let registry = ProviderRegistry::from_config(&config.llm);
    if registry.is_empty() {
        tracing::info!("no LLM providers initialized; configure API keys to enable chat");
    } else {
        tracing::info!(providers = ?registry.list_providers(), "LLM provider registry ready");
    }

    build_app_state_with(config, registry)
}

/// Wire every subsystem around an already-built provider registry.
pub fn build_app_state_with(
    config: Arc<Config>,
    registry: ProviderRegistry,
) -> anyhow::Result<AppState> {
    // ── Store ────────────────────────────────────────────────────────
    let store = Arc::new(
        Store::open(&config.store.path)
            .with_context(|| format!("opening store at {}", config.store.path.display()))?,
    );

    // ── Models + pricing ─────────────────────────────────────────────
    let catalog = Arc::new(ModelCatalog::new(config.models.clone(), registry));
    tracing::info!(
        models = catalog.models().len(),
        default = %catalog.default_id(),
        "model catalog ready"
    );
    let pricing = Arc::new(PricingCatalog::from_config(&config.llm));

    // ── Session keys ─────────────────────────────────────────────────
    let sessions =
        Arc::new(SessionKeys::from_config(&config.auth).context("initializing session keys")?);

    // ── Tools ────────────────────────────────────────────────────────
    let tools = Arc::new(
        tools::build_default_registry(&config, store.clone(), catalog.clone())
            .context("initializing tools")?,
    );
    tracing::info!(tools = ?tools.names(), "tool registry ready");

    // ── Resumable streams ────────────────────────────────────────────
    let streams = Arc::new(StreamRegistry::new(Duration::from_secs(
        config.streams.retain_secs,
    )));
    tracing::info!(
        enabled = config.streams.resumable,
        retain_secs = config.streams.retain_secs,
        "stream registry ready"
    );

    Ok(AppState {
        config,
        store,
        catalog,
        pricing,
        sessions,
        tools,
        streams,
    })
}

/// Spawn the long-running background tasks. Call after [`build_app_state`]
/// when running the HTTP server.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic stream eviction ─────────────────────────────────────
    {
        let streams = state.streams.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                streams.evict_expired();
            }
        });
    }
}
