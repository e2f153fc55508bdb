//! Provider registry.
//!
//! Instantiates every configured model endpoint at startup. Providers that
//! fail to initialize (usually a missing API key) are logged and skipped so
//! the server still boots; chat requests routed to them fail with a
//! service-unavailable error instead.

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use rc_domain::config::{LlmConfig, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    /// Initialization failures by provider id, surfaced by `config validate`.
    failures: HashMap<String, String>,
}

impl ProviderRegistry {
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut registry = Self::default();

        for pc in &config.providers {
            let result = match pc.kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc, config.default_timeout_ms)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    registry.providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                    registry.failures.insert(pc.id.clone(), e.to_string());
                }
            }
        }

        if registry.providers.is_empty() && !config.providers.is_empty() {
            tracing::warn!("no LLM providers initialized; chat requests will fail until auth is configured");
        }
        registry
    }

    /// Register (or replace) a provider under `id`.
    pub fn insert(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        let id = id.into();
        self.failures.remove(&id);
        self.providers.insert(id, provider);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn failure(&self, provider_id: &str) -> Option<&str> {
        self.failures.get(provider_id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered provider ids, sorted.
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}
