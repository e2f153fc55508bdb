//! Chat model catalog: maps the ids a client picks (`chat-model`,
//! `chat-model-grok`, ...) onto a registered provider and upstream model.

use std::sync::Arc;

use crate::registry::ProviderRegistry;
use crate::traits::LlmProvider;
use rc_domain::config::{ChatModelConfig, ModelRef, ModelsConfig};
use rc_domain::error::{Error, Result};

/// A model ready to be called.
#[derive(Clone)]
pub struct ResolvedModel {
    /// Catalog id (`chat-model`), or the upstream id for support models.
    pub id: String,
    /// Upstream model id (`anthropic/claude-opus-4.5`).
    pub model: String,
    pub reasoning: bool,
    pub provider: Arc<dyn LlmProvider>,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("reasoning", &self.reasoning)
            .field("provider", &self.provider.provider_id())
            .finish()
    }
}

pub struct ModelCatalog {
    config: ModelsConfig,
    registry: ProviderRegistry,
}

impl ModelCatalog {
    pub fn new(config: ModelsConfig, registry: ProviderRegistry) -> Self {
        Self { config, registry }
    }

    pub fn models(&self) -> &[ChatModelConfig] {
        &self.config.chat
    }

    pub fn default_id(&self) -> &str {
        &self.config.default
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.config.find(id).is_some()
    }

    /// The id to use for a previously selected model: the same id when it
    /// is still in the catalog, the default otherwise.
    pub fn select<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(id) if self.is_known(id) => id,
            _ => self.default_id(),
        }
    }

    pub fn chat_model(&self, id: &str) -> Result<ResolvedModel> {
        let entry = self
            .config
            .find(id)
            .ok_or_else(|| Error::NotFound(format!("chat model `{id}`")))?;
        Ok(ResolvedModel {
            id: entry.id.clone(),
            model: entry.model.clone(),
            reasoning: entry.reasoning,
            provider: self.provider(&entry.provider)?,
        })
    }

    pub fn title_model(&self) -> Result<ResolvedModel> {
        self.support_model(&self.config.title)
    }

    pub fn artifact_model(&self) -> Result<ResolvedModel> {
        self.support_model(&self.config.artifact)
    }

    fn support_model(&self, r: &ModelRef) -> Result<ResolvedModel> {
        Ok(ResolvedModel {
            id: r.model.clone(),
            model: r.model.clone(),
            reasoning: false,
            provider: self.provider(&r.provider)?,
        })
    }

    fn provider(&self, id: &str) -> Result<Arc<dyn LlmProvider>> {
        self.registry.get(id).ok_or_else(|| {
            let reason = self
                .registry
                .failure(id)
                .unwrap_or("not configured")
                .to_string();
            Error::Config(format!("provider `{id}` unavailable: {reason}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChatRequest, ChatResponse};
    use rc_domain::stream::{BoxStream, StreamEvent};

    struct Dummy;

    #[async_trait::async_trait]
    impl LlmProvider for Dummy {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            Err(Error::Other("unused".into()))
        }
        async fn chat_stream(
            &self,
            _req: &ChatRequest,
        ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            Err(Error::Other("unused".into()))
        }
        fn provider_id(&self) -> &str {
            "gateway"
        }
    }

    fn catalog() -> ModelCatalog {
        let mut registry = ProviderRegistry::default();
        registry.insert("gateway", Arc::new(Dummy));
        ModelCatalog::new(ModelsConfig::default(), registry)
    }

    #[test]
    fn resolves_catalog_ids_to_gateway_models() {
        let c = catalog();
        let grok = c.chat_model("chat-model-grok").unwrap();
        assert_eq!(grok.model, "xai/grok-4.1-fast-reasoning");
        assert!(grok.reasoning);
        assert_eq!(grok.provider.provider_id(), "gateway");
        assert_eq!(c.title_model().unwrap().model, "anthropic/claude-sonnet-4.5");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let err = catalog().chat_model("gpt-9").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn select_falls_back_to_default() {
        let c = catalog();
        assert_eq!(c.select(Some("chat-model-gemini")), "chat-model-gemini");
        assert_eq!(c.select(Some("retired-model")), "chat-model");
        assert_eq!(c.select(None), "chat-model");
    }

    #[test]
    fn missing_provider_is_a_config_error() {
        let c = ModelCatalog::new(ModelsConfig::default(), ProviderRegistry::default());
        let err = c.chat_model("chat-model").unwrap_err();
        assert!(err.to_string().contains("provider `gateway` unavailable"));
    }
}
