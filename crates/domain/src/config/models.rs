use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat models
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The models a user can pick from, plus the fixed models used for
/// titles and artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Chat model id used when the client sends none or an unknown one.
    #[serde(default = "d_default_model")]
    pub default: String,
    #[serde(default = "d_chat_models")]
    pub chat: Vec<ChatModelConfig>,
    #[serde(default = "d_support_model")]
    pub title: ModelRef,
    #[serde(default = "d_support_model")]
    pub artifact: ModelRef,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: d_default_model(),
            chat: d_chat_models(),
            title: d_support_model(),
            artifact: d_support_model(),
        }
    }
}

impl ModelsConfig {
    pub fn find(&self, id: &str) -> Option<&ChatModelConfig> {
        self.chat.iter().find(|m| m.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatModelConfig {
    /// Stable id the client selects (e.g. `chat-model`).
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "d_provider")]
    pub provider: String,
    /// Model id as understood by the provider (e.g. `anthropic/claude-opus-4.5`).
    pub model: String,
    /// Reasoning models stream their reasoning and run without tools.
    #[serde(default)]
    pub reasoning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    #[serde(default = "d_provider")]
    pub provider: String,
    pub model: String,
}

fn d_provider() -> String {
    "gateway".into()
}
fn d_default_model() -> String {
    "chat-model".into()
}
fn d_support_model() -> ModelRef {
    ModelRef {
        provider: d_provider(),
        model: "anthropic/claude-sonnet-4.5".into(),
    }
}

fn chat_model(id: &str, name: &str, description: &str, model: &str, reasoning: bool) -> ChatModelConfig {
    ChatModelConfig {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        provider: d_provider(),
        model: model.into(),
        reasoning,
    }
}

fn d_chat_models() -> Vec<ChatModelConfig> {
    vec![
        chat_model(
            "chat-model",
            "Claude 4.5 Opus",
            "Most intelligent model for highly complex tasks",
            "anthropic/claude-opus-4.5",
            false,
        ),
        chat_model(
            "chat-model-gemini",
            "Gemini 3 Pro Preview",
            "Next-generation multimodal capabilities",
            "google/gemini-3-pro-preview",
            false,
        ),
        chat_model(
            "chat-model-grok",
            "Grok 4.1 Fast Reasoning",
            "xAI's fastest reasoning model",
            "xai/grok-4.1-fast-reasoning",
            true,
        ),
        chat_model(
            "chat-model-sonnet",
            "Claude 4.5 Sonnet",
            "Balanced intelligence and speed",
            "anthropic/claude-sonnet-4.5",
            false,
        ),
    ]
}
