use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Upstream model endpoints. Chat models refer to these by `id`.
    #[serde(default = "d_providers")]
    pub providers: Vec<ProviderConfig>,
    /// Per-model pricing overrides (key = gateway model id, e.g.
    /// `anthropic/claude-sonnet-4.5`). Take precedence over the catalog.
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
    /// Public model catalog used for cost enrichment. Empty disables it.
    #[serde(default = "d_catalog_url")]
    pub catalog_url: String,
    #[serde(default = "d_catalog_ttl")]
    pub catalog_ttl_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            providers: d_providers(),
            pricing: HashMap::new(),
            catalog_url: d_catalog_url(),
            catalog_ttl_secs: d_catalog_ttl(),
        }
    }
}

/// Pricing per million tokens, plus optional context-window limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
    #[serde(default)]
    pub context_window: Option<u64>,
    #[serde(default)]
    pub max_output: Option<u64>,
}

impl ModelPricing {
    pub fn input_cost(&self, tokens: u32) -> f64 {
        tokens as f64 * self.input_per_1m / 1_000_000.0
    }

    pub fn output_cost(&self, tokens: u32) -> f64 {
        tokens as f64 * self.output_per_1m / 1_000_000.0
    }

    /// Estimated cost in USD for the given token counts.
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.input_cost(input_tokens) + self.output_cost(output_tokens)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat-completions contract (hosted AI gateways, OpenAI,
    /// most self-hosted servers).
    #[default]
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Header name. Defaults to `Authorization`.
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix. Defaults to `Bearer `.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (config-only setups; prefer `env`).
    #[serde(default)]
    pub key: Option<String>,
    /// OS keychain service name.
    #[serde(default)]
    pub service: Option<String>,
    /// OS keychain account name.
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    Keychain,
    None,
}

fn d_timeout_ms() -> u64 {
    120_000
}
fn d_catalog_url() -> String {
    "https://models.dev/api.json".into()
}
fn d_catalog_ttl() -> u64 {
    24 * 60 * 60
}
fn d_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        id: "gateway".into(),
        kind: ProviderKind::OpenaiCompat,
        base_url: "https://ai-gateway.vercel.sh/v1".into(),
        auth: AuthConfig {
            env: Some("AI_GATEWAY_API_KEY".into()),
            ..Default::default()
        },
    }]
}
