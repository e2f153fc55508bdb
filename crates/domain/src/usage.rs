use serde::{Deserialize, Serialize};

use crate::stream::Usage;

/// Usage as reported to the client and stored as a chat's last context:
/// token counts, optionally enriched with cost and context-window limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, rename = "costUSD", skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<UsageCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextLimits>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCost {
    #[serde(rename = "inputUSD")]
    pub input_usd: f64,
    #[serde(rename = "outputUSD")]
    pub output_usd: f64,
    #[serde(rename = "totalUSD")]
    pub total_usd: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_max: Option<u64>,
}

impl From<&Usage> for AppUsage {
    fn from(u: &Usage) -> Self {
        Self {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
            reasoning_tokens: u.reasoning_tokens,
            cached_input_tokens: u.cached_input_tokens,
            ..Default::default()
        }
    }
}
