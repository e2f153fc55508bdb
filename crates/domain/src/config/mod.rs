mod auth;
mod llm;
mod models;
mod observability;
mod server;
mod services;

pub use auth::*;
pub use llm::*;
pub use models::*;
pub use observability::*;
pub use server::*;
pub use services::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: SessionAuthConfig,
    #[serde(default)]
    pub entitlements: EntitlementsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return every issue found. An empty
    /// vec means the config is usable as-is.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError::warning("llm.providers", "no LLM providers configured"));
        }
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                ));
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].base_url"),
                    "provider base_url must not be empty",
                ));
            }
        }

        if self.models.chat.is_empty() {
            errors.push(ConfigError::error("models.chat", "at least one chat model is required"));
        } else if self.models.find(&self.models.default).is_none() {
            errors.push(ConfigError::error(
                "models.default",
                format!("default model `{}` is not in models.chat", self.models.default),
            ));
        }
        let provider_known = |id: &str| self.llm.providers.iter().any(|p| p.id == id);
        for (i, model) in self.models.chat.iter().enumerate() {
            if !provider_known(&model.provider) {
                errors.push(ConfigError::warning(
                    format!("models.chat[{i}].provider"),
                    format!("unknown provider `{}`", model.provider),
                ));
            }
        }
        for (field, model) in [("models.title", &self.models.title), ("models.artifact", &self.models.artifact)] {
            if !provider_known(&model.provider) {
                errors.push(ConfigError::warning(
                    format!("{field}.provider"),
                    format!("unknown provider `{}`", model.provider),
                ));
            }
        }

        for (tier, ent) in [("guest", &self.entitlements.guest), ("regular", &self.entitlements.regular)] {
            if ent.max_messages_per_day == 0 {
                errors.push(ConfigError::warning(
                    format!("entitlements.{tier}.max_messages_per_day"),
                    "0 blocks every message for this user type",
                ));
            }
        }

        if self.auth.token_ttl_hours == 0 {
            errors.push(ConfigError::error("auth.token_ttl_hours", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "must be between 0.0 and 1.0",
            ));
        }

        errors
    }
}
