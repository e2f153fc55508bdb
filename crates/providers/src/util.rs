//! Helpers shared by provider adapters and the gateway's HTTP tools.

use rc_domain::config::{AuthConfig, AuthMode};
use rc_domain::error::{Error, Result};

/// Map a [`reqwest::Error`] onto the domain error: timeouts stay
/// distinguishable, everything else is an HTTP failure.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Where an API key was found. Logged at startup, never the key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Plaintext,
    Keychain,
    Env,
    KeychainFallbackEnv,
}

/// Resolve the API key for a provider.
///
/// Lookup order: plaintext `key`, OS keychain (`service` + `account`),
/// `env`, then the headless keychain fallback variable
/// `{SERVICE}_{ACCOUNT}`. `mode = "none"` yields `None`.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<Option<(String, KeySource)>> {
    if auth.mode == AuthMode::None {
        return Ok(None);
    }

    if let Some(key) = &auth.key {
        tracing::warn!("API key read from plaintext config; prefer `env` or the keychain");
        return Ok(Some((key.clone(), KeySource::Plaintext)));
    }

    let keychain = auth.service.as_deref().zip(auth.account.as_deref());

    if let Some((service, account)) = keychain {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(Some((secret, KeySource::Keychain))),
            Err(e) => tracing::warn!(
                service,
                account,
                error = %e,
                "keychain lookup failed, trying environment"
            ),
        }
    }

    if let Some(var) = &auth.env {
        return match std::env::var(var) {
            Ok(v) if !v.is_empty() => Ok(Some((v, KeySource::Env))),
            _ => Err(Error::Auth(format!("environment variable '{var}' is not set"))),
        };
    }

    if let Some((service, account)) = keychain {
        let var = keychain_fallback_env_name(service, account);
        if let Ok(v) = std::env::var(&var) {
            return Ok(Some((v, KeySource::KeychainFallbackEnv)));
        }
    }

    Err(Error::Auth(
        "no API key configured: set `key`, `env`, or keychain `service` + `account`".into(),
    ))
}

/// Read a secret from the platform credential store.
pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    keyring::Entry::new(service, account)
        .and_then(|entry| entry.get_password())
        .map_err(|e| Error::Auth(format!("keychain: {e}")))
}

/// `("raisechat", "gateway-key")` → `RAISECHAT_GATEWAY_KEY`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!("{service}_{account}").to_uppercase().replace('-', "_")
}
