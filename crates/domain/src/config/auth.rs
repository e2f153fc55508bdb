use serde::{Deserialize, Serialize};

use crate::message::UserType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAuthConfig {
    /// Environment variable holding the token signing secret. When unset,
    /// a random per-process secret is generated (tokens do not survive a
    /// restart).
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
    #[serde(default = "d_ttl_hours")]
    pub token_ttl_hours: u64,
    /// Allow anonymous guest sessions via `POST /api/auth/guest`.
    #[serde(default = "d_true")]
    pub guest_enabled: bool,
}

impl Default for SessionAuthConfig {
    fn default() -> Self {
        Self {
            secret_env: d_secret_env(),
            token_ttl_hours: d_ttl_hours(),
            guest_enabled: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entitlements
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementsConfig {
    #[serde(default = "d_guest")]
    pub guest: Entitlement,
    #[serde(default = "d_regular")]
    pub regular: Entitlement,
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        Self {
            guest: d_guest(),
            regular: d_regular(),
        }
    }
}

impl EntitlementsConfig {
    pub fn for_user(&self, user_type: UserType) -> &Entitlement {
        match user_type {
            UserType::Guest => &self.guest,
            UserType::Regular => &self.regular,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    /// Messages a user may send in any rolling 24-hour window.
    pub max_messages_per_day: usize,
}

fn d_secret_env() -> String {
    "RC_AUTH_SECRET".into()
}
fn d_ttl_hours() -> u64 {
    24 * 30
}
fn d_true() -> bool {
    true
}
fn d_guest() -> Entitlement {
    Entitlement {
        max_messages_per_day: 20,
    }
}
fn d_regular() -> Entitlement {
    Entitlement {
        max_messages_per_day: 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_entitlements() {
        let cfg = EntitlementsConfig::default();
        assert_eq!(cfg.for_user(UserType::Guest).max_messages_per_day, 20);
        assert_eq!(cfg.for_user(UserType::Regular).max_messages_per_day, 100);
    }

    #[test]
    fn partial_override_keeps_other_tier() {
        let cfg: EntitlementsConfig = toml::from_str(
            r#"
            [guest]
            max_messages_per_day = 3
        "#,
        )
        .unwrap();
        assert_eq!(cfg.guest.max_messages_per_day, 3);
        assert_eq!(cfg.regular.max_messages_per_day, 100);
    }

    #[test]
    fn session_auth_defaults() {
        let cfg: SessionAuthConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.secret_env, "RC_AUTH_SECRET");
        assert_eq!(cfg.token_ttl_hours, 720);
        assert!(cfg.guest_enabled);
    }
}
