//! Signed session tokens.
//!
//! A token is `hex(payload).hex(mac)` where the payload is the JSON claims
//! `{ sub, email, typ, exp }` and the mac is HMAC-SHA256 over the payload
//! bytes. Tokens travel as `Authorization: Bearer <token>` or in the
//! `rc_session` cookie.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use rc_domain::config::SessionAuthConfig;
use rc_domain::message::UserType;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "rc_session";
const GUEST_EMAIL_PATTERN: &str = r"^guest-\d+$";

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub user_type: UserType,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_guest(&self) -> bool {
        self.user_type == UserType::Guest
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    typ: UserType,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("user type does not match email")]
    TypeMismatch,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signing keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionKeys {
    secret: Vec<u8>,
    ttl: Duration,
    guest_email: Regex,
}

impl SessionKeys {
    /// Read the signing secret from the configured env var. Without one a
    /// random secret is generated, so tokens die with the process.
    pub fn from_config(config: &SessionAuthConfig) -> anyhow::Result<Self> {
        let secret = match std::env::var(&config.secret_env) {
            Ok(s) if !s.trim().is_empty() => s.into_bytes(),
            _ => {
                tracing::warn!(
                    env = %config.secret_env,
                    "session secret not set, using a random per-process secret"
                );
                random_secret()
            }
        };
        Self::new(secret, config.token_ttl_hours)
    }

    pub fn new(secret: impl Into<Vec<u8>>, ttl_hours: u64) -> anyhow::Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            anyhow::bail!("session secret must not be empty");
        }
        let ttl_hours = i64::try_from(ttl_hours)?;
        Ok(Self {
            secret,
            ttl: Duration::hours(ttl_hours),
            guest_email: Regex::new(GUEST_EMAIL_PATTERN)?,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_guest_email(&self, email: &str) -> bool {
        self.guest_email.is_match(email)
    }

    /// Mint a session for a fresh guest user.
    pub fn issue_guest(&self) -> Result<(String, Session), TokenError> {
        let email = format!("guest-{}", Utc::now().timestamp_millis());
        self.issue(Uuid::new_v4().to_string(), email, UserType::Guest)
    }

    /// Mint a session for a regular user. The user id is derived from the
    /// email so repeated issues refer to the same user.
    pub fn issue_regular(&self, email: &str) -> Result<(String, Session), TokenError> {
        self.issue(user_id_for_email(email), email.to_string(), UserType::Regular)
    }

    fn issue(
        &self,
        user_id: String,
        email: String,
        user_type: UserType,
    ) -> Result<(String, Session), TokenError> {
        if self.is_guest_email(&email) != (user_type == UserType::Guest) {
            return Err(TokenError::TypeMismatch);
        }
        let expires_at = Utc::now() + self.ttl;
        let claims = Claims {
            sub: user_id.clone(),
            email: email.clone(),
            typ: user_type,
            exp: expires_at.timestamp(),
        };
        let token = self.sign_claims(&claims)?;
        Ok((
            token,
            Session {
                user_id,
                email,
                user_type,
                expires_at,
            },
        ))
    }

    fn sign_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
        let mac = self.mac(&payload)?;
        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(mac)))
    }

    fn mac(&self, payload: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Malformed)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    pub fn verify(&self, token: &str) -> Result<Session, TokenError> {
        let (payload_hex, mac_hex) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = hex::decode(payload_hex).map_err(|_| TokenError::Malformed)?;
        let provided = hex::decode(mac_hex).map_err(|_| TokenError::Malformed)?;

        let expected = self.mac(&payload)?;
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(TokenError::BadSignature);
        }

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if self.is_guest_email(&claims.email) != (claims.typ == UserType::Guest) {
            return Err(TokenError::TypeMismatch);
        }
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;

        Ok(Session {
            user_id: claims.sub,
            email: claims.email,
            user_type: claims.typ,
            expires_at,
        })
    }

    /// The session carried by a request, if any. Invalid tokens count as
    /// no session.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        let token = token_from_headers(headers)?;
        match self.verify(token) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            }
        }
    }
}

fn random_secret() -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.finalize().to_vec()
}

/// Stable user id for an email address.
pub fn user_id_for_email(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.num_seconds().max(0)
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Extractor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The request's session, if it carries a valid one. Never rejects:
/// handlers decide which error an anonymous request gets.
pub struct MaybeSession(pub Option<Session>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(state.sessions.from_headers(&parts.headers)))
    }
}
