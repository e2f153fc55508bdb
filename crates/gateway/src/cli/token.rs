use rc_domain::config::Config;

use crate::session::SessionKeys;

/// Mint a session token with the configured secret and print it with its
/// user id. Only useful when the secret env var is set: without it every
/// process signs with its own random key.
pub fn issue(config: &Config, email: Option<&str>, guest: bool) -> anyhow::Result<()> {
    let secret = std::env::var(&config.auth.secret_env).map_err(|_| {
        anyhow::anyhow!(
            "{} is not set; tokens signed now would not verify on the server",
            config.auth.secret_env
        )
    })?;
    let keys = SessionKeys::new(secret, config.auth.token_ttl_hours)?;

    let (token, session) = match (email, guest) {
        (_, true) => keys.issue_guest()?,
        (Some(email), false) => keys.issue_regular(email)?,
        (None, false) => anyhow::bail!("either --email or --guest is required"),
    };

    println!("user_id: {}", session.user_id);
    println!("type:    {}", session.user_type.as_str());
    println!("expires: {}", session.expires_at.to_rfc3339());
    println!("token:   {token}");
    Ok(())
}
