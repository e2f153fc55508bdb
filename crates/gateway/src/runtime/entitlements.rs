//! Per-user daily message allowance.

use rc_domain::config::EntitlementsConfig;
use rc_domain::trace::TraceEvent;
use rc_store::Store;

use crate::api::error::{ChatError, ErrorType, Surface};
use crate::session::Session;

/// Rolling window the allowance applies to.
pub const WINDOW_HOURS: i64 = 24;

/// Reject the request when the user already sent more messages in the
/// window than their user type allows.
pub fn check_message_allowance(
    store: &Store,
    entitlements: &EntitlementsConfig,
    session: &Session,
) -> Result<(), ChatError> {
    let count = store.get_message_count_by_user_id(&session.user_id, WINDOW_HOURS)?;
    let limit = entitlements.for_user(session.user_type).max_messages_per_day;

    if count > limit {
        TraceEvent::RateLimited {
            user_id: session.user_id.clone(),
            user_type: session.user_type.as_str().to_string(),
            count,
            limit,
        }
        .emit();
        return Err(ChatError::new(ErrorType::RateLimit, Surface::Chat));
    }
    Ok(())
}
