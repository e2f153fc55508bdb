use std::sync::Arc;

use rc_domain::config::Config;
use rc_providers::{ModelCatalog, PricingCatalog};
use rc_store::Store;

use crate::runtime::resumable::StreamRegistry;
use crate::session::SessionKeys;
use crate::tools::ToolRegistry;

/// Shared application state passed to all API handlers.
///
/// - **Core services**: config, persistence, models and pricing
/// - **Auth**: session token keys
/// - **Runtime**: model tools and resumable response streams
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub catalog: Arc<ModelCatalog>,
    pub pricing: Arc<PricingCatalog>,

    // ── Auth ──────────────────────────────────────────────────────────
    pub sessions: Arc<SessionKeys>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub tools: Arc<ToolRegistry>,
    /// Live and recently finished response streams, by chat.
    pub streams: Arc<StreamRegistry>,
}
