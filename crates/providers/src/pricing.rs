//! Usage enrichment: attaches USD cost and context-window limits to the
//! token counts of a finished response.
//!
//! Prices come from a public model catalog (models.dev JSON, USD per million
//! tokens), refreshed at most once per TTL. One lookup refreshes at a time;
//! the others answer from the previous catalog meanwhile. Configured
//! overrides win over the catalog. When a model has no known price the
//! plain usage is returned.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::util::from_reqwest;
use rc_domain::config::{LlmConfig, ModelPricing};
use rc_domain::error::Result;
use rc_domain::stream::Usage;
use rc_domain::usage::{AppUsage, ContextLimits, UsageCost};
use serde_json::Value;

/// Retry delay after a failed catalog fetch.
const RETRY_AFTER: Duration = Duration::from_secs(5 * 60);

struct Snapshot {
    entries: HashMap<String, ModelPricing>,
    refresh_at: Instant,
}

enum Cached {
    Fresh(Option<ModelPricing>),
    Stale(Option<ModelPricing>),
    Empty,
}

impl Cached {
    fn entry(self) -> Option<ModelPricing> {
        match self {
            Cached::Fresh(entry) | Cached::Stale(entry) => entry,
            Cached::Empty => None,
        }
    }
}

pub struct PricingCatalog {
    url: String,
    ttl: Duration,
    overrides: HashMap<String, ModelPricing>,
    client: reqwest::Client,
    /// Never held across a fetch.
    snapshot: tokio::sync::Mutex<Option<Snapshot>>,
    /// Held by the lookup that is refreshing the catalog.
    refreshing: tokio::sync::Mutex<()>,
}

impl PricingCatalog {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            url: config.catalog_url.clone(),
            ttl: Duration::from_secs(config.catalog_ttl_secs),
            overrides: config
                .pricing
                .iter()
                .map(|(k, v)| (normalize(k), *v))
                .collect(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            snapshot: tokio::sync::Mutex::new(None),
            refreshing: tokio::sync::Mutex::new(()),
        }
    }

    /// Pricing for an upstream model id such as `anthropic/claude-sonnet-4.5`.
    pub async fn lookup(&self, model: &str) -> Option<ModelPricing> {
        let key = normalize(model);
        if let Some(p) = self.overrides.get(&key) {
            return Some(*p);
        }
        if self.url.is_empty() {
            return None;
        }

        let _refresh = match self.cached(&key).await {
            Cached::Fresh(entry) => return entry,
            Cached::Stale(entry) => match self.refreshing.try_lock() {
                Ok(guard) => guard,
                // Someone else is refreshing; answer from the old catalog.
                Err(_) => return entry,
            },
            // Nothing to answer from yet, so wait for the first fetch.
            Cached::Empty => self.refreshing.lock().await,
        };
        // The previous holder may have refreshed already.
        if let Cached::Fresh(entry) = self.cached(&key).await {
            return entry;
        }
        self.refresh().await;
        self.cached(&key).await.entry()
    }

    async fn cached(&self, key: &str) -> Cached {
        let guard = self.snapshot.lock().await;
        match guard.as_ref() {
            None => Cached::Empty,
            Some(s) if Instant::now() < s.refresh_at => Cached::Fresh(s.entries.get(key).copied()),
            Some(s) => Cached::Stale(s.entries.get(key).copied()),
        }
    }

    /// Fetch the catalog and swap it in. A failed fetch keeps the previous
    /// entries and retries after [`RETRY_AFTER`].
    async fn refresh(&self) {
        let fetched = self.fetch().await;
        let mut guard = self.snapshot.lock().await;
        let next = match fetched {
            Ok(entries) => {
                tracing::info!(models = entries.len(), "pricing catalog refreshed");
                Snapshot {
                    entries,
                    refresh_at: Instant::now() + self.ttl,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url, "pricing catalog fetch failed");
                Snapshot {
                    entries: guard.take().map(|p| p.entries).unwrap_or_default(),
                    refresh_at: Instant::now() + RETRY_AFTER,
                }
            }
        };
        *guard = Some(next);
    }

    /// Turn raw usage into client usage, with cost when the model is priced.
    pub async fn enrich(&self, model: &str, usage: &Usage) -> AppUsage {
        let mut app = AppUsage::from(usage);
        app.model_id = Some(model.to_string());
        if let Some(pricing) = self.lookup(model).await {
            apply_pricing(&mut app, &pricing);
        }
        app
    }

    async fn fetch(&self) -> Result<HashMap<String, ModelPricing>> {
        let body: Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(from_reqwest)?
            .json()
            .await
            .map_err(from_reqwest)?;
        Ok(parse_catalog(&body))
    }
}

pub fn apply_pricing(app: &mut AppUsage, pricing: &ModelPricing) {
    let input = pricing.input_cost(app.input_tokens);
    let output = pricing.output_cost(app.output_tokens);
    app.cost_usd = Some(UsageCost {
        input_usd: input,
        output_usd: output,
        total_usd: input + output,
    });
    if pricing.context_window.is_some() || pricing.max_output.is_some() {
        app.context = Some(ContextLimits {
            total_max: pricing.context_window,
            input_max: match (pricing.context_window, pricing.max_output) {
                (Some(total), Some(out)) => Some(total.saturating_sub(out)),
                _ => None,
            },
            output_max: pricing.max_output,
        });
    }
}

/// Flatten `{ provider: { models: { id: { cost, limit } } } }` into
/// `provider/model` keys. Models without a cost block are skipped.
pub fn parse_catalog(body: &Value) -> HashMap<String, ModelPricing> {
    let mut out = HashMap::new();
    let Some(providers) = body.as_object() else {
        return out;
    };
    for (provider_id, provider) in providers {
        let Some(models) = provider.get("models").and_then(Value::as_object) else {
            continue;
        };
        for (model_id, model) in models {
            let cost = model.get("cost");
            let input = cost.and_then(|c| c.get("input")).and_then(Value::as_f64);
            let output = cost.and_then(|c| c.get("output")).and_then(Value::as_f64);
            let (Some(input), Some(output)) = (input, output) else {
                continue;
            };
            out.insert(
                normalize(&format!("{provider_id}/{model_id}")),
                ModelPricing {
                    input_per_1m: input,
                    output_per_1m: output,
                    context_window: model.pointer("/limit/context").and_then(Value::as_u64),
                    max_output: model.pointer("/limit/output").and_then(Value::as_u64),
                },
            );
        }
    }
    out
}

/// Gateway ids use dotted versions (`claude-sonnet-4.5`), the catalog uses
/// dashes (`claude-sonnet-4-5`).
fn normalize(model: &str) -> String {
    model.trim().to_ascii_lowercase().replace('.', "-")
}
