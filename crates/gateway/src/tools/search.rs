//! `valyuSearch`: Valyu DeepSearch across web, finance, academic and
//! healthcare sources.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use rc_domain::config::SearchConfig;
use rc_domain::tool::ToolDefinition;

use super::{parse_args, Tool, ToolContext, VALYU_SEARCH};

const FINANCE_SOURCES: &[&str] = &[
    "valyu/valyu-stocks-US",
    "valyu/valyu-earnings-US",
    "valyu/valyu-sec-US",
];

/// Minutes of manual research one result stands in for.
const MINUTES_PER_RESULT: f64 = 5.0;
const READING_WORDS_PER_MINUTE: f64 = 200.0;
const USD_PER_MINUTE_SAVED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SearchCategory {
    General,
    Finance,
    Academic,
    Healthcare,
}

impl SearchCategory {
    fn as_str(&self) -> &'static str {
        match self {
            SearchCategory::General => "general",
            SearchCategory::Finance => "finance",
            SearchCategory::Academic => "academic",
            SearchCategory::Healthcare => "healthcare",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchInput {
    query: String,
    #[serde(default)]
    category: Option<SearchCategory>,
    #[serde(default)]
    included_sources: Option<Vec<String>>,
    #[serde(default)]
    max_results: Option<u32>,
}

#[derive(Debug, Serialize)]
struct DeepSearchBody<'a> {
    query: &'a str,
    search_type: &'static str,
    max_num_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    included_sources: Option<Vec<String>>,
}

/// Explicit sources win; finance queries without sources go to the
/// proprietary market datasets; everything else searches all sources.
fn build_body<'a>(input: &'a SearchInput, default_max: u32) -> DeepSearchBody<'a> {
    let max_num_results = input.max_results.unwrap_or(default_max);
    let (search_type, included_sources) = match (&input.included_sources, input.category) {
        (Some(sources), _) => ("proprietary", Some(sources.clone())),
        (None, Some(SearchCategory::Finance)) => (
            "proprietary",
            Some(FINANCE_SOURCES.iter().map(|s| s.to_string()).collect()),
        ),
        (None, _) => ("all", None),
    };
    DeepSearchBody {
        query: &input.query,
        search_type,
        max_num_results,
        included_sources,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub result_count: usize,
    pub unique_sources: usize,
    pub total_words: usize,
    pub time_saved_minutes: u64,
    #[serde(rename = "estimatedValueUSD")]
    pub estimated_value_usd: f64,
    #[serde(rename = "searchCostUSD")]
    pub search_cost_usd: f64,
}

/// Roll-up shown next to the results: how much reading the search
/// replaced and what it cost.
pub fn summarize_results(response: &Value) -> SearchSummary {
    let results = response
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let unique_sources: HashSet<&str> = results
        .iter()
        .filter_map(|r| r.get("source").and_then(Value::as_str))
        .collect();

    let total_words: usize = results
        .iter()
        .filter_map(|r| r.get("content").and_then(Value::as_str))
        .map(|c| c.split_whitespace().count())
        .sum();

    let minutes = (results.len() as f64 * MINUTES_PER_RESULT
        + total_words as f64 / READING_WORDS_PER_MINUTE)
        .round();

    SearchSummary {
        result_count: results.len(),
        unique_sources: unique_sources.len(),
        total_words,
        time_saved_minutes: minutes as u64,
        estimated_value_usd: minutes * USD_PER_MINUTE_SAVED,
        search_cost_usd: response
            .get("total_deduction_dollars")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
    }
}

pub struct SearchTool {
    client: reqwest::Client,
    base_url: String,
    api_key_env: String,
    default_max_results: u32,
}

impl SearchTool {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build reqwest client for valyuSearch")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            default_max_results: config.default_max_results,
        })
    }

    async fn deep_search(&self, api_key: &str, body: &DeepSearchBody<'_>) -> Result<Value> {
        let resp = self
            .client
            .post(format!("{}/deepsearch", self.base_url))
            .header("x-api-key", api_key)
            .json(body)
            .send()
            .await
            .context("request failed")?;

        let status = resp.status();
        let payload: Value = resp.json().await.context("response was not JSON")?;
        if !status.is_success() || payload.get("success") == Some(&Value::Bool(false)) {
            let message = payload
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("search service returned {status}"));
            anyhow::bail!(message);
        }
        Ok(payload)
    }
}

#[async_trait::async_trait]
impl Tool for SearchTool {
    fn spec(&self) -> ToolDefinition {
        ToolDefinition {
            name: VALYU_SEARCH.into(),
            description: "Search the web, financial markets, academic papers and healthcare \
                          sources with Valyu DeepSearch. Use it for current events, market \
                          data, SEC filings, research and anything that needs authoritative, \
                          up-to-date sources."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The user's search query, passed exactly as written"
                    },
                    "category": {
                        "type": "string",
                        "enum": ["general", "finance", "academic", "healthcare"],
                        "description": "Domain of the query"
                    },
                    "includedSources": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Restrict the search to these proprietary datasets"
                    },
                    "maxResults": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value> {
        let input: SearchInput = parse_args(args)?;

        let api_key = match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                return Ok(json!({
                    "error": format!(
                        "Valyu API key is not configured. Please add {} to your environment variables.",
                        self.api_key_env
                    ),
                }))
            }
        };

        let body = build_body(&input, self.default_max_results);
        tracing::debug!(
            query = %input.query,
            search_type = body.search_type,
            max_results = body.max_num_results,
            "valyu deepsearch"
        );

        match self.deep_search(&api_key, &body).await {
            Ok(response) => {
                let summary = summarize_results(&response);
                Ok(json!({
                    "success": true,
                    "query": input.query,
                    "category": input.category.unwrap_or(SearchCategory::General).as_str(),
                    "results": response,
                    "source": "Valyu DeepSearch API",
                    "summary": summary,
                }))
            }
            Err(e) => {
                tracing::warn!(error = %e, "valyu search failed");
                Ok(json!({
                    "error": format!("Failed to perform Valyu search: {e}"),
                    "query": input.query,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(v: Value) -> SearchInput {
        parse_args(v).unwrap()
    }

    #[test]
    fn source_selection() {
        let plain = input(json!({"query": "q"}));
        let body = build_body(&plain, 10);
        assert_eq!(body.search_type, "all");
        assert!(body.included_sources.is_none());
        assert_eq!(body.max_num_results, 10);

        let finance = input(json!({"query": "q", "category": "finance", "maxResults": 3}));
        let body = build_body(&finance, 10);
        assert_eq!(body.search_type, "proprietary");
        assert_eq!(body.included_sources.unwrap().len(), 3);
        assert_eq!(body.max_num_results, 3);

        let explicit = input(json!({
            "query": "q",
            "category": "finance",
            "includedSources": ["valyu/valyu-arxiv"]
        }));
        let body = build_body(&explicit, 10);
        assert_eq!(body.search_type, "proprietary");
        assert_eq!(body.included_sources.unwrap(), vec!["valyu/valyu-arxiv".to_string()]);
    }

    #[test]
    fn body_wire_shape() {
        let plain = input(json!({"query": "rust"}));
        let v = serde_json::to_value(build_body(&plain, 5)).unwrap();
        assert_eq!(
            v,
            json!({"query": "rust", "search_type": "all", "max_num_results": 5})
        );
    }

    #[test]
    fn summary_counts_results_words_and_cost() {
        let response = json!({
            "results": [
                {"source": "a.com", "content": "one two three"},
                {"source": "a.com", "content": "four"},
                {"source": "b.com"}
            ],
            "total_deduction_dollars": 0.0125
        });
        let s = summarize_results(&response);
        assert_eq!(s.result_count, 3);
        assert_eq!(s.unique_sources, 2);
        assert_eq!(s.total_words, 4);
        assert_eq!(s.time_saved_minutes, 15);
        assert_eq!(s.estimated_value_usd, 15.0);
        assert_eq!(s.search_cost_usd, 0.0125);

        let empty = summarize_results(&json!({}));
        assert_eq!(empty.result_count, 0);
        assert_eq!(empty.time_saved_minutes, 0);
    }

    #[tokio::test]
    async fn missing_key_is_reported_to_the_model() {
        let tool = SearchTool::new(&SearchConfig {
            api_key_env: "RC_TEST_SEARCH_KEY_UNSET".into(),
            ..SearchConfig::default()
        })
        .unwrap();
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let ctx = ToolContext {
            session: crate::session::Session {
                user_id: "u".into(),
                email: "guest-1".into(),
                user_type: rc_domain::message::UserType::Guest,
                expires_at: chrono::Utc::now(),
            },
            chat_id: uuid::Uuid::new_v4(),
            writer: crate::runtime::ui_stream::UiStreamWriter::new(tx, None),
        };
        let out = tool.call(&ctx, json!({"query": "q"})).await.unwrap();
        assert_eq!(
            out["error"],
            "Valyu API key is not configured. Please add RC_TEST_SEARCH_KEY_UNSET to your environment variables."
        );
    }
}
