use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search (Valyu DeepSearch)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Env var holding the search API key. The search tool reports an
    /// error result (instead of failing the turn) when it is unset.
    #[serde(default = "d_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_search_url")]
    pub base_url: String,
    #[serde(default = "d_search_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "d_max_results")]
    pub default_max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: d_search_key_env(),
            base_url: d_search_url(),
            timeout_secs: d_search_timeout(),
            default_max_results: d_max_results(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Weather
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "d_weather_url")]
    pub base_url: String,
    #[serde(default = "d_weather_timeout")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: d_weather_url(),
            timeout_secs: d_weather_timeout(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "d_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: d_store_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resumable streams
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    /// Buffer response streams so a reconnecting client can resume them.
    #[serde(default = "d_true")]
    pub resumable: bool,
    /// How long a finished stream stays replayable.
    #[serde(default = "d_retain")]
    pub retain_secs: u64,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            resumable: true,
            retain_secs: d_retain(),
        }
    }
}

fn d_search_key_env() -> String {
    "VALYU_API_KEY".into()
}
fn d_search_url() -> String {
    "https://api.valyu.network/v1".into()
}
fn d_search_timeout() -> u64 {
    60
}
fn d_max_results() -> u32 {
    10
}
fn d_weather_url() -> String {
    "https://api.open-meteo.com/v1".into()
}
fn d_weather_timeout() -> u64 {
    15
}
fn d_store_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_true() -> bool {
    true
}
fn d_retain() -> u64 {
    300
}
