pub mod config;
pub mod models;
pub mod pid;
pub mod token;

use clap::{Parser, Subcommand};

use rc_domain::config::Config;

/// RaiseChat: a chat gateway with tools, artifacts and deep search.
#[derive(Debug, Parser)]
#[command(name = "raisechat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Session token utilities.
    #[command(subcommand)]
    Token(TokenCommand),
    /// List the chat models the server offers.
    Models,
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Mint a session token signed with the configured secret.
    Issue {
        /// Email of the regular user the token is for.
        #[arg(long, required_unless_present = "guest")]
        email: Option<String>,
        /// Issue a guest token instead.
        #[arg(long, conflicts_with = "email")]
        guest: bool,
    },
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `RC_CONFIG` (or `config.toml`
/// by default). A missing file yields the defaults. Returns the parsed
/// [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("RC_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))
}
