use rc_domain::config::{Config, ConfigSeverity};
use rc_providers::ProviderRegistry;

/// Validate the config and try to initialize every provider, printing any
/// issues. Returns `false` when errors were found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    let registry = ProviderRegistry::from_config(&config.llm);
    let provider_failures: Vec<(String, String)> = config
        .llm
        .providers
        .iter()
        .filter_map(|p| {
            registry
                .failure(&p.id)
                .map(|reason| (p.id.clone(), reason.to_string()))
        })
        .collect();

    if issues.is_empty() && provider_failures.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }
    // Missing keys only matter once chat requests arrive, so they warn.
    for (id, reason) in &provider_failures {
        println!("WARNING llm.providers[{id}]: cannot initialize: {reason}");
    }

    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count,
        warning_count + provider_failures.len(),
    );

    error_count == 0
}

/// The resolved config (defaults filled in) as TOML, with plaintext
/// provider keys masked.
pub fn render(config: &Config) -> anyhow::Result<String> {
    let mut masked = config.clone();
    for provider in &mut masked.llm.providers {
        if let Some(key) = provider.auth.key.as_mut() {
            *key = mask(key);
        }
    }
    Ok(toml::to_string_pretty(&masked)?)
}

pub fn show(config: &Config) {
    match render(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".into()
    } else {
        format!("{visible}****")
    }
}
