use rc_domain::config::Config;
use rc_providers::ProviderRegistry;

/// Print the chat model catalog and whether each model's provider is
/// usable with the current environment.
pub fn list(config: &Config) {
    let registry = ProviderRegistry::from_config(&config.llm);
    let status = |provider: &str| -> String {
        if registry.get(provider).is_some() {
            "ready".into()
        } else if let Some(reason) = registry.failure(provider) {
            format!("unavailable ({reason})")
        } else {
            "unknown provider".into()
        }
    };

    println!("{:<20} {:<36} {:<10} STATUS", "ID", "MODEL", "REASONING");
    for m in &config.models.chat {
        let marker = if m.id == config.models.default { "*" } else { " " };
        println!(
            "{marker}{:<19} {:<36} {:<10} {}",
            m.id,
            format!("{}/{}", m.provider, m.model),
            if m.reasoning { "yes" } else { "no" },
            status(&m.provider),
        );
    }
    println!();
    println!(
        "title:    {}/{} ({})",
        config.models.title.provider,
        config.models.title.model,
        status(&config.models.title.provider)
    );
    println!(
        "artifact: {}/{} ({})",
        config.models.artifact.provider,
        config.models.artifact.model,
        status(&config.models.artifact.provider)
    );
}
