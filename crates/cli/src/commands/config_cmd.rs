//! `deckr config`: Configuration commands.

use deckr_config::AppConfig;

/// Print the default configuration as TOML.
pub async fn default() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

/// Print the effective configuration, with the API key masked.
pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", config_path().display());

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed and validated");
            if !config.has_api_key() {
                println!("   Warning: no API key set (DECKR_API_KEY or GEMINI_API_KEY)");
            }
            println!();
            println!("   Provider:   {}", config.provider.kind);
            println!("   Model:      {}", config.default_model);
            println!("   Iterations: {}", config.agent.max_iterations);
            println!(
                "   Gateway:    {}:{}",
                config.gateway.host, config.gateway.port
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        assert!(config_path().to_str().unwrap().ends_with("config.toml"));
    }

    #[test]
    fn default_toml_parses_back() {
        let parsed: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.default_model, AppConfig::default().default_model);
    }
}
