//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;

const MASK: &str = "********";

/// Copy of the settings with every credential replaced by a mask.
fn redacted(settings: &Settings) -> Settings {
    let mut settings = settings.clone();
    for secret in [
        &mut settings.llm.api_key,
        &mut settings.speech.api_key,
        &mut settings.storage.access_key,
        &mut settings.remote.token,
    ] {
        if secret.is_some() {
            *secret = Some(MASK.to_string());
        }
    }
    settings
}

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: Option<&str>) -> Result<()> {
    let path = config_path
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&redacted(&settings))
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", path.display());
        }

        ConfigAction::Init => {
            if path.exists() {
                Output::warning(&format!("Config already exists at {}", path.display()));
                return Ok(());
            }
            // Credentials come from the environment; keep them out of the file.
            Settings::default().save_to(&path)?;
            Output::success(&format!("Created default config at {}", path.display()));
        }
    }

    Ok(())
}
