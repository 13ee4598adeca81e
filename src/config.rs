use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::form::PromptMode;
use crate::models::{self, Provider};

/// Main application configuration, stored as TOML under `~/.promptpad`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for OpenAI. The environment variable takes precedence.
    pub openai_api_key: Option<String>,

    /// API key for Anthropic. The environment variable takes precedence.
    pub anthropic_api_key: Option<String>,

    /// Default model, as a user-facing label from the catalog.
    pub default_model: String,

    /// Instruction-block lifecycle: recomputed every turn (`live`) or held
    /// from the last initialize action (`snapshot`).
    pub prompt_mode: PromptMode,

    /// Promptpad home directory.
    pub promptpad_home: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            default_model: models::DEFAULT_LABEL.to_string(),
            prompt_mode: PromptMode::Live,
            promptpad_home: home.join(".promptpad"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.promptpad/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let promptpad_home = home.join(".promptpad");
        let config_path = promptpad_home.join("config.toml");

        fs::create_dir_all(&promptpad_home).context("Failed to create .promptpad directory")?;

        let mut config = if config_path.exists() {
            let content =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.promptpad_home = promptpad_home;
        Ok(config)
    }

    /// Save configuration to file.
    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let config_path = self.promptpad_home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// API key for a provider: environment first, then the config file.
    pub fn api_key_for(&self, provider: Provider) -> Option<String> {
        if let Ok(key) = std::env::var(provider.key_env()) {
            if !key.is_empty() {
                return Some(key);
            }
        }
        match provider {
            Provider::OpenAi => self.openai_api_key.clone(),
            Provider::Anthropic => self.anthropic_api_key.clone(),
        }
    }

    /// Fail-fast credential check, run at startup rather than deferred to
    /// the first request.
    pub fn require_api_key(&self, provider: Provider) -> Result<String> {
        match self.api_key_for(provider) {
            Some(key) => Ok(key),
            None => bail!(
                "no API key for {}: set {} or add it to {}",
                provider.as_str(),
                provider.key_env(),
                self.promptpad_home.join("config.toml").display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.default_model, models::DEFAULT_LABEL);
        assert_eq!(config.prompt_mode, PromptMode::Live);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn prompt_mode_parses_from_toml() {
        let config: Config = toml::from_str("prompt_mode = \"snapshot\"").unwrap();
        assert_eq!(config.prompt_mode, PromptMode::Snapshot);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.default_model = "Claude Haiku 3.5".to_string();
        config.prompt_mode = PromptMode::Snapshot;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.default_model, "Claude Haiku 3.5");
        assert_eq!(parsed.prompt_mode, PromptMode::Snapshot);
    }
}
