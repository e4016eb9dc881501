use std::path::{Path, PathBuf};

use serde::Deserialize;

use interpreter::SessionConfig;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pilot.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: String,

    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    pub temperature: f32,

    /// Keep calling the model while commands produce follow-up content.
    pub autonomous: bool,

    /// Ask before every `@runInTerminal`.
    pub confirm_terminal: bool,

    pub max_auto_turns: Option<usize>,

    pub system_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            autonomous: true,
            confirm_terminal: true,
            max_auto_turns: None,
            system_prompt: None,
        }
    }
}

impl Config {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.model.clone(),
            autonomous: self.autonomous,
            max_auto_turns: self.max_auto_turns,
            system_prompt: self.system_prompt.clone(),
        }
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Load `explicit`, or `pilot.toml` if it exists, or the defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(Config::default());
            }
            fallback
        }
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = toml::from_str("model = \"gpt-4o\"\nmax_auto_turns = 5").unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_auto_turns, Some(5));
        assert!(config.autonomous);
        assert_eq!(config.base_url, Config::default().base_url);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/pilot.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
