use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ChatError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const MIN_MAX_TOKENS: u32 = 100;
pub const MAX_MAX_TOKENS: u32 = 32_000;
pub const MIN_HISTORY_LIMIT: usize = 2;
pub const MAX_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub generation: GenerationSettings,
    pub prompt: PromptSettings,
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    pub system_prompt: String,
    /// Number of non-system messages sent with each request.
    pub history_limit: usize,
    /// Send the system prompt as its own message. Some local models only
    /// accept user and assistant roles; turn this off for them.
    pub use_system_role: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    pub history_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                base_url: "http://localhost:1234/v1".to_string(),
                model: crate::llm::FALLBACK_MODEL.to_string(),
            },
            generation: GenerationSettings {
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: 2000,
            },
            prompt: PromptSettings {
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
                history_limit: 10,
                use_system_role: true,
            },
            tools: ToolSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    /// Get path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lmchat")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from a specific file. A missing or unparsable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring invalid config {}: {}", path.display(), e),
                },
                Err(e) => tracing::warn!("Could not read config {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ChatError> {
        self.save_to(&Self::config_path())
    }

    /// Save to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory for saved conversations.
    pub fn history_dir(&self) -> PathBuf {
        self.storage.history_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lmchat")
                .join("history")
        })
    }

    /// Snapshot the settings for a single turn, clamping values into the
    /// ranges the server accepts.
    pub fn turn_config(&self) -> TurnConfig {
        // NaN would survive clamp and serialize as null.
        let temperature = if self.generation.temperature.is_finite() {
            self.generation.temperature.clamp(0.0, 1.0)
        } else {
            tracing::warn!("Ignoring non-finite temperature, using {}", DEFAULT_TEMPERATURE);
            DEFAULT_TEMPERATURE
        };

        TurnConfig {
            model: self.server.model.clone(),
            temperature,
            max_tokens: self.generation.max_tokens.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS),
            system_prompt: self.prompt.system_prompt.clone(),
            history_limit: self.prompt.history_limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT),
            use_system_role: self.prompt.use_system_role,
            tools_enabled: self.tools.enabled,
        }
    }
}

/// Immutable configuration for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub history_limit: usize,
    pub use_system_role: bool,
    pub tools_enabled: bool,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Settings::default().turn_config()
    }
}
