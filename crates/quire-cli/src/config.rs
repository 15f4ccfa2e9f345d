//! Configuration file support

use quire_ai::models::{self, DEFAULT_FOLLOWUP_MODEL_ID, DEFAULT_MODEL_ID};
use quire_engine::{EngineConfig, PersistenceConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for quire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model for routing and artifact generation
    pub model: Option<String>,
    /// Model for the short note after an edit
    pub followup_model: Option<String>,
    /// Assistant whose reflections and custom actions are used
    pub assistant: Option<String>,
    /// Where threads and memory are stored
    pub data_dir: Option<PathBuf>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Generate a followup message after artifact edits
    pub followup: Option<bool>,
    /// Update reflections after every turn
    pub reflect: Option<bool>,
    /// Seconds of quiet before the artifact is written to disk
    pub debounce_secs: Option<u64>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quire")
    }

    /// Config file path, honouring `QUIRE_CONFIG_PATH`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("QUIRE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quire")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`; a missing or unreadable file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Write a default config file unless one already exists
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        Self::example().save_to(&path)?;
        Ok(path)
    }

    fn example() -> Self {
        let engine = EngineConfig::default();
        Config {
            model: Some(DEFAULT_MODEL_ID.to_string()),
            followup_model: Some(DEFAULT_FOLLOWUP_MODEL_ID.to_string()),
            assistant: Some("default".to_string()),
            data_dir: None,
            temperature: Some(engine.temperature),
            max_tokens: Some(engine.max_tokens),
            followup: Some(engine.followup),
            reflect: Some(engine.reflect),
            debounce_secs: Some(engine.persistence.debounce.as_secs()),
            api_keys: ApiKeys::default(),
        }
    }

    /// API key from the config file, then `ANTHROPIC_API_KEY`
    pub fn get_api_key(&self) -> Option<String> {
        self.api_keys
            .anthropic
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Self::default_data_dir)
    }

    /// Build the engine configuration; explicit model ids win over the file
    pub fn engine_config(&self, model: Option<&str>, followup_model: Option<&str>) -> EngineConfig {
        let defaults = EngineConfig::default();
        let model_id = model.or(self.model.as_deref());
        let followup_id = followup_model.or(self.followup_model.as_deref());

        EngineConfig {
            model: model_id
                .map(models::get_model_or_default)
                .unwrap_or(defaults.model),
            followup_model: followup_id
                .map(models::get_model_or_default)
                .unwrap_or(defaults.followup_model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            followup: self.followup.unwrap_or(defaults.followup),
            reflect: self.reflect.unwrap_or(defaults.reflect),
            persistence: PersistenceConfig {
                debounce: self
                    .debounce_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.persistence.debounce),
                ..defaults.persistence
            },
            ..defaults
        }
    }
}
