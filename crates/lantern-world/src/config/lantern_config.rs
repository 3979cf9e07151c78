use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{
    paths::ProjectPaths, runner_config::RunnerConfig, scripting_config::ScriptingConfig,
};

#[derive(Debug)]
pub enum ConfigLoadError {
    NotFound,
    ParseError(String),
    IoError(String),
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLoadError::NotFound => write!(f, "Config file not found"),
            ConfigLoadError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigLoadError::IoError(msg) => write!(f, "IO error reading config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigLoadError {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanternConfig {
    /// Scripting configuration
    #[serde(default)]
    pub scripting: ScriptingConfig,

    /// Frame loop configuration
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl LanternConfig {
    pub fn config_path() -> PathBuf {
        ProjectPaths::new("lantern")
            .map(|p| p.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("lantern.toml"))
    }

    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}
