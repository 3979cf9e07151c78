use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::paths::ProjectPaths;

/// Per-script settings, keyed by script id under `[scripting.config.<id>]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSettings {
    /// Whether this script is loaded (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Anything else is passed through untouched
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extra: toml::Table::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptingConfig {
    /// Whether scripting is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory containing scripts (default: <data dir>/lantern/scripts)
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// Whether hot reload is enabled (default: true)
    #[serde(default = "default_hot_reload")]
    pub hot_reload: bool,

    /// Hot reload scan interval in milliseconds (default: 1000ms)
    #[serde(default = "default_hot_reload_interval")]
    pub hot_reload_interval_ms: u64,

    /// Per-script configuration (script ID -> settings)
    #[serde(default)]
    pub config: HashMap<String, ScriptSettings>,
}

fn default_enabled() -> bool {
    true
}

fn default_hot_reload() -> bool {
    true
}

fn default_hot_reload_interval() -> u64 {
    1000
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script_dir: None,
            hot_reload: true,
            hot_reload_interval_ms: 1000,
            config: HashMap::new(),
        }
    }
}

impl ScriptingConfig {
    /// Get the script directory path (use provided or default)
    pub fn script_dir(&self) -> PathBuf {
        self.script_dir.clone().unwrap_or_else(|| {
            ProjectPaths::new("lantern")
                .map(|p| p.data_dir().join("scripts"))
                .unwrap_or_else(|| PathBuf::from(".scripts"))
        })
    }

    /// Scripts without an entry are enabled.
    pub fn is_script_enabled(&self, script_id: &str) -> bool {
        self.config
            .get(script_id)
            .map(|settings| settings.enabled)
            .unwrap_or(true)
    }
}
