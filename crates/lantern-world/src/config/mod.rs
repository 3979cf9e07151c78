pub mod lantern_config;
pub mod paths;
pub mod runner_config;
pub mod scripting_config;

pub use lantern_config::{ConfigLoadError, LanternConfig};
pub use paths::ProjectPaths;
pub use runner_config::RunnerConfig;
pub use scripting_config::{ScriptSettings, ScriptingConfig};
