mod frame_runner;
mod frame_runner_builder;
pub mod logging;
pub mod reload;
pub mod script_dir;
pub mod script_scanner;

pub use frame_runner::{FrameReport, FrameRunner, Instance, Role};
pub use frame_runner_builder::{BuildError, FrameRunnerBuilder};
pub use reload::{setup_reload_signal, ReloadSignal};
pub use script_dir::{discover_scripts, ScriptFile, ScriptLoadError};
pub use script_scanner::{ScanResult, ScriptScanner};
