//! Builder for [`FrameRunner`].

use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use lantern_bridge::{BridgeError, CapabilityRegistry, GuestRuntime};
use lantern_world::config::LanternConfig;
use lantern_world::standard_registry;

use crate::frame_runner::FrameRunner;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Capability registry not specified - use .with_registry(), .with_standard_registry() or .with_global_registry()")]
    MissingRegistry,

    #[error("Frame rate must be at least 1 frame per second")]
    InvalidFrameRate,

    #[error("Failed to start the guest runtime: {0}")]
    Runtime(#[from] BridgeError),
}

enum RegistrySource {
    Explicit(Rc<CapabilityRegistry>),
    Standard,
    Global,
}

/// Builder for FrameRunner
///
/// ```no_run
/// # use lantern_runner::FrameRunner;
/// let mut runner = FrameRunner::builder()
///     .with_standard_registry()
///     .with_script_dir("scripts".into())
///     .with_frame_rate(30)
///     .build()
///     .unwrap();
/// runner.step(1.0 / 30.0, std::time::Instant::now());
/// ```
pub struct FrameRunnerBuilder {
    registry: Option<RegistrySource>,
    script_dir: Option<PathBuf>,
    config: LanternConfig,
    frame_rate: Option<u32>,
    start: Option<Instant>,
}

impl FrameRunnerBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            script_dir: None,
            config: LanternConfig::default(),
            frame_rate: None,
            start: None,
        }
    }

    pub fn with_registry(mut self, registry: Rc<CapabilityRegistry>) -> Self {
        self.registry = Some(RegistrySource::Explicit(registry));
        self
    }

    /// Use the standard world catalog.
    pub fn with_standard_registry(mut self) -> Self {
        self.registry = Some(RegistrySource::Standard);
        self
    }

    /// Use the registry installed with `lantern_bridge::install_global`.
    pub fn with_global_registry(mut self) -> Self {
        self.registry = Some(RegistrySource::Global);
        self
    }

    /// Load scripts from `dir`, even if the config disables scripting.
    pub fn with_script_dir(mut self, dir: PathBuf) -> Self {
        self.script_dir = Some(dir);
        self
    }

    pub fn with_config(mut self, config: LanternConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the configured frame rate.
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Clock origin for the scheduler (default: now).
    pub fn with_start(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }

    /// Build the runner and load its scripts.
    pub fn build(self) -> Result<FrameRunner, BuildError> {
        let frame_rate = self.frame_rate.unwrap_or(self.config.runner.frame_rate);
        if frame_rate == 0 {
            return Err(BuildError::InvalidFrameRate);
        }

        let runtime = match self.registry.ok_or(BuildError::MissingRegistry)? {
            RegistrySource::Explicit(registry) => GuestRuntime::new(registry)?,
            RegistrySource::Standard => GuestRuntime::new(Rc::new(standard_registry()?))?,
            RegistrySource::Global => GuestRuntime::from_global()?,
        };

        let mut scripting = self.config.scripting;
        let script_dir = match self.script_dir {
            Some(dir) => {
                scripting.enabled = true;
                Some(dir)
            }
            None => scripting.enabled.then(|| scripting.script_dir()),
        };

        let mut runner = FrameRunner::new(
            runtime,
            script_dir,
            scripting,
            self.config.runner.room_size,
            Duration::from_secs_f64(1.0 / f64::from(frame_rate)),
            self.start.unwrap_or_else(Instant::now),
        )?;
        runner.load_scripts();
        Ok(runner)
    }
}

impl Default for FrameRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRunner {
    pub fn builder() -> FrameRunnerBuilder {
        FrameRunnerBuilder::new()
    }
}
