use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use lantern_bridge::{BridgeError, GuestRuntime, HostRef};
use lantern_runner::{logging, setup_reload_signal, FrameRunner, ScriptFile};
use lantern_world::config::{ConfigLoadError, LanternConfig};
use lantern_world::types::{type_by_name, CONCRETE_TYPES};
use lantern_world::{contracts, standard_registry, Scheduler};

#[derive(Parser)]
#[command(name = "lantern", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the frame loop over a script directory
    Run {
        /// Config file (default: the platform config directory)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Script directory, overriding the config
        #[arg(short, long, value_name = "DIR")]
        scripts: Option<PathBuf>,

        /// Stop after this many frames
        #[arg(short, long, value_name = "N")]
        frames: Option<u64>,

        /// Also write logs to the data directory
        #[arg(long)]
        log_file: bool,
    },

    /// Load one script against its contract and report missing hooks
    Check {
        /// Script to check
        file: PathBuf,

        /// Contract id, overriding the directive or file name
        #[arg(short, long, value_name = "ID")]
        contract: Option<String>,
    },

    /// List registered capabilities, or the operations one host type sees
    Capabilities {
        /// Host type to resolve, e.g. Sprite
        #[arg(short = 't', long = "type", value_name = "NAME")]
        type_name: Option<String>,
    },

    /// Write an example config file
    Init {
        /// Where to write it (default: the platform config directory)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

const EXAMPLE_CONFIG: &str = r#"# Lantern Configuration

[scripting]
enabled = true
# script_dir = "scripts"
hot_reload = true
hot_reload_interval_ms = 1000

# Per-script settings, keyed by script id
# [scripting.config.intro]
# enabled = false

[runner]
frame_rate = 60
"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            scripts,
            frames,
            log_file,
        } => {
            let _guard = logging::init_logging("lantern", log_file)?;
            let config = load_config(config.as_deref())?;
            run(config, scripts, frames).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { file, contract } => {
            logging::init_logging("lantern", false)?;
            let passed = check(&file, contract.as_deref())?;
            Ok(if passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Capabilities { type_name } => {
            logging::init_logging("lantern", false)?;
            capabilities(type_name.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { config } => {
            logging::init_logging("lantern", false)?;
            create_example_config(&config.unwrap_or_else(LanternConfig::config_path))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<LanternConfig> {
    let result = match path {
        Some(path) => LanternConfig::load_from(path),
        None => LanternConfig::load(),
    };
    match result {
        Ok(config) => Ok(config),
        Err(ConfigLoadError::NotFound) if path.is_none() => {
            info!(
                "No config at {}, using defaults (run `lantern init` to create one)",
                LanternConfig::config_path().display()
            );
            Ok(LanternConfig::default())
        }
        Err(err) => Err(err).with_context(|| match path {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Failed to load config".to_string(),
        }),
    }
}

async fn run(config: LanternConfig, scripts: Option<PathBuf>, frames: Option<u64>) -> Result<()> {
    let mut builder = FrameRunner::builder()
        .with_standard_registry()
        .with_config(config);
    if let Some(dir) = scripts {
        builder = builder.with_script_dir(dir);
    }
    let mut runner = builder.build().context("Failed to start the frame runner")?;

    match runner.script_dir() {
        Some(dir) => info!(
            "Running {} instance(s) from {}",
            runner.instance_count(),
            dir.display()
        ),
        None => info!("Running without scripts"),
    }

    let mut interval = tokio::time::interval(runner.frame_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reload_rx = setup_reload_signal();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last = Instant::now();
    let mut failures = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let report = runner.step(now.duration_since(last).as_secs_f64(), now);
                last = now;
                failures += report.failures;
                debug!(
                    target: "scripting",
                    "Frame {}: {} draw command(s)",
                    report.frame,
                    report.commands.len()
                );

                runner.poll_reload(now);
                if frames.is_some_and(|limit| report.frame >= limit) {
                    break;
                }
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, shutting down");
                break;
            }
            Ok(()) = reload_rx.changed() => {
                let requested = reload_rx.borrow_and_update().is_some();
                if requested {
                    runner.reload_scripts();
                }
            }
        }
    }

    failures += runner.shutdown();
    info!(
        "Stopped after {} frame(s) with {} script failure(s)",
        runner.frame(),
        failures
    );
    Ok(())
}

/// Returns whether the script satisfies its contract.
fn check(file: &Path, contract: Option<&str>) -> Result<bool> {
    let script = match ScriptFile::read_as(file, contract) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(false);
        }
    };
    let contract = contracts::by_id(&script.contract)
        .ok_or_else(|| anyhow!("Unknown contract '{}'", script.contract))?;

    let runtime = GuestRuntime::new(Rc::new(standard_registry()?))?;
    // Scripts may touch the scheduler while loading.
    let scheduler: HostRef = Rc::new(Scheduler::new(Instant::now()));
    runtime.set_global("scheduler", runtime.wrap(&scheduler)?)?;

    let name = script.source_name();
    match runtime.load_contract(&contract, &script.source, &name) {
        Ok(stub) => {
            println!(
                "{}: ok ({} contract, hooks: {})",
                name,
                contract.id(),
                stub.present_hooks().join(", ")
            );
            Ok(true)
        }
        Err(BridgeError::MissingHook { missing, .. }) => {
            println!("{}: missing required hook(s) for the {} contract:", name, contract.id());
            for hook in missing {
                println!("  {}", hook);
            }
            Ok(false)
        }
        Err(e) => {
            println!("{}: {}", name, e);
            Ok(false)
        }
    }
}

fn capabilities(type_name: Option<&str>) -> Result<()> {
    let registry = standard_registry()?;

    let Some(type_name) = type_name else {
        for descriptor in registry.descriptors() {
            let operations: Vec<&str> = descriptor.operations().names().collect();
            println!(
                "{:<16} {:<14} {:<9} {}",
                descriptor.name(),
                descriptor.target().name,
                if descriptor.is_primary() { "primary" } else { "" },
                operations.join(" ")
            );
        }
        return Ok(());
    };

    let ty = type_by_name(type_name).ok_or_else(|| {
        let available = CONCRETE_TYPES
            .iter()
            .map(|ty| ty.name)
            .collect::<Vec<_>>()
            .join(", ");
        anyhow!(
            "Host type '{}' not found. Available types: {}",
            type_name,
            available
        )
    })?;
    let table = registry.resolve(ty)?;

    println!("{} (guest type: {})", ty.name, table.type_name());
    println!("capabilities: {}", table.capabilities().join(", "));
    for operation in table.operations().names() {
        println!("  {}", operation);
    }
    Ok(())
}

fn create_example_config(config_path: &Path) -> Result<()> {
    // Never overwrite an existing config file
    if config_path.exists() {
        return Err(anyhow!(
            "Config file already exists at {}. Edit it manually or delete it to create a new one.",
            config_path.display()
        ));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(config_path, EXAMPLE_CONFIG)?;
    info!("Created example config at {}", config_path.display());
    eprintln!("Config file created at: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = LanternConfig::from_toml_str(EXAMPLE_CONFIG).unwrap();
        assert!(config.scripting.enabled);
        assert_eq!(config.runner.frame_rate, 60);
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from(["lantern", "run", "--frames", "3", "--scripts", "demo"])
            .unwrap();
        match cli.command {
            Commands::Run { frames, scripts, log_file, .. } => {
                assert_eq!(frames, Some(3));
                assert_eq!(scripts, Some(PathBuf::from("demo")));
                assert!(!log_file);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parses_capability_type() {
        let cli = Cli::try_parse_from(["lantern", "capabilities", "--type", "Sprite"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Capabilities { type_name: Some(ref t) } if t == "Sprite"
        ));
    }

    #[test]
    fn test_check_reports_missing_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazy.world_object.lua");
        fs::write(&path, "function create(self) end").unwrap();

        assert!(!check(&path, None).unwrap());
        assert!(check(&path, Some("room")).unwrap());
        assert!(!check(&dir.path().join("absent.room.lua"), None).unwrap());
    }

    #[test]
    fn test_example_config_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        create_example_config(&path).unwrap();
        assert!(create_example_config(&path).is_err());
        assert!(load_config(Some(&path)).is_ok());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_unknown_host_type() {
        assert!(capabilities(Some("Dragon")).is_err());
        assert!(capabilities(Some("scenery")).is_ok());
    }
}
