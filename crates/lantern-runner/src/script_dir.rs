//! Script directory layout.
//!
//! Scripts are `*.lua` files. Each names the contract it implements either
//! with a first-line directive (`--! contract: room`) or through its file
//! name (`intro.room.lua`). The script id is the file stem without the
//! contract suffix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lantern_bridge::BridgeError;
use lantern_world::config::ScriptingConfig;
use lantern_world::contracts;
use thiserror::Error;
use tracing::{debug, info, warn};

const SCRIPT_EXTENSION: &str = "lua";
const DIRECTIVE_PREFIX: &str = "--!";

#[derive(Debug, Error)]
pub enum ScriptLoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} does not name a contract (add `--! contract: <id>` or name it <id>.<contract>.lua)", .path.display())]
    NoContract { path: PathBuf },

    #[error("{} names unknown contract '{contract}'", .path.display())]
    UnknownContract { path: PathBuf, contract: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// A script read from disk, with its contract resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub id: String,
    pub contract: String,
    pub path: PathBuf,
    pub source: String,
}

impl ScriptFile {
    /// Read a script, resolving its contract from the directive or file name.
    pub fn read(path: &Path) -> Result<Self, ScriptLoadError> {
        Self::read_as(path, None)
    }

    /// Read a script, with `contract` taking precedence when given.
    pub fn read_as(path: &Path, contract: Option<&str>) -> Result<Self, ScriptLoadError> {
        let source = fs::read_to_string(path).map_err(|source| ScriptLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(path, source, contract)
    }

    pub fn from_source(
        path: &Path,
        source: String,
        contract: Option<&str>,
    ) -> Result<Self, ScriptLoadError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let (id, suffix) = split_contract_suffix(stem);

        let contract = contract
            .or_else(|| contract_directive(&source))
            .or(suffix)
            .ok_or_else(|| ScriptLoadError::NoContract {
                path: path.to_path_buf(),
            })?
            .to_string();
        if contracts::by_id(&contract).is_none() {
            return Err(ScriptLoadError::UnknownContract {
                path: path.to_path_buf(),
                contract,
            });
        }

        Ok(Self {
            id: id.to_string(),
            contract,
            path: path.to_path_buf(),
            source,
        })
    }

    /// Name used for error messages and the guest chunk.
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// `.lua` files directly inside `dir`, sorted by path. A missing directory
/// has no scripts.
pub fn list_scripts(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(target: "scripting", "Script directory does not exist: {}", dir.display());
            return Vec::new();
        }
        Err(e) => {
            warn!(
                target: "scripting",
                "Failed to read script directory {}: {}",
                dir.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut scripts: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some(SCRIPT_EXTENSION))
        .collect();
    scripts.sort();
    scripts
}

/// Every enabled, readable script in `dir`. Scripts that fail to read or
/// name no known contract are logged and skipped.
pub fn discover_scripts(dir: &Path, config: &ScriptingConfig) -> Vec<ScriptFile> {
    let mut found = Vec::new();
    for path in list_scripts(dir) {
        let script = match ScriptFile::read(&path) {
            Ok(script) => script,
            Err(e) => {
                warn!(target: "scripting", "Skipping script: {}", e);
                continue;
            }
        };
        if !config.is_script_enabled(&script.id) {
            info!(
                target: "scripting",
                "Skipping disabled script: {} from {}",
                script.id,
                path.display()
            );
            continue;
        }
        found.push(script);
    }
    found
}

/// Contract named by a `--! contract: <id>` first line.
pub fn contract_directive(source: &str) -> Option<&str> {
    let line = source.lines().next()?.trim();
    let rest = line.strip_prefix(DIRECTIVE_PREFIX)?.trim_start();
    let id = rest.strip_prefix("contract")?.trim_start().strip_prefix(':')?.trim();
    (!id.is_empty()).then_some(id)
}

/// Split `intro.room` into `("intro", Some("room"))`. Suffixes that are not
/// contract ids stay part of the id.
pub fn split_contract_suffix(stem: &str) -> (&str, Option<&str>) {
    match stem.rsplit_once('.') {
        Some((id, suffix)) if !id.is_empty() && contracts::ids().contains(&suffix) => {
            (id, Some(suffix))
        }
        _ => (stem, None),
    }
}
