//! Detects added, changed and removed scripts for hot reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::script_dir::list_scripts;

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub changed: Vec<PathBuf>,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl ScanResult {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty() || !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Polls a script directory, comparing modification times with the last scan.
pub struct ScriptScanner {
    script_dir: PathBuf,
    scan_interval: Duration,
    last_scan: Option<Instant>,
    known: HashMap<PathBuf, SystemTime>,
}

impl ScriptScanner {
    /// Files already present count as known, so the first scan reports only
    /// what changed since construction.
    pub fn new(script_dir: PathBuf, scan_interval: Duration) -> Self {
        let known = modification_times(&script_dir);
        Self {
            script_dir,
            scan_interval,
            last_scan: None,
            known,
        }
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn should_scan(&self, now: Instant) -> bool {
        match self.last_scan {
            Some(last) => now.saturating_duration_since(last) >= self.scan_interval,
            None => true,
        }
    }

    pub fn scan_changes(&mut self, now: Instant) -> ScanResult {
        self.last_scan = Some(now);
        let current = modification_times(&self.script_dir);
        let mut result = ScanResult::default();

        for (path, modified) in &current {
            match self.known.get(path) {
                Some(previous) if previous != modified => {
                    debug!(target: "scripting", "Script changed: {}", path.display());
                    result.changed.push(path.clone());
                }
                Some(_) => {}
                None => {
                    debug!(target: "scripting", "Script added: {}", path.display());
                    result.added.push(path.clone());
                }
            }
        }
        for path in self.known.keys() {
            if !current.contains_key(path) {
                debug!(target: "scripting", "Script removed: {}", path.display());
                result.removed.push(path.clone());
            }
        }

        self.known = current;
        result
    }

    pub fn known_scripts(&self) -> usize {
        self.known.len()
    }
}

fn modification_times(dir: &Path) -> HashMap<PathBuf, SystemTime> {
    let mut times = HashMap::new();
    for path in list_scripts(dir) {
        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => {
                times.insert(path, modified);
            }
            Err(e) => {
                warn!(
                    target: "scripting",
                    "Failed to read modification time for {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
    times
}
