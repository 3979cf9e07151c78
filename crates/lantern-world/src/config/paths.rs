use std::path::PathBuf;

use directories::ProjectDirs;

/// Platform-specific config/data/cache locations.
///
/// On Linux these follow the XDG base directories (`~/.config/{name}`,
/// `~/.local/share/{name}`, `~/.cache/{name}`); macOS and Windows use their
/// native application directories.
pub struct ProjectPaths {
    dirs: ProjectDirs,
}

impl ProjectPaths {
    /// `None` when no home directory can be determined.
    pub fn new(name: &str) -> Option<Self> {
        ProjectDirs::from("", "", name).map(|dirs| ProjectPaths { dirs })
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dirs.config_dir().to_path_buf()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dirs.data_dir().to_path_buf()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dirs.cache_dir().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_contains_name() {
        if let Some(paths) = ProjectPaths::new("lantern") {
            let config_dir = paths.config_dir();
            assert!(config_dir.to_string_lossy().contains("lantern"));
        }
    }

    #[test]
    fn test_data_dir_contains_name() {
        if let Some(paths) = ProjectPaths::new("lantern") {
            let data_dir = paths.data_dir();
            assert!(data_dir.to_string_lossy().contains("lantern"));
        }
    }

    #[test]
    fn test_dirs_are_distinct_from_cache() {
        if let Some(paths) = ProjectPaths::new("lantern") {
            assert_ne!(paths.config_dir(), paths.cache_dir());
        }
    }
}
