//! Application path management for portable and installed modes.
//!
//! Mapping files live in the working directory unless `--config-dir` says
//! otherwise. Log files go next to the executable in portable mode and to
//! the platform data directory (`<data_dir>/hidmidi/logs`) otherwise.
//!
//! ## Mode Detection
//!
//! - **Portable mode**: a `.portable` marker file next to the executable.
//! - **Installed mode** (default): everything else.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "hidmidi";

/// Marker file enabling portable mode
const PORTABLE_MARKER: &str = ".portable";

/// Application paths for mapping files and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Directory scanned for `*.hidmidi.json` files
    pub config_dir: PathBuf,
    /// Directory receiving rolling log files
    pub logs_dir: PathBuf,
    /// Whether running in portable mode (logs next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the paths for this process.
    ///
    /// Called before logging is initialized; nothing is logged here.
    pub fn detect(config_dir: Option<PathBuf>) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self::resolve(&exe_dir, &cwd, dirs::data_dir(), config_dir)
    }

    /// Resolve paths from explicit inputs
    pub fn resolve(
        exe_dir: &Path,
        cwd: &Path,
        data_dir: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> Self {
        let config_dir = config_dir.unwrap_or_else(|| cwd.to_path_buf());

        if exe_dir.join(PORTABLE_MARKER).exists() {
            Self {
                config_dir,
                logs_dir: exe_dir.join("logs"),
                is_portable: true,
            }
        } else {
            let app_data = data_dir.unwrap_or_else(|| exe_dir.to_path_buf()).join(APP_NAME);
            Self {
                config_dir,
                logs_dir: app_data.join("logs"),
                is_portable: false,
            }
        }
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.config_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Full path of a mapping file named `name` in the config directory
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir.join(crate::config::with_config_extension(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_installed_mode_uses_data_dir_for_logs() {
        let exe = TempDir::new().unwrap();
        let cwd = PathBuf::from("/work");
        let paths = AppPaths::resolve(exe.path(), &cwd, Some(PathBuf::from("/data")), None);

        assert!(!paths.is_portable);
        assert_eq!(paths.config_dir, cwd);
        assert_eq!(paths.logs_dir, PathBuf::from("/data/hidmidi/logs"));
    }

    #[test]
    fn test_portable_marker_keeps_logs_next_to_exe() {
        let exe = TempDir::new().unwrap();
        std::fs::write(exe.path().join(".portable"), "").unwrap();

        let paths = AppPaths::resolve(
            exe.path(),
            Path::new("/work"),
            Some(PathBuf::from("/data")),
            Some(PathBuf::from("/maps")),
        );

        assert!(paths.is_portable);
        assert_eq!(paths.logs_dir, exe.path().join("logs"));
        assert_eq!(paths.config_dir, PathBuf::from("/maps"));
        assert_eq!(paths.config_file("stick"), PathBuf::from("/maps/stick.hidmidi.json"));
    }

    #[test]
    fn test_ensure_directories_creates_missing() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths {
            config_dir: root.path().join("maps"),
            logs_dir: root.path().join("data/logs"),
            is_portable: false,
        };

        paths.ensure_directories().unwrap();
        assert!(paths.config_dir.is_dir());
        assert!(paths.logs_dir.is_dir());
    }
}
