//! Runtime settings for the layout tool
//!
//! Stored as JSON in `<config_dir>/winsys-layout/settings.json`. Environment
//! variables override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::constants::config::{APP_DIR, DEFAULT_MODULE_ROOT, FILENAME, LOCAL_ROOT_DIR};
use crate::constants::window_manager::DEFAULT_NAME;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Read-only layer shipped with the installed modules
    #[serde(default = "default_module_root")]
    pub module_root: PathBuf,

    /// Writable per-user layer
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Stem of the window-manager file in both layers
    #[serde(default = "default_window_manager_name")]
    pub window_manager_name: String,

    /// Optional `{"extensions": [...]}` file; every module counts as enabled without it
    #[serde(default)]
    pub extensions_file: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_module_root() -> PathBuf {
    PathBuf::from(DEFAULT_MODULE_ROOT)
}

fn default_local_root() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push(LOCAL_ROOT_DIR);
    path
}

fn default_window_manager_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            module_root: default_module_root(),
            local_root: default_local_root(),
            window_manager_name: default_window_manager_name(),
            extensions_file: None,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let mut settings = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<Settings>(&contents)
                .with_context(|| format!("Failed to parse settings file: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No settings file found, using defaults");
                Settings::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read settings file: {}", path.display()));
            }
        };
        settings.apply_env_overrides();
        settings.validate_and_clamp();
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;
        fs::write(path, contents).context(format!("Failed to write settings file to {}", path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = env::var("WINSYS_MODULE_ROOT") {
            self.module_root = PathBuf::from(root);
        }
        if let Ok(root) = env::var("WINSYS_LOCAL_ROOT") {
            self.local_root = PathBuf::from(root);
        }
        if let Ok(name) = env::var("WINSYS_WM_NAME") {
            self.window_manager_name = name;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Repair values that would make the layout unreadable.
    fn validate_and_clamp(&mut self) {
        if self.window_manager_name.trim().is_empty() {
            warn!(window_manager_name = %self.window_manager_name, "Empty window manager name, using default");
            self.window_manager_name = default_window_manager_name();
        }
        if self.window_manager_name.contains(['/', '\\']) {
            warn!(window_manager_name = %self.window_manager_name, "Window manager name contains a path separator, using default");
            self.window_manager_name = default_window_manager_name();
        }

        let level = self.log_level.to_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            self.log_level = level;
        } else {
            warn!(log_level = %self.log_level, "Unknown log level, using info");
            self.log_level = default_log_level();
        }

        if self.module_root == self.local_root {
            warn!(root = %self.local_root.display(), "Module and local layers share one root");
        }
    }
}
