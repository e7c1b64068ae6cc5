//! `tabmap.toml` configuration.
//!
//! Looked up at an explicit `--config` path or in the platform config
//! folder:
//! - macOS: ~/Library/Application Support/com.tabmap.tabmap/
//! - Windows: %APPDATA%/tabmap/tabmap/config/
//! - Linux: ~/.config/tabmap/

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tabmap_session::SessionConfig;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "tabmap";
const APP_NAME: &str = "tabmap";
const CONFIG_FILENAME: &str = "tabmap.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where drafts and committed mappings live.
    pub state_dir: Option<PathBuf>,
    /// JSON field schema used instead of the built-in one.
    pub schema: Option<PathBuf>,
    pub session: SessionConfig,
}

impl CliConfig {
    /// The configured state directory, else the platform data folder, else
    /// `.tabmap` in the working directory.
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .or_else(default_state_dir)
            .unwrap_or_else(|| PathBuf::from(".tabmap"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
}

/// Path of the config file in the platform config folder.
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

pub fn default_state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Loads the configuration from `explicit` or the default location.
///
/// Returns defaults if:
/// - the file doesn't exist
/// - the file cannot be parsed
/// - the platform-specific directory cannot be determined
pub fn load_config(explicit: Option<&Path>) -> CliConfig {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(config_path) else {
        tracing::warn!("could not determine config path, using defaults");
        return CliConfig::default();
    };

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to parse config: {e}, using defaults");
                CliConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            CliConfig::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read config: {e}, using defaults");
            CliConfig::default()
        }
    }
}
