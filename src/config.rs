//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treemerge/treemerge.toml`
//! 3. Local config: `<dir>/.treemerge.toml` (current directory by default)
//! 4. Environment variables: `TREEMERGE_*` prefix
//!
//! The CLI `--resolution` flag is applied on top by the caller.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, Map};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{BoundaryMatcher, DEFAULT_BOUNDARY_RESOLUTION};

/// Name of the local config file.
pub const LOCAL_CONFIG_FILE: &str = ".treemerge.toml";

/// Raw settings for intermediate parsing (Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub boundary_resolution: Option<u64>,
    pub validate_trees: Option<bool>,
    pub database: Option<PathBuf>,
}

/// Unified configuration for treemerge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Breakpoint tolerance in base pairs for tolerant event equality
    pub boundary_resolution: u64,
    /// Reject trees with overlapping siblings or repeated inherited events
    pub validate_trees: bool,
    /// Default tree database for `<db>#<id>`-less sources and `import`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            boundary_resolution: DEFAULT_BOUNDARY_RESOLUTION,
            validate_trees: true,
            database: None,
        }
    }
}

/// Get the XDG config directory for treemerge.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treemerge").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treemerge.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    /// Matcher implementing tolerant equality at the configured resolution.
    pub fn matcher(&self) -> BoundaryMatcher {
        BoundaryMatcher::new(self.boundary_resolution)
    }

    /// Expand `~`, `$VAR` and `${VAR}` in path-like fields.
    fn expand_paths(&mut self) {
        if let Some(db) = &self.database {
            self.database = Some(expand_path(db));
        }
    }

    /// Overlay values win where specified.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            boundary_resolution: overlay
                .boundary_resolution
                .unwrap_or(self.boundary_resolution),
            validate_trees: overlay.validate_trees.unwrap_or(self.validate_trees),
            database: overlay.database.clone().or_else(|| self.database.clone()),
        }
    }

    /// Load settings from the standard locations.
    ///
    /// `local_dir` is the directory searched for `.treemerge.toml`; None skips
    /// the local layer.
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let global = global_config_path();
        let local = local_dir.map(local_config_path);
        Self::load_from(global.as_deref(), local.as_deref())
    }

    /// Load settings from explicit config file locations.
    ///
    /// Missing files are skipped; unreadable or malformed files are errors.
    pub fn load_from(
        global_path: Option<&Path>,
        local_path: Option<&Path>,
    ) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        for path in [global_path, local_path].into_iter().flatten() {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        Ok(current)
    }

    /// Apply TREEMERGE_* environment variables as explicit overrides.
    fn apply_env_overrides(settings: Self) -> Result<Self, ApplicationError> {
        settings.with_env_overrides(None)
    }

    /// Apply TREEMERGE_* overrides from `vars`, or from the process
    /// environment when None.
    ///
    /// Unset keys keep the current value; values that do not parse are errors.
    pub fn with_env_overrides(
        mut self,
        vars: Option<Map<String, String>>,
    ) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("TREEMERGE")
                    .prefix_separator("_")
                    .separator("__")
                    .source(vars),
            )
            .build()
            .map_err(config_err)?;

        if let Some(val) = env_value::<u64>(&config, "boundary_resolution")? {
            self.boundary_resolution = val;
        }
        if let Some(val) = env_value::<bool>(&config, "validate_trees")? {
            self.validate_trees = val;
        }
        if let Some(val) = env_value::<String>(&config, "database")? {
            self.database = Some(PathBuf::from(val));
        }

        Ok(self)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        format!(
            r#"# treemerge configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/treemerge/treemerge.toml
#   Local:  ./.treemerge.toml
#   Env:    TREEMERGE_* environment variables
#   Flag:   --resolution on the command line

# Two breakpoints closer than this many base pairs are the same event
# boundary_resolution = {DEFAULT_BOUNDARY_RESOLUTION}

# Reject trees whose siblings share events or whose nodes repeat an inherited event
# validate_trees = true

# Default tree database
# database = "~/treemerge/trees.db"
"#
        )
    }
}

fn env_value<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>, ApplicationError> {
    match config.get::<T>(key) {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(ApplicationError::Config {
            message: format!("TREEMERGE_{}: {e}", key.to_uppercase()),
        }),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
