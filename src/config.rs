//! Configuration management for regeneration runs
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (regen.toml)
//! - Environment variables (REGEN__*)
//!
//! ## Example config file (regen.toml):
//! ```toml
//! [build_state]
//! path = ".regen/build-state.json"
//! enabled = true
//!
//! [codemod]
//! roots = ["src", "app"]
//! extensions = ["ts", "tsx"]
//! remove_unused = true
//! dry_run = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for regeneration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegenConfig {
    /// Build state persistence
    #[serde(default)]
    pub build_state: BuildStateConfig,

    /// Consumer code rewriting
    #[serde(default)]
    pub codemod: CodemodConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStateConfig {
    /// Where the previous run's state is read from and the new one written
    #[serde(default = "default_state_path")]
    pub path: PathBuf,

    /// Read the previous state and rewrite consumer code
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodemodConfig {
    /// Directories walked for consumer sources
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,

    /// File extensions treated as consumer sources
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Delete generated declarations nothing references
    #[serde(default = "default_true")]
    pub remove_unused: bool,

    /// Report changes without writing files or state
    #[serde(default)]
    pub dry_run: bool,
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".regen/build-state.json")
}

fn default_true() -> bool {
    true
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

fn default_extensions() -> Vec<String> {
    ["ts", "tsx", "js", "jsx", "mts", "cts"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for BuildStateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            enabled: true,
        }
    }
}

impl Default for CodemodConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            extensions: default_extensions(),
            remove_unused: true,
            dry_run: false,
        }
    }
}

impl RegenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["regen.toml", ".regen.toml", "config/regen.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "schema-regen", "schema-regen") {
            let user_config = dirs.config_dir().join("regen.toml");
            if user_config.exists() {
                builder = builder.add_source(File::from(user_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // REGEN__CODEMOD__DRY_RUN=true
        builder = builder.add_source(
            Environment::with_prefix("REGEN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Build state path, resolved against `base` when relative
    pub fn state_path(&self, base: &Path) -> PathBuf {
        if self.build_state.path.is_absolute() {
            self.build_state.path.clone()
        } else {
            base.join(&self.build_state.path)
        }
    }
}
