//! Application configuration for curriculum imports.
//!
//! User config lives at `~/.curriculum/curriculum.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CurriculumError, Result};
use crate::types::{ContentType, DEFAULT_CLASS_DURATION_SECS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "curriculum.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".curriculum";

/// Default database file name inside the config directory.
const DATABASE_FILE_NAME: &str = "curriculum.db";

// ---------------------------------------------------------------------------
// Config structs (matching curriculum.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Outline parser settings.
    #[serde(default)]
    pub parser: ParserConfig,

    /// Reconciliation settings.
    #[serde(default)]
    pub import: ImportConfig,

    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[parser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Content type given to a Class with no `Content Type:` directive.
    #[serde(default = "default_content_type")]
    pub default_content_type: ContentType,

    /// Duration given to a Class with no `Duration:` directive.
    #[serde(default = "default_duration_secs")]
    pub default_duration_secs: u32,

    /// Reject malformed structure instead of dropping orphaned nodes.
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_content_type: default_content_type(),
            default_duration_secs: default_duration_secs(),
            strict: true,
        }
    }
}

fn default_content_type() -> ContentType {
    ContentType::Text
}
fn default_duration_secs() -> u32 {
    DEFAULT_CLASS_DURATION_SECS
}
fn default_true() -> bool {
    true
}

/// What happens to persisted nodes whose `order` no longer appears in the import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Leave them in place and report them.
    #[default]
    Keep,
    /// Delete them (and their subtrees).
    Prune,
}

/// `[import]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub orphans: OrphanPolicy,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to `~/.curriculum/curriculum.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime parser configuration, merged from config file + CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub default_content_type: ContentType,
    pub default_duration_secs: u32,
    pub strict: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ParseOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_content_type: config.parser.default_content_type,
            default_duration_secs: config.parser.default_duration_secs,
            strict: config.parser.strict,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.curriculum/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CurriculumError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.curriculum/curriculum.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: explicit config value, else the config directory default.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.storage.database_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(config_dir()?.join(DATABASE_FILE_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CurriculumError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CurriculumError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CurriculumError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CurriculumError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CurriculumError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
