//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSEARCH_CONFIG` (environment variable)
//! 2. `~/.config/mailsearch/config.toml` (Linux)
//!    `~/Library/Application Support/mailsearch/config.toml` (macOS)
//!    `%APPDATA%\mailsearch\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::index::CompactionPolicy;
use crate::search::executor::DEFAULT_WINDOW;

/// Agent home used when none is configured, relative to the user's home.
pub const DEFAULT_AGENT_HOME_DIR: &str = ".leap";

/// Directory under the agent home holding the index.
pub const DEFAULT_INDEX_DIR_NAME: &str = "search_index";

/// Name of the mail index inside the index directory.
pub const DEFAULT_INDEX_NAME: &str = "mails";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Index location and key.
    pub index: IndexConfig,
    /// Search defaults.
    pub search: SearchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Mail agent home directory (default: `~/.leap`).
    pub agent_home: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Index location and key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory name under the agent home.
    pub index_dir_name: String,
    /// Index name; the encrypted file is `<index_name>.idx`.
    pub index_name: String,
    /// Master key file for the CLI (default: `<config_dir>/mailsearch/index.key`).
    pub key_file: Option<PathBuf>,
    /// Fold the commit log into the base after this many commits.
    pub compact_max_log_entries: usize,
    /// Fold the commit log once it holds this many bytes and at least as
    /// many as the base.
    pub compact_min_log_bytes: usize,
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when a search gives none.
    pub default_window: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            agent_home: None,
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir_name: DEFAULT_INDEX_DIR_NAME.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            key_file: None,
            compact_max_log_entries: CompactionPolicy::default().max_log_entries,
            compact_min_log_bytes: CompactionPolicy::default().min_log_bytes,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_window: DEFAULT_WINDOW,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILSEARCH_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailsearch").join("config.toml"))
}

/// `~/.leap`, or `./.leap` when the home directory is unknown.
pub fn default_agent_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_AGENT_HOME_DIR)
}

/// The configured agent home, or [`default_agent_home`].
pub fn agent_home(config: &Config) -> PathBuf {
    config
        .general
        .agent_home
        .clone()
        .unwrap_or_else(default_agent_home)
}

/// Directory holding the encrypted index.
pub fn index_dir(config: &Config) -> PathBuf {
    agent_home(config).join(&config.index.index_dir_name)
}

/// Commit-log compaction thresholds. Zero entries is read as one.
pub fn compaction_policy(config: &Config) -> CompactionPolicy {
    CompactionPolicy {
        max_log_entries: config.index.compact_max_log_entries.max(1),
        min_log_bytes: config.index.compact_min_log_bytes,
    }
}

/// The master key file used by the CLI.
///
/// Defaults to the user's config directory so the key does not sit next to
/// the index it unlocks. Without a config directory it falls back to the
/// agent home.
pub fn key_file_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.index.key_file {
        return path.clone();
    }
    dirs::config_dir()
        .map(|d| d.join("mailsearch").join("index.key"))
        .unwrap_or_else(|| agent_home(config).join("index.key"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsearch")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailsearch.log")
}
