//! Configuration primitives for ReviewBase workspaces.
//!
//! Stored in a TOML file at `<workspace root>/config/config.toml`. The root is
//! `REVIEWBASE_HOME` when set, otherwise the OS data directory:
//!   %APPDATA%/ReviewBase on Windows
//!   $XDG_DATA_HOME/ReviewBase on Linux
//!   ~/Library/Application Support/ReviewBase on macOS
//!
//! The config tracks the last active review and per-install screening,
//! enrichment and deduplication preferences.

use serde::{Deserialize, Serialize};

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Slug of the review that was active when the tool last ran.
    pub last_active_review: Option<String>,
    #[serde(default)]
    pub screening: ScreeningSettings,
    #[serde(default)]
    pub enrichment: EnrichmentSettings,
    #[serde(default)]
    pub dedup: DedupSettings,
}

/// Screening loop defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningSettings {
    /// Number of decisions between progress log lines.
    #[serde(default = "default_progress_every")]
    pub progress_every: u32,
    /// Consecutive failed commits tolerated for one record before the session ends.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,
    /// File name of the decision store inside the review directory.
    #[serde(default = "default_decisions_file")]
    pub decisions_file: String,
}

impl Default for ScreeningSettings {
    fn default() -> Self {
        Self {
            progress_every: default_progress_every(),
            max_commit_attempts: default_max_commit_attempts(),
            decisions_file: default_decisions_file(),
        }
    }
}

const fn default_progress_every() -> u32 {
    10
}

const fn default_max_commit_attempts() -> u32 {
    3
}

fn default_decisions_file() -> String {
    "decisions.csv".into()
}

/// Remote abstract lookup preferences. Off unless enabled here or per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Contact address sent to Crossref for the polite pool.
    #[serde(default)]
    pub mailto: Option<String>,
    #[serde(default = "default_min_abstract_chars")]
    pub min_abstract_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            mailto: None,
            min_abstract_chars: default_min_abstract_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.crossref.org".into()
}

const fn default_min_abstract_chars() -> usize {
    crate::enrichment::DEFAULT_MIN_ABSTRACT_CHARS
}

const fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSettings {
    /// Jaro-Winkler similarity under which titles sharing a DOI are flagged.
    #[serde(default = "default_title_conflict_threshold")]
    pub title_conflict_threshold: f64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            title_conflict_threshold: default_title_conflict_threshold(),
        }
    }
}

const fn default_title_conflict_threshold() -> f64 {
    crate::ingestion::dedup::DEFAULT_TITLE_CONFLICT_THRESHOLD
}

pub const CONFIG_FILE_NAME: &str = "config.toml";

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the root directory where ReviewBase stores data.
///
/// Order of precedence:
/// 1. `REVIEWBASE_HOME` environment variable.
/// 2. OS-specific data directory via `directories::BaseDirs`.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(path) = env::var("REVIEWBASE_HOME") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS data directory")?;
    Ok(base_dirs.data_dir().join("ReviewBase"))
}

/// Loads the configuration from disk or returns defaults.
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(AppConfig::default())
    }
}

/// Persists the configuration to disk.
pub fn save(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let data = toml::to_string_pretty(config)?;
    fs::write(path, data).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}

/// Ensures the workspace structure exists (config/ and reviews/ directories).
pub fn ensure_workspace_structure(root: &Path) -> Result<WorkspacePaths> {
    let paths = WorkspacePaths::at(root);
    fs::create_dir_all(&paths.config_dir)?;
    fs::create_dir_all(&paths.reviews_dir)?;
    Ok(paths)
}

/// Convenience struct exposing important workspace paths.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub reviews_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            config_dir: root.join("config"),
            reviews_dir: root.join("reviews"),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn review_dir(&self, slug: &str) -> PathBuf {
        self.reviews_dir.join(slug)
    }
}
