//! CallDesk configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::allocator::DEFAULT_CANDIDATE_CAP;
use crate::bulk::DEFAULT_MAX_IDS;

/// Main CallDesk configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Allocator limits
    pub allocation: AllocationConfig,

    /// Listing pagination
    pub listing: ListingConfig,

    /// Bulk operation limits
    pub bulk: BulkConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .calldesk.yml
        let local_config = PathBuf::from(".calldesk.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/calldesk/calldesk.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("calldesk").join("calldesk.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load later reports them.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".calldesk.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("calldesk").join("calldesk.yml"));
                }
                paths
            }
        };
        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the task store database
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("calldesk"),
        }
    }
}

/// Allocator limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Most candidates a single allocation considers
    #[serde(rename = "candidate-cap")]
    pub candidate_cap: usize,

    /// Language values meaning "every language"
    #[serde(rename = "all-languages-tokens")]
    pub all_languages_tokens: Vec<String>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            candidate_cap: DEFAULT_CANDIDATE_CAP,
            all_languages_tokens: vec!["all".to_string(), "__all__".to_string()],
        }
    }
}

/// Listing pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    #[serde(rename = "default-limit")]
    pub default_limit: usize,

    #[serde(rename = "max-limit")]
    pub max_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// Bulk operation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    #[serde(rename = "max-ids")]
    pub max_ids: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_ids: DEFAULT_MAX_IDS,
        }
    }
}
