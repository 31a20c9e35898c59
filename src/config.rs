//! Configuration management for numbreacher
//!
//! Configuration is loaded from `./config/numbreacher.toml`. When that file does
//! not exist the embedded template is used, so the binary works out of the box.
//! Command-line flags override individual values after loading.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/numbreacher.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/numbreacher.toml");

/// Inclusive bounds for the configured worker count
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 64;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Unknown engine '{name}'. Available: {available}")]
    UnknownEngine { name: String, available: String },

    #[error("Worker count {value} is out of range (expected {min}-{max})")]
    WorkersOutOfRange { value: usize, min: usize, max: usize },

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub owner_lookup: OwnerLookupConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

/// Dispatcher selection
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// One of "threading", "parallel", "async"
    pub name: String,
    /// Upper bound on concurrently executing tasks
    pub max_workers: usize,
}

/// Owner-name lookup settings.
///
/// Serializable because isolated worker processes receive a copy of it and
/// rebuild their own resolver from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerLookupConfig {
    /// Whether scans resolve owner names by default
    pub enabled: bool,
    /// HTML search endpoint; queries are appended as `?q=...`
    pub search_url: String,
    /// Per-query fetch timeout
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Result titles inspected per query
    #[serde(default = "default_max_titles")]
    pub max_titles_per_query: usize,
}

fn default_max_titles() -> usize {
    10
}

impl Default for OwnerLookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_url: "https://duckduckgo.com/html/".to_string(),
            timeout_secs: 4,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string(),
            max_titles_per_query: default_max_titles(),
        }
    }
}

/// Bulk input handling
#[derive(Debug, Clone, Deserialize)]
pub struct BulkConfig {
    /// Drop repeated numbers (first occurrence wins) before dispatch
    #[serde(default = "default_dedupe")]
    pub dedupe: bool,
}

fn default_dedupe() -> bool {
    true
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { dedupe: default_dedupe() }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load from the default path, falling back to the embedded template
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::load() {
            Err(ConfigError::FileNotFound(_)) => Self::embedded(),
            other => other,
        }
    }

    /// Parse the embedded default configuration
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::engine::EngineKind::parse(&self.engine.name)?;
        validate_workers(self.engine.max_workers)?;
        self.owner_lookup.validate()
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG)?;
        Ok(path.to_path_buf())
    }
}

impl OwnerLookupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.search_url).is_err() {
            return Err(ConfigError::InvalidUrl {
                field: "owner_lookup.search_url".to_string(),
                url: self.search_url.clone(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "owner_lookup.timeout_secs".to_string(),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "owner_lookup.user_agent".to_string(),
            });
        }
        if self.max_titles_per_query == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "owner_lookup.max_titles_per_query".to_string(),
            });
        }
        Ok(())
    }
}

/// Reject worker counts outside the supported range
pub fn validate_workers(value: usize) -> Result<usize, ConfigError> {
    if (MIN_WORKERS..=MAX_WORKERS).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::WorkersOutOfRange {
            value,
            min: MIN_WORKERS,
            max: MAX_WORKERS,
        })
    }
}
