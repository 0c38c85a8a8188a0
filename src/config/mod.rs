//! Configuration loading and management

use crate::core::query::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE, PageLimits};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Page size defaults and bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size used when the caller does not ask for one
    pub default_page_size: u64,

    /// Larger requested page sizes are clamped to this
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// Connection settings for the MongoDB backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string (e.g., "mongodb://localhost:27017")
    pub uri: String,

    /// Database holding the entity collections
    pub database: String,
}

/// Complete configuration for the repositories
///
/// # Example
/// ```yaml
/// pagination:
///   default_page_size: 20
///   max_page_size: 100
/// operation_timeout_ms: 5000
/// mongodb:
///   uri: mongodb://localhost:27017
///   database: shop
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub pagination: PaginationConfig,

    /// Deadline for operations whose context carries none; absent means unbounded
    pub operation_timeout_ms: Option<u64>,

    /// Only needed by the MongoDB backend
    pub mongodb: Option<MongoConfig>,
}

impl RepositoryConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings are usable together
    pub fn validate(&self) -> Result<()> {
        let pagination = &self.pagination;
        if pagination.default_page_size == 0 {
            bail!("pagination.default_page_size must be at least 1");
        }
        if pagination.max_page_size < pagination.default_page_size {
            bail!(
                "pagination.max_page_size ({}) is below default_page_size ({})",
                pagination.max_page_size,
                pagination.default_page_size
            );
        }
        if self.operation_timeout_ms == Some(0) {
            bail!("operation_timeout_ms must be positive when set");
        }
        if let Some(mongo) = &self.mongodb {
            if mongo.uri.trim().is_empty() {
                bail!("mongodb.uri must not be empty");
            }
            if mongo.database.trim().is_empty() {
                bail!("mongodb.database must not be empty");
            }
        }
        Ok(())
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.pagination.default_page_size,
            max_page_size: self.pagination.max_page_size,
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}
