use crate::core::{RepoError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When pending changes of a unit of work are written to the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushMode {
    /// Flush before every query and at commit.
    #[default]
    Auto,
    /// Flush only at commit or on an explicit `flush()`.
    Commit,
}

/// How nested projections obtain the associated entity's columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NestedFetch {
    /// The executor selects the associated columns in the same statement.
    #[default]
    Join,
    /// One secondary fetch per distinct associated key.
    Secondary,
}

/// Repository and unit-of-work configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Clear the identity map right after every bulk statement
    pub auto_clear_after_bulk: bool,

    /// Flush policy for the unit of work
    pub flush_mode: FlushMode,

    /// Fetch strategy for nested projections
    pub nested_fetch: NestedFetch,

    /// Largest page size a page request may ask for
    pub max_page_size: Option<u64>,

    /// How long a pessimistic lock request waits before failing
    pub lock_timeout_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            auto_clear_after_bulk: false,
            flush_mode: FlushMode::Auto,
            nested_fetch: NestedFetch::Join,
            max_page_size: None,
            lock_timeout_ms: 0,
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether bulk statements clear the identity map
    pub fn auto_clear_after_bulk(mut self, enabled: bool) -> Self {
        self.auto_clear_after_bulk = enabled;
        self
    }

    /// Set the flush mode
    pub fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.flush_mode = mode;
        self
    }

    /// Set the nested projection fetch strategy
    pub fn nested_fetch(mut self, strategy: NestedFetch) -> Self {
        self.nested_fetch = strategy;
        self
    }

    /// Set the maximum page size
    pub fn max_page_size(mut self, max: u64) -> Self {
        self.max_page_size = Some(max);
        self
    }

    /// Set the pessimistic lock timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn lock_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Parse from a JSON document; missing keys keep their defaults.
    ///
    /// ```ignore
    /// let config = RepositoryConfig::from_json(r#"{"auto_clear_after_bulk": true}"#)?;
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == Some(0) {
            return Err(RepoError::Configuration(
                "max_page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::default();
        assert!(!config.auto_clear_after_bulk);
        assert_eq!(config.flush_mode, FlushMode::Auto);
        assert_eq!(config.lock_timeout_duration(), Duration::ZERO);
    }

    #[test]
    fn test_builder() {
        let config = RepositoryConfig::new()
            .auto_clear_after_bulk(true)
            .nested_fetch(NestedFetch::Secondary)
            .lock_timeout(Duration::from_millis(250))
            .max_page_size(100);
        assert!(config.auto_clear_after_bulk);
        assert_eq!(config.nested_fetch, NestedFetch::Secondary);
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.max_page_size, Some(100));
    }

    #[test]
    fn test_from_json() {
        let config =
            RepositoryConfig::from_json(r#"{"auto_clear_after_bulk": true, "flush_mode": "Commit"}"#)
                .unwrap();
        assert!(config.auto_clear_after_bulk);
        assert_eq!(config.flush_mode, FlushMode::Commit);
        assert_eq!(config.nested_fetch, NestedFetch::Join);

        assert!(RepositoryConfig::from_json(r#"{"max_page_size": 0}"#).is_err());
    }
}
