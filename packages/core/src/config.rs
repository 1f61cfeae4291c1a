//! Tree engine configuration

use crate::models::ValidationError;
use serde::{Deserialize, Serialize};

/// Deepest depth accepted for `max_depth`
const MAX_SUPPORTED_DEPTH: usize = 64;

/// Environment variable overriding [`TreeConfig::max_depth`]
pub const MAX_DEPTH_ENV: &str = "MENUTREE_MAX_DEPTH";

/// Environment variable overriding [`TreeConfig::max_sort`]
pub const MAX_SORT_ENV: &str = "MENUTREE_MAX_SORT";

/// Structural limits enforced by `NodeService`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Deepest allowed node depth; top-level nodes have depth 0
    pub max_depth: usize,

    /// Largest allowed `sort` value (the smallest is 0)
    pub max_sort: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_sort: 9999,
        }
    }
}

impl TreeConfig {
    /// Defaults overlaid with `MENUTREE_MAX_DEPTH` and `MENUTREE_MAX_SORT`
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(MAX_DEPTH_ENV) {
            match raw.trim().parse() {
                Ok(value) => config.max_depth = value,
                Err(_) => tracing::warn!(var = MAX_DEPTH_ENV, value = %raw, "Ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(MAX_SORT_ENV) {
            match raw.trim().parse() {
                Ok(value) => config.max_sort = value,
                Err(_) => tracing::warn!(var = MAX_SORT_ENV, value = %raw, "Ignoring invalid value"),
            }
        }

        config
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_sort(mut self, max_sort: i64) -> Self {
        self.max_sort = max_sort;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_depth == 0 || self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ValidationError::InvalidConfig(format!(
                "max_depth must be between 1 and {}, got {}",
                MAX_SUPPORTED_DEPTH, self.max_depth
            )));
        }
        if self.max_sort < 0 {
            return Err(ValidationError::InvalidConfig(format!(
                "max_sort must not be negative, got {}",
                self.max_sort
            )));
        }
        Ok(())
    }
}
