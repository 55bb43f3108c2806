//! Process-wide storage configuration and its per-writer snapshot.
//!
//! Three settings shape every writer: the compression algorithm, the target
//! rows per stripe, and the target rows per block. They are read from
//! [`StorageConfig`] exactly once, at writer creation, and frozen into an
//! immutable [`StorageOptions`] for the writer's lifetime. Changing the
//! config mid-statement never affects an open writer.

use serde::{Deserialize, Serialize};
use strata_error::{Result, StrataError};

/// Compression applied to column blocks by the columnar engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    /// No compression.
    #[default]
    None,
    /// PGLZ block compression.
    Pglz,
}

/// Default target rows per stripe.
pub const DEFAULT_STRIPE_ROW_COUNT: u64 = 150_000;

/// Default target rows per block.
pub const DEFAULT_BLOCK_ROW_COUNT: u64 = 10_000;

/// Process-wide storage settings, read at writer-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Compression algorithm for new blocks.
    pub compression: CompressionKind,
    /// Target rows per stripe.
    pub stripe_row_count: u64,
    /// Target rows per block.
    pub block_row_count: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compression: CompressionKind::None,
            stripe_row_count: DEFAULT_STRIPE_ROW_COUNT,
            block_row_count: DEFAULT_BLOCK_ROW_COUNT,
        }
    }
}

impl StorageConfig {
    /// Validate the settings.
    ///
    /// Row counts must be non-zero and a stripe must hold at least one block.
    pub fn validate(&self) -> Result<()> {
        if self.stripe_row_count == 0 || self.block_row_count == 0 {
            return Err(StrataError::internal(
                "stripe_row_count and block_row_count must be non-zero",
            ));
        }
        if self.block_row_count > self.stripe_row_count {
            return Err(StrataError::internal(format!(
                "block_row_count {} exceeds stripe_row_count {}",
                self.block_row_count, self.stripe_row_count
            )));
        }
        Ok(())
    }
}

/// Immutable snapshot of [`StorageConfig`] bound to one writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptions {
    /// Compression algorithm.
    pub compression: CompressionKind,
    /// Target rows per stripe.
    pub stripe_row_count: u64,
    /// Target rows per block.
    pub block_row_count: u64,
}

impl StorageOptions {
    /// Snapshot the current process configuration.
    pub fn snapshot(config: &StorageConfig) -> Self {
        Self {
            compression: config.compression,
            stripe_row_count: config.stripe_row_count,
            block_row_count: config.block_row_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = StorageConfig::default();
        assert_eq!(config.compression, CompressionKind::None);
        assert_eq!(config.stripe_row_count, 150_000);
        assert_eq!(config.block_row_count, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_row_counts_are_rejected() {
        let config = StorageConfig {
            block_row_count: 0,
            ..StorageConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn block_larger_than_stripe_is_rejected() {
        let config = StorageConfig {
            stripe_row_count: 100,
            block_row_count: 200,
            ..StorageConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn snapshot_is_decoupled_from_config() {
        let mut config = StorageConfig::default();
        let opts = StorageOptions::snapshot(&config);
        config.block_row_count = 500;
        assert_eq!(opts.block_row_count, 10_000);
    }
}
