//! Centralized configuration for maketorrent.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use crate::MakeTorrentError;
use crate::torrent::PieceLength;

/// Central configuration for all maketorrent components.
#[derive(Debug, Clone, Default)]
pub struct MakeTorrentConfig {
    pub creation: CreationConfig,
    pub hashing: HashingConfig,
}

/// Metadata defaults and limits for new torrents.
#[derive(Debug, Clone)]
pub struct CreationConfig {
    /// Smallest accepted piece length exponent (64 KiB)
    pub min_piece_exponent: u32,
    /// Largest accepted piece length exponent (32 MiB)
    pub max_piece_exponent: u32,
    /// Piece length exponent used when none is given (256 KiB)
    pub default_piece_exponent: u32,
    /// Producer identification written to `created by`
    pub created_by: String,
    /// Value of the `encoding` field
    pub encoding: &'static str,
}

impl Default for CreationConfig {
    fn default() -> Self {
        Self {
            min_piece_exponent: 16,
            max_piece_exponent: 25,
            default_piece_exponent: 18,
            created_by: format!("maketorrent v{}", env!("CARGO_PKG_VERSION")),
            encoding: "UTF-8",
        }
    }
}

impl CreationConfig {
    /// Validates `exponent` against the configured range and builds the length.
    ///
    /// # Errors
    /// - `MakeTorrentError::Configuration` - Exponent outside the accepted range
    pub fn piece_length(&self, exponent: u32) -> Result<PieceLength, MakeTorrentError> {
        if !(self.min_piece_exponent..=self.max_piece_exponent).contains(&exponent) {
            return Err(MakeTorrentError::Configuration {
                reason: format!(
                    "piece length must be between {} ({} KiB) and {} ({} MiB), got {}",
                    self.min_piece_exponent,
                    (1u64 << self.min_piece_exponent) / 1024,
                    self.max_piece_exponent,
                    (1u64 << self.max_piece_exponent) / (1024 * 1024),
                    exponent
                ),
            });
        }
        Ok(PieceLength::from_exponent(exponent)?)
    }
}

/// Hash worker pool sizing.
#[derive(Debug, Clone)]
pub struct HashingConfig {
    /// Number of concurrent hashing workers
    pub worker_count: usize,
    /// Pieces allowed to wait for a free worker
    pub queue_capacity: usize,
}

impl Default for HashingConfig {
    fn default() -> Self {
        let worker_count = num_cpus::get().max(1);
        Self {
            worker_count,
            queue_capacity: worker_count * 2,
        }
    }
}

impl HashingConfig {
    /// Uses `worker_count` workers and scales the queue with them.
    pub fn with_workers(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            worker_count,
            queue_capacity: worker_count * 2,
        }
    }
}

impl MakeTorrentConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(workers) = std::env::var("MAKETORRENT_HASH_WORKERS")
            && let Ok(count) = workers.parse::<usize>()
            && count > 0
        {
            config.hashing = HashingConfig::with_workers(count);
        }

        if let Ok(capacity) = std::env::var("MAKETORRENT_QUEUE_CAPACITY")
            && let Ok(count) = capacity.parse::<usize>()
            && count > 0
        {
            config.hashing.queue_capacity = count;
        }

        config
    }
}
