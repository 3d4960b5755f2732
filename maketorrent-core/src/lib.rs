//! Maketorrent Core - BitTorrent metainfo creation
//!
//! This crate turns a file or directory tree into a BitTorrent v1 metainfo
//! descriptor: file enumeration, cross-file piece segmentation, parallel
//! piece hashing, metainfo assembly, bencode encoding and parsing.

pub mod config;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::MakeTorrentConfig;
pub use torrent::{
    CreationOptions, FileEntry, InfoHash, PieceLength, TorrentCreator, TorrentError,
    TorrentMetainfo,
};

/// Errors that can bubble up from any maketorrent subsystem.
#[derive(Debug, thiserror::Error)]
pub enum MakeTorrentError {
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl MakeTorrentError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            MakeTorrentError::Torrent(e) => match e {
                TorrentError::InvalidPieceLength { reason } => {
                    format!("Invalid piece length: {reason}")
                }
                TorrentError::InvalidOptions { reason } => reason.clone(),
                TorrentError::TargetNotFound { path } => {
                    format!("Target file or directory does not exist: {}", path.display())
                }
                TorrentError::FileRead { path, .. } => {
                    format!("Could not read {}", path.display())
                }
                TorrentError::FileSizeChanged { path, .. } => {
                    format!("{} was modified while hashing", path.display())
                }
                TorrentError::InvalidTorrentFile { reason } => {
                    format!("Invalid torrent file: {reason}")
                }
                _ => "Torrent creation failed".to_string(),
            },
            MakeTorrentError::Configuration { reason } => format!("Configuration error: {reason}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MakeTorrentError::Configuration { .. }
                | MakeTorrentError::Torrent(
                    TorrentError::InvalidPieceLength { .. }
                        | TorrentError::InvalidOptions { .. }
                        | TorrentError::TargetNotFound { .. }
                )
        )
    }
}
