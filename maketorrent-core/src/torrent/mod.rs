//! BitTorrent metainfo creation: enumeration, segmentation, hashing, assembly

pub mod creation;
pub mod encoding;
pub mod enumeration;
pub mod hashing;
pub mod metainfo;
pub mod observer;
pub mod parsing;
pub mod stream;

use std::fmt;
use std::path::PathBuf;

pub use creation::{CreationOptions, TorrentCreator};
pub use encoding::{encode_info, encode_metainfo};
pub use enumeration::{EnumeratedFiles, enumerate_files, target_name};
pub use hashing::{HashScheduler, PieceDigest, hash_piece};
pub use metainfo::{
    FileEntry, FileLayout, FileSlice, MetainfoAssembler, MetainfoSummary, PieceLength,
    TorrentMetainfo,
};
pub use observer::{CreationObserver, SilentObserver, TracingObserver};
pub use parsing::{MetainfoParser, ParsedTorrent};
pub use stream::{ChainedFileReader, Piece, PieceSegmenter};

/// Length in bytes of a SHA-1 piece digest.
pub const PIECE_HASH_LEN: usize = 20;

/// SHA-1 digest of one piece's raw bytes.
pub type PieceHash = [u8; PIECE_HASH_LEN];

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the bencoded info dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Zero-based index of a piece within a torrent.
///
/// Indices are assigned in stream order, so a piece's index is also its
/// position in the final hash list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceIndex(pub u32);

impl PieceIndex {
    /// Creates PieceIndex from zero-based index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying piece index as u32.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the index as a table position.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while creating or reading torrent metainfo.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("Invalid piece length: {reason}")]
    InvalidPieceLength { reason: String },

    #[error("Invalid creation options: {reason}")]
    InvalidOptions { reason: String },

    #[error("Target does not exist: {}", path.display())]
    TargetNotFound { path: PathBuf },

    #[error("Invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("File {} changed during hashing: expected {expected} bytes, found {actual}", path.display())]
    FileSizeChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Hash worker failed: {reason}")]
    HashWorkerFailed { reason: String },

    #[error("Metainfo invariant violated: {reason}")]
    MetainfoInvariant { reason: String },

    #[error("Failed to parse torrent file: {reason}")]
    InvalidTorrentFile { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_piece_index_ordering() {
        let piece1 = PieceIndex::new(5);
        let piece2 = PieceIndex::new(10);
        assert!(piece1 < piece2);
        assert_eq!(piece1.as_u32(), 5);
        assert_eq!(piece2.as_usize(), 10);
    }

    #[test]
    fn test_file_read_error_names_path() {
        let error = TorrentError::FileRead {
            path: PathBuf::from("data/a.bin"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(error.to_string().contains("data/a.bin"));
    }
}
