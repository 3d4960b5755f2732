//! Torrent creation from local files with piece splitting and hashing
//!
//! Enumerates the target, streams its files through the piece segmenter,
//! hashes pieces on a bounded worker pool and assembles the metainfo.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::enumeration::{EnumeratedFiles, enumerate_files};
use super::hashing::HashScheduler;
use super::metainfo::{MetainfoAssembler, PieceLength, TorrentMetainfo};
use super::observer::{CreationObserver, SilentObserver};
use super::stream::{ChainedFileReader, PieceSegmenter};
use super::{PieceHash, TorrentError};
use crate::config::{CreationConfig, HashingConfig, MakeTorrentConfig};

/// Scalar metadata for a new torrent.
#[derive(Debug, Clone)]
pub struct CreationOptions {
    /// Torrent name; defaults to the target's base name
    pub name: Option<String>,
    /// Tracker URLs, primary first
    pub announce_urls: Vec<String>,
    pub comment: Option<String>,
    pub private: bool,
    pub piece_length: PieceLength,
    pub created_by: String,
    pub encoding: String,
    /// Seconds since the Unix epoch; defaults to the current time
    pub creation_date: Option<i64>,
}

impl CreationOptions {
    /// Options with the configured producer string and encoding.
    pub fn new(
        announce_urls: Vec<String>,
        piece_length: PieceLength,
        config: &CreationConfig,
    ) -> Self {
        Self {
            name: None,
            announce_urls,
            comment: None,
            private: false,
            piece_length,
            created_by: config.created_by.clone(),
            encoding: config.encoding.to_string(),
            creation_date: None,
        }
    }

    /// Checks metadata before any file is touched.
    ///
    /// # Errors
    /// - `TorrentError::InvalidOptions` - No tracker, unparsable tracker URL,
    ///   or an empty or path-like name
    pub fn validate(&self) -> Result<(), TorrentError> {
        if self.announce_urls.is_empty() {
            return Err(TorrentError::InvalidOptions {
                reason: "at least one announce URL is required".to_string(),
            });
        }

        for announce_url in &self.announce_urls {
            url::Url::parse(announce_url).map_err(|e| TorrentError::InvalidOptions {
                reason: format!("invalid announce URL '{announce_url}': {e}"),
            })?;
        }

        if let Some(name) = &self.name
            && (name.is_empty() || name.contains('/'))
        {
            return Err(TorrentError::InvalidOptions {
                reason: format!("invalid torrent name '{name}'"),
            });
        }

        Ok(())
    }
}

/// Torrent creator for converting local files to torrent metainfo
pub struct TorrentCreator {
    hashing: HashingConfig,
    observer: Arc<dyn CreationObserver>,
}

impl Default for TorrentCreator {
    fn default() -> Self {
        Self::new(&MakeTorrentConfig::default())
    }
}

impl TorrentCreator {
    /// Creates a silent creator using the configured worker pool.
    pub fn new(config: &MakeTorrentConfig) -> Self {
        Self {
            hashing: config.hashing.clone(),
            observer: Arc::new(SilentObserver),
        }
    }

    /// Reports progress to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn CreationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Creates metainfo for a file or directory.
    ///
    /// Options are validated before any I/O. Directories always produce a
    /// multi-file torrent, even with a single file inside.
    ///
    /// # Errors
    /// - `TorrentError::InvalidOptions` - Options failed validation
    /// - `TorrentError::TargetNotFound` - Target does not exist
    /// - `TorrentError::FileRead` - A file could not be listed or read
    /// - `TorrentError::FileSizeChanged` - A file changed while hashing
    pub async fn create(
        &self,
        target: &Path,
        options: CreationOptions,
    ) -> Result<TorrentMetainfo, TorrentError> {
        options.validate()?;

        let files = enumerate_files(target).await?;
        let name = match options.name {
            Some(name) => name,
            None => files.default_name()?,
        };

        let piece_hashes = self.hash_pieces(&files, options.piece_length).await?;

        let metainfo = MetainfoAssembler {
            name,
            announce_urls: options.announce_urls,
            comment: options.comment,
            created_by: options.created_by,
            creation_date: options
                .creation_date
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            encoding: options.encoding,
            private: options.private,
            piece_length: options.piece_length,
            layout: files.layout(),
            files: files.into_entries(),
            piece_hashes,
        }
        .assemble()?;

        self.observer.creation_finished(&metainfo);
        Ok(metainfo)
    }

    /// Hashes the concatenated contents of `files` in pieces of `piece_length`.
    ///
    /// Reading stays sequential while hashing runs on the worker pool; the
    /// returned hashes are ordered by piece index.
    ///
    /// # Errors
    /// - `TorrentError::FileRead` - A file could not be opened or read
    /// - `TorrentError::FileSizeChanged` - A file changed since enumeration
    /// - `TorrentError::HashWorkerFailed` - A hash worker failed
    pub async fn hash_pieces(
        &self,
        files: &EnumeratedFiles,
        piece_length: PieceLength,
    ) -> Result<Vec<PieceHash>, TorrentError> {
        let total_length = files.total_length();
        let piece_count = piece_length.piece_count(total_length);
        self.observer.files_enumerated(files.entries(), total_length, piece_count);

        let expected_pieces =
            usize::try_from(piece_count).map_err(|_| TorrentError::InvalidPieceLength {
                reason: format!("{piece_count} pieces exceed addressable memory"),
            })?;
        if u32::try_from(piece_count).is_err() {
            return Err(TorrentError::InvalidPieceLength {
                reason: format!("{piece_count} pieces exceed the piece index range"),
            });
        }

        info!(
            "Hashing {} bytes as {} pieces of {} bytes with {} workers",
            total_length,
            piece_count,
            piece_length.bytes(),
            self.hashing.worker_count
        );

        let mut scheduler =
            HashScheduler::new(&self.hashing, expected_pieces, self.observer.clone());
        let mut segmenter =
            PieceSegmenter::new(ChainedFileReader::new(files.sources()), piece_length);

        while let Some(piece) = segmenter.next_piece().await? {
            scheduler.submit(piece).await?;
        }
        debug!("Segmented {} pieces", segmenter.pieces_emitted());

        scheduler.finish().await
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::torrent::hashing::hash_piece;
    use crate::torrent::metainfo::FileLayout;

    const TRACKER: &str = "http://tracker.example.com/announce";

    fn options(piece_bytes: u32) -> CreationOptions {
        let mut options = CreationOptions::new(
            vec![TRACKER.to_string()],
            PieceLength::from_bytes(piece_bytes).unwrap(),
            &CreationConfig::default(),
        );
        options.creation_date = Some(1_700_000_000);
        options
    }

    fn creator() -> TorrentCreator {
        TorrentCreator::new(&MakeTorrentConfig {
            hashing: HashingConfig::with_workers(4),
            ..MakeTorrentConfig::default()
        })
    }

    #[tokio::test]
    async fn test_create_torrent_from_small_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        let test_data = b"Hello, BitTorrent! This is test data for torrent creation.";
        fs::write(&path, test_data).unwrap();

        let metainfo = creator().create(&path, options(32)).await.unwrap();

        assert_eq!(metainfo.name, "hello.txt");
        assert_eq!(metainfo.layout, FileLayout::SingleFile);
        assert_eq!(metainfo.total_length(), test_data.len() as u64);
        assert_eq!(metainfo.announce, TRACKER);
        assert_eq!(
            metainfo.piece_hashes,
            vec![hash_piece(&test_data[..32]), hash_piece(&test_data[32..])]
        );
    }

    #[tokio::test]
    async fn test_directory_with_one_file_is_multi_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("only.bin"), [1u8; 5]).unwrap();

        let metainfo = creator().create(dir.path(), options(4)).await.unwrap();

        assert_eq!(metainfo.layout, FileLayout::MultiFile);
        assert_eq!(metainfo.files.len(), 1);
        assert_eq!(metainfo.piece_count(), 2);
    }

    #[tokio::test]
    async fn test_name_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, [0u8; 3]).unwrap();

        let mut opts = options(4);
        opts.name = Some("renamed".to_string());
        let metainfo = creator().create(&path, opts).await.unwrap();

        assert_eq!(metainfo.name, "renamed");
        assert_eq!(metainfo.files[0].path, vec!["data.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_io() {
        let mut opts = options(4);
        opts.announce_urls.clear();
        let result = creator()
            .create(Path::new("/nonexistent/target"), opts)
            .await;
        assert!(matches!(result, Err(TorrentError::InvalidOptions { .. })));

        let mut opts = options(4);
        opts.announce_urls = vec!["not a url".to_string()];
        assert!(opts.validate().is_err());

        let mut opts = options(4);
        opts.name = Some("a/b".to_string());
        assert!(opts.validate().is_err());
    }

    #[tokio::test]
    async fn test_nonexistent_target_error() {
        let result = creator()
            .create(Path::new("/nonexistent/file.txt"), options(4))
            .await;
        assert!(matches!(result, Err(TorrentError::TargetNotFound { .. })));
    }

    #[tokio::test]
    async fn test_creation_date_defaults_to_now() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a");
        fs::write(&path, b"x").unwrap();

        let mut opts = options(4);
        opts.creation_date = None;
        let before = chrono::Utc::now().timestamp();
        let metainfo = creator().create(&path, opts).await.unwrap();

        assert!(metainfo.creation_date >= before);
    }
}
