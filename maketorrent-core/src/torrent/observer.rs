//! Progress reporting hooks for torrent creation

use tracing::{debug, info};

use super::PieceIndex;
use super::metainfo::{FileEntry, TorrentMetainfo};

/// Receives progress notifications from the creation pipeline.
///
/// All methods default to doing nothing, so implementors only override the
/// events they care about. Calls may come from the collector while the
/// segmenter is still reading.
pub trait CreationObserver: Send + Sync {
    /// Called once after enumeration with the files in stream order.
    fn files_enumerated(&self, _files: &[FileEntry], _total_length: u64, _piece_count: u64) {}

    /// Called for every collected piece hash; `completed` counts upward.
    fn piece_hashed(&self, _index: PieceIndex, _completed: usize, _total: usize) {}

    /// Called after the metainfo has been assembled.
    fn creation_finished(&self, _metainfo: &TorrentMetainfo) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl CreationObserver for SilentObserver {}

/// Observer that reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CreationObserver for TracingObserver {
    fn files_enumerated(&self, files: &[FileEntry], total_length: u64, piece_count: u64) {
        for file in files {
            info!("Adding {} ({} bytes)", file.display_path(), file.length);
        }
        info!(
            "{} bytes in {} files, {} pieces",
            total_length,
            files.len(),
            piece_count
        );
    }

    fn piece_hashed(&self, index: PieceIndex, completed: usize, total: usize) {
        debug!("Hashed piece {} ({} of {})", index, completed, total);
        if completed == total {
            info!("Hashed all {} pieces", total);
        }
    }

    fn creation_finished(&self, metainfo: &TorrentMetainfo) {
        info!(
            "Created metainfo '{}' with info hash {}",
            metainfo.name,
            metainfo.info_hash()
        );
    }
}
