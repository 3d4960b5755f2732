//! Metainfo data model and assembly
//!
//! `TorrentMetainfo` is the in-memory descriptor handed to the encoder. It is
//! only built through `MetainfoAssembler`, which checks that the piece hash
//! list matches the file list and piece length.

use serde::Serialize;

use super::{InfoHash, PieceHash, PieceIndex, TorrentError, encoding};

/// Power-of-two piece length in bytes, fixed for a whole torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PieceLength(u32);

impl PieceLength {
    /// Largest supported exponent (2 GiB pieces).
    pub const MAX_EXPONENT: u32 = 31;

    /// Creates a piece length of `2^exponent` bytes.
    ///
    /// # Errors
    /// - `TorrentError::InvalidPieceLength` - Exponent above `MAX_EXPONENT`
    pub fn from_exponent(exponent: u32) -> Result<Self, TorrentError> {
        if exponent > Self::MAX_EXPONENT {
            return Err(TorrentError::InvalidPieceLength {
                reason: format!(
                    "exponent {exponent} exceeds maximum of {}",
                    Self::MAX_EXPONENT
                ),
            });
        }
        Ok(Self(1u32 << exponent))
    }

    /// Creates a piece length from a byte count.
    ///
    /// # Errors
    /// - `TorrentError::InvalidPieceLength` - Zero or not a power of two
    pub fn from_bytes(bytes: u32) -> Result<Self, TorrentError> {
        if !bytes.is_power_of_two() {
            return Err(TorrentError::InvalidPieceLength {
                reason: format!("{bytes} is not a power of two"),
            });
        }
        Ok(Self(bytes))
    }

    pub fn bytes(self) -> u32 {
        self.0
    }

    pub fn as_u64(self) -> u64 {
        u64::from(self.0)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns `n` such that the piece length is `2^n`.
    pub fn exponent(self) -> u32 {
        self.0.trailing_zeros()
    }

    /// Number of pieces needed to cover `total_length` bytes.
    pub fn piece_count(self, total_length: u64) -> u64 {
        total_length.div_ceil(self.as_u64())
    }
}

/// A file inside the torrent, relative to the torrent root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path components relative to the root; the base name for single files
    pub path: Vec<String>,
    pub length: u64,
}

impl FileEntry {
    pub fn new(path: Vec<String>, length: u64) -> Self {
        Self { path, length }
    }

    /// Path joined with `/`, as shown to users.
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

/// Whether the info dictionary carries a single `length` or a `files` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileLayout {
    SingleFile,
    MultiFile,
}

/// Part of a piece that lives in one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSlice {
    pub file_index: usize,
    /// Offset inside the file
    pub offset: u64,
    pub length: u64,
}

/// Complete BitTorrent v1 metainfo.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentMetainfo {
    pub name: String,
    pub announce: String,
    /// Trackers after the primary announce URL, in the order given
    pub announce_list: Vec<String>,
    pub comment: Option<String>,
    pub created_by: String,
    /// Seconds since the Unix epoch
    pub creation_date: i64,
    pub encoding: String,
    pub private: bool,
    pub piece_length: PieceLength,
    pub layout: FileLayout,
    pub files: Vec<FileEntry>,
    pub piece_hashes: Vec<PieceHash>,
}

impl TorrentMetainfo {
    /// Sum of all file lengths.
    pub fn total_length(&self) -> u64 {
        self.files.iter().map(|file| file.length).sum()
    }

    pub fn piece_count(&self) -> usize {
        self.piece_hashes.len()
    }

    /// All tracker URLs, primary first.
    pub fn announce_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.announce.as_str()).chain(self.announce_list.iter().map(String::as_str))
    }

    /// Byte length of the piece at `index`.
    ///
    /// `None` past the last hash, and for hashes that start beyond the end of
    /// the data when the struct was built without the assembler.
    pub fn piece_size(&self, index: PieceIndex) -> Option<u64> {
        if index.as_usize() >= self.piece_count() {
            return None;
        }
        let start = u64::from(index.as_u32()) * self.piece_length.as_u64();
        let remaining = self
            .total_length()
            .checked_sub(start)
            .filter(|&remaining| remaining > 0)?;
        Some(remaining.min(self.piece_length.as_u64()))
    }

    /// File slices that make up the piece at `index`, in stream order.
    ///
    /// Re-derives the segmentation from the metainfo alone: piece `i` covers
    /// stream offsets `[i * piece_length, i * piece_length + size)` mapped
    /// across files in list order.
    pub fn piece_spans(&self, index: PieceIndex) -> Option<Vec<FileSlice>> {
        let size = self.piece_size(index)?;
        let start = u64::from(index.as_u32()) * self.piece_length.as_u64();
        let end = start + size;

        let mut spans = Vec::new();
        let mut file_start = 0u64;
        for (file_index, file) in self.files.iter().enumerate() {
            let file_end = file_start + file.length;
            if file_end > start && file_start < end {
                let slice_start = start.max(file_start);
                let slice_end = end.min(file_end);
                spans.push(FileSlice {
                    file_index,
                    offset: slice_start - file_start,
                    length: slice_end - slice_start,
                });
            }
            if file_end >= end {
                break;
            }
            file_start = file_end;
        }
        Some(spans)
    }

    /// SHA-1 of the bencoded info dictionary.
    pub fn info_hash(&self) -> InfoHash {
        encoding::info_hash(self)
    }

    /// Flat, serializable view for display.
    pub fn summary(&self) -> MetainfoSummary {
        let creation_date = chrono::DateTime::from_timestamp(self.creation_date, 0)
            .map(|date| date.to_rfc3339())
            .unwrap_or_else(|| self.creation_date.to_string());

        MetainfoSummary {
            name: self.name.clone(),
            info_hash: self.info_hash().to_string(),
            trackers: self.announce_urls().map(str::to_string).collect(),
            comment: self.comment.clone(),
            created_by: self.created_by.clone(),
            creation_date,
            private: self.private,
            layout: self.layout,
            piece_length: self.piece_length,
            piece_count: self.piece_count(),
            total_length: self.total_length(),
            files: self.files.clone(),
        }
    }
}

/// Display-oriented metainfo view with hex info hash and RFC 3339 date.
#[derive(Debug, Clone, Serialize)]
pub struct MetainfoSummary {
    pub name: String,
    pub info_hash: String,
    pub trackers: Vec<String>,
    pub comment: Option<String>,
    pub created_by: String,
    pub creation_date: String,
    pub private: bool,
    pub layout: FileLayout,
    pub piece_length: PieceLength,
    pub piece_count: usize,
    pub total_length: u64,
    pub files: Vec<FileEntry>,
}

/// Combines enumeration and hashing results with scalar metadata.
#[derive(Debug, Clone)]
pub struct MetainfoAssembler {
    pub name: String,
    /// Primary tracker first; must not be empty
    pub announce_urls: Vec<String>,
    pub comment: Option<String>,
    pub created_by: String,
    pub creation_date: i64,
    pub encoding: String,
    pub private: bool,
    pub piece_length: PieceLength,
    pub layout: FileLayout,
    pub files: Vec<FileEntry>,
    pub piece_hashes: Vec<PieceHash>,
}

impl MetainfoAssembler {
    /// Builds the metainfo after checking its structural invariants.
    ///
    /// # Errors
    /// - `TorrentError::MetainfoInvariant` - Piece count does not cover the
    ///   files, single-file layout without exactly one file, or no tracker
    pub fn assemble(self) -> Result<TorrentMetainfo, TorrentError> {
        let total_length: u64 = self.files.iter().map(|file| file.length).sum();
        let expected_pieces = self.piece_length.piece_count(total_length);

        if self.piece_hashes.len() as u64 != expected_pieces {
            return Err(TorrentError::MetainfoInvariant {
                reason: format!(
                    "{} piece hashes for {total_length} bytes at piece length {} (expected {expected_pieces})",
                    self.piece_hashes.len(),
                    self.piece_length.bytes()
                ),
            });
        }

        if self.layout == FileLayout::SingleFile && self.files.len() != 1 {
            return Err(TorrentError::MetainfoInvariant {
                reason: format!("single-file layout with {} files", self.files.len()),
            });
        }

        let mut announce_urls = self.announce_urls.into_iter();
        let announce = announce_urls
            .next()
            .ok_or_else(|| TorrentError::MetainfoInvariant {
                reason: "no announce URL".to_string(),
            })?;

        Ok(TorrentMetainfo {
            name: self.name,
            announce,
            announce_list: announce_urls.collect(),
            comment: self.comment,
            created_by: self.created_by,
            creation_date: self.creation_date,
            encoding: self.encoding,
            private: self.private,
            piece_length: self.piece_length,
            layout: self.layout,
            files: self.files,
            piece_hashes: self.piece_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler(files: Vec<FileEntry>, piece_bytes: u32, pieces: usize) -> MetainfoAssembler {
        MetainfoAssembler {
            name: "sample".to_string(),
            announce_urls: vec![
                "http://tracker.example.com/announce".to_string(),
                "udp://backup.example.com:1337".to_string(),
            ],
            comment: None,
            created_by: "maketorrent test".to_string(),
            creation_date: 1_700_000_000,
            encoding: "UTF-8".to_string(),
            private: false,
            piece_length: PieceLength::from_bytes(piece_bytes).unwrap(),
            layout: FileLayout::MultiFile,
            files,
            piece_hashes: vec![[0u8; 20]; pieces],
        }
    }

    #[test]
    fn test_piece_length_from_exponent() {
        let length = PieceLength::from_exponent(18).unwrap();
        assert_eq!(length.bytes(), 262_144);
        assert_eq!(length.exponent(), 18);
        assert!(PieceLength::from_exponent(32).is_err());
    }

    #[test]
    fn test_piece_length_rejects_non_power_of_two() {
        assert!(PieceLength::from_bytes(0).is_err());
        assert!(PieceLength::from_bytes(3).is_err());
        assert!(PieceLength::from_bytes(4).is_ok());
    }

    #[test]
    fn test_piece_count_rounds_up() {
        let length = PieceLength::from_bytes(4).unwrap();
        assert_eq!(length.piece_count(0), 0);
        assert_eq!(length.piece_count(4), 1);
        assert_eq!(length.piece_count(10), 3);
    }

    #[test]
    fn test_assemble_splits_primary_announce() {
        let metainfo = assembler(vec![FileEntry::new(vec!["a".into()], 10)], 4, 3)
            .assemble()
            .unwrap();
        assert_eq!(metainfo.announce, "http://tracker.example.com/announce");
        assert_eq!(metainfo.announce_list, vec!["udp://backup.example.com:1337"]);
        assert_eq!(metainfo.announce_urls().count(), 2);
        assert_eq!(metainfo.total_length(), 10);
    }

    #[test]
    fn test_assemble_rejects_wrong_piece_count() {
        let result = assembler(vec![FileEntry::new(vec!["a".into()], 10)], 4, 2).assemble();
        assert!(matches!(result, Err(TorrentError::MetainfoInvariant { .. })));
    }

    #[test]
    fn test_assemble_rejects_missing_tracker() {
        let mut parts = assembler(vec![], 4, 0);
        parts.announce_urls.clear();
        assert!(parts.assemble().is_err());
    }

    #[test]
    fn test_assemble_rejects_single_layout_with_many_files() {
        let mut parts = assembler(
            vec![
                FileEntry::new(vec!["a".into()], 1),
                FileEntry::new(vec!["b".into()], 1),
            ],
            4,
            1,
        );
        parts.layout = FileLayout::SingleFile;
        assert!(parts.assemble().is_err());
    }

    #[test]
    fn test_piece_sizes_last_piece_short() {
        let metainfo = assembler(vec![FileEntry::new(vec!["a".into()], 10)], 4, 3)
            .assemble()
            .unwrap();
        let sizes: Vec<u64> = (0..3)
            .map(|i| metainfo.piece_size(PieceIndex::new(i)).unwrap())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(metainfo.piece_size(PieceIndex::new(3)), None);
    }

    #[test]
    fn test_surplus_hashes_have_no_size() {
        let mut metainfo = assembler(vec![FileEntry::new(vec!["a".into()], 5)], 4, 2)
            .assemble()
            .unwrap();
        metainfo.piece_hashes.push([0u8; 20]);
        metainfo.piece_hashes.push([0u8; 20]);

        assert_eq!(metainfo.piece_size(PieceIndex::new(1)), Some(1));
        assert_eq!(metainfo.piece_size(PieceIndex::new(2)), None);
        assert_eq!(metainfo.piece_size(PieceIndex::new(3)), None);
        assert!(metainfo.piece_spans(PieceIndex::new(3)).is_none());
    }

    #[test]
    fn test_piece_spans_cross_file_boundary() {
        let metainfo = assembler(
            vec![
                FileEntry::new(vec!["a".into()], 3),
                FileEntry::new(vec!["empty".into()], 0),
                FileEntry::new(vec!["b".into()], 5),
            ],
            4,
            2,
        )
        .assemble()
        .unwrap();

        assert_eq!(
            metainfo.piece_spans(PieceIndex::new(0)).unwrap(),
            vec![
                FileSlice {
                    file_index: 0,
                    offset: 0,
                    length: 3
                },
                FileSlice {
                    file_index: 2,
                    offset: 0,
                    length: 1
                },
            ]
        );
        assert_eq!(
            metainfo.piece_spans(PieceIndex::new(1)).unwrap(),
            vec![FileSlice {
                file_index: 2,
                offset: 1,
                length: 4
            }]
        );
        assert!(metainfo.piece_spans(PieceIndex::new(2)).is_none());
    }

    #[test]
    fn test_summary_formats_date() {
        let metainfo = assembler(vec![FileEntry::new(vec!["a".into()], 4)], 4, 1)
            .assemble()
            .unwrap();
        let summary = metainfo.summary();
        assert!(summary.creation_date.starts_with("2023-11-14"));
        assert_eq!(summary.piece_count, 1);
        assert_eq!(summary.info_hash.len(), 40);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["piece_length"], 4);
        assert_eq!(json["files"][0]["path"][0], "a");
    }
}
