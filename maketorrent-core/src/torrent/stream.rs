//! Multi-file byte stream and fixed-length piece segmentation
//!
//! `ChainedFileReader` presents an ordered list of files as one read cursor,
//! so `PieceSegmenter` only deals with filling a piece buffer and never with
//! file boundaries. At most one file handle is open at any time.

use std::collections::VecDeque;
use std::path::PathBuf;

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

use super::metainfo::PieceLength;
use super::{PieceIndex, TorrentError};

/// Sequential reader over several files as if they were concatenated.
///
/// Each file must yield exactly the number of bytes recorded for it; a file
/// that grew or shrank since enumeration fails the read instead of shifting
/// every following piece boundary.
pub struct ChainedFileReader {
    pending: VecDeque<(PathBuf, u64)>,
    current: Option<OpenFile>,
}

struct OpenFile {
    path: PathBuf,
    file: File,
    expected: u64,
    consumed: u64,
}

impl ChainedFileReader {
    /// Creates a reader over `(path, expected_length)` pairs in stream order.
    pub fn new(sources: Vec<(PathBuf, u64)>) -> Self {
        Self {
            pending: sources.into(),
            current: None,
        }
    }

    /// Reads up to `buf.len()` bytes from the stream.
    ///
    /// Returns 0 only once every file is exhausted. A read never spans two
    /// files, so a short count does not mean end of stream.
    ///
    /// # Errors
    /// - `TorrentError::FileRead` - File could not be opened or read
    /// - `TorrentError::FileSizeChanged` - File length differs from the recorded one
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TorrentError> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.current.is_none() {
                match self.pending.pop_front() {
                    Some((path, expected)) => {
                        self.current = Some(OpenFile::open(path, expected).await?);
                    }
                    None => return Ok(0),
                }
            }
            let Some(open) = self.current.as_mut() else {
                return Ok(0);
            };

            let read = open
                .file
                .read(buf)
                .await
                .map_err(|source| TorrentError::FileRead {
                    path: open.path.clone(),
                    source,
                })?;

            if read == 0 {
                if open.consumed != open.expected {
                    return Err(open.size_changed());
                }
                trace!("Finished {} ({} bytes)", open.path.display(), open.consumed);
                // Dropping the handle closes it before the next file opens
                self.current = None;
                continue;
            }

            open.consumed += read as u64;
            if open.consumed > open.expected {
                return Err(open.size_changed());
            }
            return Ok(read);
        }
    }

    /// Fills `buf` across file boundaries until it is full or the stream ends.
    ///
    /// # Errors
    /// Same as [`ChainedFileReader::read`].
    pub async fn fill(&mut self, buf: &mut [u8]) -> Result<usize, TorrentError> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.read(&mut buf[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        Ok(filled)
    }
}

impl OpenFile {
    async fn open(path: PathBuf, expected: u64) -> Result<Self, TorrentError> {
        let file = File::open(&path)
            .await
            .map_err(|source| TorrentError::FileRead {
                path: path.clone(),
                source,
            })?;
        debug!("Reading {} ({} bytes)", path.display(), expected);
        Ok(Self {
            path,
            file,
            expected,
            consumed: 0,
        })
    }

    fn size_changed(&self) -> TorrentError {
        TorrentError::FileSizeChanged {
            path: self.path.clone(),
            expected: self.expected,
            actual: self.consumed,
        }
    }
}

/// One segment of the logical stream, ready for hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub index: PieceIndex,
    pub data: Bytes,
}

/// Cuts the chained stream into pieces of a fixed length.
///
/// Every piece except possibly the last is exactly `piece_length` bytes.
/// Partial contents at the end of a file stay in the accumulation buffer and
/// are completed from the next file.
pub struct PieceSegmenter {
    reader: ChainedFileReader,
    piece_length: PieceLength,
    next_index: u32,
    exhausted: bool,
}

impl PieceSegmenter {
    pub fn new(reader: ChainedFileReader, piece_length: PieceLength) -> Self {
        Self {
            reader,
            piece_length,
            next_index: 0,
            exhausted: false,
        }
    }

    /// Number of pieces emitted so far.
    pub fn pieces_emitted(&self) -> u32 {
        self.next_index
    }

    /// Returns the next piece, or `None` once the stream is exhausted.
    ///
    /// # Errors
    /// - `TorrentError::FileRead` - Underlying read failed
    /// - `TorrentError::FileSizeChanged` - Source file changed during the run
    pub async fn next_piece(&mut self) -> Result<Option<Piece>, TorrentError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buffer = BytesMut::zeroed(self.piece_length.as_usize());
        let filled = self.reader.fill(&mut buffer).await?;

        if filled < buffer.len() {
            self.exhausted = true;
            if filled == 0 {
                return Ok(None);
            }
            buffer.truncate(filled);
            debug!("Final piece {} is {} bytes", self.next_index, filled);
        }

        let index = PieceIndex::new(self.next_index);
        self.next_index += 1;

        Ok(Some(Piece {
            index,
            data: buffer.freeze(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_files(dir: &TempDir, contents: &[&[u8]]) -> Vec<(PathBuf, u64)> {
        contents
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let path = dir.path().join(format!("file{i}"));
                fs::write(&path, data).unwrap();
                (path, data.len() as u64)
            })
            .collect()
    }

    async fn collect_pieces(sources: Vec<(PathBuf, u64)>, piece_bytes: u32) -> Vec<Piece> {
        let mut segmenter = PieceSegmenter::new(
            ChainedFileReader::new(sources),
            PieceLength::from_bytes(piece_bytes).unwrap(),
        );
        let mut pieces = Vec::new();
        while let Some(piece) = segmenter.next_piece().await.unwrap() {
            pieces.push(piece);
        }
        pieces
    }

    #[tokio::test]
    async fn test_single_file_last_piece_short() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &[b"0123456789"]);

        let pieces = collect_pieces(sources, 4).await;

        let lengths: Vec<usize> = pieces.iter().map(|p| p.data.len()).collect();
        assert_eq!(lengths, vec![4, 4, 2]);
        assert_eq!(&pieces[2].data[..], b"89");
        assert_eq!(pieces[2].index, PieceIndex::new(2));
    }

    #[tokio::test]
    async fn test_piece_spans_two_files() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &[b"abc", b"defgh"]);

        let pieces = collect_pieces(sources, 4).await;

        assert_eq!(pieces.len(), 2);
        assert_eq!(&pieces[0].data[..], b"abcd");
        assert_eq!(&pieces[1].data[..], b"efgh");
    }

    #[tokio::test]
    async fn test_exact_multiple_carries_nothing() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &[b"abcdefgh", b"ij"]);

        let pieces = collect_pieces(sources, 4).await;

        assert_eq!(pieces.len(), 3);
        assert_eq!(&pieces[1].data[..], b"efgh");
        assert_eq!(&pieces[2].data[..], b"ij");
    }

    #[tokio::test]
    async fn test_empty_files_are_transparent() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &[b"", b"ab", b"", b"", b"cdef", b""]);

        let pieces = collect_pieces(sources, 4).await;

        assert_eq!(pieces.len(), 2);
        assert_eq!(&pieces[0].data[..], b"abcd");
        assert_eq!(&pieces[1].data[..], b"ef");
    }

    #[tokio::test]
    async fn test_empty_stream_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &[b""]);

        assert!(collect_pieces(sources, 4).await.is_empty());
        assert!(collect_pieces(Vec::new(), 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_piece_spanning_many_small_files() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &[b"a", b"b", b"c", b"d", b"e"]);

        let pieces = collect_pieces(sources, 8).await;

        assert_eq!(pieces.len(), 1);
        assert_eq!(&pieces[0].data[..], b"abcde");
    }

    #[tokio::test]
    async fn test_grown_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut sources = write_files(&dir, &[b"abcdef"]);
        sources[0].1 = 4;

        let mut reader = ChainedFileReader::new(sources);
        let mut buf = [0u8; 16];
        let result = reader.fill(&mut buf).await;

        assert!(matches!(
            result,
            Err(TorrentError::FileSizeChanged { expected: 4, actual: 6, .. })
        ));
    }

    #[tokio::test]
    async fn test_shrunk_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut sources = write_files(&dir, &[b"ab", b"cd"]);
        sources[0].1 = 5;

        let mut reader = ChainedFileReader::new(sources);
        let mut buf = [0u8; 16];
        let result = reader.fill(&mut buf).await;

        assert!(matches!(
            result,
            Err(TorrentError::FileSizeChanged { expected: 5, actual: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let sources = vec![(dir.path().join("gone"), 3)];

        let mut reader = ChainedFileReader::new(sources);
        let mut buf = [0u8; 4];

        assert!(matches!(
            reader.read(&mut buf).await,
            Err(TorrentError::FileRead { .. })
        ));
    }
}
