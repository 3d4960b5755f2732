//! Bencode parsing of `.torrent` files back into metainfo

use sha1::{Digest, Sha1};

use super::metainfo::{FileEntry, FileLayout, PieceLength, TorrentMetainfo};
use super::{InfoHash, PIECE_HASH_LEN, PieceHash, TorrentError};

// Type aliases for complex bencode types
type BencodeDict<'a> = std::collections::HashMap<&'a [u8], bencode_rs::Value<'a>>;
type ParseResult<T> = Result<T, TorrentError>;

/// Metainfo together with the info hash of the original bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTorrent {
    pub metainfo: TorrentMetainfo,
    /// SHA-1 over the info dictionary exactly as it appears in the input
    pub info_hash: InfoHash,
}

/// Bencode parsing utilities for torrent metainfo extraction.
pub struct MetainfoParser;

impl MetainfoParser {
    /// Parses `.torrent` bytes into metainfo.
    ///
    /// # Errors
    /// - `TorrentError::InvalidTorrentFile` - Malformed bencode or missing fields
    pub fn parse(torrent_bytes: &[u8]) -> Result<ParsedTorrent, TorrentError> {
        let parsed = bencode_rs::Value::parse(torrent_bytes).map_err(|e| {
            TorrentError::InvalidTorrentFile {
                reason: format!("Bencode parsing failed: {e:?}"),
            }
        })?;

        let Some(root) = parsed.first() else {
            return Err(invalid("Empty bencode data"));
        };

        let bencode_rs::Value::Dictionary(dict) = root else {
            return Err(invalid("Root element must be dictionary"));
        };

        let metainfo = Self::extract_metainfo(dict)?;
        let info_hash = Self::calculate_info_hash(torrent_bytes)?;

        Ok(ParsedTorrent {
            metainfo,
            info_hash,
        })
    }

    /// Reads and parses a `.torrent` file.
    ///
    /// # Errors
    /// - `TorrentError::FileRead` - File could not be read
    /// - `TorrentError::InvalidTorrentFile` - Parsing failed
    pub async fn parse_file(path: &std::path::Path) -> Result<ParsedTorrent, TorrentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TorrentError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&bytes)
    }

    fn extract_metainfo(dict: &BencodeDict<'_>) -> ParseResult<TorrentMetainfo> {
        let Some(bencode_rs::Value::Dictionary(info)) = dict.get(b"info".as_slice()) else {
            return Err(invalid("Missing or invalid 'info' dictionary"));
        };

        let name = Self::extract_string(info, b"name")?;

        let piece_length = u32::try_from(Self::extract_integer(info, b"piece length")?)
            .map_err(|_| invalid("Piece length out of range"))
            .and_then(|bytes| {
                PieceLength::from_bytes(bytes).map_err(|e| invalid(&e.to_string()))
            })?;

        let pieces_bytes = Self::extract_bytes(info, b"pieces")?;
        if pieces_bytes.len() % PIECE_HASH_LEN != 0 {
            return Err(invalid("Invalid pieces length"));
        }
        let piece_hashes: Vec<PieceHash> = pieces_bytes
            .chunks(PIECE_HASH_LEN)
            .map(|chunk| {
                let mut hash = [0u8; PIECE_HASH_LEN];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let (layout, files) = if let Ok(length) = Self::extract_integer(info, b"length") {
            let length = u64::try_from(length).map_err(|_| invalid("Negative file length"))?;
            (
                FileLayout::SingleFile,
                vec![FileEntry::new(vec![name.clone()], length)],
            )
        } else if let Some(bencode_rs::Value::List(files_list)) = info.get(b"files".as_slice()) {
            (FileLayout::MultiFile, Self::extract_files(files_list)?)
        } else {
            return Err(invalid("Missing 'files' or 'length' field"));
        };

        let total_length = files
            .iter()
            .try_fold(0u64, |total, file| total.checked_add(file.length))
            .ok_or_else(|| invalid("Total length overflows"))?;
        if piece_length.piece_count(total_length) != piece_hashes.len() as u64 {
            return Err(invalid("Piece count does not match total length"));
        }

        let (announce, announce_list) = Self::extract_announce_urls(dict)?;

        Ok(TorrentMetainfo {
            name,
            announce,
            announce_list,
            comment: Self::extract_string(dict, b"comment").ok(),
            created_by: Self::extract_string(dict, b"created by").unwrap_or_default(),
            creation_date: Self::extract_integer(dict, b"creation date").unwrap_or_default(),
            encoding: Self::extract_string(dict, b"encoding").unwrap_or_default(),
            private: matches!(Self::extract_integer(info, b"private"), Ok(1)),
            piece_length,
            layout,
            files,
            piece_hashes,
        })
    }

    /// Calculate SHA1 hash of the info dictionary as it appears in the input
    fn calculate_info_hash(torrent_bytes: &[u8]) -> ParseResult<InfoHash> {
        let (start, end) = Self::find_root_value(torrent_bytes, b"info")?;

        let mut hasher = Sha1::new();
        hasher.update(&torrent_bytes[start..end]);
        let hash_result = hasher.finalize();
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&hash_result);

        Ok(InfoHash::new(hash))
    }

    /// Locates the byte range of `key`'s value in the root dictionary.
    fn find_root_value(data: &[u8], key: &[u8]) -> ParseResult<(usize, usize)> {
        if data.first() != Some(&b'd') {
            return Err(invalid("Expected dictionary start"));
        }

        let mut pos = 1;
        while pos < data.len() && data[pos] != b'e' {
            let key_end = Self::find_bencode_value_end(data, pos)?;
            let current_key = Self::string_contents(data, pos, key_end)?;
            let value_end = Self::find_bencode_value_end(data, key_end)?;
            if current_key == key {
                return Ok((key_end, value_end));
            }
            pos = value_end;
        }

        Err(invalid("Could not find info dictionary in data"))
    }

    fn string_contents(data: &[u8], start: usize, end: usize) -> ParseResult<&[u8]> {
        let colon = data[start..end]
            .iter()
            .position(|&byte| byte == b':')
            .ok_or_else(|| invalid("Dictionary key must be a string"))?;
        Ok(&data[start + colon + 1..end])
    }

    /// Find the end position of the bencode value starting at `start`
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidTorrentFile` - If the value is truncated or malformed
    pub fn find_bencode_value_end(data: &[u8], start: usize) -> Result<usize, TorrentError> {
        let mut pos = start;
        let mut depth = 0usize;

        loop {
            match data.get(pos) {
                Some(b'd' | b'l') => {
                    depth += 1;
                    pos += 1;
                }
                Some(b'e') if depth > 0 => {
                    depth -= 1;
                    pos += 1;
                }
                Some(b'i') => {
                    // Integer: find 'e'
                    let end = data[pos..]
                        .iter()
                        .position(|&byte| byte == b'e')
                        .ok_or_else(|| invalid("Unterminated integer"))?;
                    pos += end + 1;
                }
                Some(b'0'..=b'9') => {
                    // String: read length
                    let colon = data[pos..]
                        .iter()
                        .position(|&byte| byte == b':')
                        .ok_or_else(|| invalid("Invalid string format"))?;
                    let length: usize = std::str::from_utf8(&data[pos..pos + colon])
                        .ok()
                        .and_then(|text| text.parse().ok())
                        .ok_or_else(|| invalid("Invalid string length"))?;

                    pos += colon + 1 + length; // Skip ':' and string content
                    if pos > data.len() {
                        return Err(invalid("String exceeds data"));
                    }
                }
                Some(_) => return Err(invalid("Invalid bencode character")),
                None => return Err(invalid("Incomplete bencode value")),
            }

            if depth == 0 {
                return Ok(pos);
            }
        }
    }

    /// Extract string from bencode dictionary
    fn extract_string(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<String> {
        let bytes = Self::extract_bytes(dict, key)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            invalid(&format!(
                "Invalid UTF-8 in field: {:?}",
                String::from_utf8_lossy(key)
            ))
        })
    }

    /// Extract bytes from bencode dictionary
    fn extract_bytes<'a>(dict: &'a BencodeDict<'_>, key: &[u8]) -> ParseResult<&'a [u8]> {
        match dict.get(key) {
            Some(bencode_rs::Value::Bytes(bytes)) => Ok(bytes),
            _ => Err(invalid(&format!(
                "Missing or invalid field: {:?}",
                String::from_utf8_lossy(key)
            ))),
        }
    }

    /// Extract integer from bencode dictionary
    fn extract_integer(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<i64> {
        match dict.get(key) {
            Some(bencode_rs::Value::Integer(value)) => Ok(*value),
            _ => Err(invalid(&format!(
                "Missing or invalid integer field: {:?}",
                String::from_utf8_lossy(key)
            ))),
        }
    }

    /// Extract files information from multi-file torrent
    fn extract_files(files_list: &[bencode_rs::Value<'_>]) -> ParseResult<Vec<FileEntry>> {
        let mut files = Vec::with_capacity(files_list.len());

        for file_value in files_list {
            let bencode_rs::Value::Dictionary(file_dict) = file_value else {
                return Err(invalid("Invalid file entry type"));
            };

            let length = u64::try_from(Self::extract_integer(file_dict, b"length")?)
                .map_err(|_| invalid("Negative file length"))?;

            let Some(bencode_rs::Value::List(path_list)) = file_dict.get(b"path".as_slice())
            else {
                return Err(invalid("Missing or invalid path in file"));
            };

            let mut path = Vec::with_capacity(path_list.len());
            for path_component in path_list {
                let bencode_rs::Value::Bytes(component) = path_component else {
                    return Err(invalid("Invalid path component type"));
                };
                let component = String::from_utf8(component.to_vec())
                    .map_err(|_| invalid("Invalid UTF-8 in file path"))?;
                path.push(component);
            }

            if path.is_empty() {
                return Err(invalid("Empty file path"));
            }
            files.push(FileEntry::new(path, length));
        }

        Ok(files)
    }

    /// Extract the primary announce URL and the remaining trackers
    fn extract_announce_urls(dict: &BencodeDict<'_>) -> ParseResult<(String, Vec<String>)> {
        let mut announce_urls = Vec::new();

        if let Ok(announce) = Self::extract_string(dict, b"announce") {
            announce_urls.push(announce);
        }

        if let Some(bencode_rs::Value::List(announce_list)) = dict.get(b"announce-list".as_slice())
        {
            for tier in announce_list {
                if let bencode_rs::Value::List(tier_urls) = tier {
                    for url_value in tier_urls {
                        if let bencode_rs::Value::Bytes(url_bytes) = url_value
                            && let Ok(url) = String::from_utf8(url_bytes.to_vec())
                            && !announce_urls.contains(&url)
                        {
                            announce_urls.push(url);
                        }
                    }
                }
            }
        }

        let mut urls = announce_urls.into_iter();
        let announce = urls.next().ok_or_else(|| invalid("Missing 'announce' field"))?;
        Ok((announce, urls.collect()))
    }
}

fn invalid(reason: &str) -> TorrentError {
    TorrentError::InvalidTorrentFile {
        reason: reason.to_string(),
    }
}
