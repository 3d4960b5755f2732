//! Bencode serialization of torrent metainfo
//!
//! Dictionaries are written with their keys already in sorted byte order, as
//! bencode requires, so no intermediate value tree is built.

use sha1::{Digest, Sha1};

use super::InfoHash;
use super::metainfo::{FileLayout, TorrentMetainfo};

/// Minimal bencode writer over a byte buffer.
#[derive(Debug, Default)]
struct BencodeWriter {
    buffer: Vec<u8>,
}

impl BencodeWriter {
    fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buffer
            .extend_from_slice(value.len().to_string().as_bytes());
        self.buffer.push(b':');
        self.buffer.extend_from_slice(value);
        self
    }

    fn string(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    fn integer(&mut self, value: i64) -> &mut Self {
        self.buffer.push(b'i');
        self.buffer.extend_from_slice(value.to_string().as_bytes());
        self.buffer.push(b'e');
        self
    }

    fn unsigned(&mut self, value: u64) -> &mut Self {
        self.buffer.push(b'i');
        self.buffer.extend_from_slice(value.to_string().as_bytes());
        self.buffer.push(b'e');
        self
    }

    fn begin_dict(&mut self) -> &mut Self {
        self.buffer.push(b'd');
        self
    }

    fn begin_list(&mut self) -> &mut Self {
        self.buffer.push(b'l');
        self
    }

    fn end(&mut self) -> &mut Self {
        self.buffer.push(b'e');
        self
    }

    fn raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(encoded);
        self
    }

    fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Encodes the complete `.torrent` file contents.
///
/// `announce-list` is only written when there is more than one tracker; it
/// then holds one tier per URL with the primary announce URL first.
pub fn encode_metainfo(metainfo: &TorrentMetainfo) -> Vec<u8> {
    let mut writer = BencodeWriter::default();
    writer.begin_dict();

    writer.string("announce").string(&metainfo.announce);

    if !metainfo.announce_list.is_empty() {
        writer.string("announce-list").begin_list();
        for url in metainfo.announce_urls() {
            writer.begin_list().string(url).end();
        }
        writer.end();
    }

    if let Some(comment) = &metainfo.comment {
        writer.string("comment").string(comment);
    }

    writer
        .string("created by")
        .string(&metainfo.created_by)
        .string("creation date")
        .integer(metainfo.creation_date)
        .string("encoding")
        .string(&metainfo.encoding)
        .string("info")
        .raw(&encode_info(metainfo));

    writer.end();
    writer.finish()
}

/// Encodes only the info dictionary, the input of the info hash.
pub fn encode_info(metainfo: &TorrentMetainfo) -> Vec<u8> {
    let mut writer = BencodeWriter::default();
    writer.begin_dict();

    match metainfo.layout {
        FileLayout::MultiFile => {
            writer.string("files").begin_list();
            for file in &metainfo.files {
                writer
                    .begin_dict()
                    .string("length")
                    .unsigned(file.length)
                    .string("path")
                    .begin_list();
                for component in &file.path {
                    writer.string(component);
                }
                writer.end().end();
            }
            writer.end();
        }
        FileLayout::SingleFile => {
            writer.string("length").unsigned(metainfo.total_length());
        }
    }

    writer
        .string("name")
        .string(&metainfo.name)
        .string("piece length")
        .unsigned(metainfo.piece_length.as_u64());

    let pieces: Vec<u8> = metainfo.piece_hashes.concat();
    writer.string("pieces").bytes(&pieces);

    if metainfo.private {
        writer.string("private").integer(1);
    }

    writer.end();
    writer.finish()
}

/// SHA-1 of the encoded info dictionary.
pub fn info_hash(metainfo: &TorrentMetainfo) -> InfoHash {
    let mut hasher = Sha1::new();
    hasher.update(encode_info(metainfo));
    let hash = hasher.finalize();

    let mut hash_array = [0u8; 20];
    hash_array.copy_from_slice(&hash[..20]);
    InfoHash::new(hash_array)
}
