use std::fs;
use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use maketorrent_core::config::{CreationConfig, HashingConfig};
use maketorrent_core::torrent::hash_piece;
use maketorrent_core::{CreationOptions, MakeTorrentConfig, PieceLength, TorrentCreator};
use tempfile::TempDir;

fn bench_piece_hashing(c: &mut Criterion) {
    let piece = vec![0xA5u8; 256 * 1024];

    let mut group = c.benchmark_group("piece_hashing");
    group.throughput(Throughput::Bytes(piece.len() as u64));
    group.bench_function("sha1_256k", |b| b.iter(|| hash_piece(black_box(&piece))));
    group.finish();
}

fn bench_directory_creation(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    for i in 0..16 {
        fs::write(dir.path().join(format!("file{i:02}.bin")), vec![i as u8; 1_000_000]).unwrap();
    }

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let creation = CreationConfig::default();
    let piece_length = PieceLength::from_exponent(16).unwrap();

    let mut group = c.benchmark_group("directory_creation");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(16 * 1_000_000));
    for workers in [1, 4] {
        let creator = TorrentCreator::new(&MakeTorrentConfig {
            hashing: HashingConfig::with_workers(workers),
            ..MakeTorrentConfig::default()
        });
        group.bench_function(format!("16x1MB_{workers}_workers"), |b| {
            b.iter(|| {
                let mut options = CreationOptions::new(
                    vec!["http://tracker.example.com/announce".to_string()],
                    piece_length,
                    &creation,
                );
                options.creation_date = Some(0);
                runtime
                    .block_on(creator.create(dir.path(), options))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_piece_hashing, bench_directory_creation);
criterion_main!(benches);
