//! Piece hashing and the worker pool that runs it
//!
//! Pieces are submitted in stream order; each carries its index so results
//! can complete in any order and still land in the right slot.

use std::sync::Arc;

use bytes::Bytes;
use sha1::{Digest, Sha1};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use super::observer::CreationObserver;
use super::stream::Piece;
use super::{PIECE_HASH_LEN, PieceHash, PieceIndex, TorrentError};
use crate::config::HashingConfig;

/// Calculates the SHA-1 digest of one piece.
pub fn hash_piece(data: &[u8]) -> PieceHash {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let hash = hasher.finalize();

    let mut hash_array = [0u8; PIECE_HASH_LEN];
    hash_array.copy_from_slice(&hash[..PIECE_HASH_LEN]);
    hash_array
}

/// Completed hash tagged with the index it was submitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceDigest {
    pub index: PieceIndex,
    pub hash: PieceHash,
}

#[derive(Debug)]
struct HashJob {
    index: PieceIndex,
    data: Bytes,
}

/// Fixed-size pool of hashing workers with an order-restoring collector.
///
/// `submit` queues a piece and waits only when the bounded queue is full.
/// `finish` is the single barrier: it drains every worker and returns the
/// hashes indexed by piece number. Dropping the scheduler aborts the workers.
pub struct HashScheduler {
    job_tx: Option<mpsc::Sender<HashJob>>,
    result_rx: mpsc::UnboundedReceiver<PieceDigest>,
    workers: JoinSet<Result<(), TorrentError>>,
    results: Vec<Option<PieceHash>>,
    submitted: usize,
    collected: usize,
    observer: Arc<dyn CreationObserver>,
}

impl HashScheduler {
    /// Spawns the worker pool sized for `expected_pieces` results.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &HashingConfig,
        expected_pieces: usize,
        observer: Arc<dyn CreationObserver>,
    ) -> Self {
        let worker_count = config.worker_count.max(1);
        let (job_tx, job_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            workers.spawn(run_worker(worker_id, job_rx.clone(), result_tx.clone()));
        }
        debug!(
            "Started {} hash workers for {} pieces",
            worker_count, expected_pieces
        );

        Self {
            job_tx: Some(job_tx),
            result_rx,
            workers,
            results: vec![None; expected_pieces],
            submitted: 0,
            collected: 0,
            observer,
        }
    }

    /// Queues a piece for hashing.
    ///
    /// Pieces must arrive in index order starting at 0; the submission order
    /// is what binds a piece to its slot.
    ///
    /// # Errors
    /// - `TorrentError::MetainfoInvariant` - Out-of-order or surplus piece
    /// - `TorrentError::HashWorkerFailed` - All workers have stopped
    pub async fn submit(&mut self, piece: Piece) -> Result<(), TorrentError> {
        if piece.index.as_usize() != self.submitted {
            return Err(TorrentError::MetainfoInvariant {
                reason: format!(
                    "piece {} submitted after {} pieces",
                    piece.index, self.submitted
                ),
            });
        }
        if self.submitted >= self.results.len() {
            return Err(TorrentError::MetainfoInvariant {
                reason: format!(
                    "piece {} exceeds expected count {}",
                    piece.index,
                    self.results.len()
                ),
            });
        }

        let job_tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| TorrentError::HashWorkerFailed {
                reason: "hash queue already closed".to_string(),
            })?;
        job_tx
            .send(HashJob {
                index: piece.index,
                data: piece.data,
            })
            .await
            .map_err(|_| TorrentError::HashWorkerFailed {
                reason: "hash workers stopped accepting pieces".to_string(),
            })?;
        self.submitted += 1;

        // Record whatever finished meanwhile so progress is reported live
        while let Ok(digest) = self.result_rx.try_recv() {
            self.record(digest)?;
        }
        Ok(())
    }

    /// Waits for every submitted piece and returns hashes in piece order.
    ///
    /// # Errors
    /// - `TorrentError::HashWorkerFailed` - A worker panicked or failed
    /// - `TorrentError::MetainfoInvariant` - A slot is missing or filled twice
    pub async fn finish(mut self) -> Result<Vec<PieceHash>, TorrentError> {
        // Closing the queue lets workers exit once it is drained
        self.job_tx = None;

        while let Some(digest) = self.result_rx.recv().await {
            self.record(digest)?;
        }

        while let Some(joined) = self.workers.join_next().await {
            joined.map_err(|e| TorrentError::HashWorkerFailed {
                reason: e.to_string(),
            })??;
        }

        if self.submitted != self.results.len() {
            return Err(TorrentError::MetainfoInvariant {
                reason: format!(
                    "{} pieces submitted, {} expected",
                    self.submitted,
                    self.results.len()
                ),
            });
        }

        std::mem::take(&mut self.results)
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| TorrentError::MetainfoInvariant {
                    reason: format!("no hash for piece {index}"),
                })
            })
            .collect()
    }

    fn record(&mut self, digest: PieceDigest) -> Result<(), TorrentError> {
        let total = self.results.len();
        let slot = self
            .results
            .get_mut(digest.index.as_usize())
            .ok_or_else(|| TorrentError::MetainfoInvariant {
                reason: format!("piece {} outside of {total} pieces", digest.index),
            })?;

        if slot.replace(digest.hash).is_some() {
            return Err(TorrentError::MetainfoInvariant {
                reason: format!("piece {} hashed twice", digest.index),
            });
        }

        self.collected += 1;
        self.observer.piece_hashed(digest.index, self.collected, total);
        Ok(())
    }
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<HashJob>>>,
    results: mpsc::UnboundedSender<PieceDigest>,
) -> Result<(), TorrentError> {
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(HashJob { index, data }) = job else {
            trace!("Hash worker {} idle, queue closed", worker_id);
            return Ok(());
        };

        let hash = tokio::task::spawn_blocking(move || hash_piece(&data))
            .await
            .map_err(|e| TorrentError::HashWorkerFailed {
                reason: format!("piece {index}: {e}"),
            })?;

        if results.send(PieceDigest { index, hash }).is_err() {
            // Collector is gone, nothing left to report to
            return Ok(());
        }
    }
}
