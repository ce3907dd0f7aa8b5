//! Parallel positional byte comparison.
//!
//! Both buffers are split into contiguous chunks over the longer length. Each
//! chunk is scanned by one task on a persistent rayon pool; the tasks report
//! into a lock-guarded merge state and the last one to finish delivers the
//! concatenated, strictly increasing offset list.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use tracing::{debug, warn};

use super::error::{DiffError, DiffResult};
use super::partition::{partition, ChunkRange};

/// Byte offset, relative to the start of the longer buffer.
pub type DiffOffset = usize;

/// Completion continuation for an asynchronous comparison.
pub type DiffCallback = Box<dyn FnOnce(DiffResult<Vec<DiffOffset>>) + Send + 'static>;

/// Anything that can compare two shared buffers and report asynchronously.
pub trait ByteComparator: Send + Sync {
    /// Start comparing `a` and `b`; `on_complete` runs exactly once.
    fn compare_with(&self, a: Arc<[u8]>, b: Arc<[u8]>, on_complete: DiffCallback);
}

/// Offsets in `range` where `a` and `b` disagree.
///
/// A position past the end of one buffer reads as `None`, which never equals a
/// real byte, so tail-length mismatches are always reported.
pub fn scan_range(a: &[u8], b: &[u8], range: ChunkRange) -> Vec<DiffOffset> {
    range.as_range().filter(|&i| a.get(i) != b.get(i)).collect()
}

/// Diff engine backed by a fixed-size worker pool.
pub struct DiffEngine {
    pool: Arc<rayon::ThreadPool>,
    workers: usize,
}

impl DiffEngine {
    /// Build an engine with `workers` threads (at least one).
    pub fn new(workers: usize) -> DiffResult<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("delta-diff-{}", i))
            .build()
            .map_err(|e| DiffError::WorkerPool {
                reason: e.to_string(),
            })?;
        Ok(Self {
            pool: Arc::new(pool),
            workers,
        })
    }

    /// One worker per logical CPU.
    pub fn with_default_workers() -> DiffResult<Self> {
        Self::new(num_cpus::get())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Compare and await the merged offsets.
    pub async fn compare(&self, a: Arc<[u8]>, b: Arc<[u8]>) -> DiffResult<Vec<DiffOffset>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.compare_with(
            a,
            b,
            Box::new(move |result: DiffResult<Vec<DiffOffset>>| {
                let _ = tx.send(result);
            }),
        );
        rx.await.unwrap_or(Err(DiffError::Dropped))
    }

    /// Compare on the pool and block the calling thread until done.
    pub fn compare_blocking(&self, a: &[u8], b: &[u8]) -> DiffResult<Vec<DiffOffset>> {
        let chunks = partition(a.len().max(b.len()), self.workers);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let partials: Vec<DiffResult<Vec<DiffOffset>>> = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| run_chunk(a, b, *chunk))
                .collect()
        });

        let partials = partials.into_iter().collect::<DiffResult<Vec<_>>>()?;
        Ok(merge(partials))
    }
}

impl ByteComparator for DiffEngine {
    fn compare_with(&self, a: Arc<[u8]>, b: Arc<[u8]>, on_complete: DiffCallback) {
        let max_len = a.len().max(b.len());
        let chunks = partition(max_len, self.workers);
        if chunks.is_empty() {
            on_complete(Ok(Vec::new()));
            return;
        }

        debug!(bytes = max_len, chunks = chunks.len(), "comparison dispatched");
        let state = Arc::new(Mutex::new(MergeState::new(chunks.len(), on_complete)));

        for (index, chunk) in chunks.into_iter().enumerate() {
            let a = Arc::clone(&a);
            let b = Arc::clone(&b);
            let state = Arc::clone(&state);
            self.pool.spawn(move || {
                let outcome = run_chunk(&a, &b, chunk);
                MergeState::finish_chunk(&state, index, outcome);
            });
        }
    }
}

fn run_chunk(a: &[u8], b: &[u8], chunk: ChunkRange) -> DiffResult<Vec<DiffOffset>> {
    panic::catch_unwind(AssertUnwindSafe(|| scan_range(a, b, chunk))).map_err(|payload| {
        DiffError::ChunkFailed {
            start: chunk.start,
            end: chunk.end,
            reason: panic_message(payload.as_ref()),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "chunk task panicked".to_string()
    }
}

// Chunks are disjoint and ascending and each list is sorted, so
// concatenation in chunk order is already globally sorted.
fn merge(partials: Vec<Vec<DiffOffset>>) -> Vec<DiffOffset> {
    let merged: Vec<DiffOffset> = partials.into_iter().flatten().collect();
    debug_assert!(merged.windows(2).all(|w| w[0] < w[1]));
    merged
}

/// Per-run accumulation shared by the chunk tasks.
struct MergeState {
    outstanding: usize,
    partials: Vec<Option<Vec<DiffOffset>>>,
    failure: Option<DiffError>,
    on_complete: Option<DiffCallback>,
}

impl MergeState {
    fn new(chunks: usize, on_complete: DiffCallback) -> Self {
        Self {
            outstanding: chunks,
            partials: vec![None; chunks],
            failure: None,
            on_complete: Some(on_complete),
        }
    }

    /// Record one chunk; the last chunk in delivers the merged result.
    fn finish_chunk(state: &Mutex<MergeState>, index: usize, outcome: DiffResult<Vec<DiffOffset>>) {
        let delivery = {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            match outcome {
                Ok(offsets) => guard.partials[index] = Some(offsets),
                Err(e) => {
                    warn!(error = %e, "chunk comparison failed");
                    guard.failure.get_or_insert(e);
                }
            }
            guard.outstanding -= 1;
            if guard.outstanding > 0 {
                return;
            }
            guard.take_delivery()
        };

        if let Some((callback, result)) = delivery {
            callback(result);
        }
    }

    fn take_delivery(&mut self) -> Option<(DiffCallback, DiffResult<Vec<DiffOffset>>)> {
        let callback = self.on_complete.take()?;
        let result = match self.failure.take() {
            Some(e) => Err(e),
            None => {
                let partials = std::mem::take(&mut self.partials)
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect();
                Ok(merge(partials))
            }
        };
        Some((callback, result))
    }
}
