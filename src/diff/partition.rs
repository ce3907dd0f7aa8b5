//! Splits a byte range into contiguous chunks, one per comparison task.

use std::ops::Range;

/// Half-open byte interval `[start, end)` handled by one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<ChunkRange> for Range<usize> {
    fn from(chunk: ChunkRange) -> Self {
        chunk.as_range()
    }
}

/// Partition `[0, total_len)` into at most `worker_count` chunks.
///
/// Chunk size is `ceil(total_len / worker_count)`; only the last chunk may be
/// shorter, and fewer chunks than workers come back when the length does not
/// divide evenly. A zero worker count is treated as one. An empty input yields
/// no chunks.
pub fn partition(total_len: usize, worker_count: usize) -> Vec<ChunkRange> {
    if total_len == 0 {
        return Vec::new();
    }
    let workers = worker_count.max(1);
    let chunk_size = total_len.div_ceil(workers);

    (0..total_len)
        .step_by(chunk_size)
        .map(|start| ChunkRange::new(start, (start + chunk_size).min(total_len)))
        .collect()
}
