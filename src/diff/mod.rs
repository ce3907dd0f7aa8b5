//! Chunked, parallel byte-level comparison of two buffers.

pub mod engine;
pub mod error;
pub mod partition;

pub use engine::{scan_range, ByteComparator, DiffCallback, DiffEngine, DiffOffset};
pub use error::{DiffError, DiffResult};
pub use partition::{partition, ChunkRange};
