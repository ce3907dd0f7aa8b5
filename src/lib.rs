// Library module for delta
// Multi-algorithm file digests and parallel byte-level file comparison

pub mod compare;
pub mod config;
pub mod diff;
pub mod hash;
pub mod report;

pub use compare::{CompareEngine, ComparisonOutcome, ComparisonReport, FileBuffer, FileSlot};
pub use config::DeltaConfig;
pub use diff::{ByteComparator, DiffEngine, DiffError};
pub use hash::{Algorithm, DigestResult, HashEngine, HashError, HashRegistry};
