//! File-pair comparison: loaded buffers, short-circuit and size-guard policy,
//! and generation-tagged delivery of diff results.

pub mod buffer;
pub mod orchestrator;

pub use buffer::{FileBuffer, FileSlot};
pub use orchestrator::{
    check_comparison_allowed, check_lengths_allowed, is_comparison_allowed, should_short_circuit,
    CompareEngine, ComparisonOutcome, ComparisonReport, DigestStatus, Disallowed, Generation,
};
