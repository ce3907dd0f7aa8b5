//! Error types for the diff engine.

/// Errors that can occur during a byte comparison run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// A chunk task panicked; the whole run is failed.
    #[error("comparison of bytes {start}..{end} failed: {reason}\nSuggestion: Retry the comparison")]
    ChunkFailed {
        start: usize,
        end: usize,
        reason: String,
    },

    /// The worker pool could not be created.
    #[error("could not start comparison workers: {reason}\nSuggestion: Lower the configured worker count")]
    WorkerPool { reason: String },

    /// The run was dropped before it delivered a result.
    #[error("comparison was dropped before completing\nSuggestion: Retry the comparison")]
    Dropped,
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
