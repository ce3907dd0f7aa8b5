// Error types for digest computation
// Every variant carries the path/operation context plus a suggestion line

use std::io;
use std::path::PathBuf;

/// Errors raised while computing file digests.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("File not found: {}\nSuggestion: Check that the file path is correct and the file exists", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Permission denied while {operation} file: {}\nSuggestion: Check file permissions or close programs holding a lock on it", path.display())]
    PermissionDenied { path: PathBuf, operation: String },

    #[error("I/O error while {operation}{}: {source}\nSuggestion: Check that the file is readable and not being modified", display_path(path))]
    Io {
        path: Option<PathBuf>,
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported hash algorithm: {algorithm}\nSuggestion: Run `delta list` to see available algorithms")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("No hash algorithms selected\nSuggestion: Name at least one algorithm, or leave the list out to use every supported algorithm")]
    NoAlgorithms,

    #[error("Hash worker for {} stopped before finishing: {reason}\nSuggestion: Retry the operation", path.display())]
    WorkerLost { path: PathBuf, reason: String },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" file {}", p.display()),
        None => String::new(),
    }
}

impl HashError {
    /// Classify an `io::Error` into the most specific variant for `operation`.
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<PathBuf>) -> Self {
        match (err.kind(), path) {
            (io::ErrorKind::NotFound, Some(path)) => HashError::FileNotFound { path },
            (io::ErrorKind::PermissionDenied, Some(path)) => HashError::PermissionDenied {
                path,
                operation: operation.to_string(),
            },
            (_, path) => HashError::Io {
                path,
                operation: operation.to_string(),
                source: err,
            },
        }
    }
}

impl From<io::Error> for HashError {
    fn from(err: io::Error) -> Self {
        HashError::from_io_error(err, "reading", None)
    }
}
