// Streaming hash engine
// Reads a file once in fixed-size blocks and feeds every accumulator from the same bytes

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::HashError;
use super::registry::{Algorithm, HashRegistry, Hasher};
use crate::config::DeltaConfig;

/// Default read block size (64 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// One slot of a [`DigestResult`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestValue {
    Hex(String),
    Error(String),
}

impl DigestValue {
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            DigestValue::Hex(hex) => Some(hex),
            DigestValue::Error(_) => None,
        }
    }
}

/// Digests of one input, keyed by algorithm.
///
/// Either every slot holds a hex digest, or every slot holds the same error
/// message. A result is never partially populated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DigestResult {
    pub path: PathBuf,
    pub bytes_read: u64,
    pub digests: BTreeMap<Algorithm, DigestValue>,
}

impl DigestResult {
    /// Build a successful result from finished hex digests.
    pub fn from_digests(
        path: impl Into<PathBuf>,
        bytes_read: u64,
        digests: impl IntoIterator<Item = (Algorithm, String)>,
    ) -> Self {
        Self {
            path: path.into(),
            bytes_read,
            digests: digests
                .into_iter()
                .map(|(alg, hex)| (alg, DigestValue::Hex(hex)))
                .collect(),
        }
    }

    /// Build a failed result: the same message lands in every requested slot.
    pub fn failed(path: impl Into<PathBuf>, algorithms: &[Algorithm], message: &str) -> Self {
        Self {
            path: path.into(),
            bytes_read: 0,
            digests: algorithms
                .iter()
                .map(|alg| (*alg, DigestValue::Error(message.to_string())))
                .collect(),
        }
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<&DigestValue> {
        self.digests.get(&algorithm)
    }

    /// Hex digest for `algorithm`, if present and successful.
    pub fn hex(&self, algorithm: Algorithm) -> Option<&str> {
        self.get(algorithm).and_then(DigestValue::as_hex)
    }

    /// The run's error message, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.digests.values().find_map(|value| match value {
            DigestValue::Error(message) => Some(message.as_str()),
            DigestValue::Hex(_) => None,
        })
    }

    pub fn is_failed(&self) -> bool {
        self.error().is_some()
    }

    pub fn algorithms(&self) -> impl Iterator<Item = Algorithm> + '_ {
        self.digests.keys().copied()
    }
}

/// Hash engine with streaming I/O
#[derive(Debug, Clone)]
pub struct HashEngine {
    block_size: usize,
    algorithms: AlgorithmSelection,
}

// Names stay unresolved until a run starts so a bad name fails only that run
#[derive(Debug, Clone)]
enum AlgorithmSelection {
    Resolved(Vec<Algorithm>),
    Named(Vec<String>),
}

impl HashEngine {
    /// Engine hashing every fixed-length algorithm with 64 KiB blocks
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            algorithms: AlgorithmSelection::Resolved(HashRegistry::supported_algorithms(true)),
        }
    }

    pub fn from_config(config: &DeltaConfig) -> Self {
        let algorithms = match &config.algorithms {
            Some(names) => AlgorithmSelection::Named(names.clone()),
            None => AlgorithmSelection::Resolved(HashRegistry::supported_algorithms(
                config.exclude_variable_length_algorithms,
            )),
        };
        Self {
            block_size: config.block_size_bytes.max(1),
            algorithms,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = AlgorithmSelection::Resolved(algorithms);
        self
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Algorithms a run will compute. Never empty.
    pub fn algorithms(&self) -> Result<Vec<Algorithm>, HashError> {
        match &self.algorithms {
            AlgorithmSelection::Resolved(algorithms) if algorithms.is_empty() => {
                Err(HashError::NoAlgorithms)
            }
            AlgorithmSelection::Resolved(algorithms) => Ok(algorithms.clone()),
            AlgorithmSelection::Named(names) => HashRegistry::resolve(names),
        }
    }

    // Algorithms to label a failed result with when resolution itself failed
    fn failure_slots(&self) -> Vec<Algorithm> {
        self.algorithms()
            .unwrap_or_else(|_| HashRegistry::supported_algorithms(true))
    }

    /// Hash `path` on the calling thread. Never returns a partial mapping.
    pub fn digest_file(&self, path: &Path) -> DigestResult {
        match self.try_digest_file(path) {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hash run failed");
                DigestResult::failed(path, &self.failure_slots(), &e.to_string())
            }
        }
    }

    /// Hash `path`, surfacing the error instead of folding it into the result.
    pub fn try_digest_file(&self, path: &Path) -> Result<DigestResult, HashError> {
        let algorithms = self.algorithms()?;
        debug!(path = %path.display(), algorithms = algorithms.len(), "hash run started");

        let file = File::open(path)
            .map_err(|e| HashError::from_io_error(e, "opening", Some(path.to_path_buf())))?;
        let (bytes_read, digests) = self.stream(file, &algorithms, Some(path))?;

        debug!(path = %path.display(), bytes = bytes_read, "hash run finished");
        Ok(DigestResult::from_digests(path, bytes_read, digests))
    }

    /// Hash any reader with the same fan-out (stdin, sockets, ...).
    pub fn digest_reader<R: Read>(&self, reader: R, label: &str) -> Result<DigestResult, HashError> {
        let algorithms = self.algorithms()?;
        let (bytes_read, digests) = self.stream(reader, &algorithms, None)?;
        Ok(DigestResult::from_digests(label, bytes_read, digests))
    }

    /// Hash in-memory content.
    pub fn digest_bytes(&self, data: &[u8], label: &str) -> Result<DigestResult, HashError> {
        self.digest_reader(data, label)
    }

    fn stream<R: Read>(
        &self,
        mut reader: R,
        algorithms: &[Algorithm],
        path: Option<&Path>,
    ) -> Result<(u64, Vec<(Algorithm, String)>), HashError> {
        let mut hashers: Vec<(Algorithm, Box<dyn Hasher>)> = algorithms
            .iter()
            .map(|alg| (*alg, HashRegistry::new_accumulator(*alg)))
            .collect();

        let mut buffer = vec![0u8; self.block_size];
        let mut bytes_read = 0u64;

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(HashError::from_io_error(e, "reading", path.map(Path::to_path_buf)))
                }
            };

            // Same block, same order, into every accumulator
            for (_, hasher) in hashers.iter_mut() {
                hasher.update(&buffer[..n]);
            }
            bytes_read += n as u64;
        }

        let digests = hashers
            .into_iter()
            .map(|(alg, hasher)| (alg, hasher.finalize_hex()))
            .collect();
        Ok((bytes_read, digests))
    }

    /// Start hashing `path` on the runtime's blocking pool.
    ///
    /// Must be called from within a tokio runtime. Each call gets its own
    /// accumulators, so any number of runs may be outstanding at once.
    pub fn spawn(&self, path: impl Into<PathBuf>) -> HashTask {
        let path = path.into();
        let engine = self.clone();
        let task_path = path.clone();
        let handle = tokio::task::spawn_blocking(move || engine.digest_file(&task_path));
        HashTask {
            path,
            slots: self.failure_slots(),
            handle,
        }
    }

    /// Hash `path` without blocking the caller's task.
    pub async fn hash_file(&self, path: impl Into<PathBuf>) -> DigestResult {
        self.spawn(path).join().await
    }

    /// Hash `path` and hand the result to `on_complete` once it is final.
    pub fn hash_file_with<F>(&self, path: impl Into<PathBuf>, on_complete: F)
    where
        F: FnOnce(DigestResult) + Send + 'static,
    {
        let task = self.spawn(path);
        tokio::spawn(async move {
            on_complete(task.join().await);
        });
    }
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an outstanding hash run.
pub struct HashTask {
    path: PathBuf,
    slots: Vec<Algorithm>,
    handle: tokio::task::JoinHandle<DigestResult>,
}

impl HashTask {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run. A panicked or cancelled worker becomes a failed result.
    pub async fn join(self) -> DigestResult {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                let err = HashError::WorkerLost {
                    path: self.path.clone(),
                    reason: e.to_string(),
                };
                warn!(path = %self.path.display(), error = %err, "hash worker lost");
                DigestResult::failed(self.path, &self.slots, &err.to_string())
            }
        }
    }
}
