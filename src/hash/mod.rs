// Hash module
// Digest registry plus the single-pass multi-algorithm streaming engine

pub mod engine;
pub mod error;
pub mod registry;

pub use engine::{DigestResult, DigestValue, HashEngine, HashTask, DEFAULT_BLOCK_SIZE};
pub use error::HashError;
pub use registry::{Algorithm, AlgorithmInfo, HashRegistry, Hasher};
