// Digest registry
// Enumerates the supported algorithms and builds fresh accumulators per run

use std::fmt;
use std::str::FromStr;

use blake2::{Blake2b512, Blake2s256};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::digest::{ExtendableOutput, Update};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512, Shake128, Shake256};
use xxhash_rust::xxh3::Xxh3;

use super::error::HashError;

/// Stateful digest accumulator fed with successive blocks of one input.
pub trait Hasher: Send {
    /// Update the hasher with the next block of data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and return the raw digest bytes
    fn finalize(self: Box<Self>) -> Vec<u8>;

    /// Output size in bytes
    fn output_size(&self) -> usize;

    /// Finalize and hex-encode
    fn finalize_hex(self: Box<Self>) -> String {
        hex::encode(self.finalize())
    }
}

/// A supported digest algorithm.
///
/// Variants are declared in lexicographic order of their canonical names so
/// the derived `Ord` matches the order `HashRegistry::supported_algorithms` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Blake2b,
    Blake2s,
    Blake3,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Sha512,
    Shake128,
    Shake256,
    Xxh128,
    Xxh3,
}

/// Information about a hash algorithm
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlgorithmInfo {
    pub name: &'static str,
    pub output_bits: usize,
    pub cryptographic: bool,
    pub variable_length: bool,
}

impl Algorithm {
    pub const ALL: [Algorithm; 17] = [
        Algorithm::Blake2b,
        Algorithm::Blake2s,
        Algorithm::Blake3,
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha3_224,
        Algorithm::Sha3_256,
        Algorithm::Sha3_384,
        Algorithm::Sha3_512,
        Algorithm::Sha512,
        Algorithm::Shake128,
        Algorithm::Shake256,
        Algorithm::Xxh128,
        Algorithm::Xxh3,
    ];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Blake2b => "blake2b",
            Algorithm::Blake2s => "blake2s",
            Algorithm::Blake3 => "blake3",
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha3_224 => "sha3_224",
            Algorithm::Sha3_256 => "sha3_256",
            Algorithm::Sha3_384 => "sha3_384",
            Algorithm::Sha3_512 => "sha3_512",
            Algorithm::Sha512 => "sha512",
            Algorithm::Shake128 => "shake_128",
            Algorithm::Shake256 => "shake_256",
            Algorithm::Xxh128 => "xxh128",
            Algorithm::Xxh3 => "xxh3",
        }
    }

    /// Digest length in bytes. SHAKE variants use the fixed length we emit.
    pub fn output_size(self) -> usize {
        match self {
            Algorithm::Xxh3 => 8,
            Algorithm::Md5 | Algorithm::Xxh128 => 16,
            Algorithm::Sha1 => 20,
            Algorithm::Sha224 | Algorithm::Sha3_224 => 28,
            Algorithm::Blake2s
            | Algorithm::Blake3
            | Algorithm::Sha256
            | Algorithm::Sha3_256
            | Algorithm::Shake128 => 32,
            Algorithm::Sha384 | Algorithm::Sha3_384 => 48,
            Algorithm::Blake2b | Algorithm::Sha3_512 | Algorithm::Sha512 | Algorithm::Shake256 => 64,
        }
    }

    pub fn is_cryptographic(self) -> bool {
        !matches!(self, Algorithm::Xxh3 | Algorithm::Xxh128)
    }

    /// Extendable-output functions whose length is chosen by the caller.
    pub fn is_variable_length(self) -> bool {
        matches!(self, Algorithm::Shake128 | Algorithm::Shake256)
    }

    pub fn info(self) -> AlgorithmInfo {
        AlgorithmInfo {
            name: self.name(),
            output_bits: self.output_size() * 8,
            cryptographic: self.is_cryptographic(),
            variable_length: self.is_variable_length(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        let alg = match normalized.as_str() {
            "blake2b" | "blake2b_512" => Algorithm::Blake2b,
            "blake2s" | "blake2s_256" => Algorithm::Blake2s,
            "blake3" => Algorithm::Blake3,
            "md5" => Algorithm::Md5,
            "sha1" => Algorithm::Sha1,
            "sha224" | "sha_224" => Algorithm::Sha224,
            "sha256" | "sha_256" => Algorithm::Sha256,
            "sha384" | "sha_384" => Algorithm::Sha384,
            "sha512" | "sha_512" => Algorithm::Sha512,
            "sha3_224" => Algorithm::Sha3_224,
            "sha3_256" => Algorithm::Sha3_256,
            "sha3_384" => Algorithm::Sha3_384,
            "sha3_512" => Algorithm::Sha3_512,
            "shake_128" | "shake128" => Algorithm::Shake128,
            "shake_256" | "shake256" => Algorithm::Shake256,
            "xxh3" => Algorithm::Xxh3,
            "xxh128" => Algorithm::Xxh128,
            _ => {
                return Err(HashError::UnsupportedAlgorithm {
                    algorithm: s.to_string(),
                })
            }
        };
        Ok(alg)
    }
}

impl serde::Serialize for Algorithm {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// Any fixed-output RustCrypto digest
struct DigestWrapper<D>(D);

impl<D> Hasher for DigestWrapper<D>
where
    D: Digest + Send,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }

    fn output_size(&self) -> usize {
        <D as Digest>::output_size()
    }
}

// SHAKE emits a caller-chosen length; we fix it per variant
struct ShakeWrapper<X> {
    inner: X,
    output_len: usize,
}

impl<X> Hasher for ShakeWrapper<X>
where
    X: Update + ExtendableOutput + Send,
{
    fn update(&mut self, data: &[u8]) {
        Update::update(&mut self.inner, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        let mut out = vec![0u8; self.output_len];
        self.inner.finalize_xof_into(&mut out);
        out
    }

    fn output_size(&self) -> usize {
        self.output_len
    }
}

struct Blake3Wrapper(blake3::Hasher);

impl Hasher for Blake3Wrapper {
    fn update(&mut self, data: &[u8]) {
        // Blocks are small; update_rayon only pays off on multi-megabyte inputs.
        if data.len() >= 1024 * 1024 {
            self.0.update_rayon(data);
        } else {
            self.0.update(data);
        }
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }

    fn output_size(&self) -> usize {
        32
    }
}

// XXH3 family; hex output uses the canonical big-endian form
struct Xxh3Wrapper {
    state: Xxh3,
    wide: bool,
}

impl Hasher for Xxh3Wrapper {
    fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        if self.wide {
            self.state.digest128().to_be_bytes().to_vec()
        } else {
            self.state.digest().to_be_bytes().to_vec()
        }
    }

    fn output_size(&self) -> usize {
        if self.wide {
            16
        } else {
            8
        }
    }
}

/// Registry for hash algorithms
pub struct HashRegistry;

impl HashRegistry {
    /// Algorithms available for a run, sorted by canonical name.
    pub fn supported_algorithms(exclude_variable_length: bool) -> Vec<Algorithm> {
        let mut algorithms: Vec<Algorithm> = Algorithm::ALL
            .iter()
            .copied()
            .filter(|alg| !(exclude_variable_length && alg.is_variable_length()))
            .collect();
        algorithms.sort_by_key(|alg| alg.name());
        algorithms
    }

    /// Fresh accumulator for `algorithm`. Instances never share state.
    pub fn new_accumulator(algorithm: Algorithm) -> Box<dyn Hasher> {
        match algorithm {
            Algorithm::Blake2b => Box::new(DigestWrapper(Blake2b512::new())),
            Algorithm::Blake2s => Box::new(DigestWrapper(Blake2s256::new())),
            Algorithm::Blake3 => Box::new(Blake3Wrapper(blake3::Hasher::new())),
            Algorithm::Md5 => Box::new(DigestWrapper(Md5::new())),
            Algorithm::Sha1 => Box::new(DigestWrapper(Sha1::new())),
            Algorithm::Sha224 => Box::new(DigestWrapper(Sha224::new())),
            Algorithm::Sha256 => Box::new(DigestWrapper(Sha256::new())),
            Algorithm::Sha384 => Box::new(DigestWrapper(Sha384::new())),
            Algorithm::Sha3_224 => Box::new(DigestWrapper(Sha3_224::new())),
            Algorithm::Sha3_256 => Box::new(DigestWrapper(Sha3_256::new())),
            Algorithm::Sha3_384 => Box::new(DigestWrapper(Sha3_384::new())),
            Algorithm::Sha3_512 => Box::new(DigestWrapper(Sha3_512::new())),
            Algorithm::Sha512 => Box::new(DigestWrapper(Sha512::new())),
            Algorithm::Shake128 => Box::new(ShakeWrapper {
                inner: Shake128::default(),
                output_len: algorithm.output_size(),
            }),
            Algorithm::Shake256 => Box::new(ShakeWrapper {
                inner: Shake256::default(),
                output_len: algorithm.output_size(),
            }),
            Algorithm::Xxh128 => Box::new(Xxh3Wrapper {
                state: Xxh3::new(),
                wide: true,
            }),
            Algorithm::Xxh3 => Box::new(Xxh3Wrapper {
                state: Xxh3::new(),
                wide: false,
            }),
        }
    }

    /// Look up an accumulator by name, e.g. from configuration.
    pub fn get_hasher(name: &str) -> Result<Box<dyn Hasher>, HashError> {
        let algorithm: Algorithm = name.parse()?;
        Ok(Self::new_accumulator(algorithm))
    }

    /// Resolve a list of names, keeping registry order and dropping duplicates.
    /// An empty list is an error: a run with no accumulators cannot report failure.
    pub fn resolve(names: &[String]) -> Result<Vec<Algorithm>, HashError> {
        if names.is_empty() {
            return Err(HashError::NoAlgorithms);
        }
        let mut algorithms = names
            .iter()
            .map(|name| name.parse::<Algorithm>())
            .collect::<Result<Vec<_>, _>>()?;
        algorithms.sort_by_key(|alg| alg.name());
        algorithms.dedup();
        Ok(algorithms)
    }

    pub fn list_algorithms(exclude_variable_length: bool) -> Vec<AlgorithmInfo> {
        Self::supported_algorithms(exclude_variable_length)
            .into_iter()
            .map(Algorithm::info)
            .collect()
    }
}
