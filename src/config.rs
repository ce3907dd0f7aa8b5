// Runtime configuration
// Loaded from TOML; every field has a default so an empty file is valid

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::hash::{Algorithm, HashRegistry, DEFAULT_BLOCK_SIZE};

pub const DEFAULT_SIZE_LIMIT: u64 = 1_048_576;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}\nSuggestion: Check that the path exists and is readable", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}\nSuggestion: Check the TOML syntax and field names", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeltaConfig {
    /// Largest buffer either side may have for a full byte comparison
    pub size_limit_bytes: u64,
    /// Read block size for the streaming hash engine
    pub block_size_bytes: usize,
    /// Leave SHAKE out of the default algorithm set
    pub exclude_variable_length_algorithms: bool,
    /// Explicit algorithm names; `None` means every enabled algorithm
    pub algorithms: Option<Vec<String>>,
    /// Digest whose equality skips the byte comparison
    pub short_circuit_algorithm: String,
    /// Comparison worker count; `None` means one per logical CPU
    pub workers: Option<usize>,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            size_limit_bytes: DEFAULT_SIZE_LIMIT,
            block_size_bytes: DEFAULT_BLOCK_SIZE,
            exclude_variable_length_algorithms: true,
            algorithms: None,
            short_circuit_algorithm: Algorithm::Sha256.name().to_string(),
            workers: None,
        }
    }
}

impl DeltaConfig {
    /// `<config_dir>/delta/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("delta").join("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DeltaConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the default location if it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "block_size_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.size_limit_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "size_limit_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        self.short_circuit_algorithm()?;
        if let Some(names) = &self.algorithms {
            HashRegistry::resolve(names).map_err(|e| ConfigError::Invalid {
                field: "algorithms",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn short_circuit_algorithm(&self) -> Result<Algorithm, ConfigError> {
        self.short_circuit_algorithm
            .parse()
            .map_err(|e: crate::hash::HashError| ConfigError::Invalid {
                field: "short_circuit_algorithm",
                reason: e.to_string(),
            })
    }

    /// Override the size limit (e.g. from the command line), re-validating.
    pub fn with_size_limit(mut self, size_limit_bytes: u64) -> Result<Self, ConfigError> {
        self.size_limit_bytes = size_limit_bytes;
        self.validate()?;
        Ok(self)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}
