// Loaded file content
// Buffers are read-only once loaded and shared between comparison tasks

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use crate::hash::HashError;

/// Which side of a file pair a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum FileSlot {
    First,
    Second,
}

impl FileSlot {
    pub fn index(self) -> usize {
        match self {
            FileSlot::First => 0,
            FileSlot::Second => 1,
        }
    }

    pub fn other(self) -> FileSlot {
        match self {
            FileSlot::First => FileSlot::Second,
            FileSlot::Second => FileSlot::First,
        }
    }
}

impl fmt::Display for FileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSlot::First => write!(f, "File 1"),
            FileSlot::Second => write!(f, "File 2"),
        }
    }
}

/// Full content of a file plus where it came from.
#[derive(Clone)]
pub struct FileBuffer {
    path: PathBuf,
    data: Arc<[u8]>,
}

impl FileBuffer {
    pub fn new(path: impl Into<PathBuf>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }

    /// Read the whole file without blocking the runtime.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HashError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| HashError::from_io_error(e, "loading", Some(path.to_path_buf())))?;
        Ok(Self::new(path, data))
    }

    /// Size of the file on disk, without reading it.
    pub async fn file_len(path: impl AsRef<Path>) -> Result<u64, HashError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| HashError::from_io_error(e, "inspecting", Some(path.to_path_buf())))?;
        Ok(metadata.len())
    }

    /// Load the file only if it holds at most `limit` bytes.
    ///
    /// Returns `Ok(None)` for a larger file. At most `limit + 1` bytes are
    /// ever read, so a file that grows after the size check is still bounded.
    pub async fn load_within(path: impl AsRef<Path>, limit: u64) -> Result<Option<Self>, HashError> {
        let path = path.as_ref();
        if Self::file_len(path).await? > limit {
            return Ok(None);
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| HashError::from_io_error(e, "loading", Some(path.to_path_buf())))?;
        let mut data = Vec::new();
        file.take(limit.saturating_add(1))
            .read_to_end(&mut data)
            .await
            .map_err(|e| HashError::from_io_error(e, "loading", Some(path.to_path_buf())))?;

        if data.len() as u64 > limit {
            return Ok(None);
        }
        Ok(Some(Self::new(path, data)))
    }

    pub fn load_blocking(path: impl AsRef<Path>) -> Result<Self, HashError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| HashError::from_io_error(e, "loading", Some(path.to_path_buf())))?;
        Ok(Self::new(path, data))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes for handing to worker tasks.
    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for FileBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBuffer")
            .field("path", &self.path)
            .field("len", &self.data.len())
            .finish()
    }
}
