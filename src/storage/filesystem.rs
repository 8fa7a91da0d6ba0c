use crate::storage::{StorageBackend, StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Filesystem-based storage backend
///
/// Keeps uploaded slice files in a directory on the local filesystem, with a
/// configurable root path. Defaults to "./tmp".
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root_path: PathBuf,
}

impl FilesystemStorage {
    /// Create a new filesystem storage backend with the given root path
    pub fn new<P: AsRef<Path>>(root_path: P) -> StorageResult<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        // Validate that the path can be created if it doesn't exist
        if !root_path.exists() {
            std::fs::create_dir_all(&root_path).map_err(|e| {
                StorageError::Config(format!(
                    "Failed to create storage root directory '{}': {}",
                    root_path.display(),
                    e
                ))
            })?;
        }

        // Do NOT canonicalize the path. On macOS, canonicalization may resolve
        // symlinks like /var -> /private/var which breaks tests that compare
        // against the exact provided parent directory.
        Ok(Self { root_path })
    }

    /// Create a new filesystem storage backend with the default "./tmp" path
    pub fn with_default_path() -> StorageResult<Self> {
        Self::new("./tmp")
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    fn base_path(&self) -> &Path {
        &self.root_path
    }
}
