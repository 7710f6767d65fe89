use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{CrlStore, Result, StorageError};

/// Owner and group read-write
const FILE_MODE: u32 = 0o660;

/// Stores artifacts as files in a single directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.tmp"))
    }
}

#[async_trait]
impl CrlStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::Read {
                key: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Writes to a temporary sibling and renames it over the target, so a
    /// crash mid-write never leaves a truncated artifact.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let temp_path = self.temp_path_for(key);
        let write_error = |e: std::io::Error| StorageError::Write {
            key: path.display().to_string(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&self.dir).await.map_err(write_error)?;
        fs::write(&temp_path, data).await.map_err(write_error)?;
        set_mode(&temp_path).await.map_err(write_error)?;

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_error(e));
        }

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
