//! File-backed key-value store
//!
//! One `<key>.json` file per key inside a data directory. Writes go to a
//! temp file in the same directory and are renamed into place, so readers
//! never see a partial value.

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Directory of JSON files
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    ///
    /// # Errors
    /// `StoreError::Io` if the directory cannot be created
    pub async fn open(dir: impl Into<PathBuf>, quota_bytes: Option<u64>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io_error(&dir, e))?;
        tracing::debug!(dir = %dir.display(), "opened local file store");
        Ok(Self { dir, quota_bytes })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{VALUE_EXTENSION}")))
    }

    /// Bytes used by every value file except `skip`
    async fn used_bytes_except(&self, skip: &Path) -> Result<u64, StoreError> {
        let mut total = 0;
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io_error(&self.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io_error(&self.dir, e))?
        {
            let path = entry.path();
            if path == skip || key_of(&path).is_none() {
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| StoreError::io_error(&path, e))?;
            total += meta.len();
        }
        Ok(total)
    }
}

fn key_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(&format!(".{VALUE_EXTENSION}"))
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(limit) = self.quota_bytes {
            let required = self.used_bytes_except(&path).await? + value.len() as u64;
            if required > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    limit,
                });
            }
        }

        let temp = path.with_extension(TEMP_EXTENSION);
        if let Err(e) = fs::write(&temp, value.as_bytes()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::io_error(temp, e));
        }
        fs::rename(&temp, &path)
            .await
            .map_err(|e| StoreError::io_error(&path, e))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io_error(&self.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io_error(&self.dir, e))?
        {
            if let Some(key) = key_of(&entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
