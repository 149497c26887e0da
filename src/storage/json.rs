use std::{
    fs::{self, OpenOptions, rename, write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::{Value, to_string_pretty};
use tracing::debug;
use uuid::Uuid;

use crate::storage::{KeyValueStore, StorageError};

/// Number of backups kept per key.
const MAX_BACKUPS: usize = 5;

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes land in a unique temp file first and are renamed over the target
/// while holding an exclusive lock on `<key>.lock`. The previous file is copied
/// into `<dir>/backups` before it is replaced.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_for(&self, key: &str) -> Result<KeyFile, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(KeyFile {
            key: key.to_string(),
            path: self.dir.join(format!("{key}.json")),
            lock_path: self.dir.join(format!("{key}.lock")),
            backups_dir: self.dir.join("backups"),
        })
    }
}

#[async_trait]
impl KeyValueStore for JsonDirStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let file = self.file_for(key)?;
        tokio::task::spawn_blocking(move || file.read())
            .await
            .map_err(|e| StorageError::Worker(e.to_string()))?
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let file = self.file_for(key)?;
        tokio::task::spawn_blocking(move || file.write(&value))
            .await
            .map_err(|e| StorageError::Worker(e.to_string()))?
    }
}

/// Blocking file operations for a single key.
struct KeyFile {
    key: String,
    path: PathBuf,
    lock_path: PathBuf,
    backups_dir: PathBuf,
}

impl KeyFile {
    fn read(&self) -> Result<Option<Value>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| StorageError::ParseFailed {
                    path: self.path.clone(),
                    source: e,
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn write(&self, value: &Value) -> Result<(), StorageError> {
        let json =
            to_string_pretty(value).map_err(|e| StorageError::SerializeFailed { source: e })?;

        let unique_temp = format!("{}.tmp.{}", self.path.display(), Uuid::new_v4());
        let temp_path = PathBuf::from(&unique_temp);
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        let result = self.replace_with(&temp_path);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    /// Moves `temp_path` over the key file under the lock, backing up the
    /// previous contents first.
    fn replace_with(&self, temp_path: &Path) -> Result<(), StorageError> {
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| StorageError::LockFailed {
                path: self.lock_path.clone(),
                source: e,
            })?;
        FileExt::lock_exclusive(&lock_file).map_err(|e| StorageError::LockFailed {
            path: self.lock_path.clone(),
            source: e,
        })?;

        self.create_backup()?;
        self.cleanup_old_backups()?;

        rename(temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        FileExt::unlock(&lock_file).map_err(|e| StorageError::LockFailed {
            path: self.lock_path.clone(),
            source: e,
        })?;

        debug!(key = %self.key, path = %self.path.display(), "Wrote key to disk");
        Ok(())
    }

    fn create_backup(&self) -> Result<u64, StorageError> {
        let file_exists = fs::exists(&self.path).map_err(|e| StorageError::BackupFailed {
            path: self.path.clone(),
            source: e,
        })?;
        if !file_exists {
            return Ok(0);
        }

        fs::create_dir_all(&self.backups_dir).map_err(|e| StorageError::BackupFailed {
            path: self.backups_dir.clone(),
            source: e,
        })?;

        let backup_path = self.backup_path();
        fs::copy(&self.path, &backup_path).map_err(|e| StorageError::BackupFailed {
            path: backup_path,
            source: e,
        })
    }

    fn cleanup_old_backups(&self) -> Result<(), StorageError> {
        let backup_dir = &self.backups_dir;
        let backup_dir_exists = fs::exists(backup_dir).map_err(|e| StorageError::CleanupFailed {
            dir: backup_dir.clone(),
            source: e,
        })?;
        if !backup_dir_exists {
            return Ok(());
        }

        let prefix = format!("{}-", self.key);
        let mut file_entries = fs::read_dir(backup_dir)
            .map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();

        file_entries.sort();

        let number_of_files_to_delete = file_entries.len().saturating_sub(MAX_BACKUPS);
        for file_path in &file_entries[..number_of_files_to_delete] {
            fs::remove_file(file_path).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        }

        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let stamp = jiff::Timestamp::now().as_nanosecond();
        self.backups_dir
            .join(format!("{}-{:024}.json", self.key, stamp))
    }
}
