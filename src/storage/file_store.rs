use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::{fs, sync::Mutex};

use super::key_value::{KeyValueStore, StorageError};

/// Key-value store persisted as a single JSON object on disk.
///
/// Every read and every change starts from what is on disk; other
/// processes may write the same file.
pub struct FileKeyValueStore {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StorageError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No saved state yet at {}", self.path.display());
                return Ok(Map::new());
            }
            Err(error) => return Err(error.into()),
        };

        match serde_json::from_slice(&contents)? {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::Corrupted(self.path.display().to_string())),
        }
    }

    async fn persist(&self, map: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, serde_json::to_vec_pretty(map)?).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn mutate(
        &self,
        change: impl FnOnce(&mut Map<String, Value>) + Send,
    ) -> Result<(), StorageError> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.load().await?;

        change(&mut map);
        self.persist(&map).await
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.load().await?;

        Ok(map.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.mutate(|map| {
            map.insert(key.to_owned(), value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|map| {
            map.remove(key);
        })
        .await
    }
}
