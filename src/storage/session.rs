use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::outage::OutageNotice;

use super::key_value::{KeyValueStore, StorageError};

const IDENTIFICATION_KEY: &str = "identification";
const NOTICES_KEY: &str = "notices";
const NOTIFICATIONS_ENABLED_KEY: &str = "notifications_enabled";

/// Typed view over the key-value store holding what survives a restart:
/// the last identification queried, its notices and the reminder toggle.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn identification(&self) -> Result<Option<String>, StorageError> {
        self.read(IDENTIFICATION_KEY).await
    }

    pub async fn save_identification(&self, identification: &str) -> Result<(), StorageError> {
        self.write(IDENTIFICATION_KEY, &identification).await
    }

    pub async fn notices(&self) -> Result<Option<Vec<OutageNotice>>, StorageError> {
        self.read(NOTICES_KEY).await
    }

    pub async fn save_notices(&self, notices: &[OutageNotice]) -> Result<(), StorageError> {
        self.write(NOTICES_KEY, &notices).await
    }

    pub async fn clear_notices(&self) -> Result<(), StorageError> {
        self.store.remove(NOTICES_KEY).await
    }

    pub async fn notifications_enabled(&self) -> Result<bool, StorageError> {
        Ok(self
            .read(NOTIFICATIONS_ENABLED_KEY)
            .await?
            .unwrap_or(false))
    }

    pub async fn save_notifications_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.write(NOTIFICATIONS_ENABLED_KEY, &enabled).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        self.store.set(key, value).await
    }
}
