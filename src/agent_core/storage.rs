//! Key-value storage capability.
//!
//! Values are JSON so any serde type can be stored through the typed helpers.
//! Hosts back this with whatever they have (a settings file, a database, the
//! editor's global state); [`InMemoryStorage`] is the bundled implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use super::errors::AgentError;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AgentError>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AgentError>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AgentError>;
    async fn keys(&self) -> Result<Vec<String>, AgentError>;
}

/// Read `key` and deserialize it into `T`.
pub async fn get_typed<T>(storage: &dyn Storage, key: &str) -> Result<Option<T>, AgentError>
where
    T: DeserializeOwned,
{
    match storage.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize `value` and store it under `key`.
pub async fn set_typed<T>(storage: &dyn Storage, key: &str, value: &T) -> Result<(), AgentError>
where
    T: Serialize + Sync + ?Sized,
{
    storage.set(key, serde_json::to_value(value)?).await
}

// ─── InMemoryStorage ────────────────────────────────────────────────────────

/// Process-local storage. Keys are listed in sorted order.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AgentError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AgentError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, AgentError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
