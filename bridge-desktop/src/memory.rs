//! Process-local settings store.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    String(String),
    Bool(bool),
    I64(i64),
}

impl StoredValue {
    fn type_name(&self) -> &'static str {
        match self {
            StoredValue::String(_) => "string",
            StoredValue::Bool(_) => "bool",
            StoredValue::I64(_) => "i64",
        }
    }
}

/// In-memory `SettingsStore`. Same typing rules as the SQLite store, nothing
/// survives the process.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<BTreeMap<String, StoredValue>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mismatch(key: &str, expected: &str, actual: &StoredValue) -> BridgeError {
        BridgeError::Storage(format!(
            "Type mismatch for {}: expected {}, got {}",
            key,
            expected,
            actual.type_name()
        ))
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), StoredValue::String(value.to_string()));
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.values.read().await.get(key) {
            Some(StoredValue::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(Self::mismatch(key, "string", other)),
            None => Ok(None),
        }
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), StoredValue::Bool(value));
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.values.read().await.get(key) {
            Some(StoredValue::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(Self::mismatch(key, "bool", other)),
            None => Ok(None),
        }
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), StoredValue::I64(value));
        Ok(())
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.values.read().await.get(key) {
            Some(StoredValue::I64(value)) => Ok(Some(*value)),
            Some(other) => Err(Self::mismatch(key, "i64", other)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.read().await.contains_key(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.values.read().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.values.write().await.clear();
        Ok(())
    }
}
