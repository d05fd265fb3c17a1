//! Settings Storage Abstraction
//!
//! Provides the platform-agnostic key-value trait used for the consent record
//! and the persisted player volume.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences storage:
/// - Web: `localStorage`
/// - Desktop: SQLite file next to the application data
/// - Tests / private sessions: in-memory map
///
/// Values are typed: reading a key with a different accessor than the one it
/// was written with is an error, not a silent coercion.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_volume(store: &dyn SettingsStore, volume: u8) -> Result<()> {
///     store.set_i64("soundstage.player.volume", volume as i64).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// List all setting keys, sorted
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings
    async fn clear_all(&self) -> Result<()>;
}
