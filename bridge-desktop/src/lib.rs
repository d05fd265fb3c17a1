//! # Desktop Bridge Implementations
//!
//! Default `SettingsStore` implementations for hosts that do not bring their
//! own (desktop shells, CLI tooling, tests).
//!
//! - [`SqliteSettingsStore`]: persistent key-value store in a SQLite file
//! - [`MemorySettingsStore`]: process-local map, for tests and private
//!   sessions where nothing may be written to disk
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::SqliteSettingsStore;
//! use bridge_traits::SettingsStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SqliteSettingsStore::new("/tmp/soundstage/settings.db".into())
//!         .await
//!         .unwrap();
//!     store.set_i64("soundstage.player.volume", 60).await.unwrap();
//! }
//! ```

mod memory;
mod settings;

pub use memory::MemorySettingsStore;
pub use settings::SqliteSettingsStore;
