//! # Host Bridge Traits
//!
//! Capability traits the host platform must implement for the Soundstage
//! playback core.
//!
//! ## Overview
//!
//! This crate defines the contract between the core crates and whatever
//! environment is hosting them (a browser shell, a desktop webview, a test
//! harness). Each trait is a capability the core needs but cannot provide
//! itself.
//!
//! ## Traits
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!   (consent record, last volume)
//!
//! ### Embedded player
//! - [`WidgetLoader`](widget::WidgetLoader) - Loads the third-party widget
//!   client library and mounts an instance
//! - [`PlaybackWidget`](widget::PlaybackWidget) - Imperative surface of one
//!   mounted widget; events flow back through a channel of
//!   [`WidgetEvent`](widget::WidgetEvent)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let loader = builder.widget_loader
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "WidgetLoader".to_string(),
//!         message: "Inject the host's embed widget loader.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert host-specific failures into it and keep messages
//! actionable, because widget failures end up verbatim in the player's
//! error hint.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across Tokio tasks behind an `Arc`.

pub mod error;
pub mod storage;
pub mod time;
pub mod widget;

pub use error::BridgeError;

// Re-export commonly used types
pub use storage::SettingsStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
pub use widget::{
    PlaybackWidget, WidgetEvent, WidgetEventSender, WidgetInstanceId, WidgetLoader, WidgetSound,
    WidgetSource,
};
