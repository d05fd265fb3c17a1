//! Workspace facade crate.
//!
//! Exposes the feature flags that map onto the individual workspace crates
//! (`core-service`, `core-playback`, `core-consent`). Host applications can
//! depend on `soundstage-workspace` and enable the documented features
//! instead of wiring each crate individually.
//!
//! - `desktop-shims` (default): SQLite-backed settings from `bridge-desktop`.
//! - `headless`: no default host adapters; every bridge must be injected.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_consent as consent;
#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_playback as playback;
#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service::{PlayerService, ServiceError};
#[cfg(feature = "desktop-shims")]
pub use core_service::bootstrap_desktop;
