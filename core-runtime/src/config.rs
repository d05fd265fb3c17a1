//! # Core Configuration Module
//!
//! Builder-based configuration for the player core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds every host capability the core needs plus the
//! tunable [`PlayerSettings`]. The builder fails fast: a missing capability
//! is reported with an actionable [`Error::CapabilityMissing`] before any
//! component starts.
//!
//! ## Required Dependencies
//!
//! - `WidgetLoader` - mounts the embedded player widget (always required)
//! - `SettingsStore` - persists the consent record and the volume
//!
//! ## Optional Dependencies
//!
//! - `Clock` - timestamps for persisted consent records (default: system clock)
//!
//! When the `desktop-shims` feature is enabled and no `SettingsStore` is
//! injected, a SQLite store is opened at [`CoreConfigBuilder::settings_path`]
//! or, without a path, a process-local in-memory store is used.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, NavigationPolicy};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .widget_loader(Arc::new(BrowserWidgetLoader::new()))
//!     .settings_store(Arc::new(LocalStorageSettings::new()))
//!     .ready_timeout(Duration::from_secs(8))
//!     .navigation(NavigationPolicy::Wrap)
//!     .build()
//!     .await?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::widget::DEFAULT_PLAYER_ORIGIN;
use bridge_traits::{Clock, SettingsStore, SystemClock, WidgetLoader};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound accepted for the widget readiness timeout.
const MAX_READY_TIMEOUT_MS: u64 = 120_000;

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Preferences storage (consent record, volume)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Loader for the embedded player widget
    pub widget_loader: Arc<dyn WidgetLoader>,

    /// Time source for persisted timestamps
    pub clock: Arc<dyn Clock>,

    /// Player tuning
    pub player: PlayerSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field("widget_loader", &"WidgetLoader { ... }")
            .field("clock", &"Clock { ... }")
            .field("player", &self.player)
            .finish()
    }
}

/// What `next`/`previous` do at the ends of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    /// Stay on the first/last track.
    #[default]
    Clamp,
    /// Jump to the other end of the queue.
    Wrap,
}

/// Tunable behaviour of the playback session.
///
/// Durations are stored in milliseconds so the struct round-trips through
/// JSON host configuration; use the accessor methods for `Duration`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// How long a mounted widget may take to report readiness.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Minimum spacing between committed progress updates. 0 commits every sample.
    #[serde(default = "default_progress_throttle_ms")]
    pub progress_throttle_ms: u64,

    /// Delay before the consent manager opens on a first visit.
    #[serde(default = "default_consent_prompt_delay_ms")]
    pub consent_prompt_delay_ms: u64,

    /// Volume used until a persisted value has been read (0-100).
    #[serde(default = "default_volume")]
    pub default_volume: u8,

    #[serde(default)]
    pub navigation: NavigationPolicy,

    /// Capacity of the event bus channel.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Origin of the embeddable player iframe.
    #[serde(default = "default_player_origin")]
    pub player_origin: String,
}

fn default_ready_timeout_ms() -> u64 {
    12_000
}

fn default_progress_throttle_ms() -> u64 {
    200
}

fn default_consent_prompt_delay_ms() -> u64 {
    800
}

fn default_volume() -> u8 {
    80
}

fn default_event_buffer_size() -> usize {
    crate::events::DEFAULT_EVENT_BUFFER_SIZE
}

fn default_player_origin() -> String {
    DEFAULT_PLAYER_ORIGIN.to_string()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout_ms(),
            progress_throttle_ms: default_progress_throttle_ms(),
            consent_prompt_delay_ms: default_consent_prompt_delay_ms(),
            default_volume: default_volume(),
            navigation: NavigationPolicy::default(),
            event_buffer_size: default_event_buffer_size(),
            player_origin: default_player_origin(),
        }
    }
}

impl PlayerSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn progress_throttle(&self) -> Duration {
        Duration::from_millis(self.progress_throttle_ms)
    }

    pub fn consent_prompt_delay(&self) -> Duration {
        Duration::from_millis(self.consent_prompt_delay_ms)
    }

    /// Validates ranges and returns an actionable error on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.ready_timeout_ms == 0 {
            return Err(Error::Config(
                "Widget ready timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.ready_timeout_ms > MAX_READY_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "Widget ready timeout exceeds maximum of {}ms",
                MAX_READY_TIMEOUT_MS
            )));
        }

        if self.progress_throttle_ms >= self.ready_timeout_ms {
            return Err(Error::Config(
                "Progress throttle must be shorter than the widget ready timeout".to_string(),
            ));
        }

        if self.default_volume > 100 {
            return Err(Error::Config(format!(
                "Default volume must be within 0-100, got {}",
                self.default_volume
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if !(self.player_origin.starts_with("https://") || self.player_origin.starts_with("http://"))
        {
            return Err(Error::Config(format!(
                "Player origin must be an http(s) URL, got '{}'",
                self.player_origin
            )));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.player.validate()
    }
}

fn widget_loader_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "WidgetLoader".to_string(),
        message: "WidgetLoader implementation is required to mount the embedded player. \
                 Browser: inject a loader that injects the widget script and binds the iframe. \
                 Tests: inject a fake loader."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for consent and volume persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
                 Web: inject a localStorage-based settings store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_settings_store(
    settings_path: Option<PathBuf>,
) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::{MemorySettingsStore, SqliteSettingsStore};

    let store: Arc<dyn SettingsStore> = match settings_path {
        Some(path) => Arc::new(SqliteSettingsStore::new(path).await.map_err(|e| {
            Error::SettingsUnavailable(e.to_string())
        })?),
        None => Arc::new(MemorySettingsStore::new()),
    };
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_settings_store(
    _settings_path: Option<PathBuf>,
) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    widget_loader: Option<Arc<dyn WidgetLoader>>,
    clock: Option<Arc<dyn Clock>>,
    player: PlayerSettings,
}

impl CoreConfigBuilder {
    /// Sets the settings store implementation.
    ///
    /// Takes precedence over [`settings_path`](Self::settings_path).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// File the default SQLite settings store is opened at.
    ///
    /// Only used with the `desktop-shims` feature and when no store was
    /// injected.
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Sets the widget loader implementation.
    pub fn widget_loader(mut self, loader: Arc<dyn WidgetLoader>) -> Self {
        self.widget_loader = Some(loader);
        self
    }

    /// Sets the time source. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replaces all player settings at once.
    pub fn player_settings(mut self, settings: PlayerSettings) -> Self {
        self.player = settings;
        self
    }

    /// How long a mounted widget may take to report readiness.
    ///
    /// Default: 12 s
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.player.ready_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Minimum spacing between committed progress updates.
    ///
    /// Default: 200 ms
    pub fn progress_throttle(mut self, throttle: Duration) -> Self {
        self.player.progress_throttle_ms = duration_to_millis(throttle);
        self
    }

    /// Delay before the consent manager opens for a visitor without a stored choice.
    ///
    /// Default: 800 ms
    pub fn consent_prompt_delay(mut self, delay: Duration) -> Self {
        self.player.consent_prompt_delay_ms = duration_to_millis(delay);
        self
    }

    /// Volume used until the persisted value is read.
    ///
    /// Default: 80
    pub fn default_volume(mut self, volume: u8) -> Self {
        self.player.default_volume = volume;
        self
    }

    /// Behaviour of `next`/`previous` at the ends of the queue.
    ///
    /// Default: [`NavigationPolicy::Clamp`]
    pub fn navigation(mut self, policy: NavigationPolicy) -> Self {
        self.player.navigation = policy;
        self
    }

    /// Capacity of the event bus channel.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.player.event_buffer_size = size;
        self
    }

    /// Origin of the embeddable player.
    pub fn player_origin(mut self, origin: impl Into<String>) -> Self {
        self.player.player_origin = origin.into();
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Async because the default SQLite settings store opens its pool on the
    /// caller's runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no `WidgetLoader` was injected, or no
    ///   `SettingsStore` was injected and `desktop-shims` is disabled
    /// - [`Error::Config`] when a player setting is out of range
    pub async fn build(self) -> Result<CoreConfig> {
        let widget_loader = self.widget_loader.ok_or_else(widget_loader_missing_error)?;

        // Settings are checked before any store is opened.
        self.player.validate()?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path).await?,
        };

        let config = CoreConfig {
            settings_store,
            widget_loader,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            player: self.player,
        };

        config.validate()?;
        Ok(config)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
