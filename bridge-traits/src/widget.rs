//! Embedded player widget bridge.
//!
//! The actual playback is performed by a third-party, iframe-hosted widget
//! whose client library is injected at runtime. The core never talks to it
//! directly: the host implements [`WidgetLoader`] to load the library and
//! mount one instance, and hands back a [`PlaybackWidget`] exposing the
//! widget's imperative methods. Everything the widget reports (readiness,
//! play/pause, progress, errors) flows back through the
//! [`WidgetEventSender`] supplied at mount time, in the order the widget
//! emitted it.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default origin of the embeddable player.
pub const DEFAULT_PLAYER_ORIGIN: &str = "https://w.soundcloud.com/player/";

/// One sound as described by the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSound {
    pub id: u64,
    pub title: String,
    /// Uploader display name.
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
    pub waveform_url: Option<String>,
    pub permalink_url: Option<String>,
    /// Full length in milliseconds, when the widget knows it.
    pub duration_ms: Option<u64>,
}

impl WidgetSound {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: None,
            artwork_url: None,
            waveform_url: None,
            permalink_url: None,
            duration_ms: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_permalink(mut self, url: impl Into<String>) -> Self {
        self.permalink_url = Some(url.into());
        self
    }

    pub fn with_waveform_url(mut self, url: impl Into<String>) -> Self {
        self.waveform_url = Some(url.into());
        self
    }

    pub fn with_artwork_url(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }
}

/// What the hosting element embeds: a track or playlist URL plus the visual
/// options passed to the iframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSource {
    /// Public URL of the track or playlist.
    pub url: String,
    pub auto_play: bool,
    pub show_artwork: bool,
    pub visual: bool,
    /// Accent colour as a hex string without `#`.
    pub color: Option<String>,
}

impl WidgetSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auto_play: false,
            show_artwork: false,
            visual: false,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into().trim_start_matches('#').to_string());
        self
    }

    /// Iframe `src` for this source under the given player origin.
    pub fn embed_src(&self, player_origin: &str) -> String {
        let mut src = format!(
            "{}?url={}&auto_play={}&show_artwork={}&visual={}&hide_related=true&show_comments=false",
            player_origin,
            urlencoding::encode(&self.url),
            self.auto_play,
            self.show_artwork,
            self.visual,
        );
        if let Some(color) = &self.color {
            src.push_str("&color=");
            src.push_str(&urlencoding::encode(color));
        }
        src
    }
}

/// Events the widget emits after being bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WidgetEvent {
    Ready,
    Play,
    Pause,
    Finish,
    PlayProgress {
        position_ms: u64,
        /// Present when the progress payload carries the sound length.
        duration_ms: Option<u64>,
    },
    Error {
        message: String,
    },
}

impl WidgetEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetEvent::Ready => "ready",
            WidgetEvent::Play => "play",
            WidgetEvent::Pause => "pause",
            WidgetEvent::Finish => "finish",
            WidgetEvent::PlayProgress { .. } => "play_progress",
            WidgetEvent::Error { .. } => "error",
        }
    }
}

/// Channel end the host pushes widget events into.
pub type WidgetEventSender = mpsc::UnboundedSender<WidgetEvent>;

/// Identity of one mounted widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetInstanceId(Uuid);

impl WidgetInstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WidgetInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Imperative surface of one mounted widget.
#[async_trait::async_trait]
pub trait PlaybackWidget: Send + Sync {
    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn toggle(&self) -> Result<()>;

    /// Jump to the sound at `index` in the widget's playlist and start it.
    async fn skip(&self, index: usize) -> Result<()>;

    async fn seek_to(&self, position_ms: u64) -> Result<()>;

    /// Volume on the widget's 0-100 scale.
    async fn set_volume(&self, volume: u8) -> Result<()>;

    async fn current_sound(&self) -> Result<Option<WidgetSound>>;

    async fn current_sound_index(&self) -> Result<Option<usize>>;

    async fn position(&self) -> Result<u64>;

    /// Every sound of the embedded playlist, in playlist order.
    async fn sounds(&self) -> Result<Vec<WidgetSound>>;

    /// Detach all event bindings. Must be safe to call more than once.
    fn unbind_all(&self);
}

/// Loads the widget client library and mounts instances.
#[async_trait::async_trait]
pub trait WidgetLoader: Send + Sync {
    /// Make sure the widget's client library is available. Hosts typically
    /// inject a script tag once and cache the outcome.
    ///
    /// Network blocks and content blockers surface here as
    /// [`BridgeError::ScriptUnavailable`](crate::error::BridgeError::ScriptUnavailable).
    async fn load_script(&self) -> Result<()>;

    /// Create one widget bound to `source`, forwarding its events to `events`.
    async fn mount(
        &self,
        source: &WidgetSource,
        events: WidgetEventSender,
    ) -> Result<Arc<dyn PlaybackWidget>>;
}
