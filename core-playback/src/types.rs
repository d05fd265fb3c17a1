//! # Playback Types
//!
//! Value types shared by the store, engine, actions and UI surfaces.

use bridge_traits::WidgetSound;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Tracks
// ============================================================================

/// Opaque track identifier. Wraps the widget's numeric sound id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u64);

impl TrackId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One playable item as reported by the widget.
///
/// Never edited in place: a new current sound replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackTrack {
    pub id: TrackId,
    pub title: String,
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
    /// URL of the waveform JSON (`{width, height, samples}`).
    pub waveform_url: Option<String>,
    /// Public page of the sound; the "open externally" fallback.
    pub permalink_url: Option<String>,
    pub duration_ms: Option<u64>,
}

impl PlaybackTrack {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(id),
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
}

impl From<WidgetSound> for PlaybackTrack {
    fn from(sound: WidgetSound) -> Self {
        Self {
            id: TrackId::new(sound.id),
            title: sound.title,
            artist: sound.artist,
            artwork_url: sound.artwork_url,
            waveform_url: sound.waveform_url,
            permalink_url: sound.permalink_url,
            // Some widgets report 0 for sounds they have not loaded yet.
            duration_ms: sound.duration_ms.filter(|duration| *duration > 0),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle of the underlying widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// No widget mounted.
    #[default]
    Idle,
    /// Widget mounted (or script loading), waiting for readiness.
    Loading,
    /// Widget ready; commands run immediately.
    Ready,
    /// Script load, readiness or playback failed.
    Error,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Ready => "ready",
            PlaybackStatus::Error => "error",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A playback command, executed immediately when the widget is ready or kept
/// as the single pending action until it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlaybackCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    /// Jump to a queue position.
    Select { index: usize },
    /// Seek to an absolute position.
    Seek { position_ms: u64 },
}

impl PlaybackCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackCommand::Play => "play",
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::Toggle => "toggle",
            PlaybackCommand::Next => "next",
            PlaybackCommand::Previous => "previous",
            PlaybackCommand::Select { .. } => "select",
            PlaybackCommand::Seek { .. } => "seek",
        }
    }

    /// Commands that would start audio and therefore need media consent.
    pub fn starts_playback(&self) -> bool {
        matches!(
            self,
            PlaybackCommand::Play
                | PlaybackCommand::Toggle
                | PlaybackCommand::Next
                | PlaybackCommand::Previous
                | PlaybackCommand::Select { .. }
        )
    }
}

/// What happened to an action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Sent to the ready widget.
    Executed,
    /// Stored as the pending action until the widget is ready.
    Queued,
    /// Media consent is missing; the consent manager was opened and the
    /// command kept pending.
    ConsentRequested,
    /// Nothing to do (out-of-range index, unknown duration, already at the end).
    Ignored,
    /// The widget rejected the command; the store carries the error.
    Failed,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything a UI surface may read. Never carries the widget handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub media_allowed: bool,
    /// Set once the user has triggered playback at least once.
    pub has_started: bool,
    pub is_playing: bool,
    pub track: Option<PlaybackTrack>,
    pub queue: Vec<PlaybackTrack>,
    /// Position of `track` in `queue`, when it is part of it.
    pub current_index: Option<usize>,
    pub position_ms: u64,
    /// Known length of the current track; kept across progress samples
    /// that carry none.
    pub duration_ms: Option<u64>,
    /// 0-100.
    pub volume: u8,
    /// Restored by unmute.
    pub last_non_zero_volume: u8,
    /// The persisted volume has been read.
    pub volume_hydrated: bool,
    /// The widget received the stored volume since it became ready.
    pub widget_volume_hydrated: bool,
    /// Human-readable failure description.
    pub error: Option<String>,
    pub has_pending_action: bool,
}

impl PlaybackSnapshot {
    pub(crate) fn initial(default_volume: u8) -> Self {
        let volume = default_volume.min(100);
        Self {
            status: PlaybackStatus::Idle,
            media_allowed: false,
            has_started: false,
            is_playing: false,
            track: None,
            queue: Vec::new(),
            current_index: None,
            position_ms: 0,
            duration_ms: None,
            volume,
            last_non_zero_volume: if volume > 0 { volume } else { 100 },
            volume_hydrated: false,
            widget_volume_hydrated: false,
            error: None,
            has_pending_action: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == PlaybackStatus::Ready
    }

    pub fn is_muted(&self) -> bool {
        self.volume == 0
    }

    /// `position / duration` in `[0, 1]`, or 0 when the duration is unknown.
    pub fn progress_ratio(&self) -> f64 {
        match self.duration_ms {
            Some(duration) if duration > 0 => {
                (self.position_ms as f64 / duration as f64).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}
