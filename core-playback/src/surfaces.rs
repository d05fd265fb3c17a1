//! # UI Surfaces
//!
//! Render-ready view models derived from a [`PlaybackSnapshot`]. Surfaces
//! (hero player, bottom bar, track list, waveform) build these on every
//! snapshot change and call [`PlaybackActions`](crate::PlaybackActions) for
//! input; none of them touches the widget.

use crate::commands::neighbour_index;
use crate::error::{PlaybackError, Result};
use crate::types::{PlaybackSnapshot, PlaybackStatus, TrackId};
use core_runtime::config::NavigationPolicy;
use serde::{Deserialize, Serialize};

/// Formats milliseconds as `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_time(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

// ============================================================================
// Controls (hero player and bottom bar)
// ============================================================================

/// Why the controls are unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ControlHint {
    ConsentRequired,
    Loading,
    Error(String),
}

impl ControlHint {
    pub fn text(&self) -> String {
        match self {
            ControlHint::ConsentRequired => PlaybackError::ConsentRequired.user_message(),
            ControlHint::Loading => "Loading player…".to_string(),
            ControlHint::Error(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlsView {
    /// Buttons are interactive only with a ready widget.
    pub enabled: bool,
    pub is_playing: bool,
    /// The bottom bar appears once playback has been started.
    pub show_bottom_bar: bool,
    pub hint: Option<ControlHint>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
    /// "Open externally" link; offered regardless of widget health.
    pub permalink_url: Option<String>,
    pub progress_ratio: f64,
    pub elapsed_label: String,
    pub duration_label: String,
    pub volume: u8,
    pub muted: bool,
    pub can_previous: bool,
    pub can_next: bool,
}

impl ControlsView {
    pub fn from_snapshot(snapshot: &PlaybackSnapshot, navigation: NavigationPolicy) -> Self {
        let enabled = snapshot.is_ready();
        let hint = if !snapshot.media_allowed {
            Some(ControlHint::ConsentRequired)
        } else {
            match snapshot.status {
                PlaybackStatus::Loading => Some(ControlHint::Loading),
                PlaybackStatus::Error => Some(ControlHint::Error(
                    snapshot
                        .error
                        .clone()
                        .unwrap_or_else(|| PlaybackError::WidgetUnavailable.user_message()),
                )),
                PlaybackStatus::Idle | PlaybackStatus::Ready => None,
            }
        };

        let track = snapshot.track.as_ref();
        let len = snapshot.queue.len();
        let has_neighbour = |forward| {
            neighbour_index(snapshot.current_index, len, forward, navigation).is_some()
        };

        Self {
            enabled,
            is_playing: snapshot.is_playing,
            show_bottom_bar: snapshot.has_started,
            hint,
            title: track.map(|t| t.title.clone()),
            artist: track.and_then(|t| t.artist.clone()),
            artwork_url: track.and_then(|t| t.artwork_url.clone()),
            permalink_url: track.and_then(|t| t.permalink_url.clone()),
            progress_ratio: snapshot.progress_ratio(),
            elapsed_label: format_time(snapshot.position_ms),
            duration_label: snapshot
                .duration_ms
                .map(format_time)
                .unwrap_or_else(|| "--:--".to_string()),
            volume: snapshot.volume,
            muted: snapshot.is_muted(),
            can_previous: enabled && has_neighbour(false),
            can_next: enabled && has_neighbour(true),
        }
    }
}

// ============================================================================
// Track list
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRow {
    pub index: usize,
    pub id: TrackId,
    pub title: String,
    pub artist: Option<String>,
    pub duration_label: Option<String>,
    pub is_current: bool,
    /// Current and audibly playing.
    pub is_playing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackListView {
    pub rows: Vec<TrackRow>,
}

impl TrackListView {
    pub fn from_snapshot(snapshot: &PlaybackSnapshot) -> Self {
        let rows = snapshot
            .queue
            .iter()
            .enumerate()
            .map(|(index, track)| {
                let is_current = snapshot.current_index == Some(index);
                TrackRow {
                    index,
                    id: track.id,
                    title: track.title.clone(),
                    artist: track.artist.clone(),
                    duration_label: track.duration_ms.map(format_time),
                    is_current,
                    is_playing: is_current && snapshot.is_playing,
                }
            })
            .collect();
        Self { rows }
    }

    pub fn current(&self) -> Option<&TrackRow> {
        self.rows.iter().find(|row| row.is_current)
    }
}

// ============================================================================
// Waveform
// ============================================================================

/// Waveform JSON as served at a track's `waveform_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveformData {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u32>,
}

impl WaveformData {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| PlaybackError::InvalidWaveform(e.to_string()))
    }
}

/// Bar heights in `[0, 1]`, scaled so the loudest bar is 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformView {
    bars: Vec<f32>,
}

impl WaveformView {
    /// Downsamples to `bar_count` bars, each the peak of its sample range.
    pub fn new(data: &WaveformData, bar_count: usize) -> Self {
        let samples = &data.samples;
        if samples.is_empty() || bar_count == 0 {
            return Self { bars: Vec::new() };
        }

        let len = samples.len();
        let peaks: Vec<u32> = (0..bar_count)
            .map(|bar| {
                let start = bar * len / bar_count;
                let end = ((bar + 1) * len / bar_count).max(start + 1).min(len);
                samples[start..end].iter().copied().max().unwrap_or(0)
            })
            .collect();

        let loudest = peaks.iter().copied().max().unwrap_or(0);
        let bars = peaks
            .into_iter()
            .map(|peak| {
                if loudest == 0 {
                    0.0
                } else {
                    peak as f32 / loudest as f32
                }
            })
            .collect();
        Self { bars }
    }

    pub fn bars(&self) -> &[f32] {
        &self.bars
    }

    /// Bars to draw as played for a progress ratio.
    pub fn played_bars(&self, ratio: f64) -> usize {
        if !ratio.is_finite() {
            return 0;
        }
        let played = (ratio.clamp(0.0, 1.0) * self.bars.len() as f64).floor() as usize;
        played.min(self.bars.len())
    }

    /// Seek ratio for a click on bar `index` (its centre).
    pub fn seek_ratio_for_bar(&self, index: usize) -> Option<f64> {
        if index >= self.bars.len() {
            return None;
        }
        Some((index as f64 + 0.5) / self.bars.len() as f64)
    }
}
