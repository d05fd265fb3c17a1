//! # Playback Coordination
//!
//! One shared player for every surface of the site, driving a single
//! third-party embedded widget.
//!
//! ## Overview
//!
//! - [`PlaybackStore`]: the shared [`PlaybackSnapshot`] plus the widget
//!   handle and the single pending action
//! - [`PlaybackEngine`]: mounts the widget when media consent and a host
//!   element are both present, turns widget events into store updates, and
//!   tears everything down when either goes away
//! - [`PlaybackActions`]: the command surface used by UI code; runs commands
//!   on a ready widget or keeps them pending until it is
//! - [`surfaces`]: view models for the controls, track list and waveform
//!
//! ```text
//! UI surfaces ──> PlaybackActions ──> widget
//!      ▲                                 │ events
//!      │                                 ▼
//! PlaybackStore <──────────────── PlaybackEngine <── ConsentStore (gate)
//! ```
//!
//! Widget failures never propagate as errors to the host: they become
//! `status = Error` with a readable message, and the track permalink stays
//! available.

pub mod actions;
mod commands;
pub mod engine;
pub mod error;
pub mod store;
pub mod surfaces;
mod throttle;
pub mod types;

pub use actions::{PlaybackActions, MEDIA_CONSENT_REASON};
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use store::{PlaybackStore, VOLUME_STORAGE_KEY};
pub use surfaces::{ControlHint, ControlsView, TrackListView, TrackRow, WaveformData, WaveformView};
pub use types::{
    ActionOutcome, PlaybackCommand, PlaybackSnapshot, PlaybackStatus, PlaybackTrack, TrackId,
};
