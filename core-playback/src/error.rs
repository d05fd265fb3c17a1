//! # Playback Error Types
//!
//! Every widget-originated failure ends up as store state (`status = Error`
//! plus [`PlaybackError::user_message`]); these values only travel as far as
//! the engine/action boundary.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while coordinating the embedded player.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The widget's client library could not be loaded (network block,
    /// content blocker) or the widget could not be mounted.
    #[error("Widget script failed to load: {0}")]
    ScriptLoad(String),

    /// The widget was mounted but never reported readiness.
    #[error("Widget timed out after {0:?} waiting for readiness")]
    WidgetTimeout(Duration),

    /// The widget reported an error or rejected a call.
    #[error("Widget error: {0}")]
    WidgetRuntime(String),

    /// Media consent is missing. A policy block, not a failure.
    #[error("Media consent required")]
    ConsentRequired,

    /// No widget is mounted.
    #[error("No widget mounted")]
    WidgetUnavailable,

    /// Reading or writing a persisted preference failed.
    #[error("Preference storage failed: {0}")]
    Storage(String),

    /// Waveform data could not be parsed.
    #[error("Invalid waveform data: {0}")]
    InvalidWaveform(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Short explanation shown next to disabled controls.
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::ScriptLoad(_) => {
                "The player could not be loaded. It may be blocked by your browser or network."
                    .to_string()
            }
            PlaybackError::WidgetTimeout(_) => {
                "The player timed out while loading. Try again or open the track externally."
                    .to_string()
            }
            PlaybackError::WidgetRuntime(reason) => format!("Playback failed: {}", reason),
            PlaybackError::ConsentRequired => {
                "Allow media content to listen here.".to_string()
            }
            PlaybackError::WidgetUnavailable => "The player is not available.".to_string(),
            PlaybackError::Storage(_) => "Your player preferences could not be saved.".to_string(),
            PlaybackError::InvalidWaveform(_) => "Waveform unavailable.".to_string(),
            PlaybackError::InvalidConfig(_) => "The player is misconfigured.".to_string(),
        }
    }

    /// Returns `true` if remounting the widget may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::ScriptLoad(_)
                | PlaybackError::WidgetTimeout(_)
                | PlaybackError::WidgetRuntime(_)
                | PlaybackError::WidgetUnavailable
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
