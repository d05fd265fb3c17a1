//! # Playback Actions
//!
//! The only entry point UI surfaces use to change playback.
//!
//! Every action follows the same path:
//! 1. a command that would start audio without media consent is kept as
//!    the pending action and the consent manager opens;
//! 2. with a ready widget the command runs now;
//! 3. otherwise it becomes the pending action and runs once the widget
//!    reports readiness.
//!
//! Widget failures are recorded on the store (`status = Error`) rather than
//! returned, so surfaces only ever read [`ActionOutcome`]s.

use crate::commands;
use crate::store::PlaybackStore;
use crate::types::{ActionOutcome, PlaybackCommand};
use core_consent::ConsentStore;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Reason passed to the consent manager when playback is blocked.
pub const MEDIA_CONSENT_REASON: &str = "media_requested";

/// Cheap-to-clone handle shared by every control surface.
#[derive(Clone)]
pub struct PlaybackActions {
    store: Arc<PlaybackStore>,
    consent: Arc<ConsentStore>,
}

impl PlaybackActions {
    pub fn new(store: Arc<PlaybackStore>, consent: Arc<ConsentStore>) -> Self {
        Self { store, consent }
    }

    pub async fn play(&self) -> ActionOutcome {
        self.dispatch(PlaybackCommand::Play).await
    }

    pub async fn pause(&self) -> ActionOutcome {
        self.dispatch(PlaybackCommand::Pause).await
    }

    pub async fn toggle(&self) -> ActionOutcome {
        self.dispatch(PlaybackCommand::Toggle).await
    }

    pub async fn next(&self) -> ActionOutcome {
        self.dispatch(PlaybackCommand::Next).await
    }

    pub async fn previous(&self) -> ActionOutcome {
        self.dispatch(PlaybackCommand::Previous).await
    }

    /// Plays the queue entry at `index`. Out-of-range indices are ignored
    /// once the queue is known.
    pub async fn select_track(&self, index: usize) -> ActionOutcome {
        let snapshot = self.store.snapshot();
        if snapshot.is_ready() && index >= snapshot.queue.len() {
            debug!(index, "Ignoring selection outside the queue");
            return ActionOutcome::Ignored;
        }
        self.dispatch(PlaybackCommand::Select { index }).await
    }

    /// Seeks to `ratio` (0.0-1.0) of the current track. Needs a known
    /// duration; non-finite ratios are ignored.
    pub async fn seek_to_ratio(&self, ratio: f64) -> ActionOutcome {
        if !ratio.is_finite() {
            return ActionOutcome::Ignored;
        }
        let Some(duration) = self.store.snapshot().duration_ms.filter(|d| *d > 0) else {
            debug!("Ignoring seek without a known duration");
            return ActionOutcome::Ignored;
        };
        let position_ms = (ratio.clamp(0.0, 1.0) * duration as f64).round() as u64;
        self.dispatch(PlaybackCommand::Seek { position_ms }).await
    }

    /// Sets the volume (clamped to 0-100), persists it and applies it to a
    /// ready widget. Without one the stored value is applied on readiness.
    #[instrument(skip(self))]
    pub async fn set_volume(&self, level: i32) -> ActionOutcome {
        let volume = level.clamp(0, 100) as u8;
        if let Err(e) = self.store.set_volume(volume).await {
            // The session value still applies.
            warn!(error = %e, "Volume not persisted");
        }

        let Some(widget) = self.store.ready_widget() else {
            return ActionOutcome::Queued;
        };
        match widget.set_volume(volume).await {
            Ok(()) => ActionOutcome::Executed,
            Err(e) => {
                self.store.fail(&commands::widget_error(e));
                ActionOutcome::Failed
            }
        }
    }

    /// Mutes, or restores the last non-zero volume.
    pub async fn toggle_mute(&self) -> ActionOutcome {
        let snapshot = self.store.snapshot();
        let target = if snapshot.is_muted() {
            snapshot.last_non_zero_volume
        } else {
            0
        };
        self.set_volume(i32::from(target)).await
    }

    /// Opens the consent manager on behalf of a surface.
    pub fn request_media_consent(&self) {
        self.consent.open_manager(MEDIA_CONSENT_REASON);
    }

    #[instrument(skip(self), fields(action = command.name()))]
    async fn dispatch(&self, command: PlaybackCommand) -> ActionOutcome {
        if command.starts_playback() && !self.consent.media_allowed() {
            debug!("Media consent missing, keeping action until granted");
            self.store.set_pending_action(command);
            self.request_media_consent();
            return ActionOutcome::ConsentRequested;
        }

        let Some(widget) = self.store.ready_widget() else {
            debug!("Widget not ready, queueing action");
            self.store.set_pending_action(command);
            return ActionOutcome::Queued;
        };

        // A direct action supersedes whatever was still pending.
        self.store.take_pending_action();

        match commands::execute(&self.store, widget.as_ref(), command).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.store.fail(&e);
                ActionOutcome::Failed
            }
        }
    }
}
