//! # Playback Store
//!
//! Single source of truth for the player, shared by every UI surface.
//!
//! ## Overview
//!
//! Observable state lives in a `watch` channel of [`PlaybackSnapshot`].
//! Setters only notify subscribers when a field actually changed, so a
//! widget repeating its last state never re-renders anything.
//!
//! Two things are deliberately kept out of the snapshot:
//! - the widget handle (only the engine and the action executor use it),
//! - the pending action (surfaces only see `has_pending_action`).
//!
//! ## Invariants
//!
//! - `is_playing` is never true while `media_allowed` is false.
//! - `current_index`, when set, points at the queue entry whose id equals
//!   the current track's id.
//! - `position_ms <= duration_ms` whenever a duration is known.
//! - At most one pending action exists; it is consumed at most once.

use crate::commands;
use crate::error::{PlaybackError, Result};
use crate::throttle::{ProgressSample, ProgressThrottle};
use crate::types::{PlaybackCommand, PlaybackSnapshot, PlaybackStatus, PlaybackTrack};
use bridge_traits::{PlaybackWidget, SettingsStore, WidgetInstanceId};
use core_runtime::config::{NavigationPolicy, PlayerSettings};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Settings key holding the last chosen volume (0-100).
pub const VOLUME_STORAGE_KEY: &str = "soundstage.player.volume";

/// The one mounted widget and the mount generation it belongs to.
#[derive(Clone)]
pub(crate) struct WidgetHandle {
    pub generation: u64,
    pub instance_id: WidgetInstanceId,
    pub widget: Arc<dyn PlaybackWidget>,
}

/// Shared playback state.
pub struct PlaybackStore {
    state: watch::Sender<PlaybackSnapshot>,
    widget: Mutex<Option<WidgetHandle>>,
    pending: Mutex<Option<PlaybackCommand>>,
    progress: Mutex<ProgressThrottle>,
    settings: Arc<dyn SettingsStore>,
    event_bus: EventBus,
    navigation: NavigationPolicy,
}

impl PlaybackStore {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        event_bus: EventBus,
        default_volume: u8,
        navigation: NavigationPolicy,
    ) -> Self {
        let (state, _) = watch::channel(PlaybackSnapshot::initial(default_volume));
        Self {
            state,
            widget: Mutex::new(None),
            pending: Mutex::new(None),
            progress: Mutex::new(ProgressThrottle::new(
                PlayerSettings::default().progress_throttle(),
            )),
            settings,
            event_bus,
            navigation,
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified whenever the snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state.subscribe()
    }

    pub fn navigation(&self) -> NavigationPolicy {
        self.navigation
    }

    // ------------------------------------------------------------------
    // Lifecycle setters (driven by the engine)
    // ------------------------------------------------------------------

    pub fn set_status(&self, status: PlaybackStatus) {
        let changed = self.update(|s| {
            s.status = status;
            if status != PlaybackStatus::Error {
                s.error = None;
            }
        });
        if changed {
            debug!(status = %status, "Playback status changed");
            self.emit(PlaybackEvent::StatusChanged {
                status: status.to_string(),
            });
        }
    }

    /// Moves to `Ready` for the widget mounted in `generation`.
    ///
    /// Checked under the widget lock, so a concurrent teardown or consent
    /// revoke either wins entirely or happens after this transition.
    pub(crate) fn mark_ready(&self, generation: u64) -> bool {
        let widget = self.widget.lock();
        let mounted = widget
            .as_ref()
            .is_some_and(|handle| handle.generation == generation);
        if !mounted || !self.state.borrow().media_allowed {
            debug!(generation, "Not marking a stale or unconsented widget ready");
            return false;
        }
        let changed = self.update(|s| {
            s.status = PlaybackStatus::Ready;
            s.error = None;
        });
        drop(widget);

        if changed {
            debug!(status = %PlaybackStatus::Ready, "Playback status changed");
            self.emit(PlaybackEvent::StatusChanged {
                status: PlaybackStatus::Ready.to_string(),
            });
        }
        true
    }

    /// Moves to `Error` with the error's user-facing message.
    pub fn fail(&self, error: &PlaybackError) {
        error!(error = %error, "Playback failed");
        let message = error.user_message();
        self.update(|s| {
            s.status = PlaybackStatus::Error;
            s.error = Some(message.clone());
            s.is_playing = false;
        });
        self.emit(PlaybackEvent::StatusChanged {
            status: PlaybackStatus::Error.to_string(),
        });
        self.emit(PlaybackEvent::Error {
            message,
            recoverable: error.is_recoverable(),
        });
    }

    pub fn set_error(&self, message: Option<String>) {
        self.update(|s| s.error = message);
    }

    /// Mirrors the media consent decision.
    ///
    /// Revoking clears the widget handle and stops playback in the snapshot.
    /// The engine pauses and unbinds the widget before calling this.
    pub fn set_media_allowed(&self, allowed: bool) {
        if !allowed {
            if let Some(handle) = self.widget.lock().take() {
                handle.widget.unbind_all();
            }
        }
        self.update(|s| {
            s.media_allowed = allowed;
            if !allowed {
                s.is_playing = false;
                s.status = PlaybackStatus::Idle;
                s.widget_volume_hydrated = false;
            }
        });
    }

    /// Ignored while media is not allowed.
    pub fn set_playing(&self, playing: bool) {
        if playing && !self.state.borrow().media_allowed {
            debug!("Ignoring playing=true without media consent");
            return;
        }
        self.update(|s| s.is_playing = playing);
    }

    /// Records that the user triggered playback; reveals the bottom bar.
    pub fn mark_started(&self) {
        self.update(|s| s.has_started = true);
    }

    /// Replaces the current track. Position resets when the id changes.
    pub fn set_track(&self, track: Option<PlaybackTrack>) {
        let mut changed_to = None;
        self.update(|s| {
            let same = match (&s.track, &track) {
                (Some(old), Some(new)) => old.id == new.id,
                (None, None) => true,
                _ => false,
            };
            if same {
                if let Some(duration) = track.as_ref().and_then(|t| t.duration_ms) {
                    s.duration_ms = Some(duration);
                    s.position_ms = s.position_ms.min(duration);
                }
            } else {
                s.position_ms = 0;
                s.duration_ms = track.as_ref().and_then(|t| t.duration_ms);
                changed_to = track.as_ref().map(|t| (t.id.to_string(), t.title.clone()));
            }
            s.current_index = index_in(&s.queue, track.as_ref(), s.current_index);
            s.track = track;
        });

        if let Some((track_id, title)) = changed_to {
            debug!(track_id = %track_id, "Current track changed");
            self.emit(PlaybackEvent::TrackChanged { track_id, title });
        }
    }

    pub fn set_queue(&self, queue: Vec<PlaybackTrack>) {
        self.update(|s| {
            s.current_index = index_in(&queue, s.track.as_ref(), s.current_index);
            s.queue = queue;
        });
    }

    /// Pins the current index to `index` when that queue entry is the
    /// current track. Playlists may contain the same sound more than once.
    pub(crate) fn align_current_index(&self, index: usize) {
        self.update(|s| {
            let matches = match (s.queue.get(index), &s.track) {
                (Some(entry), Some(track)) => entry.id == track.id,
                _ => false,
            };
            if matches {
                s.current_index = Some(index);
            }
        });
    }

    /// Commits a progress sample. A missing or zero duration keeps the
    /// known one; the position is clamped to it.
    pub fn set_progress(&self, position_ms: u64, duration_ms: Option<u64>) {
        self.update(|s| {
            let duration = duration_ms.filter(|d| *d > 0).or(s.duration_ms);
            s.duration_ms = duration;
            s.position_ms = match duration {
                Some(d) => position_ms.min(d),
                None => position_ms,
            };
        });
    }

    pub fn set_widget_volume_hydrated(&self, hydrated: bool) {
        self.update(|s| s.widget_volume_hydrated = hydrated);
    }

    /// Back to idle after a teardown. Track metadata stays so surfaces can
    /// still offer the permalink.
    pub(crate) fn reset_session(&self) {
        self.update(|s| {
            s.status = PlaybackStatus::Idle;
            s.is_playing = false;
            s.position_ms = 0;
            s.duration_ms = s.track.as_ref().and_then(|t| t.duration_ms);
            s.error = None;
            s.widget_volume_hydrated = false;
        });
    }

    // ------------------------------------------------------------------
    // Progress throttle
    // ------------------------------------------------------------------

    pub(crate) fn set_progress_interval(&self, interval: Duration) {
        *self.progress.lock() = ProgressThrottle::new(interval);
    }

    /// Returns the sample to commit now, if the throttle lets it through.
    pub(crate) fn offer_progress(
        &self,
        sample: ProgressSample,
        now: Instant,
    ) -> Option<ProgressSample> {
        self.progress.lock().offer(sample, now)
    }

    /// Newest progress sample held back by the throttle.
    pub(crate) fn flush_progress(&self) -> Option<ProgressSample> {
        self.progress.lock().flush()
    }

    /// Forgets held-back samples. Called on seeks and widget changes, where
    /// older samples no longer describe the playhead.
    pub(crate) fn reset_progress(&self) {
        self.progress.lock().reset();
    }

    // ------------------------------------------------------------------
    // Widget handle
    // ------------------------------------------------------------------

    /// Stores the mounted widget. Refused while media is not allowed.
    pub(crate) fn set_widget(&self, handle: WidgetHandle) -> bool {
        if !self.state.borrow().media_allowed {
            warn!("Refusing to store a widget without media consent");
            return false;
        }
        *self.widget.lock() = Some(handle);
        true
    }

    pub(crate) fn clear_widget(&self) -> Option<WidgetHandle> {
        self.widget.lock().take()
    }

    pub(crate) fn widget(&self) -> Option<WidgetHandle> {
        self.widget.lock().clone()
    }

    pub(crate) fn widget_for(&self, generation: u64) -> Option<Arc<dyn PlaybackWidget>> {
        self.widget
            .lock()
            .as_ref()
            .filter(|handle| handle.generation == generation)
            .map(|handle| Arc::clone(&handle.widget))
    }

    pub fn has_widget(&self) -> bool {
        self.widget.lock().is_some()
    }

    /// The widget, only when it is ready for commands.
    pub(crate) fn ready_widget(&self) -> Option<Arc<dyn PlaybackWidget>> {
        if !self.state.borrow().is_ready() {
            return None;
        }
        self.widget().map(|handle| handle.widget)
    }

    // ------------------------------------------------------------------
    // Volume
    // ------------------------------------------------------------------

    /// Reads the persisted volume once. Later calls return the current value.
    ///
    /// A read failure keeps the default and still marks the volume hydrated.
    pub async fn hydrate_volume(&self) -> Result<u8> {
        if self.state.borrow().volume_hydrated {
            return Ok(self.state.borrow().volume);
        }

        let stored = self.settings.get_i64(VOLUME_STORAGE_KEY).await;
        let result = match stored {
            Ok(Some(raw)) => {
                let volume = raw.clamp(0, 100) as u8;
                debug!(volume, "Restored persisted volume");
                self.update(|s| {
                    s.volume = volume;
                    if volume > 0 {
                        s.last_non_zero_volume = volume;
                    }
                });
                Ok(volume)
            }
            Ok(None) => Ok(self.state.borrow().volume),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted volume");
                Err(PlaybackError::Storage(e.to_string()))
            }
        };
        self.update(|s| s.volume_hydrated = true);
        result
    }

    /// Sets and persists the volume. The snapshot is updated even when the
    /// write fails.
    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        let volume = volume.min(100);
        let changed = self.update(|s| {
            s.volume = volume;
            if volume > 0 {
                s.last_non_zero_volume = volume;
            }
        });
        if changed {
            self.emit(PlaybackEvent::VolumeChanged { volume });
        }

        self.settings
            .set_i64(VOLUME_STORAGE_KEY, i64::from(volume))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist volume");
                PlaybackError::Storage(e.to_string())
            })
    }

    // ------------------------------------------------------------------
    // Pending action
    // ------------------------------------------------------------------

    /// Replaces the pending action. Last write wins.
    pub fn set_pending_action(&self, command: PlaybackCommand) {
        let replaced = self.pending.lock().replace(command);
        if let Some(previous) = replaced.filter(|previous| *previous != command) {
            debug!(
                previous = previous.name(),
                action = command.name(),
                "Replacing pending action"
            );
        }
        self.update(|s| s.has_pending_action = true);
        self.emit(PlaybackEvent::ActionQueued {
            action: command.name().to_string(),
        });
    }

    pub fn pending_action(&self) -> Option<PlaybackCommand> {
        *self.pending.lock()
    }

    pub fn take_pending_action(&self) -> Option<PlaybackCommand> {
        let taken = self.pending.lock().take();
        if taken.is_some() {
            self.update(|s| s.has_pending_action = false);
        }
        taken
    }

    /// Runs the pending action if the widget is ready. The action is taken
    /// under the lock, so concurrent callers execute it at most once.
    ///
    /// A widget failure moves the store to `Error` and is returned.
    pub async fn try_consume_pending_action(&self) -> Result<Option<PlaybackCommand>> {
        let Some(widget) = self.ready_widget() else {
            return Ok(None);
        };
        let Some(command) = self.take_pending_action() else {
            return Ok(None);
        };

        info!(action = command.name(), "Running pending action");
        self.emit(PlaybackEvent::ActionDrained {
            action: command.name().to_string(),
        });

        if let Err(e) = commands::execute(self, widget.as_ref(), command).await {
            self.fail(&e);
            return Err(e);
        }
        Ok(Some(command))
    }

    // ------------------------------------------------------------------

    pub(crate) fn emit(&self, event: PlaybackEvent) {
        let _ = self.event_bus.emit(CoreEvent::Playback(event));
    }

    /// Applies `f` and notifies subscribers only if the snapshot changed.
    fn update(&self, f: impl FnOnce(&mut PlaybackSnapshot)) -> bool {
        self.state.send_if_modified(|s| {
            let before = s.clone();
            f(s);
            *s != before
        })
    }
}

/// Queue position of `track`. Keeps `previous` when it still points at the
/// same sound, so repeated entries do not snap back to the first one.
fn index_in(
    queue: &[PlaybackTrack],
    track: Option<&PlaybackTrack>,
    previous: Option<usize>,
) -> Option<usize> {
    let track = track?;
    if let Some(index) = previous {
        if queue.get(index).is_some_and(|entry| entry.id == track.id) {
            return Some(index);
        }
    }
    queue.iter().position(|candidate| candidate.id == track.id)
}
