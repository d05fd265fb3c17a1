//! # Playback Engine
//!
//! Owns the widget lifecycle: mounts exactly one widget while media consent
//! is granted and a host element is attached, translates widget events into
//! store updates, and tears the widget down when either condition goes away.
//!
//! ## Sessions
//!
//! Every mount attempt and every teardown bumps a generation counter. Each
//! async step of a mount re-checks it, and each widget event is tagged with
//! the generation of the widget that produced it, so results and events
//! from a widget that has since been torn down are dropped.
//!
//! Script loading and mounting run on a background task owned by the
//! session. The readiness timer starts together with it, so a script that
//! never loads is bounded by the same timeout as a widget that never
//! reports ready, and a consent revoke can cancel a load in flight.
//!
//! ```text
//!  attach_host / consent granted
//!            │
//!            ▼
//!   ┌────────────────┐  load_script + mount   ┌─────────┐  Ready   ┌───────┐
//!   │ Idle           ├───────────────────────>│ Loading ├─────────>│ Ready │
//!   └────────────────┘                        └────┬────┘          └───┬───┘
//!            ▲                    timeout / error  │   Error event     │
//!            │                                     ▼                   │
//!            │   teardown                     ┌─────────┐              │
//!            └────────────────────────────────┤  Error  │<─────────────┘
//!                                             └─────────┘
//! ```

use crate::commands;
use crate::error::PlaybackError;
use crate::store::{PlaybackStore, WidgetHandle};
use crate::throttle::ProgressSample;
use crate::types::{PlaybackStatus, PlaybackTrack};
use bridge_traits::{PlaybackWidget, WidgetEvent, WidgetInstanceId, WidgetLoader, WidgetSource};
use core_consent::ConsentState;
use core_runtime::config::PlayerSettings;
use core_runtime::events::PlaybackEvent;
use core_runtime::logging::strip_query;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

#[derive(Default)]
struct Session {
    generation: u64,
    mounting: bool,
    mount_task: Option<AbortHandle>,
    pump: Option<JoinHandle<()>>,
    ready_timer: Option<JoinHandle<()>>,
    consent_watch: Option<JoinHandle<()>>,
}

struct EngineInner {
    store: Arc<PlaybackStore>,
    loader: Arc<dyn WidgetLoader>,
    settings: PlayerSettings,
    host: Mutex<Option<WidgetSource>>,
    session: Mutex<Session>,
}

/// Widget lifecycle coordinator. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    pub fn new(
        store: Arc<PlaybackStore>,
        loader: Arc<dyn WidgetLoader>,
        settings: PlayerSettings,
    ) -> Self {
        store.set_progress_interval(settings.progress_throttle());
        Self {
            inner: Arc::new(EngineInner {
                store,
                loader,
                settings,
                host: Mutex::new(None),
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<PlaybackStore> {
        &self.inner.store
    }

    /// Registers the element the widget renders into and mounts if media
    /// is allowed. Attaching a different source replaces the widget.
    #[instrument(skip(self, source), fields(url = %strip_query(&source.url)))]
    pub async fn attach_host(&self, source: WidgetSource) {
        let previous = self.inner.host.lock().replace(source.clone());
        if previous.as_ref() != Some(&source) && previous.is_some() {
            self.inner.teardown("host_changed").await;
        }
        self.inner.mount_and_wait().await;
    }

    /// Removes the host element and tears the widget down.
    #[instrument(skip(self))]
    pub async fn detach_host(&self) {
        self.inner.host.lock().take();
        self.inner.teardown("host_detached").await;
    }

    /// Applies a media consent decision: mounts on grant, tears down on
    /// revoke.
    #[instrument(skip(self))]
    pub async fn set_media_allowed(&self, allowed: bool) {
        if allowed {
            self.inner.store.set_media_allowed(true);
            self.inner.mount_and_wait().await;
        } else {
            self.inner.revoke_media().await;
        }
    }

    /// Follows media consent changes until the sender goes away or
    /// [`shutdown`](Self::shutdown) is called.
    pub fn watch_consent(&self, mut consent: watch::Receiver<ConsentState>) {
        let engine = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut last = None;
            loop {
                let allowed = consent.borrow_and_update().media_allowed();
                if last != Some(allowed) {
                    last = Some(allowed);
                    let Some(engine) = engine.upgrade() else {
                        break;
                    };
                    if allowed {
                        // Loading runs in the background so a revoke is
                        // never stuck behind it.
                        engine.store.set_media_allowed(true);
                        engine.mount();
                    } else {
                        engine.revoke_media().await;
                    }
                }
                if consent.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = self.inner.session.lock().consent_watch.replace(task) {
            previous.abort();
        }
    }

    /// Tears down and mounts again. Used after a load failure or timeout.
    #[instrument(skip(self))]
    pub async fn retry(&self) {
        self.inner.teardown("retry").await;
        self.inner.mount_and_wait().await;
    }

    /// Stops following consent and tears the widget down.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        if let Some(task) = self.inner.session.lock().consent_watch.take() {
            task.abort();
        }
        self.inner.teardown("shutdown").await;
    }
}

impl EngineInner {
    async fn revoke_media(&self) {
        self.teardown("consent_revoked").await;
        self.store.set_media_allowed(false);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session.lock().generation == generation
    }

    async fn mount_and_wait(self: &Arc<Self>) {
        let Some(task) = self.mount() else {
            return;
        };
        if let Err(e) = task.await {
            if e.is_cancelled() {
                debug!("Widget mount cancelled");
            } else {
                warn!(error = %e, "Widget mount task failed");
            }
        }
    }

    /// Claims a new session, moves to `Loading`, starts the readiness timer
    /// and spawns the load. Returns `None` when there is nothing to mount.
    fn mount(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let Some(source) = self.host.lock().clone() else {
            debug!("No host element attached, not mounting");
            return None;
        };
        if !self.store.snapshot().media_allowed {
            debug!("Media consent missing, not mounting");
            return None;
        }

        let mut session = self.session.lock();
        if session.mounting || self.store.has_widget() {
            debug!("Widget already mounted or mounting");
            return None;
        }
        session.mounting = true;
        session.generation += 1;
        let generation = session.generation;

        self.store.reset_progress();
        self.store.set_status(PlaybackStatus::Loading);

        if let Some(stale) = session
            .ready_timer
            .replace(self.spawn_ready_timer(generation))
        {
            stale.abort();
        }
        let task = self.spawn_load(generation, source);
        session.mount_task = Some(task.abort_handle());
        Some(task)
    }

    /// Loads the script and mounts the widget without keeping the engine
    /// alive while the host works.
    fn spawn_load(self: &Arc<Self>, generation: u64, source: WidgetSource) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        let loader = Arc::clone(&self.loader);
        tokio::spawn(async move {
            let loaded = loader.load_script().await;
            let Some(inner) = engine.upgrade() else {
                return;
            };
            if let Err(e) = loaded {
                inner.abort_mount(generation, PlaybackError::ScriptLoad(e.to_string()));
                return;
            }
            if !inner.is_current(generation) {
                return;
            }
            drop(inner);

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let mounted = loader.mount(&source, events_tx).await;
            match (engine.upgrade(), mounted) {
                (Some(inner), Ok(widget)) => inner.install(generation, widget, events_rx),
                (Some(inner), Err(e)) => inner.abort_mount(generation, commands::widget_error(e)),
                (None, Ok(widget)) => widget.unbind_all(),
                (None, Err(_)) => {}
            }
        })
    }

    fn install(
        self: &Arc<Self>,
        generation: u64,
        widget: Arc<dyn PlaybackWidget>,
        events: mpsc::UnboundedReceiver<WidgetEvent>,
    ) {
        let instance_id = WidgetInstanceId::new();
        {
            let mut session = self.session.lock();
            if session.generation != generation {
                debug!("Discarding widget mounted for a stale session");
                widget.unbind_all();
                return;
            }
            session.mounting = false;
            session.mount_task = None;

            let handle = WidgetHandle {
                generation,
                instance_id,
                widget: Arc::clone(&widget),
            };
            if !self.store.set_widget(handle) {
                widget.unbind_all();
                return;
            }
            session.pump = Some(self.spawn_pump(generation, events));
        }

        info!(instance_id = %instance_id.as_uuid(), "Widget mounted, waiting for readiness");
        self.store.emit(PlaybackEvent::WidgetMounted {
            instance_id: instance_id.as_uuid().to_string(),
        });
    }

    fn abort_mount(&self, generation: u64, error: PlaybackError) {
        let timer = {
            let mut session = self.session.lock();
            if session.generation != generation {
                return;
            }
            session.mounting = false;
            session.mount_task = None;
            session.ready_timer.take()
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        self.store.fail(&error);
    }

    /// Unbinds and pauses the widget (best effort), clears it from the
    /// store and returns to idle.
    async fn teardown(&self, reason: &str) {
        let (pump, ready_timer, load, was_mounting) = {
            let mut session = self.session.lock();
            let was_mounting = session.mounting;
            session.generation += 1;
            session.mounting = false;
            (
                session.pump.take(),
                session.ready_timer.take(),
                session.mount_task.take(),
                was_mounting,
            )
        };
        for task in [pump, ready_timer].into_iter().flatten() {
            task.abort();
        }
        if let Some(load) = load {
            load.abort();
        }
        self.store.reset_progress();

        let handle = self.store.clear_widget();
        if let Some(handle) = &handle {
            debug!(instance_id = %handle.instance_id.as_uuid(), "Unbinding widget");
            handle.widget.unbind_all();
            if let Err(e) = handle.widget.pause().await {
                debug!(error = %e, "Pause during teardown failed");
            }
        }

        self.store.reset_session();
        if handle.is_some() || was_mounting {
            info!(reason, "Widget torn down");
            self.store.emit(PlaybackEvent::WidgetTornDown {
                reason: reason.to_string(),
            });
        }
    }

    fn spawn_pump(
        self: &Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<WidgetEvent>,
    ) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.handle_event(generation, event).await;
            }
        })
    }

    fn spawn_ready_timer(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        let timeout = self.settings.ready_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(engine) = engine.upgrade() {
                engine.expire_ready_wait(generation, timeout);
            }
        })
    }

    /// Fails a session still loading after the readiness timeout. A load
    /// that has not finished is cancelled; a mounted widget is kept so a
    /// late ready event can still recover.
    fn expire_ready_wait(&self, generation: u64, timeout: std::time::Duration) {
        if self.store.snapshot().status != PlaybackStatus::Loading {
            return;
        }
        let stalled_load = {
            let mut session = self.session.lock();
            if session.generation != generation {
                return;
            }
            session.ready_timer = None;
            if session.mounting {
                session.mounting = false;
                session.mount_task.take()
            } else {
                None
            }
        };
        if let Some(load) = stalled_load {
            warn!("Widget script still loading at readiness timeout");
            load.abort();
        }
        self.store.fail(&PlaybackError::WidgetTimeout(timeout));
    }

    fn cancel_ready_timer(&self) {
        if let Some(timer) = self.session.lock().ready_timer.take() {
            timer.abort();
        }
    }

    async fn handle_event(&self, generation: u64, event: WidgetEvent) {
        let name = event.name();
        if !self.is_current(generation) {
            debug!(event = name, "Ignoring event from a stale widget");
            return;
        }
        trace!(event = name, "Widget event");

        match event {
            WidgetEvent::Ready => self.on_ready(generation).await,
            WidgetEvent::Error { message } => {
                self.cancel_ready_timer();
                self.store.fail(&PlaybackError::WidgetRuntime(message));
            }
            _ if !self.store.snapshot().is_ready() => {
                debug!(event = name, "Ignoring widget event before readiness");
            }
            WidgetEvent::Play => self.on_play(generation).await,
            WidgetEvent::Pause => self.on_pause(),
            WidgetEvent::Finish => self.on_finish(generation).await,
            WidgetEvent::PlayProgress {
                position_ms,
                duration_ms,
            } => {
                let sample = ProgressSample {
                    position_ms,
                    duration_ms,
                };
                let committed = self.store.offer_progress(sample, Instant::now());
                if let Some(sample) = committed {
                    self.commit_progress(sample);
                }
            }
        }
    }

    /// Applies the stored volume, seeds queue, track and position from the
    /// widget, then runs the pending action.
    async fn on_ready(&self, generation: u64) {
        self.cancel_ready_timer();
        let Some(widget) = self.store.widget_for(generation) else {
            return;
        };

        let volume = self.store.snapshot().volume;
        match widget.set_volume(volume).await {
            Ok(()) => self.store.set_widget_volume_hydrated(true),
            Err(e) => warn!(error = %e, "Failed to apply stored volume to widget"),
        }

        let sounds = match widget.sounds().await {
            Ok(sounds) => sounds,
            Err(e) => {
                warn!(error = %e, "Failed to read widget playlist");
                Vec::new()
            }
        };
        let sound_count = sounds.len();
        self.store
            .set_queue(sounds.into_iter().map(PlaybackTrack::from).collect());
        self.sync_current_sound(widget.as_ref()).await;
        match widget.position().await {
            Ok(position) => self.store.set_progress(position, None),
            Err(e) => debug!(error = %e, "Failed to read widget position"),
        }

        if !self.store.mark_ready(generation) {
            return;
        }
        info!(sound_count, "Widget ready");
        self.store
            .emit(PlaybackEvent::WidgetReady { sound_count });

        if let Err(e) = self.store.try_consume_pending_action().await {
            warn!(error = %e, "Pending action failed");
        }
    }

    async fn on_play(&self, generation: u64) {
        self.store.set_playing(true);
        self.store.mark_started();
        if let Some(widget) = self.store.widget_for(generation) {
            // Playlists advance on their own; pick up the new sound.
            self.sync_current_sound(widget.as_ref()).await;
        }
        self.store.emit(PlaybackEvent::Started {
            track_id: self.current_track_id(),
        });
    }

    fn on_pause(&self) {
        self.flush_progress();
        self.store.set_playing(false);
        self.store.emit(PlaybackEvent::Paused {
            track_id: self.current_track_id(),
            position_ms: self.store.snapshot().position_ms,
        });
    }

    async fn on_finish(&self, generation: u64) {
        self.flush_progress();

        if let Some(duration) = self.store.snapshot().duration_ms {
            self.commit_progress(ProgressSample {
                position_ms: duration,
                duration_ms: Some(duration),
            });
        }
        self.store.set_playing(false);
        self.store.emit(PlaybackEvent::Completed {
            track_id: self.current_track_id(),
        });
        self.store.set_progress(0, None);

        if let Some(widget) = self.store.widget_for(generation) {
            self.sync_current_sound(widget.as_ref()).await;
        }
    }

    fn flush_progress(&self) {
        let pending = self.store.flush_progress();
        if let Some(sample) = pending {
            self.commit_progress(sample);
        }
    }

    fn commit_progress(&self, sample: ProgressSample) {
        self.store.set_progress(sample.position_ms, sample.duration_ms);
        let snapshot = self.store.snapshot();
        self.store.emit(PlaybackEvent::PositionChanged {
            track_id: snapshot.track.as_ref().map(|t| t.id.to_string()),
            position_ms: snapshot.position_ms,
            duration_ms: snapshot.duration_ms.unwrap_or(0),
        });
    }

    async fn sync_current_sound(&self, widget: &dyn PlaybackWidget) {
        match widget.current_sound().await {
            Ok(Some(sound)) => self.store.set_track(Some(PlaybackTrack::from(sound))),
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "Failed to read current sound");
                return;
            }
        }
        match widget.current_sound_index().await {
            Ok(Some(index)) => self.store.align_current_index(index),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Failed to read current sound index"),
        }
    }

    fn current_track_id(&self) -> Option<String> {
        self.store
            .snapshot()
            .track
            .as_ref()
            .map(|track| track.id.to_string())
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        if let Some(load) = session.mount_task.take() {
            load.abort();
        }
        for task in [
            session.pump.take(),
            session.ready_timer.take(),
            session.consent_watch.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}
