//! Integration tests for the playback engine, store and actions
//!
//! This test suite verifies:
//! - Consent gating of widget mounting and playback commands
//! - Pending action queueing and draining
//! - Readiness timeout and script load failures
//! - Progress throttling and finish handling
//! - Teardown and stale widget isolation
//! - Volume handling across widget sessions

use async_trait::async_trait;
use bridge_desktop::MemorySettingsStore;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, PlaybackWidget, SettingsStore, SystemClock, WidgetEvent, WidgetEventSender,
    WidgetLoader, WidgetSound, WidgetSource,
};
use core_consent::ConsentStore;
use core_playback::{
    ActionOutcome, ControlHint, ControlsView, PlaybackActions, PlaybackCommand, PlaybackEngine,
    PlaybackStatus, PlaybackStore, VOLUME_STORAGE_KEY,
};
use core_runtime::config::{NavigationPolicy, PlayerSettings};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

// ============================================================================
// Fake widget
// ============================================================================

#[derive(Default)]
struct WidgetState {
    current: usize,
    playing: bool,
    position_ms: u64,
    volume: Option<u8>,
    calls: Vec<String>,
    unbound: bool,
}

/// Behaves like the embedded widget: commands change its state and echo
/// the matching event, until it is unbound.
struct FakeWidget {
    sounds: Vec<WidgetSound>,
    events: WidgetEventSender,
    fail_pause: bool,
    state: Mutex<WidgetState>,
}

impl FakeWidget {
    fn emit(&self, event: WidgetEvent) {
        if !self.state.lock().unbound {
            let _ = self.events.send(event);
        }
    }

    fn call_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.as_str() == name)
            .count()
    }

    fn volume(&self) -> Option<u8> {
        self.state.lock().volume
    }

    fn current_index(&self) -> usize {
        self.state.lock().current
    }

    fn is_unbound(&self) -> bool {
        self.state.lock().unbound
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().calls.push(call.into());
    }

    fn start(&self) {
        self.state.lock().playing = true;
        self.emit(WidgetEvent::Play);
    }

    fn stop(&self) {
        self.state.lock().playing = false;
        self.emit(WidgetEvent::Pause);
    }
}

#[async_trait]
impl PlaybackWidget for FakeWidget {
    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        self.start();
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        if self.fail_pause {
            return Err(BridgeError::WidgetCall("pause rejected".to_string()));
        }
        self.stop();
        Ok(())
    }

    async fn toggle(&self) -> BridgeResult<()> {
        self.record("toggle");
        let playing = self.state.lock().playing;
        if playing {
            self.stop();
        } else {
            self.start();
        }
        Ok(())
    }

    async fn skip(&self, index: usize) -> BridgeResult<()> {
        self.record(format!("skip:{}", index));
        if index >= self.sounds.len() {
            return Err(BridgeError::WidgetCall(format!("no sound at {}", index)));
        }
        {
            let mut state = self.state.lock();
            state.current = index;
            state.position_ms = 0;
        }
        self.start();
        Ok(())
    }

    async fn seek_to(&self, position_ms: u64) -> BridgeResult<()> {
        self.record("seek");
        self.state.lock().position_ms = position_ms;
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> BridgeResult<()> {
        self.record("set_volume");
        self.state.lock().volume = Some(volume);
        Ok(())
    }

    async fn current_sound(&self) -> BridgeResult<Option<WidgetSound>> {
        let current = self.state.lock().current;
        Ok(self.sounds.get(current).cloned())
    }

    async fn current_sound_index(&self) -> BridgeResult<Option<usize>> {
        let current = self.state.lock().current;
        Ok((current < self.sounds.len()).then_some(current))
    }

    async fn position(&self) -> BridgeResult<u64> {
        Ok(self.state.lock().position_ms)
    }

    async fn sounds(&self) -> BridgeResult<Vec<WidgetSound>> {
        Ok(self.sounds.clone())
    }

    fn unbind_all(&self) {
        self.state.lock().unbound = true;
    }
}

// ============================================================================
// Fake loader
// ============================================================================

struct FakeLoader {
    sounds: Vec<WidgetSound>,
    script_error: Option<String>,
    stall_script: bool,
    auto_ready: bool,
    fail_pause: bool,
    script_loads: AtomicUsize,
    widgets: Mutex<Vec<Arc<FakeWidget>>>,
}

impl FakeLoader {
    fn new(sounds: Vec<WidgetSound>) -> Self {
        Self {
            sounds,
            script_error: None,
            stall_script: false,
            auto_ready: true,
            fail_pause: false,
            script_loads: AtomicUsize::new(0),
            widgets: Mutex::new(Vec::new()),
        }
    }

    fn with_script_error(mut self, message: &str) -> Self {
        self.script_error = Some(message.to_string());
        self
    }

    /// The script request never settles, like a blackholed CDN.
    fn stalled_script(mut self) -> Self {
        self.stall_script = true;
        self
    }

    fn never_ready(mut self) -> Self {
        self.auto_ready = false;
        self
    }

    fn failing_pause(mut self) -> Self {
        self.fail_pause = true;
        self
    }

    fn mount_count(&self) -> usize {
        self.widgets.lock().len()
    }

    fn widget(&self, index: usize) -> Arc<FakeWidget> {
        Arc::clone(&self.widgets.lock()[index])
    }

    fn last_widget(&self) -> Arc<FakeWidget> {
        Arc::clone(self.widgets.lock().last().expect("no widget mounted"))
    }
}

#[async_trait]
impl WidgetLoader for FakeLoader {
    async fn load_script(&self) -> BridgeResult<()> {
        self.script_loads.fetch_add(1, Ordering::SeqCst);
        if self.stall_script {
            std::future::pending::<()>().await;
        }
        match &self.script_error {
            Some(message) => Err(BridgeError::ScriptUnavailable(message.clone())),
            None => Ok(()),
        }
    }

    async fn mount(
        &self,
        _source: &WidgetSource,
        events: WidgetEventSender,
    ) -> BridgeResult<Arc<dyn PlaybackWidget>> {
        let widget = Arc::new(FakeWidget {
            sounds: self.sounds.clone(),
            events,
            fail_pause: self.fail_pause,
            state: Mutex::new(WidgetState::default()),
        });
        if self.auto_ready {
            widget.emit(WidgetEvent::Ready);
        }
        self.widgets.lock().push(Arc::clone(&widget));
        Ok(widget)
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    settings: Arc<MemorySettingsStore>,
    consent: Arc<ConsentStore>,
    store: Arc<PlaybackStore>,
    engine: PlaybackEngine,
    actions: PlaybackActions,
    loader: Arc<FakeLoader>,
    events: Receiver<CoreEvent>,
}

impl Harness {
    fn new(loader: FakeLoader) -> Self {
        Self::with_settings(loader, PlayerSettings::default(), Arc::new(MemorySettingsStore::new()))
    }

    fn with_settings(
        loader: FakeLoader,
        player: PlayerSettings,
        settings: Arc<MemorySettingsStore>,
    ) -> Self {
        let bus = EventBus::new(1024);
        let events = bus.subscribe();
        let consent = Arc::new(ConsentStore::new(
            settings.clone(),
            Arc::new(SystemClock),
            bus.clone(),
            player.consent_prompt_delay(),
        ));
        let store = Arc::new(PlaybackStore::new(
            settings.clone(),
            bus,
            player.default_volume,
            player.navigation,
        ));
        let loader = Arc::new(loader);
        let engine = PlaybackEngine::new(store.clone(), loader.clone(), player);
        let actions = PlaybackActions::new(store.clone(), consent.clone());

        Self {
            settings,
            consent,
            store,
            engine,
            actions,
            loader,
            events,
        }
    }

    /// Host attached and media granted; waits for the widget to settle.
    async fn ready(loader: FakeLoader) -> Self {
        let harness = Self::new(loader);
        harness.engine.attach_host(source()).await;
        harness.grant_media().await;
        harness
    }

    async fn grant_media(&self) {
        self.consent.accept_all().await.unwrap();
        self.engine.set_media_allowed(true).await;
        settle().await;
    }

    fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let CoreEvent::Playback(event) = event {
                events.push(event);
            }
        }
        events
    }
}

fn source() -> WidgetSource {
    WidgetSource::new("https://soundcloud.com/artist/sets/showreel")
}

fn playlist() -> Vec<WidgetSound> {
    vec![
        WidgetSound::new(101, "Opening")
            .with_duration_ms(180_000)
            .with_permalink("https://soundcloud.com/artist/opening"),
        WidgetSound::new(102, "Middle").with_duration_ms(240_000),
        WidgetSound::new(103, "Closing").with_duration_ms(200_000),
    ]
}

/// Lets spawned engine tasks run without advancing time.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Consent gating
// ============================================================================

#[tokio::test]
async fn test_play_without_consent_opens_manager_and_mounts_nothing() {
    let harness = Harness::new(FakeLoader::new(playlist()));
    harness.engine.attach_host(source()).await;

    let outcome = harness.actions.play().await;

    assert_eq!(outcome, ActionOutcome::ConsentRequested);
    assert!(harness.consent.state().manager_open);
    assert_eq!(harness.loader.mount_count(), 0);
    assert_eq!(harness.loader.script_loads.load(Ordering::SeqCst), 0);

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Idle);
    assert!(!snapshot.is_playing);
    assert_eq!(
        harness.store.pending_action(),
        Some(PlaybackCommand::Play)
    );
}

#[tokio::test]
async fn test_granting_consent_runs_remembered_play() {
    let harness = Harness::new(FakeLoader::new(playlist()));
    harness.engine.attach_host(source()).await;
    harness.actions.play().await;

    harness.grant_media().await;

    let widget = harness.loader.last_widget();
    assert_eq!(widget.call_count("play"), 1);

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Ready);
    assert!(snapshot.is_playing);
    assert!(snapshot.has_started);
    assert!(!snapshot.has_pending_action);
    assert_eq!(snapshot.track.unwrap().title, "Opening");
}

#[tokio::test]
async fn test_consent_watch_mounts_and_tears_down() {
    let harness = Harness::new(FakeLoader::new(playlist()));
    harness.engine.attach_host(source()).await;
    harness.engine.watch_consent(harness.consent.subscribe());
    settle().await;
    assert_eq!(harness.loader.mount_count(), 0);

    harness.consent.accept_all().await.unwrap();
    settle().await;
    assert_eq!(harness.loader.mount_count(), 1);
    assert!(harness.store.snapshot().is_ready());

    harness.consent.reject_all().await.unwrap();
    settle().await;
    assert!(harness.loader.widget(0).is_unbound());
    assert!(!harness.store.has_widget());
    assert!(!harness.store.snapshot().media_allowed);

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_no_widget_without_host_element() {
    let harness = Harness::new(FakeLoader::new(playlist()));
    harness.grant_media().await;

    assert_eq!(harness.loader.mount_count(), 0);
    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Idle);

    harness.engine.attach_host(source()).await;
    settle().await;
    assert_eq!(harness.loader.mount_count(), 1);
}

#[tokio::test]
async fn test_repeated_mount_requests_keep_one_widget() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;

    harness.engine.set_media_allowed(true).await;
    harness.engine.attach_host(source()).await;
    settle().await;

    assert_eq!(harness.loader.mount_count(), 1);
}

// ============================================================================
// Pending actions
// ============================================================================

#[tokio::test]
async fn test_single_pending_action_last_write_wins() {
    let harness = Harness::new(FakeLoader::new(playlist()).never_ready());
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;

    assert_eq!(harness.actions.toggle().await, ActionOutcome::Queued);
    assert_eq!(harness.actions.next().await, ActionOutcome::Queued);

    assert_eq!(harness.store.pending_action(), Some(PlaybackCommand::Next));
}

#[tokio::test]
async fn test_pending_action_drains_once() {
    let harness = Harness::new(FakeLoader::new(playlist()).never_ready());
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;
    harness.actions.play().await;

    let widget = harness.loader.last_widget();
    widget.emit(WidgetEvent::Ready);
    settle().await;
    widget.emit(WidgetEvent::Ready);
    settle().await;

    assert_eq!(widget.call_count("play"), 1);
    assert_eq!(harness.store.pending_action(), None);
    assert_eq!(harness.store.try_consume_pending_action().await, Ok(None));
}

#[tokio::test]
async fn test_direct_action_supersedes_pending() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;
    harness.store.set_pending_action(PlaybackCommand::Next);

    assert_eq!(harness.actions.play().await, ActionOutcome::Executed);
    assert_eq!(harness.store.pending_action(), None);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_widget_that_never_becomes_ready_times_out() {
    let harness = Harness::new(FakeLoader::new(playlist()).never_ready());
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;
    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Loading);

    tokio::time::sleep(Duration::from_millis(11_999)).await;
    settle().await;
    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Loading);

    tokio::time::sleep(Duration::from_millis(2)).await;
    settle().await;

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Error);
    assert!(snapshot.error.as_deref().unwrap().contains("timed out"));

    let controls = ControlsView::from_snapshot(&snapshot, NavigationPolicy::Clamp);
    assert!(!controls.enabled);
    assert!(matches!(controls.hint, Some(ControlHint::Error(_))));
}

#[tokio::test(start_paused = true)]
async fn test_ready_before_timeout_cancels_it() {
    let harness = Harness::new(FakeLoader::new(playlist()).never_ready());
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    harness.loader.last_widget().emit(WidgetEvent::Ready);
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;

    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_script_load_times_out_and_revoke_still_applies() {
    let harness = Harness::new(FakeLoader::new(playlist()).stalled_script());
    harness.engine.attach_host(source()).await;
    harness.engine.watch_consent(harness.consent.subscribe());
    harness.consent.accept_all().await.unwrap();
    settle().await;
    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Loading);
    assert_eq!(harness.loader.script_loads.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Error);
    assert!(snapshot.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(harness.loader.mount_count(), 0);

    harness.consent.reject_all().await.unwrap();
    settle().await;

    let snapshot = harness.store.snapshot();
    assert!(!snapshot.media_allowed);
    assert_eq!(snapshot.status, PlaybackStatus::Idle);
    assert_eq!(harness.loader.mount_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_revoke_cancels_script_load_in_flight() {
    let mut harness = Harness::new(FakeLoader::new(playlist()).stalled_script());
    harness.engine.attach_host(source()).await;
    harness.engine.watch_consent(harness.consent.subscribe());
    harness.consent.accept_all().await.unwrap();
    settle().await;
    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Loading);
    harness.drain_events();

    harness.consent.reject_all().await.unwrap();
    settle().await;
    assert!(harness
        .drain_events()
        .iter()
        .any(|event| matches!(event, PlaybackEvent::WidgetTornDown { reason } if reason == "consent_revoked")));

    // Neither the cancelled load nor its timer may touch the idle player.
    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;

    let snapshot = harness.store.snapshot();
    assert!(!snapshot.media_allowed);
    assert_eq!(snapshot.status, PlaybackStatus::Idle);
    assert_eq!(snapshot.error, None);
    assert_eq!(harness.loader.mount_count(), 0);
}

#[tokio::test]
async fn test_script_load_failure_sets_error() {
    let harness = Harness::new(FakeLoader::new(playlist()).with_script_error("blocked by client"));
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Error);
    assert!(snapshot.error.unwrap().contains("could not be loaded"));
    assert_eq!(harness.loader.mount_count(), 0);
}

#[tokio::test]
async fn test_retry_after_failure_mounts_again() {
    let harness = Harness::new(FakeLoader::new(playlist()).never_ready());
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;
    harness
        .loader
        .last_widget()
        .emit(WidgetEvent::Error {
            message: "track unavailable".to_string(),
        });
    settle().await;
    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Error);

    harness.engine.retry().await;
    settle().await;

    assert_eq!(harness.loader.mount_count(), 2);
    assert!(harness.loader.widget(0).is_unbound());
    assert_eq!(harness.store.snapshot().status, PlaybackStatus::Loading);
}

#[tokio::test]
async fn test_widget_error_event_disables_controls() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;

    harness.loader.last_widget().emit(WidgetEvent::Error {
        message: "track unavailable in your country".to_string(),
    });
    settle().await;

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Error);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Playback failed: track unavailable in your country")
    );

    let controls = ControlsView::from_snapshot(&snapshot, NavigationPolicy::Clamp);
    assert!(!controls.enabled);
    assert_eq!(
        controls.permalink_url.as_deref(),
        Some("https://soundcloud.com/artist/opening")
    );
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_revoking_consent_tears_down_despite_pause_failure() {
    let mut harness = Harness::ready(FakeLoader::new(playlist()).failing_pause()).await;
    harness.actions.play().await;
    settle().await;
    assert!(harness.store.snapshot().is_playing);
    harness.drain_events();

    harness.engine.set_media_allowed(false).await;

    let widget = harness.loader.last_widget();
    assert!(widget.is_unbound());
    assert_eq!(widget.call_count("pause"), 1);

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Idle);
    assert!(!snapshot.is_playing);
    assert!(!snapshot.media_allowed);
    assert!(!harness.store.has_widget());

    assert!(harness.drain_events().contains(&PlaybackEvent::WidgetTornDown {
        reason: "consent_revoked".to_string()
    }));
}

#[tokio::test]
async fn test_events_from_torn_down_widget_are_ignored() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;
    let stale = harness.loader.last_widget();

    harness.engine.detach_host().await;
    harness.engine.attach_host(source()).await;
    settle().await;
    assert_eq!(harness.loader.mount_count(), 2);

    // The stale widget keeps talking after it was replaced.
    let _ = stale.events.send(WidgetEvent::Play);
    let _ = stale.events.send(WidgetEvent::PlayProgress {
        position_ms: 90_000,
        duration_ms: Some(180_000),
    });
    settle().await;

    let snapshot = harness.store.snapshot();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.position_ms, 0);
}

#[tokio::test]
async fn test_detach_keeps_track_for_permalink() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;

    harness.engine.detach_host().await;

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Idle);
    assert_eq!(
        snapshot.track.and_then(|t| t.permalink_url).as_deref(),
        Some("https://soundcloud.com/artist/opening")
    );
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_next_clamps_at_end_of_queue() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;
    assert_eq!(harness.store.snapshot().current_index, Some(0));

    assert_eq!(harness.actions.next().await, ActionOutcome::Executed);
    assert_eq!(harness.actions.next().await, ActionOutcome::Executed);
    assert_eq!(harness.store.snapshot().current_index, Some(2));

    assert_eq!(harness.actions.next().await, ActionOutcome::Ignored);
    settle().await;

    assert_eq!(harness.store.snapshot().current_index, Some(2));
    assert_eq!(harness.loader.last_widget().current_index(), 2);
}

#[tokio::test]
async fn test_wrap_navigation_goes_around() {
    let player = PlayerSettings {
        navigation: NavigationPolicy::Wrap,
        ..PlayerSettings::default()
    };
    let harness = Harness::with_settings(
        FakeLoader::new(playlist()),
        player,
        Arc::new(MemorySettingsStore::new()),
    );
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;

    assert_eq!(harness.actions.previous().await, ActionOutcome::Executed);
    assert_eq!(harness.store.snapshot().current_index, Some(2));
}

#[tokio::test]
async fn test_select_track_updates_store_immediately() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;

    assert_eq!(harness.actions.select_track(1).await, ActionOutcome::Executed);
    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.current_index, Some(1));
    assert_eq!(snapshot.track.unwrap().title, "Middle");
    assert_eq!(snapshot.position_ms, 0);

    assert_eq!(harness.actions.select_track(7).await, ActionOutcome::Ignored);
}

#[tokio::test]
async fn test_repeated_sound_keeps_selected_position() {
    let sounds = vec![
        WidgetSound::new(101, "Opening").with_duration_ms(180_000),
        WidgetSound::new(102, "Middle").with_duration_ms(240_000),
        WidgetSound::new(101, "Opening").with_duration_ms(180_000),
    ];
    let harness = Harness::ready(FakeLoader::new(sounds)).await;
    assert_eq!(harness.store.snapshot().current_index, Some(0));

    assert_eq!(harness.actions.select_track(2).await, ActionOutcome::Executed);
    assert_eq!(harness.store.snapshot().current_index, Some(2));

    // The widget's play event re-reads the current sound.
    settle().await;
    assert_eq!(harness.loader.last_widget().current_index(), 2);
    assert_eq!(harness.store.snapshot().current_index, Some(2));
}

#[tokio::test]
async fn test_seek_requires_known_duration() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;

    assert_eq!(harness.actions.seek_to_ratio(0.5).await, ActionOutcome::Executed);
    assert_eq!(harness.store.snapshot().position_ms, 90_000);

    assert_eq!(harness.actions.seek_to_ratio(f64::NAN).await, ActionOutcome::Ignored);
    assert_eq!(harness.actions.seek_to_ratio(3.0).await, ActionOutcome::Executed);
    assert_eq!(harness.store.snapshot().position_ms, 180_000);

    let idle = Harness::new(FakeLoader::new(playlist()));
    assert_eq!(idle.actions.seek_to_ratio(0.5).await, ActionOutcome::Ignored);
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_progress_is_throttled_and_finish_commits_duration() {
    let mut harness = Harness::ready(FakeLoader::new(playlist())).await;
    let widget = harness.loader.last_widget();
    harness.actions.play().await;
    settle().await;
    harness.drain_events();

    for position_ms in (178_000..180_000).step_by(50) {
        widget.emit(WidgetEvent::PlayProgress {
            position_ms,
            duration_ms: Some(180_000),
        });
        settle().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    widget.emit(WidgetEvent::Finish);
    settle().await;

    let positions: Vec<u64> = harness
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            PlaybackEvent::PositionChanged { position_ms, .. } => Some(position_ms),
            _ => None,
        })
        .collect();

    let (throttled, flushed) = positions.split_at(positions.len() - 2);
    assert_eq!(throttled.first(), Some(&178_000));
    assert!(throttled.windows(2).all(|pair| pair[1] - pair[0] >= 200));
    assert_eq!(throttled.len(), 10);
    assert_eq!(flushed, &[179_950, 180_000]);

    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.position_ms, 0);
    assert!(!snapshot.is_playing);
}

#[tokio::test]
async fn test_pause_flushes_latest_progress() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;
    let widget = harness.loader.last_widget();

    widget.emit(WidgetEvent::PlayProgress {
        position_ms: 1_000,
        duration_ms: Some(180_000),
    });
    widget.emit(WidgetEvent::PlayProgress {
        position_ms: 1_050,
        duration_ms: Some(180_000),
    });
    settle().await;
    assert_eq!(harness.store.snapshot().position_ms, 1_000);

    widget.emit(WidgetEvent::Pause);
    settle().await;
    assert_eq!(harness.store.snapshot().position_ms, 1_050);
}

#[tokio::test]
async fn test_seek_discards_progress_held_by_throttle() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;
    let widget = harness.loader.last_widget();

    widget.emit(WidgetEvent::PlayProgress {
        position_ms: 1_000,
        duration_ms: Some(180_000),
    });
    widget.emit(WidgetEvent::PlayProgress {
        position_ms: 1_050,
        duration_ms: Some(180_000),
    });
    settle().await;
    assert_eq!(harness.store.snapshot().position_ms, 1_000);

    assert_eq!(harness.actions.seek_to_ratio(0.5).await, ActionOutcome::Executed);
    assert_eq!(harness.store.snapshot().position_ms, 90_000);

    widget.emit(WidgetEvent::Pause);
    settle().await;
    assert_eq!(harness.store.snapshot().position_ms, 90_000);
}

// ============================================================================
// Volume
// ============================================================================

#[tokio::test]
async fn test_stored_volume_is_applied_on_ready() {
    let settings = Arc::new(MemorySettingsStore::new());
    settings.set_i64(VOLUME_STORAGE_KEY, 37).await.unwrap();

    let harness = Harness::with_settings(
        FakeLoader::new(playlist()),
        PlayerSettings::default(),
        settings,
    );
    assert_eq!(harness.store.hydrate_volume().await, Ok(37));
    harness.engine.attach_host(source()).await;
    harness.grant_media().await;

    assert_eq!(harness.loader.last_widget().volume(), Some(37));
    assert!(harness.store.snapshot().widget_volume_hydrated);
}

#[tokio::test]
async fn test_volume_before_ready_is_applied_on_ready() {
    let harness = Harness::new(FakeLoader::new(playlist()));

    assert_eq!(harness.actions.set_volume(150).await, ActionOutcome::Queued);
    assert_eq!(harness.store.snapshot().volume, 100);

    harness.engine.attach_host(source()).await;
    harness.grant_media().await;
    assert_eq!(harness.loader.last_widget().volume(), Some(100));
}

#[tokio::test]
async fn test_toggle_mute_restores_last_volume() {
    let harness = Harness::ready(FakeLoader::new(playlist())).await;
    let widget = harness.loader.last_widget();

    harness.actions.set_volume(65).await;
    assert_eq!(harness.actions.toggle_mute().await, ActionOutcome::Executed);
    assert_eq!(widget.volume(), Some(0));
    assert!(harness.store.snapshot().is_muted());

    harness.actions.toggle_mute().await;
    assert_eq!(widget.volume(), Some(65));
    assert_eq!(
        harness.settings.get_i64(VOLUME_STORAGE_KEY).await.unwrap(),
        Some(65)
    );
}
