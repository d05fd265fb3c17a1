//! Player service façade and bootstrap helpers.
//!
//! This crate wires a [`CoreConfig`] (host-provided settings store and
//! widget loader) into one consent store, one playback store, one engine and
//! the shared action handle. Hosts create a single [`PlayerService`] per page
//! session and hand clones of [`PlayerService::actions`] and
//! [`PlayerService::subscribe`] to every UI surface.
//!
//! Desktop hosts typically enable the `desktop-shims` feature, which lets
//! [`bootstrap_desktop`] open the default SQLite settings store.

pub mod error;

pub use error::{Result, ServiceError};

use bridge_traits::WidgetSource;
use core_consent::ConsentStore;
use core_playback::{
    ControlsView, PlaybackActions, PlaybackEngine, PlaybackSnapshot, PlaybackStore,
    TrackListView,
};
use core_runtime::config::{CoreConfig, PlayerSettings};
use core_runtime::events::{EventBus, EventStream};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct PlayerService {
    settings: PlayerSettings,
    event_bus: EventBus,
    consent: Arc<ConsentStore>,
    store: Arc<PlaybackStore>,
    engine: PlaybackEngine,
    actions: PlaybackActions,
}

impl PlayerService {
    /// Creates the service. Nothing is read from storage until
    /// [`start`](Self::start).
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let CoreConfig {
            settings_store,
            widget_loader,
            clock,
            player,
        } = config;

        let event_bus = EventBus::new(player.event_buffer_size);
        let consent = Arc::new(ConsentStore::new(
            Arc::clone(&settings_store),
            clock,
            event_bus.clone(),
            player.consent_prompt_delay(),
        ));
        let store = Arc::new(PlaybackStore::new(
            settings_store,
            event_bus.clone(),
            player.default_volume,
            player.navigation,
        ));
        let engine = PlaybackEngine::new(Arc::clone(&store), widget_loader, player.clone());
        let actions = PlaybackActions::new(Arc::clone(&store), Arc::clone(&consent));

        Ok(Self {
            settings: player,
            event_bus,
            consent,
            store,
            engine,
            actions,
        })
    }

    /// Restores consent and volume, then lets consent drive the widget.
    ///
    /// An unreadable volume is not fatal: the default applies.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        self.consent.initialize().await?;
        if let Err(e) = self.store.hydrate_volume().await {
            warn!(error = %e, "Using default volume");
        }
        self.engine.watch_consent(self.consent.subscribe());

        info!(
            media_allowed = self.consent.media_allowed(),
            volume = self.store.snapshot().volume,
            "Player service started"
        );
        Ok(())
    }

    /// Registers the element hosting the widget.
    pub async fn attach_host(&self, source: WidgetSource) {
        self.engine.attach_host(source).await;
    }

    pub async fn detach_host(&self) {
        self.engine.detach_host().await;
    }

    /// Remounts the widget after a failure.
    pub async fn retry(&self) {
        self.engine.retry().await;
    }

    /// Iframe `src` for a source under the configured player origin.
    pub fn embed_src(&self, source: &WidgetSource) -> String {
        source.embed_src(&self.settings.player_origin)
    }

    pub fn actions(&self) -> PlaybackActions {
        self.actions.clone()
    }

    /// Snapshot channel for UI surfaces.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.store.snapshot()
    }

    pub fn controls(&self) -> ControlsView {
        ControlsView::from_snapshot(&self.store.snapshot(), self.settings.navigation)
    }

    pub fn track_list(&self) -> TrackListView {
        TrackListView::from_snapshot(&self.store.snapshot())
    }

    pub fn consent(&self) -> &Arc<ConsentStore> {
        &self.consent
    }

    pub fn store(&self) -> &Arc<PlaybackStore> {
        &self.store
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Event stream over the service's bus.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Tears the widget down and stops following consent.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
        info!("Player service stopped");
    }
}

/// Convenience bootstrapper for desktop hosts: SQLite settings at
/// `settings_path`, default player settings, started.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example(loader: std::sync::Arc<dyn bridge_traits::WidgetLoader>) -> core_service::Result<()> {
/// use core_service::bootstrap_desktop;
///
/// let player = bootstrap_desktop(loader, "/tmp/soundstage/settings.db").await?;
/// let actions = player.actions();
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    loader: Arc<dyn bridge_traits::WidgetLoader>,
    settings_path: impl Into<std::path::PathBuf>,
) -> Result<PlayerService> {
    let config = CoreConfig::builder()
        .widget_loader(loader)
        .settings_path(settings_path)
        .build()
        .await?;
    let service = PlayerService::new(config)?;
    service.start().await?;
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::MemorySettingsStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        BridgeError, PlaybackWidget, SettingsStore, WidgetEventSender, WidgetLoader,
    };
    use core_consent::consent_storage_key;
    use core_playback::{ActionOutcome, PlaybackStatus, VOLUME_STORAGE_KEY};
    use core_runtime::events::{CoreEvent, EventSeverity, PlaybackEvent};
    use mockall::mock;
    use std::time::Duration;

    mock! {
        Loader {}

        #[async_trait]
        impl WidgetLoader for Loader {
            async fn load_script(&self) -> BridgeResult<()>;
            async fn mount(
                &self,
                source: &WidgetSource,
                events: WidgetEventSender,
            ) -> BridgeResult<Arc<dyn PlaybackWidget>>;
        }
    }

    fn blocked_loader(script_loads: usize) -> MockLoader {
        let mut loader = MockLoader::new();
        loader
            .expect_load_script()
            .times(script_loads)
            .returning(|| Err(BridgeError::ScriptUnavailable("blocked".to_string())));
        loader.expect_mount().never();
        loader
    }

    async fn service(loader: MockLoader, settings: Arc<MemorySettingsStore>) -> PlayerService {
        let config = CoreConfig::builder()
            .widget_loader(Arc::new(loader))
            .settings_store(settings)
            .consent_prompt_delay(Duration::from_millis(800))
            .build()
            .await
            .unwrap();
        PlayerService::new(config).unwrap()
    }

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    fn source() -> WidgetSource {
        WidgetSource::new("https://soundcloud.com/artist/track")
    }

    #[tokio::test]
    async fn test_first_visit_does_not_load_widget() {
        let player = service(blocked_loader(0), Arc::new(MemorySettingsStore::new())).await;
        player.start().await.unwrap();
        player.attach_host(source()).await;
        settle().await;

        assert_eq!(
            player.actions().play().await,
            ActionOutcome::ConsentRequested
        );
        assert!(player.consent().state().manager_open);
        assert_eq!(player.snapshot().status, PlaybackStatus::Idle);

        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_restores_consent_and_volume() {
        let settings = Arc::new(MemorySettingsStore::new());
        settings.set_i64(VOLUME_STORAGE_KEY, 42).await.unwrap();
        {
            let previous = service(blocked_loader(0), settings.clone()).await;
            previous.consent().accept_all().await.unwrap();
        }
        assert!(settings.has_key(&consent_storage_key()).await.unwrap());

        let player = service(blocked_loader(1), settings).await;
        player.start().await.unwrap();
        player.attach_host(source()).await;
        settle().await;

        let snapshot = player.snapshot();
        assert_eq!(snapshot.volume, 42);
        assert!(snapshot.media_allowed);
        assert_eq!(snapshot.status, PlaybackStatus::Error);

        let controls = player.controls();
        assert!(!controls.enabled);
        assert!(controls.hint.is_some());

        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_script_failure_is_reported_on_event_bus() {
        let settings = Arc::new(MemorySettingsStore::new());
        let player = service(blocked_loader(1), settings).await;
        let mut errors = player.events().min_severity(EventSeverity::Error);

        player.start().await.unwrap();
        player.consent().accept_all().await.unwrap();
        player.attach_host(source()).await;
        settle().await;

        match errors.recv().await.unwrap() {
            CoreEvent::Playback(PlaybackEvent::Error { recoverable, .. }) => {
                assert!(recoverable)
            }
            other => panic!("unexpected event: {:?}", other),
        }

        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let result = CoreConfig::builder()
            .widget_loader(Arc::new(MockLoader::new()))
            .settings_store(Arc::new(MemorySettingsStore::new()))
            .default_volume(180)
            .build()
            .await;

        assert!(matches!(result, Err(core_runtime::Error::Config(_))));
    }

    #[tokio::test]
    async fn test_embed_src_uses_configured_origin() {
        let config = CoreConfig::builder()
            .widget_loader(Arc::new(MockLoader::new()))
            .settings_store(Arc::new(MemorySettingsStore::new()))
            .player_origin("https://player.example.test/")
            .build()
            .await
            .unwrap();
        let player = PlayerService::new(config).unwrap();

        assert!(player
            .embed_src(&source())
            .starts_with("https://player.example.test/?url=https%3A%2F%2Fsoundcloud.com"));
    }
}
