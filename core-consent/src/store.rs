//! # Consent Store
//!
//! Process-wide record of which optional categories the visitor approved.
//!
//! ## Overview
//!
//! The store owns a `watch` channel of [`ConsentState`]. Every mutation:
//! 1. updates the in-memory state (subscribers see it immediately),
//! 2. persists the record as JSON under [`consent_storage_key`],
//! 3. emits a [`ConsentEvent`] on the event bus.
//!
//! Persistence failures never roll the in-memory choice back: the visitor's
//! decision applies for the session even when it cannot be stored.
//!
//! ## Usage
//!
//! ```ignore
//! let consent = Arc::new(ConsentStore::new(settings, clock, event_bus, Duration::from_millis(800)));
//! consent.initialize().await?;
//!
//! if !consent.media_allowed() {
//!     consent.open_manager("media_requested");
//! }
//! ```

use crate::error::{ConsentError, Result};
use crate::types::{
    consent_storage_key, ConsentCategory, ConsentPreferences, ConsentState, StoredConsent,
    CONSENT_KEY_PREFIX, CONSENT_SCHEMA_VERSION,
};
use bridge_traits::{Clock, SettingsStore};
use core_runtime::events::{ConsentEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// State shared with the delayed prompt task.
struct Shared {
    state: watch::Sender<ConsentState>,
    event_bus: EventBus,
}

impl Shared {
    fn open_manager(&self, reason: &str) {
        let opened = self.state.send_if_modified(|state| {
            if state.manager_open {
                return false;
            }
            state.manager_open = true;
            true
        });

        if opened {
            debug!(reason, "Opening consent manager");
            self.emit(ConsentEvent::ManagerOpened {
                reason: reason.to_string(),
            });
        }
    }

    fn emit(&self, event: ConsentEvent) {
        // No subscriber is a normal condition.
        let _ = self.event_bus.emit(CoreEvent::Consent(event));
    }
}

/// Persisted consent preferences plus the manager open/close flag.
pub struct ConsentStore {
    shared: Arc<Shared>,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    prompt_delay: Duration,
    prompt_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConsentStore {
    /// Creates a store with default (denied) preferences. Nothing is read
    /// until [`initialize`](Self::initialize) is called.
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        prompt_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConsentState::default());
        Self {
            shared: Arc::new(Shared { state, event_bus }),
            settings,
            clock,
            prompt_delay,
            prompt_task: Mutex::new(None),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ConsentState {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConsentState> {
        self.shared.state.subscribe()
    }

    pub fn is_allowed(&self, category: ConsentCategory) -> bool {
        self.shared.state.borrow().preferences.get(category)
    }

    /// Shorthand for `is_allowed(ConsentCategory::Media)`.
    pub fn media_allowed(&self) -> bool {
        self.is_allowed(ConsentCategory::Media)
    }

    /// Reads the persisted record.
    ///
    /// An absent, unreadable or outdated record leaves the defaults in place
    /// and schedules the manager to open after the prompt delay, unless a
    /// choice is made first. Never assumes consent.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        self.discard_legacy_records().await;

        let stored = match self.settings.get_string(&consent_storage_key()).await {
            Ok(raw) => raw.and_then(|raw| parse_record(&raw)),
            Err(e) => {
                warn!(error = %e, "Failed to read consent record");
                None
            }
        };

        match stored {
            Some(record) => {
                info!(
                    media = record.media,
                    analytics = record.analytics,
                    has_choice = record.has_choice,
                    "Restored consent choice"
                );
                let preferences = record.preferences();
                let has_choice = record.has_choice;
                self.shared.state.send_modify(|state| {
                    state.preferences = preferences;
                    state.has_choice = has_choice;
                    state.updated_at = record.updated_at();
                    state.hydrated = true;
                });
                self.emit_preferences();
                if !has_choice {
                    self.schedule_prompt();
                }
            }
            None => {
                debug!("No usable consent record, prompting after delay");
                self.shared.state.send_modify(|state| state.hydrated = true);
                self.schedule_prompt();
            }
        }

        Ok(())
    }

    /// Sets one category and persists the choice.
    ///
    /// # Errors
    ///
    /// - [`ConsentError::EssentialLocked`] when asked to disable `Essential`
    /// - [`ConsentError::Storage`] / [`ConsentError::Serialization`] when the
    ///   record could not be written; the in-memory choice still applies
    pub async fn set_category(&self, category: ConsentCategory, value: bool) -> Result<()> {
        if category == ConsentCategory::Essential {
            if value {
                return Ok(());
            }
            warn!("Refusing to disable the essential consent category");
            self.shared.emit(ConsentEvent::EssentialLocked);
            return Err(ConsentError::EssentialLocked);
        }

        let now = self.clock.now();
        self.shared.state.send_modify(|state| {
            state.preferences.set(category, value);
            state.has_choice = true;
            state.updated_at = Some(now);
        });
        debug!(category = %category, value, "Consent category updated");

        self.emit_preferences();
        self.persist().await
    }

    /// Grants every optional category and closes the manager.
    pub async fn accept_all(&self) -> Result<()> {
        self.apply_all(ConsentPreferences::all_granted()).await
    }

    /// Denies every optional category and closes the manager.
    pub async fn reject_all(&self) -> Result<()> {
        self.apply_all(ConsentPreferences::default()).await
    }

    /// Shows the consent manager. `reason` is only used for diagnostics.
    pub fn open_manager(&self, reason: &str) {
        self.shared.open_manager(reason);
    }

    pub fn close_manager(&self) {
        let closed = self.shared.state.send_if_modified(|state| {
            if !state.manager_open {
                return false;
            }
            state.manager_open = false;
            true
        });
        if closed {
            self.shared.emit(ConsentEvent::ManagerClosed);
        }
    }

    /// Forgets the stored choice, reverts to defaults and reopens the manager.
    pub async fn reset(&self) -> Result<()> {
        self.cancel_prompt();
        self.shared.state.send_modify(|state| {
            state.preferences = ConsentPreferences::default();
            state.has_choice = false;
            state.updated_at = None;
        });
        info!("Consent choice reset");

        self.shared.emit(ConsentEvent::Reset);
        self.emit_preferences();
        self.open_manager("reset");

        self.settings.delete(&consent_storage_key()).await?;
        Ok(())
    }

    async fn apply_all(&self, preferences: ConsentPreferences) -> Result<()> {
        self.cancel_prompt();
        let now = self.clock.now();
        self.shared.state.send_modify(|state| {
            state.preferences = preferences;
            state.has_choice = true;
            state.updated_at = Some(now);
        });
        info!(
            media = preferences.media,
            analytics = preferences.analytics,
            "Consent choice recorded"
        );

        self.emit_preferences();
        self.close_manager();
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let record = {
            let state = self.shared.state.borrow();
            StoredConsent::new(
                state.preferences,
                state.has_choice,
                self.clock.unix_timestamp_millis(),
            )
        };

        let json = serde_json::to_string(&record)?;
        if let Err(e) = self.settings.set_string(&consent_storage_key(), &json).await {
            warn!(error = %e, "Failed to persist consent record");
            return Err(e.into());
        }
        Ok(())
    }

    /// Records written by other schema versions are never read again.
    async fn discard_legacy_records(&self) {
        let current = consent_storage_key();
        let keys = match self.settings.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                debug!(error = %e, "Could not list settings keys");
                return;
            }
        };

        for key in keys
            .into_iter()
            .filter(|key| key.starts_with(CONSENT_KEY_PREFIX) && *key != current)
        {
            debug!(key = %key, "Removing outdated consent record");
            if let Err(e) = self.settings.delete(&key).await {
                warn!(key = %key, error = %e, "Failed to remove outdated consent record");
            }
        }
    }

    fn schedule_prompt(&self) {
        self.cancel_prompt();

        let shared = Arc::clone(&self.shared);
        let delay = self.prompt_delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !shared.state.borrow().has_choice {
                shared.open_manager("first_visit");
            }
        });
        *self.prompt_task.lock() = Some(task);
    }

    fn cancel_prompt(&self) {
        if let Some(task) = self.prompt_task.lock().take() {
            task.abort();
        }
    }

    fn emit_preferences(&self) {
        let (preferences, has_choice) = {
            let state = self.shared.state.borrow();
            (state.preferences, state.has_choice)
        };
        self.shared.emit(ConsentEvent::PreferencesChanged {
            media: preferences.media,
            analytics: preferences.analytics,
            has_choice,
        });
    }
}

impl Drop for ConsentStore {
    fn drop(&mut self) {
        self.cancel_prompt();
    }
}

fn parse_record(raw: &str) -> Option<StoredConsent> {
    match serde_json::from_str::<StoredConsent>(raw) {
        Ok(record) if record.version == CONSENT_SCHEMA_VERSION => Some(record),
        Ok(record) => {
            info!(
                stored = record.version,
                current = CONSENT_SCHEMA_VERSION,
                "Consent record version changed, asking again"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "Ignoring malformed consent record");
            None
        }
    }
}
