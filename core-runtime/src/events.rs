//! # Event Bus System
//!
//! Decoupled notification channel for the player core, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: typed enums per domain ([`ConsentEvent`], [`PlaybackEvent`])
//! - **EventBus**: broadcast channel that any component may publish on
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ ConsentStore ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Analytics  │
//!                                │ (broadcast│                  └────────────┘
//! ┌──────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │PlaybackEngine├──────────────>│           ├─────────────────>│ Host shell │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! The bus mirrors state transitions for observers that are not UI surfaces
//! (diagnostics, host analytics once consented). UI surfaces read the
//! playback snapshot channel instead; they never depend on this bus.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::WidgetReady { sound_count: 3 }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Widget ready");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.
//!
//! Publishing with no subscriber returns `Err`, which emitters ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Consent preference and manager changes
    Consent(ConsentEvent),
    /// Widget lifecycle and playback state changes
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Consent(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Consent(ConsentEvent::EssentialLocked) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::WidgetReady { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::WidgetTornDown { .. }) => EventSeverity::Info,
            CoreEvent::Consent(ConsentEvent::PreferencesChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Consent Events
// ============================================================================

/// Events raised by the consent store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConsentEvent {
    /// The stored preferences changed.
    PreferencesChanged {
        media: bool,
        analytics: bool,
        /// Whether the user has made an explicit choice.
        has_choice: bool,
    },
    /// The consent manager was opened.
    ManagerOpened {
        /// What triggered it (e.g. "first_visit", "media_requested", "user").
        reason: String,
    },
    /// The consent manager was closed.
    ManagerClosed,
    /// A request to disable the essential category was refused.
    EssentialLocked,
    /// The stored choice was forgotten.
    Reset,
}

impl ConsentEvent {
    fn description(&self) -> &str {
        match self {
            ConsentEvent::PreferencesChanged { .. } => "Consent preferences changed",
            ConsentEvent::ManagerOpened { .. } => "Consent manager opened",
            ConsentEvent::ManagerClosed => "Consent manager closed",
            ConsentEvent::EssentialLocked => "Essential consent cannot be disabled",
            ConsentEvent::Reset => "Consent choice reset",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events raised by the playback engine and actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The widget lifecycle status changed.
    StatusChanged {
        /// New status ("idle", "loading", "ready", "error").
        status: String,
    },
    /// A widget instance was mounted and is waiting for readiness.
    WidgetMounted {
        /// Identifier of the mounted instance.
        instance_id: String,
    },
    /// The widget reported readiness and the store was seeded.
    WidgetReady {
        /// Number of sounds in the embedded playlist.
        sound_count: usize,
    },
    /// The widget was torn down.
    WidgetTornDown {
        /// Why ("consent_revoked", "host_detached", "shutdown").
        reason: String,
    },
    /// Playback started or resumed.
    Started {
        /// The track ID being played, when known.
        track_id: Option<String>,
    },
    /// Playback paused.
    Paused {
        track_id: Option<String>,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Track finished playing naturally.
    Completed {
        track_id: Option<String>,
    },
    /// The current track changed.
    TrackChanged {
        track_id: String,
        title: String,
    },
    /// A throttled progress sample was committed.
    PositionChanged {
        track_id: Option<String>,
        /// New position (milliseconds).
        position_ms: u64,
        /// Track duration (milliseconds), 0 when unknown.
        duration_ms: u64,
    },
    /// The volume changed.
    VolumeChanged {
        /// Volume on the 0-100 scale.
        volume: u8,
    },
    /// A command was stored until the widget becomes ready.
    ActionQueued {
        /// Command name (e.g. "play", "next").
        action: String,
    },
    /// A stored command was executed against the widget.
    ActionDrained {
        action: String,
    },
    /// Playback error occurred.
    Error {
        /// Human-readable error message.
        message: String,
        /// Whether remounting the widget may succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StatusChanged { .. } => "Playback status changed",
            PlaybackEvent::WidgetMounted { .. } => "Widget mounted",
            PlaybackEvent::WidgetReady { .. } => "Widget ready",
            PlaybackEvent::WidgetTornDown { .. } => "Widget torn down",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::ActionQueued { .. } => "Playback action queued",
            PlaybackEvent::ActionDrained { .. } => "Pending playback action executed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Clones share the same channel. Each `subscribe()` creates an independent
/// receiver; slow receivers get `RecvError::Lagged` without blocking others.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let consent_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Consent(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Keep only events at or above `min` severity.
    pub fn min_severity(self, min: EventSeverity) -> Self {
        self.filter(move |event| event.severity() >= min)
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
