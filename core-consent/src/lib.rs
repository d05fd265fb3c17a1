//! # Consent Module
//!
//! Tracks which optional capability categories the visitor approved and
//! whether the consent manager should be shown.
//!
//! ## Overview
//!
//! - [`ConsentStore`]: persisted preferences, manager trigger, change
//!   notification through a `watch` channel and the event bus
//! - [`ConsentCategory`]: `Essential` (always on), `Media` (third-party
//!   embeds such as the audio widget), `Analytics`
//!
//! The playback core only consumes the media gate: the widget is never
//! mounted while `Media` is denied.

pub mod error;
pub mod store;
pub mod types;

pub use error::{ConsentError, Result};
pub use store::ConsentStore;
pub use types::{
    consent_storage_key, ConsentCategory, ConsentPreferences, ConsentState,
    CONSENT_SCHEMA_VERSION,
};
