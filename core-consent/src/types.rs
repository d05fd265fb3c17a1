//! Consent data model and its persisted form.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the persisted consent record. Records written under another
/// version are treated as absent and the visitor is asked again.
pub const CONSENT_SCHEMA_VERSION: u32 = 2;

/// Prefix shared by every versioned consent key.
pub const CONSENT_KEY_PREFIX: &str = "soundstage.consent.v";

/// Settings key the current record lives under.
pub fn consent_storage_key() -> String {
    format!("{}{}", CONSENT_KEY_PREFIX, CONSENT_SCHEMA_VERSION)
}

/// Optional capability the visitor can approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    /// Required for the site to work. Always granted.
    Essential,
    /// Third-party embeds (the audio widget).
    Media,
    /// Audience measurement.
    Analytics,
}

impl ConsentCategory {
    pub const ALL: [ConsentCategory; 3] = [
        ConsentCategory::Essential,
        ConsentCategory::Media,
        ConsentCategory::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentCategory::Essential => "essential",
            ConsentCategory::Media => "media",
            ConsentCategory::Analytics => "analytics",
        }
    }
}

impl fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category decisions. `essential` is always true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentPreferences {
    pub essential: bool,
    pub media: bool,
    pub analytics: bool,
}

impl Default for ConsentPreferences {
    /// Nothing optional is assumed.
    fn default() -> Self {
        Self {
            essential: true,
            media: false,
            analytics: false,
        }
    }
}

impl ConsentPreferences {
    pub fn all_granted() -> Self {
        Self {
            essential: true,
            media: true,
            analytics: true,
        }
    }

    pub fn get(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Essential => true,
            ConsentCategory::Media => self.media,
            ConsentCategory::Analytics => self.analytics,
        }
    }

    pub(crate) fn set(&mut self, category: ConsentCategory, value: bool) {
        match category {
            ConsentCategory::Essential => self.essential = true,
            ConsentCategory::Media => self.media = value,
            ConsentCategory::Analytics => self.analytics = value,
        }
    }
}

/// Observable consent state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsentState {
    pub preferences: ConsentPreferences,
    /// The visitor made an explicit choice (stored or this session).
    pub has_choice: bool,
    /// The consent manager UI should be shown.
    pub manager_open: bool,
    /// The persisted record has been read.
    pub hydrated: bool,
    /// When the current choice was made.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConsentState {
    pub fn media_allowed(&self) -> bool {
        self.preferences.media
    }
}

/// JSON shape of the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredConsent {
    pub essential: bool,
    pub media: bool,
    pub analytics: bool,
    pub version: u32,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    pub has_choice: bool,
}

impl StoredConsent {
    pub fn new(preferences: ConsentPreferences, has_choice: bool, updated_at_ms: i64) -> Self {
        Self {
            essential: true,
            media: preferences.media,
            analytics: preferences.analytics,
            version: CONSENT_SCHEMA_VERSION,
            updated_at: updated_at_ms,
            has_choice,
        }
    }

    pub fn preferences(&self) -> ConsentPreferences {
        ConsentPreferences {
            essential: true,
            media: self.media,
            analytics: self.analytics,
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.updated_at).single()
    }
}
