//! Errors surfaced by host capabilities.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The widget client library never became available (blocked by an
    /// extension, offline, CSP).
    #[error("Widget script failed to load: {0}")]
    ScriptUnavailable(String),

    /// A call on a mounted widget was rejected by the host.
    #[error("Widget call failed: {0}")]
    WidgetCall(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
