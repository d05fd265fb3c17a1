use thiserror::Error;

/// Errors raised while assembling the runtime: configuration, missing host
/// capabilities and subscriber installation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Settings store could not be opened: {0}")]
    SettingsUnavailable(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
