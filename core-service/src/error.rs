use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Player initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Consent error: {0}")]
    Consent(#[from] core_consent::ConsentError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
