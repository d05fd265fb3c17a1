use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsentError {
    #[error("Consent storage unavailable: {0}")]
    Storage(#[from] BridgeError),

    #[error("Consent record could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("The essential category is always enabled")]
    EssentialLocked,
}

pub type Result<T> = std::result::Result<T, ConsentError>;
