use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[source] anyhow::Error),

    #[error("storage call timed out")]
    Timeout,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("offer not found: {0}")]
    OfferNotFound(String),

    #[error("invalid import data format: {0}")]
    InvalidImport(&'static str),

    #[error("store initialization failed after {attempts} attempts")]
    InitFailed { attempts: u32 },
}

impl StoreError {
    /// Whether the caller should retry the operation. Storage-layer
    /// unavailability and timeouts are transient; shape errors are not.
    pub fn should_retry(&self) -> bool {
        match self {
            // Temporary errors - retry
            Self::Backend(_) => true,
            Self::Timeout => true,

            // Fatal errors - don't retry
            Self::Serialization(_) => false,
            Self::OfferNotFound(_) => false,
            Self::InvalidImport(_) => false,
            Self::InitFailed { .. } => false,
        }
    }
}
