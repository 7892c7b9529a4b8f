use huddle_core::collaboration::ResourceKey;
use huddle_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No active lock on {0}")]
    LockNotFound(ResourceKey),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type CollabResult<T> = Result<T, CollabError>;
