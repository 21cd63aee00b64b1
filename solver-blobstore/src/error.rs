use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("no blob was found for key {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid store path: {0}")]
    InvalidStore(String),
}

pub type BlobStoreResult<T> = Result<T, BlobStoreError>;
