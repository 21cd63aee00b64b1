use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeStoreError {
    #[error(transparent)]
    Wire(#[from] solver_wire::WireError),

    #[error(transparent)]
    BlobStore(#[from] solver_blobstore::BlobStoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("solution-tree-meta blob is malformed: {0}")]
    InvalidMeta(String),

    #[error("index blob is malformed: {0}")]
    InvalidIndex(String),
}

pub type TreeStoreResult<T> = Result<T, TreeStoreError>;
