use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("no frame is tracked under id {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("shared memory backend error: {0}")]
    SharedMemory(String),
}

pub type IpcResult<T> = Result<T, IpcError>;
