use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("timed out waiting for the solver process ({waited:?} elapsed)")]
    Timeout { waited: std::time::Duration },

    #[error("solver process died unexpectedly")]
    Died,

    #[error("solver process raised during {during}: {message}")]
    ChildException { during: &'static str, message: String },

    #[error("solver did not return any frames for this solve")]
    NoResult,

    #[error("operation requires solver state {expected:?}, was {actual:?}")]
    InvalidState {
        expected: &'static str,
        actual: crate::protocol::SolverState,
    },

    #[error("path solve returned {got} tree nodes, expected {expected}")]
    PathNodeCountMismatch { expected: usize, got: usize },

    #[error("failed to kill and reap solver process within the grace period")]
    TeardownTimedOut,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] solver_wire::WireError),

    #[error(transparent)]
    Ipc(#[from] solver_ipc::IpcError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
