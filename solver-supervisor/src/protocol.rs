use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The supervisor-observable lifecycle of a solver child process. Mirrors
/// the state names the child itself reports; `Unknown` is a purely local
/// bookkeeping value meaning "we haven't heard from the child recently
/// enough to trust its last reported state".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverState {
    Unknown,
    Initializing,
    Ready,
    Solving,
    Cancelling,
    Closing,
    Closed,
}

impl SolverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverState::Unknown => "UNKNOWN",
            SolverState::Initializing => "INITIALIZING",
            SolverState::Ready => "READY",
            SolverState::Solving => "SOLVING",
            SolverState::Cancelling => "CANCELLING",
            SolverState::Closing => "CLOSING",
            SolverState::Closed => "CLOSED",
        }
    }
}

/// A command sent from the supervisor to the child over its stdin. The
/// child config is attached to each solve command rather than sent once up
/// front: `configure` on the supervisor side only validates and stashes the
/// config locally, and must never suspend waiting on the child.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SolvePath {
        config: Value,
        action_sequence: String,
    },
    SolveSubtree {
        config: Value,
        action_sequence: String,
        solve_depth: u32,
    },
    Cancel,
    Ping,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SolvePath { .. } => "SOLVE_PATH",
            Command::SolveSubtree { .. } => "SOLVE_SUBTREE",
            Command::Cancel => "CANCEL",
            Command::Ping => "PING",
        }
    }
}

/// A notification sent from the child to the supervisor over its stdout.
/// `frame_id` names a frame in the IPC frame store holding an encoded
/// [`solver_wire::BlobTreeNode`] sequence, present only on notifications
/// that actually carry a solve result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub state: SolverState,
    pub frame_id: Option<String>,
}
