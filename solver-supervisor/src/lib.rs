//! Supervises a solver child process: spawns it, drives it through its
//! command/notification protocol, and streams back decoded solve results.

pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod logging;
pub mod monitor;
pub mod process;
pub mod protocol;

pub use client::SolverProcessClient;
pub use config::{SolverConfig, SupervisorConfig};
pub use error::{SupervisorError, SupervisorResult};
pub use protocol::{Command, Notification, SolverState};
