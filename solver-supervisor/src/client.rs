use std::time::Duration;

use async_stream::try_stream;
use futures::Stream;
use solver_ipc::FrameStore;
use solver_wire::{Action, ActionSequence, BlobTreeNode, SolutionTreeBuilder, SolutionTreeNode, SolvedSpot};

use crate::config::{SolverConfig, SupervisorConfig};
use crate::error::{SupervisorError, SupervisorResult};
use crate::logging;
use crate::monitor::ProcessMonitor;
use crate::process::ChildHandle;
use crate::protocol::{Command, Notification, SolverState};

/// A duration treated as "no limit" when the caller passes [`Duration::ZERO`]
/// for a timeout budget.
const NO_LIMIT: Duration = Duration::from_secs(365 * 24 * 3600);

/// Grace period between asking a child to shut down and forcibly killing it.
pub const PROCESS_TERMINATION_NOTICE_PERIOD: Duration = Duration::from_millis(50);
/// Grace period allowed for a killed child to actually be reaped.
pub const PROCESS_KILL_TIMEOUT: Duration = Duration::from_secs(1);

fn effective(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        NO_LIMIT
    } else {
        timeout
    }
}

/// Drives one solver child process through its full lifecycle: spawn,
/// initialize, configure, solve, cancel, close. Owns the process's frame
/// store and per-run log directory; `close` (or dropping the client) must
/// always run to avoid leaking either.
pub struct SolverProcessClient {
    supervisor_config: SupervisorConfig,
    state: SolverState,
    config: Option<SolverConfig>,
    child: Option<ChildHandle>,
    frame_store: Option<Box<dyn FrameStore>>,
    monitor: Option<ProcessMonitor>,
}

impl SolverProcessClient {
    pub fn new(supervisor_config: SupervisorConfig) -> Self {
        SolverProcessClient {
            supervisor_config,
            state: SolverState::Unknown,
            config: None,
            child: None,
            frame_store: None,
            monitor: None,
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn has_known_state(&self) -> bool {
        self.state != SolverState::Unknown
    }

    pub fn is_ready(&self) -> bool {
        self.state == SolverState::Ready
    }

    pub fn is_solving(&self) -> bool {
        self.state == SolverState::Solving
    }

    pub fn is_cancelling(&self) -> bool {
        self.state == SolverState::Cancelling
    }

    pub fn is_closing(&self) -> bool {
        self.state == SolverState::Closing
    }

    pub fn is_closed(&self) -> bool {
        self.state == SolverState::Closed
    }

    pub fn has_running_process(&mut self) -> bool {
        self.child.as_mut().is_some_and(|c| c.is_alive())
    }

    pub fn has_config(&self) -> bool {
        self.config.is_some()
    }

    pub fn monitor(&self) -> Option<&ProcessMonitor> {
        self.monitor.as_ref()
    }

    fn invalidate_state(&mut self) {
        self.state = SolverState::Unknown;
    }

    /// Spawn the child and drain notifications until it reports READY.
    pub async fn initialize(&mut self, timeout: Duration, notification_timeout: Duration) -> SupervisorResult<()> {
        let monitor = ProcessMonitor::create(self.supervisor_config.log_directory_root.as_deref())?;
        let frame_store: Box<dyn FrameStore> = if self.supervisor_config.force_file_backed_frames {
            Box::new(solver_ipc::FileBackedFrameStore::new(monitor.dir()))
        } else {
            solver_ipc::select_frame_store(monitor.dir())
        };

        self.monitor = Some(monitor);
        self.frame_store = Some(frame_store);
        self.invalidate_state();

        let monitor_dir = self.monitor.as_ref().expect("just set").dir().to_path_buf();
        let stderr_path = self
            .monitor
            .as_ref()
            .expect("just set")
            .stderr_path("0000-initialize");
        let child = ChildHandle::spawn(&self.supervisor_config, &stderr_path, &monitor_dir)?;
        self.child = Some(child);

        self.drain_notifications_until(SolverState::Ready, "initialize", timeout, notification_timeout)
            .await
    }

    /// Validate and stash the solver config. Synchronous: never touches the
    /// child, so it can never suspend.
    pub fn configure(&mut self, config: SolverConfig) -> SupervisorResult<()> {
        self.require_state(SolverState::Ready)?;
        self.config = Some(config);
        Ok(())
    }

    pub async fn cancel(&mut self, timeout: Duration, notification_timeout: Duration) -> SupervisorResult<()> {
        self.require_state(SolverState::Solving)?;
        self.invalidate_state();
        self.child_mut()?.send_command(&Command::Cancel).await?;
        self.drain_notifications_until(SolverState::Ready, "cancel", timeout, notification_timeout)
            .await
    }

    pub async fn ping(&mut self, notification_timeout: Duration) -> SupervisorResult<SolverState> {
        self.child_mut()?.send_command(&Command::Ping).await?;
        let notification = self.recv_with_timeout("ping", effective(notification_timeout)).await?;
        self.state = notification.state;
        Ok(notification.state)
    }

    /// Kill and reap the child, releasing every frame it still holds.
    /// Idempotent: calling `close` on an already-closed client is a no-op.
    pub async fn close(&mut self) -> SupervisorResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = SolverState::Closing;

        if let Some(store) = self.frame_store.as_mut() {
            let _ = store.destroy_all();
        }

        tokio::time::sleep(PROCESS_TERMINATION_NOTICE_PERIOD).await;

        let teardown = if let Some(child) = self.child.as_mut() {
            child.ensure_closed(PROCESS_KILL_TIMEOUT).await
        } else {
            Ok(())
        };

        self.child = None;
        self.state = SolverState::Closed;

        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.finalize();
        }

        teardown
    }

    pub fn shared_memory_usage(&self) -> usize {
        self.frame_store.as_ref().map(|s| s.memory_usage()).unwrap_or(0)
    }

    /// Destroy every frame the store still holds. Must be called
    /// periodically by a long-lived caller — otherwise shared-memory
    /// segments accumulate until `close` finally reclaims them.
    pub fn release_shared_memory(&mut self) -> SupervisorResult<()> {
        if let Some(store) = self.frame_store.as_mut() {
            store.destroy_all()?;
        }
        Ok(())
    }

    /// Stream the raw IPC frame bytes produced by a path solve, one per
    /// notification carrying a result. Errors if the solve finished without
    /// ever producing a frame.
    pub fn solve_path_as_ipc_frames<'a>(
        &'a mut self,
        action_sequence: ActionSequence,
        timeout: Duration,
        notification_timeout: Duration,
    ) -> impl Stream<Item = SupervisorResult<Vec<u8>>> + 'a {
        try_stream! {
            self.require_state(SolverState::Ready)?;
            let config = self.config.clone().ok_or_else(|| SupervisorError::InvalidState {
                expected: "configured",
                actual: self.state,
            })?;
            self.invalidate_state();

            let command = Command::SolvePath {
                config: config.into_value(),
                action_sequence: action_sequence.to_string(),
            };
            self.child_mut()?.send_command(&command).await?;

            let mut num_yielded = 0usize;
            for await bytes in self.drain_solve_notifications(timeout, notification_timeout) {
                let bytes = bytes?;
                num_yielded += 1;
                yield bytes;
            }

            if num_yielded == 0 {
                Err(self.zero_result_error("solve_path"))?;
            }
        }
    }

    pub fn solve_subtree_as_ipc_frames<'a>(
        &'a mut self,
        action_sequence: ActionSequence,
        solve_depth: u32,
        timeout: Duration,
        notification_timeout: Duration,
    ) -> impl Stream<Item = SupervisorResult<Vec<u8>>> + 'a {
        try_stream! {
            self.require_state(SolverState::Ready)?;
            let config = self.config.clone().ok_or_else(|| SupervisorError::InvalidState {
                expected: "configured",
                actual: self.state,
            })?;
            self.invalidate_state();

            let command = Command::SolveSubtree {
                config: config.into_value(),
                action_sequence: action_sequence.to_string(),
                solve_depth,
            };
            self.child_mut()?.send_command(&command).await?;

            let mut num_yielded = 0usize;
            for await bytes in self.drain_solve_notifications(timeout, notification_timeout) {
                let bytes = bytes?;
                num_yielded += 1;
                yield bytes;
            }

            if num_yielded == 0 {
                Err(self.zero_result_error("solve_subtree"))?;
            }
        }
    }

    /// Path solve as an incrementally built [`solver_wire::SolutionTree`]:
    /// each yielded node is validated against the expected node count
    /// (`len(action_sequence) + 1`, root through to the solved leaf).
    pub async fn solve_path_as_solution_tree(
        &mut self,
        action_sequence: ActionSequence,
        timeout: Duration,
        notification_timeout: Duration,
    ) -> SupervisorResult<solver_wire::SolutionTree> {
        let expected_nodes = action_sequence.len() + 1;
        let mut builder = SolutionTreeBuilder::new();
        let mut num_nodes_yielded = 0usize;

        {
            let frames = self.solve_path_as_ipc_frames(action_sequence, timeout, notification_timeout);
            futures::pin_mut!(frames);
            use futures::StreamExt;
            while let Some(frame) = frames.next().await {
                let bytes = frame?;
                num_nodes_yielded += decode_frame_into_builder(&mut builder, &bytes)?;
            }
        }

        if num_nodes_yielded != expected_nodes {
            return Err(SupervisorError::PathNodeCountMismatch {
                expected: expected_nodes,
                got: num_nodes_yielded,
            });
        }

        Ok(builder.build())
    }

    pub async fn solve_subtree_as_solution_tree(
        &mut self,
        action_sequence: ActionSequence,
        solve_depth: u32,
        timeout: Duration,
        notification_timeout: Duration,
    ) -> SupervisorResult<solver_wire::SolutionTree> {
        let mut builder = SolutionTreeBuilder::new();

        {
            let frames = self.solve_subtree_as_ipc_frames(action_sequence, solve_depth, timeout, notification_timeout);
            futures::pin_mut!(frames);
            use futures::StreamExt;
            while let Some(frame) = frames.next().await {
                let bytes = frame?;
                decode_frame_into_builder(&mut builder, &bytes)?;
            }
        }

        Ok(builder.build())
    }

    pub fn gen_output_lines(&self) -> std::io::Result<Vec<String>> {
        self.monitor.as_ref().map(|m| m.output_lines()).unwrap_or(Ok(Vec::new()))
    }

    pub fn gen_log_lines(&self) -> std::io::Result<Vec<String>> {
        self.monitor.as_ref().map(|m| m.log_lines()).unwrap_or(Ok(Vec::new()))
    }

    pub fn gen_error_lines(&self) -> std::io::Result<Vec<String>> {
        self.monitor.as_ref().map(|m| m.error_lines()).unwrap_or(Ok(Vec::new()))
    }

    pub fn gen_event_records(&self) -> std::io::Result<Vec<serde_json::Value>> {
        self.monitor.as_ref().map(|m| m.event_records()).unwrap_or(Ok(Vec::new()))
    }

    fn require_state(&self, expected: SolverState) -> SupervisorResult<()> {
        if self.state != expected {
            return Err(SupervisorError::InvalidState {
                expected: expected.as_str(),
                actual: self.state,
            });
        }
        Ok(())
    }

    fn child_mut(&mut self) -> SupervisorResult<&mut ChildHandle> {
        self.child.as_mut().ok_or(SupervisorError::Died)
    }

    /// A solve that completed normally (the child returned to READY) but
    /// produced no frames is ambiguous: it may be a genuine empty result, or
    /// the child may have swallowed an in-solve exception and reported READY
    /// anyway (the child never crashes in that case, so nothing else
    /// distinguishes the two). Stderr captured since the child was spawned is
    /// the only other signal available, so a non-empty stderr stream is
    /// treated as evidence of the latter.
    fn zero_result_error(&self, during: &'static str) -> SupervisorError {
        let stderr = self.monitor.as_ref().and_then(|m| m.error_lines().ok()).unwrap_or_default();
        if stderr.is_empty() {
            SupervisorError::NoResult
        } else {
            SupervisorError::ChildException {
                during,
                message: stderr.join("\n"),
            }
        }
    }

    async fn recv_with_timeout(&mut self, during: &'static str, notification_timeout: Duration) -> SupervisorResult<Notification> {
        let result = {
            let child = self.child.as_mut().ok_or(SupervisorError::Died)?;
            match tokio::time::timeout(notification_timeout, child.recv_notification()).await {
                Ok(Ok(notification)) => Ok(notification),
                Ok(Err(_)) if !child.is_alive() => Err(SupervisorError::Died),
                Ok(Err(e)) => Err(e),
                Err(_) if !child.is_alive() => Err(SupervisorError::Died),
                Err(_) => Err(SupervisorError::Timeout {
                    waited: notification_timeout,
                }),
            }
        };
        if let Err(e) = &result {
            tracing::warn!(during, error = %e, "notification wait ended in error");
            self.kill_child_after_failure().await;
        }
        result
    }

    /// Kill and reap the child as part of the same failing call: a timeout,
    /// a dead child, or a broken notification channel all mean the child is
    /// no longer usable, so the operation that discovers this tears it down
    /// itself rather than leaving a hung or zombie process for a caller to
    /// separately notice and `close()`. The frame store and log directory
    /// are left alone here — `close()` must still be called to reclaim
    /// those, same as after any other end to the client's lifecycle.
    async fn kill_child_after_failure(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.ensure_closed(PROCESS_KILL_TIMEOUT).await;
        }
        self.invalidate_state();
    }

    async fn drain_notifications_until(
        &mut self,
        target: SolverState,
        command_name: &'static str,
        overall_timeout: Duration,
        notification_timeout: Duration,
    ) -> SupervisorResult<()> {
        let overall_timeout = effective(overall_timeout);
        let notification_timeout = effective(notification_timeout);
        let deadline = tokio::time::Instant::now() + overall_timeout;

        let run_name = self.monitor.as_mut().map(|m| m.begin_command(command_name));
        let _log_guard = match (&self.monitor, &run_name) {
            (Some(monitor), Some(run_name)) => logging::setup_for_command(monitor, run_name).ok(),
            _ => None,
        };

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(SupervisorError::Timeout { waited: overall_timeout });
            }
            let per_message_timeout = notification_timeout.min(deadline.saturating_duration_since(now));
            let notification = self.recv_with_timeout(command_name, per_message_timeout).await?;
            self.state = notification.state;
            tracing::info!(state = notification.state.as_str(), "notification received");
            if let (Some(monitor), Some(run_name)) = (&self.monitor, &run_name) {
                let _ = monitor.append_stdout_line(run_name, &format!("{notification:?}"));
            }
            if notification.state == target {
                return Ok(());
            }
        }
    }

    /// Stream notifications for one in-flight solve, yielding the loaded
    /// (and then destroyed) frame bytes for each one that carries a result,
    /// until the child reports it is done solving.
    fn drain_solve_notifications<'a>(
        &'a mut self,
        overall_timeout: Duration,
        notification_timeout: Duration,
    ) -> impl Stream<Item = SupervisorResult<Vec<u8>>> + 'a {
        try_stream! {
            let overall_timeout = effective(overall_timeout);
            let notification_timeout = effective(notification_timeout);
            let deadline = tokio::time::Instant::now() + overall_timeout;

            let run_name = self.monitor.as_mut().map(|m| m.begin_command("solve"));
            let _log_guard = match (&self.monitor, &run_name) {
                (Some(monitor), Some(run_name)) => logging::setup_for_command(monitor, run_name).ok(),
                _ => None,
            };

            loop {
                let now = tokio::time::Instant::now();
                if now >= deadline {
                    Err(SupervisorError::Timeout { waited: overall_timeout })?;
                }
                let per_message_timeout = notification_timeout.min(deadline.saturating_duration_since(now));
                let notification = self.recv_with_timeout("solve", per_message_timeout).await?;
                self.state = notification.state;

                if let (Some(monitor), Some(run_name)) = (&self.monitor, &run_name) {
                    let _ = monitor.append_stdout_line(run_name, &format!("{notification:?}"));
                }

                if let Some(frame_id) = notification.frame_id {
                    let store = self
                        .frame_store
                        .as_mut()
                        .ok_or(SupervisorError::Died)?;
                    let bytes = store.load(&frame_id)?;
                    store.destroy(&frame_id)?;
                    yield bytes;
                }

                if notification.state != SolverState::Solving {
                    break;
                }
            }
        }
    }
}

fn decode_frame_into_builder(builder: &mut SolutionTreeBuilder, bytes: &[u8]) -> SupervisorResult<usize> {
    let mut at = 0usize;
    let mut count = 0usize;
    while at < bytes.len() {
        let (node, next): (BlobTreeNode, usize) = BlobTreeNode::decode(bytes, at)?;
        at = next;
        let (solved_spot, _): (SolvedSpot, usize) = SolvedSpot::decode(&node.payload, 0)?;

        if node.node_id == solver_wire::ROOT_NODE_ID {
            builder.create_root_node(node.node_id, solved_spot)?;
        } else {
            let action: Action = node.child_id.parse()?;
            builder.create_child_node(node.node_id, node.parent_node_id, action, solved_spot)?;
        }
        count += 1;
    }
    Ok(count)
}

impl From<solver_wire::SolutionTreeError> for SupervisorError {
    fn from(err: solver_wire::SolutionTreeError) -> Self {
        SupervisorError::ChildException {
            during: "decode_frame_into_builder",
            message: err.to_string(),
        }
    }
}
