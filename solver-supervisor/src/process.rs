use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;

use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, SupervisorResult};
use crate::framing;
use crate::protocol::{Command, Notification};

/// A spawned solver child process plus the framed stdin/stdout pipe used to
/// drive it. The child's stderr is copied to a log file on a background
/// task for the lifetime of the process — the child is an external
/// collaborator, so the supervisor owns redirecting its diagnostic stream
/// rather than relying on the child to do it itself.
pub struct ChildHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ChildHandle {
    pub fn spawn(config: &SupervisorConfig, stderr_log_path: &Path, frame_dir: &Path) -> SupervisorResult<Self> {
        let mut command = tokio::process::Command::new(&config.solver_binary);
        command
            .args(&config.solver_args)
            // The `solver-implementation` collaborator boundary (spec §6)
            // writes frames via whichever IPC store this tells it to use —
            // it must be the same directory the parent's file-backed store
            // resolves frame ids against, since those ids are relative.
            .env("SOLVER_IPC_FRAME_DIR", frame_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = BufReader::new(child.stdout.take().expect("stdout was piped"));
        let stderr = child.stderr.take().expect("stderr was piped");

        let stderr_log_path = stderr_log_path.to_path_buf();
        let stderr_task = tokio::spawn(async move {
            if let Ok(mut file) = tokio::fs::File::create(&stderr_log_path).await {
                let mut stderr = stderr;
                let _ = tokio::io::copy(&mut stderr, &mut file).await;
            }
        });

        Ok(ChildHandle {
            child,
            stdin: Some(stdin),
            stdout,
            stderr_task: Some(stderr_task),
        })
    }

    pub async fn send_command(&mut self, command: &Command) -> SupervisorResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(SupervisorError::Died)?;
        framing::write_message(stdin, command).await?;
        Ok(())
    }

    pub async fn recv_notification(&mut self) -> SupervisorResult<Notification> {
        Ok(framing::read_message(&mut self.stdout).await?)
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Close the stdin half of the pipe, signalling EOF to a child that is
    /// waiting on its next command — the same exit path a normally
    /// terminating child takes when the supervisor has nothing left to ask
    /// of it.
    pub async fn close_stdin(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
    }

    /// Kill the child if still alive and reap it within `grace`. Idempotent:
    /// calling this on an already-exited child is a no-op success.
    pub async fn ensure_closed(&mut self, grace: Duration) -> SupervisorResult<()> {
        self.close_stdin().await;

        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return Ok(());
        }

        let _ = self.child.start_kill();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            _ => Err(SupervisorError::TeardownTimedOut),
        }
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}
