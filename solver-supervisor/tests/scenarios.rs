//! Seed end-to-end scenarios driving the real `solver-dummy` child process
//! through every shape the supervisor must handle: happy path, a fatal
//! signal, a hang, an in-solve exception, a zero-result completion, and a
//! solve that never finishes.

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use solver_supervisor::{SolverConfig, SolverProcessClient, SupervisorConfig, SupervisorError};
use solver_wire::ActionSequence;

fn config_for(scenario: &str, timeout: Duration, notification_timeout: Duration) -> SupervisorConfig {
    SupervisorConfig {
        solver_binary: PathBuf::from(env!("CARGO_BIN_EXE_solver-dummy")),
        solver_args: vec![scenario.to_string()],
        default_timeout: timeout,
        default_notification_timeout: notification_timeout,
        log_directory_root: None,
        force_file_backed_frames: true,
    }
}

async fn ready_client(scenario: &str, timeout: Duration, notification_timeout: Duration) -> SolverProcessClient {
    let mut client = SolverProcessClient::new(config_for(scenario, timeout, notification_timeout));
    client.initialize(timeout, notification_timeout).await.unwrap();
    client
        .configure(SolverConfig::from_relaxed_json(json!({"dummy": true})))
        .unwrap();
    client
}

#[tokio::test]
async fn happy_path_dummy_solver_yields_expected_frames() {
    let timeout = Duration::from_secs(5);
    let mut client = ready_client("many_frames", timeout, timeout).await;

    let sequence: ActionSequence = "xc".parse().unwrap();
    let mut frames = Vec::new();
    {
        let stream = client.solve_path_as_ipc_frames(sequence, timeout, timeout);
        futures::pin_mut!(stream);
        while let Some(frame) = stream.next().await {
            frames.push(frame.unwrap());
        }
    }

    assert_eq!(frames.len(), solver_dummy::NUM_MANY_FRAMES as usize);
    for (index, frame) in frames.iter().enumerate() {
        assert_eq!(frame, &solver_dummy::seeded_frame_bytes(index as u64));
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn child_segfault_during_solve_reports_died() {
    let timeout = Duration::from_secs(5);
    let mut client = ready_client("segfault", timeout, timeout).await;

    let sequence = ActionSequence::empty();
    let outcome = {
        let stream = client.solve_path_as_ipc_frames(sequence, timeout, timeout);
        futures::pin_mut!(stream);
        let mut last = None;
        while let Some(item) = stream.next().await {
            if let Err(e) = item {
                last = Some(e);
                break;
            }
        }
        last
    };

    assert!(matches!(outcome, Some(SupervisorError::Died)), "{outcome:?}");
    client.close().await.unwrap();
}

#[tokio::test]
async fn child_hang_during_solve_times_out() {
    let timeout = Duration::from_millis(500);
    let mut client = ready_client("hang", timeout, timeout).await;

    let sequence = ActionSequence::empty();
    let started = tokio::time::Instant::now();
    let outcome = {
        let stream = client.solve_path_as_ipc_frames(sequence, timeout, timeout);
        futures::pin_mut!(stream);
        let mut last = None;
        while let Some(item) = stream.next().await {
            if let Err(e) = item {
                last = Some(e);
                break;
            }
        }
        last
    };
    let elapsed = started.elapsed();

    assert!(matches!(outcome, Some(SupervisorError::Timeout { .. })), "{outcome:?}");
    assert!(elapsed >= timeout, "timed out too early: {elapsed:?}");
    assert!(elapsed < timeout * 3, "timed out too late: {elapsed:?}");

    client.close().await.unwrap();
}

#[tokio::test]
async fn child_exception_during_solve_is_reported_and_recoverable() {
    let timeout = Duration::from_secs(5);
    let mut client = ready_client("raises", timeout, timeout).await;

    for attempt in 0..2 {
        let sequence = ActionSequence::empty();
        let outcome = {
            let stream = client.solve_path_as_ipc_frames(sequence, timeout, timeout);
            futures::pin_mut!(stream);
            let mut last = None;
            while let Some(item) = stream.next().await {
                if let Err(e) = item {
                    last = Some(e);
                    break;
                }
            }
            last
        };
        assert!(
            matches!(outcome, Some(SupervisorError::ChildException { .. })),
            "attempt {attempt}: {outcome:?}"
        );
        // the child returned to READY, so configure (synchronous, never
        // suspends) succeeds again ahead of the next attempt.
        client
            .configure(SolverConfig::from_relaxed_json(json!({"dummy": true})))
            .unwrap();
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn zero_frame_solve_without_stderr_output_is_no_result() {
    let timeout = Duration::from_secs(5);
    let mut client = ready_client("no_result", timeout, timeout).await;

    let sequence = ActionSequence::empty();
    let outcome = {
        let stream = client.solve_path_as_ipc_frames(sequence, timeout, timeout);
        futures::pin_mut!(stream);
        let mut last = None;
        while let Some(item) = stream.next().await {
            if let Err(e) = item {
                last = Some(e);
                break;
            }
        }
        last
    };

    assert!(matches!(outcome, Some(SupervisorError::NoResult)), "{outcome:?}");
    client.close().await.unwrap();
}

#[tokio::test]
async fn never_finishing_solve_times_out_after_first_notification() {
    let timeout = Duration::from_millis(200);
    let mut client = ready_client("never_finishing", timeout, timeout).await;

    let sequence = ActionSequence::empty();
    let started = tokio::time::Instant::now();
    let mut frames_before_timeout = 0usize;
    let outcome = {
        let stream = client.solve_path_as_ipc_frames(sequence, timeout, timeout);
        futures::pin_mut!(stream);
        let mut last = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(_) => frames_before_timeout += 1,
                Err(e) => {
                    last = Some(e);
                    break;
                }
            }
        }
        last
    };
    let elapsed = started.elapsed();

    assert!(matches!(outcome, Some(SupervisorError::Timeout { .. })), "{outcome:?}");
    assert!(frames_before_timeout >= 1, "expected at least one frame before the timeout fired");
    assert!(elapsed >= timeout, "timed out too early: {elapsed:?}");
    assert!(elapsed < timeout * 5, "timed out too late: {elapsed:?}");

    client.close().await.unwrap();
}
