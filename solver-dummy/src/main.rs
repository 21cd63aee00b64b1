//! Stand-in solver child process used by the supervisor's seed test suite.
//! Speaks the real wire protocol but fakes the actual solving: each
//! scenario below reproduces one of the failure/success shapes the
//! supervisor must handle.

use std::time::Duration;

use solver_ipc::FrameStore;
use solver_supervisor::framing::{read_message, write_message};
use solver_supervisor::protocol::{Command, Notification, SolverState};
use solver_wire::{ActionSequence, BlobTreeNode, Matrix2D, SolvedSpot, StrategyOption, ROOT_NODE_ID};
use tokio::io::{stdin, stdout};

#[tokio::main]
async fn main() {
    let scenario = std::env::args().nth(1).unwrap_or_else(|| "happy_path".to_string());
    let frame_dir = std::env::var("SOLVER_IPC_FRAME_DIR").unwrap_or_else(|_| std::env::temp_dir().display().to_string());

    let mut stdin = stdin();
    let mut stdout = stdout();
    let mut frame_store = solver_ipc::FileBackedFrameStore::new(frame_dir);

    match scenario.as_str() {
        "hang_during_init" => {
            send(&mut stdout, notify(SolverState::Initializing, None)).await;
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
        _ => {
            send(&mut stdout, notify(SolverState::Initializing, None)).await;
            send(&mut stdout, notify(SolverState::Ready, None)).await;
        }
    }

    loop {
        let command: Command = match read_message(&mut stdin).await {
            Ok(c) => c,
            Err(_) => return, // parent closed its end: exit quietly
        };

        match command {
            Command::Ping => {
                send(&mut stdout, notify(SolverState::Ready, None)).await;
            }
            Command::Cancel => {
                send(&mut stdout, notify(SolverState::Cancelling, None)).await;
                send(&mut stdout, notify(SolverState::Ready, None)).await;
            }
            Command::SolvePath { action_sequence, .. } => {
                run_solve(&scenario, &mut stdout, &mut frame_store, &action_sequence).await;
            }
            Command::SolveSubtree { action_sequence, .. } => {
                run_solve(&scenario, &mut stdout, &mut frame_store, &action_sequence).await;
            }
        }
    }
}

async fn run_solve(
    scenario: &str,
    stdout: &mut tokio::io::Stdout,
    frame_store: &mut solver_ipc::FileBackedFrameStore,
    action_sequence: &str,
) {
    send(stdout, notify(SolverState::Solving, None)).await;

    match scenario {
        "segfault" => {
            std::process::abort();
        }
        "raises" => {
            // A solve-time exception is caught by the child's command loop:
            // it logs a diagnostic to its stderr-redirected stream and
            // returns to READY without crashing, per the "exception during
            // a solve" rule (as opposed to an exception in initialize/cancel,
            // which does terminate the process).
            eprintln!("solver-dummy: simulated unhandled exception during solve");
            send(stdout, notify(SolverState::Ready, None)).await;
        }
        "hang" => loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        },
        "never_finishing" => {
            let sequence: ActionSequence = action_sequence.parse().unwrap_or_else(|_| ActionSequence::empty());
            loop {
                let bytes = encode_fake_tree(&sequence);
                let frame_id = frame_store.create_empty(bytes.len()).expect("allocate frame");
                frame_store.save(&frame_id, &bytes).expect("save frame");
                send(stdout, notify(SolverState::Solving, Some(frame_id))).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }
        "no_result" => {
            send(stdout, notify(SolverState::Ready, None)).await;
        }
        "many_frames" => {
            for frame in 0..solver_dummy::NUM_MANY_FRAMES {
                let bytes = solver_dummy::seeded_frame_bytes(frame as u64);
                let frame_id = frame_store.create_empty(bytes.len()).expect("allocate frame");
                frame_store.save(&frame_id, &bytes).expect("save frame");
                send(stdout, notify(SolverState::Solving, Some(frame_id))).await;
            }
            send(stdout, notify(SolverState::Ready, None)).await;
        }
        _ => {
            let sequence: ActionSequence = action_sequence.parse().unwrap_or_else(|_| ActionSequence::empty());
            let bytes = encode_fake_tree(&sequence);
            let frame_id = frame_store.create_empty(bytes.len()).expect("allocate frame");
            frame_store.save(&frame_id, &bytes).expect("save frame");
            send(stdout, notify(SolverState::Solving, Some(frame_id))).await;
            send(stdout, notify(SolverState::Ready, None)).await;
        }
    }
}

/// Encode a tiny tree with one node per prefix of `sequence`, each leaf
/// offering the two options check/fold so a path solve always produces
/// exactly `sequence.len() + 1` nodes.
fn encode_fake_tree(sequence: &ActionSequence) -> Vec<u8> {
    let mut buf = Vec::new();
    let prefixes = sequence.prefixes();
    for (node_id, prefix) in prefixes.iter().enumerate() {
        let parent_node_id = node_id.saturating_sub(1) as u32;
        let child_id = prefix
            .actions()
            .last()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let spot = SolvedSpot {
            strategy_options: vec![StrategyOption::Check, StrategyOption::Fold],
            strategy_matrix: Matrix2D::new(1, 2, vec![7500, 2500]),
            ev_matrix: Matrix2D::new(1, 2, vec![10, -10]),
        };
        let mut payload = Vec::new();
        spot.encode(&mut payload);

        let node = BlobTreeNode {
            node_id: node_id as u32,
            parent_node_id: if node_id == 0 { ROOT_NODE_ID } else { parent_node_id },
            child_id,
            payload,
        };
        node.encode(&mut buf);
    }
    buf
}

fn notify(state: SolverState, frame_id: Option<String>) -> Notification {
    Notification { state, frame_id }
}

async fn send(stdout: &mut tokio::io::Stdout, notification: Notification) {
    let _ = write_message(stdout, &notification).await;
}
