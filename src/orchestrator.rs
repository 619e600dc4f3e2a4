//! One session end to end: directory, coordinator, signal routing, child.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::checkpoint::{CheckpointAction, CheckpointOutcome, SessionState};
use crate::cleanup::{Cleanup, CleanupGuard};
use crate::config::{Config, SessionConfig};
use crate::coordinator::Coordinator;
use crate::engine::Engine;
use crate::process::SystemProcesses;
use crate::session::{create_launch_directory, resolve_restart_directory, Mode, Session};
use crate::signals::SignalRouter;
use crate::supervisor::{self, ChildOutcome};
use crate::Result;

/// Run a session and return its exit status.
///
/// Signals are trapped before anything is started. If one ends the session
/// while the child is running, the process exits from the signal router and
/// this function never returns. During startup the signal only marks the
/// session; the next startup step sees it, lets the cleanup guard stop the
/// coordinator and returns the checkpoint-failed status.
pub fn run(mode: Mode, config: &Config) -> Result<i32> {
    let engine = Engine::new(config.engine.clone());

    let state = Arc::new(SessionState::new());
    let action = Arc::new(CheckpointAction::new(
        Arc::clone(&state),
        Box::new(SystemProcesses),
        config.session.terminate_grace(),
    ));
    let _router = SignalRouter::install(&state, Arc::clone(&action), |code| {
        std::process::exit(code)
    })?;

    let directory = prepare_directory(&mode, &config.session)?;
    eprintln!("checkpoint directory: {}", directory.display());
    if state.signal_received() {
        return Ok(abandon_startup("directory"));
    }

    let coordinator = match Coordinator::start(&engine, &directory, &config.session) {
        Ok(coordinator) => coordinator,
        Err(_) if state.signal_received() => return Ok(abandon_startup("coordinator start")),
        Err(err) => return Err(err),
    };
    let cleanup = Arc::new(Cleanup::new(coordinator.clone()));
    let _cleanup_guard = CleanupGuard::new(Arc::clone(&cleanup));
    if state.signal_received() {
        return Ok(abandon_startup("coordinator start"));
    }

    let status = coordinator.check_status(config.session.port_timeout());
    if state.signal_received() {
        return Ok(abandon_startup("status query"));
    }
    status?;
    eprintln!("coordinator port: {}", coordinator.port());

    let session = Arc::new(Session::new(
        mode,
        directory,
        coordinator.port(),
        coordinator.starter_pid(),
    ));
    info!(
        mode = session.mode().label(),
        dir = %session.directory().display(),
        port = session.port(),
        "session ready"
    );
    action.arm(Arc::clone(&session), coordinator, Arc::clone(&cleanup));

    let command = supervisor::build_command(
        &engine,
        &session,
        config.session.checkpoint_interval(),
    )?;
    match supervisor::supervise(command, &session, &state)? {
        ChildOutcome::Exited(code) => Ok(code),
        ChildOutcome::Aborted => Ok(abandon_startup("child launch")),
        ChildOutcome::Preempted => await_checkpoint_exit(),
    }
}

fn abandon_startup(step: &str) -> i32 {
    let code = CheckpointOutcome::Failed.exit_code();
    warn!(step, code, "trapped signal during startup, nothing to checkpoint");
    code
}

fn prepare_directory(mode: &Mode, settings: &SessionConfig) -> Result<PathBuf> {
    match mode {
        Mode::Launch { program, .. } => {
            create_launch_directory(&settings.base_dir, &settings.prefix, program)
        }
        Mode::Restart { directory, .. } => resolve_restart_directory(directory),
    }
}

/// The signal router owns the exit from here on.
fn await_checkpoint_exit() -> ! {
    loop {
        thread::park();
    }
}
