//! Child supervision: start the program (or its restart script) under the
//! coordinator and block until it ends or a checkpoint takes over.

use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::checkpoint::SessionState;
use crate::constants::{EXIT_SETUP_FAILED, SIGNAL_EXIT_BASE};
use crate::engine::Engine;
use crate::session::{Mode, Session};
use crate::signals::is_trapped;
use crate::{Result, RunError};

/// Time for our own copy of a group-wide signal to land after the child it
/// killed has been reaped.
const SIGNAL_SETTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    /// The child ended on its own with this exit status.
    Exited(i32),
    /// A checkpoint claimed the session; it decides the exit status.
    Preempted,
    /// A signal arrived before the child was running. The child, if it was
    /// spawned, has been killed and reaped.
    Aborted,
}

/// Command line for the session's child in its mode.
pub fn build_command(engine: &Engine, session: &Session, interval: Option<u64>) -> Result<Command> {
    match session.mode() {
        Mode::Launch { program, args } => {
            engine.launch_command(session.port(), session.directory(), interval, program, args)
        }
        Mode::Restart { args, .. } => {
            engine.restart_command(session.port(), session.directory(), args)
        }
    }
}

/// Spawn `command` as the session child and wait for it.
pub fn supervise(mut command: Command, session: &Session, state: &SessionState) -> Result<ChildOutcome> {
    if state.signal_received() {
        debug!("signal received before spawn, not starting the child");
        return Ok(ChildOutcome::Aborted);
    }

    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command.spawn().map_err(|source| RunError::ChildLaunch {
        program: program.clone(),
        source,
    })?;

    let pid = child.id();
    session.set_child_pid(pid);
    info!(pid, mode = session.mode().label(), program = %program, "child started");

    if state.signal_received() || !state.mark_running() {
        warn!(pid, "signal received before the child started, stopping it");
        let _ = child.kill();
        let _ = child.wait();
        return Ok(ChildOutcome::Aborted);
    }

    let status = child
        .wait()
        .map_err(|source| RunError::ChildLaunch { program, source })?;

    // A group-wide signal can kill the child before our handler has run.
    if status.signal().is_some_and(is_trapped) && !state.signal_received() {
        state.wait_for_signal(SIGNAL_SETTLE);
    }
    if state.signal_received() {
        debug!(pid, %status, "child ended with a trapped signal pending");
        return Ok(ChildOutcome::Preempted);
    }

    if state.mark_exited() {
        let code = exit_code_of(status);
        info!(pid, code, "child exited");
        Ok(ChildOutcome::Exited(code))
    } else {
        debug!(pid, %status, "child stopped during checkpoint");
        Ok(ChildOutcome::Preempted)
    }
}

/// Exit code, or `128 + signal` for a child killed by a signal.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => SIGNAL_EXIT_BASE + signal,
        (None, None) => EXIT_SETUP_FAILED,
    }
}
