//! Checkpoint-on-signal.
//!
//! A session moves through `Starting → Running → Checkpointing → Exited`.
//! The first trapped signal wins the move into `Checkpointing`; the child
//! exiting on its own wins the move into `Exited`. Whichever side loses stays
//! out of the way: later signals are ignored, and a child wait that returns
//! during a checkpoint leaves the exit status to the checkpoint.
//!
//! The OS handler also raises a flag synchronously. The main thread reads it
//! to tell a child killed by the same signal (a group-wide TERM, a terminal
//! Ctrl-C) from one that exited on its own, and to abandon startup.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use tracing::{debug, error, info, warn};

use crate::cleanup::Cleanup;
use crate::constants::{EXIT_CHECKPOINT_FAILED, EXIT_CHECKPOINT_SAVED};
use crate::coordinator::Coordinator;
use crate::process::ProcessControl;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// Coordinator is up, child not yet running
    Starting = 0,
    Running = 1,
    Checkpointing = 2,
    /// Child exited on its own
    Exited = 3,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Phase::Starting,
            1 => Phase::Running,
            2 => Phase::Checkpointing,
            _ => Phase::Exited,
        }
    }
}

/// Lock-free session phase shared by the main thread and the signal router.
#[derive(Debug)]
pub struct SessionState {
    phase: AtomicU8,
    signalled: Arc<AtomicBool>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
            signalled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Flag for the OS signal handler to raise. Never cleared.
    pub fn signal_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.signalled)
    }

    pub fn signal_received(&self) -> bool {
        self.signalled.load(Ordering::SeqCst)
    }

    /// Poll the signal flag for up to `timeout`.
    pub fn wait_for_signal(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.signal_received() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn transition(&self, from: Phase, to: Phase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Child spawned. Fails if a checkpoint already claimed the session.
    pub fn mark_running(&self) -> bool {
        self.transition(Phase::Starting, Phase::Running)
    }

    /// Child exited on its own. Fails if a checkpoint already claimed the session.
    pub fn mark_exited(&self) -> bool {
        self.transition(Phase::Running, Phase::Exited)
    }

    /// Claim the session for a checkpoint.
    ///
    /// Returns the phase the session was in, or the current phase if the
    /// session is already checkpointing or finished.
    pub fn begin_checkpoint(&self) -> Result<Phase, Phase> {
        for from in [Phase::Running, Phase::Starting] {
            if self.transition(from, Phase::Checkpointing) {
                return Ok(from);
            }
        }
        Err(self.phase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Saved,
    Failed,
}

impl CheckpointOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            CheckpointOutcome::Saved => EXIT_CHECKPOINT_SAVED,
            CheckpointOutcome::Failed => EXIT_CHECKPOINT_FAILED,
        }
    }
}

/// What a checkpoint needs once the coordinator is up.
struct Target {
    session: Arc<Session>,
    coordinator: Coordinator,
    cleanup: Arc<Cleanup>,
}

/// Checkpoint, bring the child tree down, release the coordinator, and pick
/// the exit status.
///
/// Created before startup so signals are trapped from the start; armed with
/// the session once the coordinator answers. Signals that arrive while the
/// session is still starting only claim it: the main thread notices, stops
/// whatever it started, and exits with [`CheckpointOutcome::Failed`].
pub struct CheckpointAction {
    state: Arc<SessionState>,
    target: OnceLock<Target>,
    processes: Box<dyn ProcessControl>,
    grace: Duration,
}

impl CheckpointAction {
    pub fn new(state: Arc<SessionState>, processes: Box<dyn ProcessControl>, grace: Duration) -> Self {
        Self {
            state,
            target: OnceLock::new(),
            processes,
            grace,
        }
    }

    /// Attach the running coordinator. Must happen before the child runs.
    pub fn arm(&self, session: Arc<Session>, coordinator: Coordinator, cleanup: Arc<Cleanup>) {
        let armed = self
            .target
            .set(Target {
                session,
                coordinator,
                cleanup,
            })
            .is_ok();
        if !armed {
            warn!("checkpoint action armed twice, keeping the first session");
        }
    }

    /// React to a trapped signal.
    ///
    /// Returns the exit status the process must terminate with, or None if
    /// the main thread owns the exit (startup) or the signal was ignored
    /// because the session is already checkpointing or finished.
    pub fn handle(&self, signal: Signal) -> Option<i32> {
        let previous = match self.state.begin_checkpoint() {
            Ok(previous) => previous,
            Err(current) => {
                warn!(signal = signal.as_str(), phase = ?current, "signal ignored");
                return None;
            }
        };
        if previous == Phase::Starting {
            warn!(signal = signal.as_str(), "signal during startup, abandoning session");
            return None;
        }

        let Some(target) = self.target.get() else {
            error!(signal = signal.as_str(), "child running without a coordinator");
            return Some(CheckpointOutcome::Failed.exit_code());
        };
        info!(
            signal = signal.as_str(),
            port = target.session.port(),
            dir = %target.session.directory().display(),
            "checkpoint requested"
        );

        let outcome = checkpoint(target);
        self.terminate(&target.session);
        target.cleanup.run();

        let code = outcome.exit_code();
        info!(code, outcome = ?outcome, "session finished by signal");
        Some(code)
    }

    /// Interrupt the child, then terminate our own process group so nothing
    /// the child forked survives. The child gets `grace` to exit before it
    /// is killed outright.
    fn terminate(&self, session: &Session) {
        let child = session.child_pid();
        if let Some(pid) = child {
            info!(pid, "interrupting child");
            self.processes.interrupt(pid);
        }

        info!("terminating process group");
        self.processes.terminate_own_group();

        if let Some(pid) = child {
            if !self.processes.wait_for_exit(pid, self.grace) {
                warn!(pid, grace_ms = self.grace.as_millis() as u64, "child survived, killing");
                self.processes.kill(pid);
            } else {
                debug!(pid, "child gone");
            }
        }
    }
}

fn checkpoint(target: &Target) -> CheckpointOutcome {
    match target.coordinator.checkpoint() {
        Ok(()) => {
            info!(dir = %target.session.directory().display(), "checkpoint saved");
            CheckpointOutcome::Saved
        }
        Err(err) => {
            error!(error = %err, "checkpoint attempt failed");
            eprintln!("ckpt-run: {err}");
            CheckpointOutcome::Failed
        }
    }
}
