//! Process signalling used when a checkpointed session tears down its child.

use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgrp, Pid};
use tracing::{debug, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Check if a process with the given PID is alive
///
/// Uses `nix::sys::signal::kill` with signal `None` (null signal / signal 0).
/// `EPERM` means the process exists but belongs to someone else, so it counts
/// as alive; `ESRCH` means it is gone.
pub fn is_process_alive(pid: u32) -> bool {
    let Some(pid) = to_pid(pid) else {
        return false;
    };

    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Poll until `pid` disappears or `timeout` passes. Returns true if it exited.
pub fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while is_process_alive(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
    true
}

fn to_pid(pid: u32) -> Option<Pid> {
    // PIDs beyond i32::MAX cannot exist; 0 would address our own group.
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

/// The operations a checkpoint needs to bring the child tree down.
pub trait ProcessControl: Send + Sync {
    /// Deliver SIGINT to a tracked child.
    fn interrupt(&self, pid: u32);

    /// Deliver SIGTERM to the process group this process belongs to.
    ///
    /// The caller must have SIGTERM trapped, otherwise it terminates itself.
    fn terminate_own_group(&self);

    /// Deliver SIGKILL to a tracked child.
    fn kill(&self, pid: u32);

    fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool;
}

/// `ProcessControl` backed by real signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl SystemProcesses {
    fn send(pid: u32, signal: Signal) {
        let Some(target) = to_pid(pid) else {
            warn!(pid, "refusing to signal invalid pid");
            return;
        };
        match kill(target, signal) {
            Ok(()) => debug!(pid, signal = signal.as_str(), "signal sent"),
            Err(Errno::ESRCH) => debug!(pid, signal = signal.as_str(), "process already gone"),
            Err(err) => warn!(pid, signal = signal.as_str(), error = %err, "cannot signal process"),
        }
    }
}

impl ProcessControl for SystemProcesses {
    fn interrupt(&self, pid: u32) {
        Self::send(pid, Signal::SIGINT);
    }

    fn terminate_own_group(&self) {
        let group = getpgrp();
        match killpg(group, Signal::SIGTERM) {
            Ok(()) => debug!(pgid = group.as_raw(), "SIGTERM sent to process group"),
            Err(err) => warn!(pgid = group.as_raw(), error = %err, "cannot signal process group"),
        }
    }

    fn kill(&self, pid: u32) {
        Self::send(pid, Signal::SIGKILL);
    }

    fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        wait_for_exit(pid, timeout)
    }
}
