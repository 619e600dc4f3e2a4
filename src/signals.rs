//! Signal routing.
//!
//! The OS handler installed by `signal-hook` raises the session's signal flag
//! and queues the signal. A dedicated thread drains the queue and runs the
//! checkpoint action there, outside of async-signal context.

use std::os::raw::c_int;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nix::sys::signal::Signal;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1};
use signal_hook::iterator::{Handle, Signals};
use signal_hook::SigId;
use tracing::{debug, warn};

use crate::checkpoint::{CheckpointAction, SessionState};
use crate::{Result, RunError};

/// Signals that trigger checkpoint-and-exit. All share one handler.
pub const TRAPPED_SIGNALS: [c_int; 5] = [SIGUSR1, SIGHUP, SIGINT, SIGQUIT, SIGTERM];

pub fn is_trapped(signal: c_int) -> bool {
    TRAPPED_SIGNALS.contains(&signal)
}

pub struct SignalRouter {
    handle: Handle,
    flag_ids: Vec<SigId>,
    thread: Option<JoinHandle<()>>,
}

impl SignalRouter {
    /// Trap [`TRAPPED_SIGNALS`] and route each one to `action`.
    ///
    /// `state`'s signal flag is raised inside the OS handler itself, before
    /// the router thread wakes up. When the action decides the session is
    /// over, `exit` receives the exit status. In the binary that is
    /// `std::process::exit`.
    pub fn install<F>(state: &SessionState, action: Arc<CheckpointAction>, exit: F) -> Result<Self>
    where
        F: Fn(i32) + Send + 'static,
    {
        let flag_ids = register_flag(state)?;
        let mut signals = match Signals::new(TRAPPED_SIGNALS) {
            Ok(signals) => signals,
            Err(err) => {
                unregister(&flag_ids);
                return Err(RunError::SignalInstall(err));
            }
        };
        let handle = signals.handle();

        let spawned = thread::Builder::new()
            .name("signal-router".to_string())
            .spawn(move || {
                for raw in signals.forever() {
                    let Ok(signal) = Signal::try_from(raw) else {
                        warn!(raw, "unknown signal number");
                        continue;
                    };
                    debug!(signal = signal.as_str(), "signal received");
                    if let Some(code) = action.handle(signal) {
                        exit(code);
                    }
                }
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                handle.close();
                unregister(&flag_ids);
                return Err(RunError::SignalInstall(err));
            }
        };

        debug!(signals = ?TRAPPED_SIGNALS, "signal handlers installed");
        Ok(Self {
            handle,
            flag_ids,
            thread: Some(thread),
        })
    }
}

fn register_flag(state: &SessionState) -> Result<Vec<SigId>> {
    let flag = state.signal_flag();
    let mut ids = Vec::with_capacity(TRAPPED_SIGNALS.len());
    for signal in TRAPPED_SIGNALS {
        match signal_hook::flag::register(signal, Arc::clone(&flag)) {
            Ok(id) => ids.push(id),
            Err(err) => {
                unregister(&ids);
                return Err(RunError::SignalInstall(err));
            }
        }
    }
    Ok(ids)
}

fn unregister(ids: &[SigId]) {
    for id in ids {
        signal_hook::low_level::unregister(*id);
    }
}

impl Drop for SignalRouter {
    fn drop(&mut self) {
        unregister(&self.flag_ids);
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
