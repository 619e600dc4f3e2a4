//! Port descriptor polling.

use std::fs;
use std::path::Path;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::{Result, RunError};

/// Read the port from the descriptor file.
///
/// Returns None if the file is missing, empty, or does not hold a port
/// number yet.
pub fn read_port(path: &Path) -> Option<u16> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
}

/// Poll `path` until the coordinator publishes a port.
///
/// `starter` is the process that was spawned to start the coordinator. With a
/// daemonising coordinator it exits almost immediately; a non-zero exit means
/// the daemon never came up. Polling gives up after `timeout`.
pub fn wait_for_port(
    path: &Path,
    starter: &mut Child,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<u16> {
    let deadline = Instant::now() + timeout;
    let mut starter_done = false;

    loop {
        if let Some(port) = read_port(path) {
            return Ok(port);
        }

        let now = Instant::now();
        if now >= deadline {
            if !starter_done {
                reap_starter(starter);
            }
            return Err(RunError::CoordinatorStart(format!(
                "no port published in {} after {}s",
                path.display(),
                timeout.as_secs_f32()
            )));
        }
        let wait = poll_interval.min(deadline - now);

        if starter_done {
            thread::sleep(wait);
            continue;
        }

        match starter.wait_timeout(wait) {
            Ok(Some(status)) if status.success() => {
                debug!("coordinator starter exited, waiting for port file");
                starter_done = true;
            }
            Ok(Some(status)) => {
                // The daemon may have written the port just before the
                // starter reported a failure.
                if let Some(port) = read_port(path) {
                    return Ok(port);
                }
                return Err(RunError::CoordinatorStart(format!(
                    "coordinator exited early with {status}"
                )));
            }
            Ok(None) => {}
            Err(err) => {
                reap_starter(starter);
                return Err(RunError::CoordinatorStart(format!(
                    "cannot wait for coordinator: {err}"
                )));
            }
        }
    }
}

/// Kill a starter that never finished and collect its status.
fn reap_starter(starter: &mut Child) {
    let pid = starter.id();
    if let Err(err) = starter.kill() {
        debug!(pid, error = %err, "coordinator starter already gone");
    }
    match starter.wait() {
        Ok(status) => debug!(pid, %status, "coordinator starter reaped"),
        Err(err) => warn!(pid, error = %err, "cannot reap coordinator starter"),
    }
}
