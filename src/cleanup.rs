//! Coordinator shutdown that runs exactly once, whichever way the session ends.

use std::sync::{Arc, Once};

use tracing::{debug, info};

use crate::coordinator::Coordinator;

/// Something that can be asked to shut the coordinator down.
pub trait Shutdown: Send + Sync {
    fn shutdown(&self);
}

impl Shutdown for Coordinator {
    fn shutdown(&self) {
        if self.quit() {
            info!(port = self.port(), "coordinator shut down");
        } else {
            debug!(port = self.port(), "coordinator already gone");
        }
    }
}

/// Runs its shutdown at most once, from any thread.
pub struct Cleanup {
    target: Box<dyn Shutdown>,
    once: Once,
}

impl Cleanup {
    pub fn new(target: impl Shutdown + 'static) -> Self {
        Self {
            target: Box::new(target),
            once: Once::new(),
        }
    }

    pub fn run(&self) {
        self.once.call_once(|| self.target.shutdown());
    }

    pub fn has_run(&self) -> bool {
        self.once.is_completed()
    }
}

/// Runs the shared cleanup when the owning scope ends.
///
/// `process::exit` skips destructors, so the checkpoint path calls
/// [`Cleanup::run`] itself before exiting.
pub struct CleanupGuard(Arc<Cleanup>);

impl CleanupGuard {
    pub fn new(cleanup: Arc<Cleanup>) -> Self {
        Self(cleanup)
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.0.run();
    }
}
