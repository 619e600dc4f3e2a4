//! Launch a program under a checkpoint coordinator, checkpoint it when the
//! session is signalled, and restart it later from the saved state.

pub mod checkpoint;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod session;
pub mod signals;
pub mod supervisor;

pub use error::{Result, RunError};
