//! Checkpoint directory resolution and the port descriptor path.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::constants::PORT_FILE_NAME;
use crate::{Result, RunError};

/// Attempts before giving up on a timestamp collision.
const MAX_NAME_ATTEMPTS: usize = 8;

/// `<prefix>.<program basename>.<timestamp>`, with nanosecond resolution.
pub fn launch_directory_name(prefix: &str, program: &OsStr, at: DateTime<Local>) -> String {
    let basename = Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string());
    format!("{prefix}.{basename}.{}", at.format("%Y%m%d-%H%M%S-%9f"))
}

/// Create a fresh directory for a launch-mode session under `base`.
///
/// Parent directories are created as needed. The leaf itself must not exist
/// yet; on a collision a new timestamp is drawn.
pub fn create_launch_directory(base: &Path, prefix: &str, program: &OsStr) -> Result<PathBuf> {
    fs::create_dir_all(base).map_err(|source| RunError::DirectoryCreate {
        path: base.to_path_buf(),
        source,
    })?;

    let mut last_err = None;
    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = base.join(launch_directory_name(prefix, program, Local::now()));
        match fs::create_dir(&path) {
            Ok(()) => {
                debug!(dir = %path.display(), "created checkpoint directory");
                return absolute(&path).map_err(|source| RunError::DirectoryCreate { path, source });
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => last_err = Some((path, err)),
            Err(source) => return Err(RunError::DirectoryCreate { path, source }),
        }
    }

    let (path, source) = last_err.unwrap_or_else(|| {
        (
            base.to_path_buf(),
            io::Error::from(io::ErrorKind::AlreadyExists),
        )
    });
    Err(RunError::DirectoryCreate { path, source })
}

/// Accept an existing restart-mode directory. Nothing is created here.
pub fn resolve_restart_directory(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(RunError::DirectoryNotFound(dir.to_path_buf()));
    }
    absolute(dir).map_err(|_| RunError::DirectoryNotFound(dir.to_path_buf()))
}

/// Where the coordinator publishes its port for this directory.
pub fn port_file_path(dir: &Path) -> PathBuf {
    dir.join(PORT_FILE_NAME)
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    fs::canonicalize(path)
}
