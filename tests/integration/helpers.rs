//! Test helpers: a fake checkpoint engine made of shell scripts, and a
//! builder for invocations of the real binary against it.
//!
//! Every fake executable appends one line per invocation to a shared log so
//! tests can assert on ordering and counts.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// 420 as seen by a waiting parent.
pub const COORDINATOR_FAILED_STATUS: i32 = 420 & 0xff;

pub const FAKE_PORT: &str = "7779";

const COORDINATOR_SCRIPT: &str = r#"#!/bin/sh
echo "coordinator $*" >> "$FAKE_ENGINE_LOG"
port_file=""
while [ $# -gt 0 ]; do
  case "$1" in
    --port-file) port_file="$2"; shift 2 ;;
    *) shift ;;
  esac
done
sleep "${FAKE_COORDINATOR_SLEEP:-0}"
printf '%s\n' "${FAKE_PORT:-7779}" > "$port_file"
exit 0
"#;

const COMMAND_SCRIPT: &str = r#"#!/bin/sh
echo "command $*" >> "$FAKE_ENGINE_LOG"
case "$*" in
  *--bcheckpoint*) exit "${FAKE_CHECKPOINT_EXIT:-0}" ;;
  *" -s") sleep "${FAKE_STATUS_SLEEP:-0}"; exit "${FAKE_STATUS_EXIT:-0}" ;;
esac
exit 0
"#;

const LAUNCHER_SCRIPT: &str = r#"#!/bin/sh
echo "launcher $*" >> "$FAKE_ENGINE_LOG"
ckptdir=""
while [ $# -gt 0 ]; do
  case "$1" in
    -p|--interval) shift 2 ;;
    --ckptdir) ckptdir="$2"; shift 2 ;;
    --no-gzip|--ckpt-open-files) shift ;;
    *) break ;;
  esac
done
cat > "$ckptdir/dmtcp_restart_script.sh" <<'EOS'
#!/bin/sh
echo "restart $*" >> "$FAKE_ENGINE_LOG"
if [ -n "$FAKE_RESTART_SLEEP" ]; then
  echo $$ > "$4/child.pid"
  exec sleep "$FAKE_RESTART_SLEEP"
fi
exit "${FAKE_RESTART_EXIT:-0}"
EOS
chmod +x "$ckptdir/dmtcp_restart_script.sh"
echo $$ > "$ckptdir/child.pid"
exec "$@"
"#;

pub struct FakeEngine {
    _temp: TempDir,
    pub bin: PathBuf,
    pub work: PathBuf,
    pub log: PathBuf,
    pub config: PathBuf,
}

impl FakeEngine {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        let bin = temp.path().join("bin");
        let work = temp.path().join("work");
        fs::create_dir_all(&bin)?;
        fs::create_dir_all(&work)?;

        write_script(&bin.join("dmtcp_coordinator"), COORDINATOR_SCRIPT)?;
        write_script(&bin.join("dmtcp_command"), COMMAND_SCRIPT)?;
        write_script(&bin.join("dmtcp_launch"), LAUNCHER_SCRIPT)?;

        let config = temp.path().join("ckpt-run.toml");
        fs::write(
            &config,
            format!(
                "[engine]\n\
                 coordinator = \"{bin}/dmtcp_coordinator\"\n\
                 launcher = \"{bin}/dmtcp_launch\"\n\
                 command = \"{bin}/dmtcp_command\"\n\
                 \n\
                 [session]\n\
                 base_dir = \"{work}\"\n\
                 port_timeout_secs = 10\n\
                 poll_interval_ms = 20\n\
                 terminate_grace_ms = 1000\n",
                bin = bin.display(),
                work = work.display(),
            ),
        )?;

        Ok(Self {
            log: temp.path().join("engine.log"),
            _temp: temp,
            bin,
            work,
            config,
        })
    }

    /// Invocation of the binary under test, in its own process group so the
    /// checkpoint path cannot signal the test harness.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ckpt-run"));
        cmd.arg("--config")
            .arg(&self.config)
            .current_dir(&self.work)
            .env("FAKE_ENGINE_LOG", &self.log)
            .env_remove("CKPT_RUN_CONFIG")
            .env_remove("RUST_LOG")
            .process_group(0);
        cmd
    }

    pub fn remove_coordinator(&self) -> Result<()> {
        fs::remove_file(self.bin.join("dmtcp_coordinator")).context("Failed to remove coordinator")
    }

    pub fn log_lines(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn count_lines(&self, needle: &str) -> usize {
        self.log_lines().iter().filter(|l| l.contains(needle)).count()
    }

    pub fn position(&self, needle: &str) -> Option<usize> {
        self.log_lines().iter().position(|l| l.contains(needle))
    }

    /// Checkpoint directories created under the work directory.
    pub fn checkpoint_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.work)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.is_dir())
                    .collect()
            })
            .unwrap_or_default();
        dirs.sort();
        dirs
    }

    /// PID the fake launcher (or restart script) recorded for the child.
    pub fn child_pid(&self) -> Option<u32> {
        self.checkpoint_dirs()
            .iter()
            .find_map(|dir| fs::read_to_string(dir.join("child.pid")).ok())
            .and_then(|s| s.trim().parse().ok())
    }
}

fn write_script(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Polls a predicate function until it returns true or timeout is reached
pub fn wait_for_condition<F>(predicate: F, timeout_ms: u64) -> Result<()>
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(50));
    }

    bail!("Timeout waiting for condition after {timeout_ms}ms")
}
