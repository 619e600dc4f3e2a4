//! Usage handling of the binary itself.

use std::process::Command;

#[test]
fn test_no_arguments_prints_usage_and_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_ckpt-run"))
        .env_remove("CKPT_RUN_CONFIG")
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_help_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_ckpt-run"))
        .arg("--help")
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-r, --restart"), "stdout: {stdout}");
    assert!(stdout.contains("42"));
}

#[test]
fn test_invalid_arguments_exit_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_ckpt-run"))
        .args(["--interval", "soon", "sleep", "1"])
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(0));
    assert!(!output.stderr.is_empty());
}
