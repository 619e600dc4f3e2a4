//! Signal-triggered checkpoint of a running session.

use std::process::{Child, Stdio};
use std::thread;
use std::time::Duration;

use ckpt_run::process::is_process_alive;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use wait_timeout::ChildExt;

use super::helpers::{wait_for_condition, FakeEngine};

/// Start a long-running session and wait until its child is up.
pub fn spawn_running_session(engine: &FakeEngine, envs: &[(&str, &str)]) -> (Child, u32) {
    let child = spawn_session(engine, envs);

    wait_for_condition(|| engine.child_pid().is_some(), 10_000).unwrap();
    let pid = engine.child_pid().unwrap();
    // Give the supervisor time to record the child as running.
    thread::sleep(Duration::from_millis(300));
    (child, pid)
}

pub fn signal_and_wait(child: &mut Child, signal: Signal) -> Option<i32> {
    kill(Pid::from_raw(child.id() as i32), signal).unwrap();
    wait_for_session(child)
}

/// Signal the session's whole process group, the way a batch scheduler or a
/// terminal does.
pub fn signal_group_and_wait(child: &mut Child, signal: Signal) -> Option<i32> {
    killpg(Pid::from_raw(child.id() as i32), signal).unwrap();
    wait_for_session(child)
}

fn wait_for_session(child: &mut Child) -> Option<i32> {
    let status = child
        .wait_timeout(Duration::from_secs(20))
        .unwrap()
        .expect("session did not exit after signal");
    status.code()
}

fn spawn_session(engine: &FakeEngine, envs: &[(&str, &str)]) -> Child {
    engine
        .command()
        .envs(envs.iter().copied())
        .args(["sleep", "30"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

fn assert_checkpoint_on(signal: Signal) {
    let engine = FakeEngine::new().unwrap();
    let (mut child, child_pid) = spawn_running_session(&engine, &[]);

    assert_eq!(signal_and_wait(&mut child, signal), Some(42), "signal {signal}");

    assert_eq!(engine.count_lines("--bcheckpoint"), 1);
    assert_eq!(engine.count_lines("--quit"), 1);
    assert!(!is_process_alive(child_pid), "child {child_pid} survived");

    let dir = &engine.checkpoint_dirs()[0];
    assert!(dir.join("dmtcp_restart_script.sh").is_file());
}

#[test]
fn test_usr1_checkpoints_and_exits_42() {
    assert_checkpoint_on(Signal::SIGUSR1);
}

#[test]
fn test_hup_checkpoints_and_exits_42() {
    assert_checkpoint_on(Signal::SIGHUP);
}

#[test]
fn test_int_checkpoints_and_exits_42() {
    assert_checkpoint_on(Signal::SIGINT);
}

#[test]
fn test_quit_checkpoints_and_exits_42() {
    assert_checkpoint_on(Signal::SIGQUIT);
}

#[test]
fn test_term_checkpoints_and_exits_42() {
    assert_checkpoint_on(Signal::SIGTERM);
}

#[test]
fn test_failed_checkpoint_exits_24() {
    let engine = FakeEngine::new().unwrap();
    let (mut child, child_pid) = spawn_running_session(&engine, &[("FAKE_CHECKPOINT_EXIT", "1")]);

    assert_eq!(signal_and_wait(&mut child, Signal::SIGUSR1), Some(24));

    assert_eq!(engine.count_lines("--quit"), 1);
    assert!(!is_process_alive(child_pid));
}

#[test]
fn test_checkpoint_happens_before_quit() {
    let engine = FakeEngine::new().unwrap();
    let (mut child, _) = spawn_running_session(&engine, &[]);

    assert_eq!(signal_and_wait(&mut child, Signal::SIGTERM), Some(42));

    let checkpoint = engine.position("--bcheckpoint").unwrap();
    let quit = engine.position("--quit").unwrap();
    assert!(checkpoint < quit, "log: {:?}", engine.log_lines());
}

#[test]
fn test_group_signal_still_checkpoints() {
    for round in 0..5 {
        let engine = FakeEngine::new().unwrap();
        let (mut child, child_pid) = spawn_running_session(&engine, &[]);

        assert_eq!(
            signal_group_and_wait(&mut child, Signal::SIGTERM),
            Some(42),
            "round {round}"
        );
        assert_eq!(engine.count_lines("--bcheckpoint"), 1, "round {round}");
        assert_eq!(engine.count_lines("--quit"), 1, "round {round}");
        assert!(!is_process_alive(child_pid));
    }
}

#[test]
fn test_group_interrupt_with_failing_checkpoint_exits_24() {
    let engine = FakeEngine::new().unwrap();
    let (mut child, _) = spawn_running_session(&engine, &[("FAKE_CHECKPOINT_EXIT", "1")]);

    assert_eq!(signal_group_and_wait(&mut child, Signal::SIGINT), Some(24));
    assert_eq!(engine.count_lines("--quit"), 1);
}

#[test]
fn test_signal_during_status_query_quits_coordinator() {
    let engine = FakeEngine::new().unwrap();
    let mut child = spawn_session(&engine, &[("FAKE_STATUS_SLEEP", "2")]);
    wait_for_condition(|| engine.count_lines(" -s") == 1, 10_000).unwrap();
    thread::sleep(Duration::from_millis(300));

    assert_eq!(signal_and_wait(&mut child, Signal::SIGTERM), Some(24));

    assert_eq!(engine.count_lines("--quit"), 1);
    assert_eq!(engine.count_lines("--bcheckpoint"), 0);
    assert_eq!(engine.count_lines("launcher"), 0);
}

#[test]
fn test_signal_while_waiting_for_port_quits_coordinator() {
    let engine = FakeEngine::new().unwrap();
    let mut child = spawn_session(&engine, &[("FAKE_COORDINATOR_SLEEP", "1")]);
    wait_for_condition(|| engine.count_lines("coordinator ") == 1, 10_000).unwrap();
    thread::sleep(Duration::from_millis(200));

    assert_eq!(signal_and_wait(&mut child, Signal::SIGUSR1), Some(24));

    assert_eq!(engine.count_lines("--quit"), 1);
    assert_eq!(engine.count_lines(" -s"), 0);
    assert_eq!(engine.count_lines("launcher"), 0);
}
