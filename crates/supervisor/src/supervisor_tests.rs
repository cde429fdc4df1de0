use super::*;
use flowforge_core::Redactor;
use nix::sys::signal::kill;
use nix::unistd::Pid;

fn supervisor() -> Supervisor {
    Supervisor::new(OutputRing::new(64, Redactor::new()))
}

fn pid_gone(pid: u32) -> bool {
    matches!(kill(Pid::from_raw(pid as i32), None), Err(Errno::ESRCH))
}

#[tokio::test]
async fn start_returns_pid_and_captures_output() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    let pid = sup
        .start("sh", &["-c".into(), "echo hello; echo world".into()], dir.path())
        .await
        .unwrap();
    assert!(pid > 0);

    let mut rx = sup.exit_receiver().unwrap();
    rx.wait_for(|e| e.is_some()).await.unwrap();
    // reader tasks race the exit; give them a moment to drain
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let lines = sup.output().last(10);
    assert!(lines.contains(&"hello".to_string()), "lines: {lines:?}");
    assert!(lines.contains(&"world".to_string()), "lines: {lines:?}");
}

#[tokio::test]
async fn child_exit_is_observed() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    sup.start("sh", &["-c".into(), "exit 3".into()], dir.path())
        .await
        .unwrap();
    let mut rx = sup.exit_receiver().unwrap();
    rx.wait_for(|e| e.is_some()).await.unwrap();
    let exit = rx.borrow().unwrap();
    assert_eq!(exit.code, Some(3));
    assert!(!exit.signaled);
    assert!(!sup.is_running());
}

#[tokio::test]
async fn stop_terminates_whole_group() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    // Shell spawns a grandchild; both live in the new process group.
    let pid = sup
        .start("sh", &["-c".into(), "sleep 60 & sleep 60".into()], dir.path())
        .await
        .unwrap();
    assert!(sup.is_running());

    let outcome = sup.stop(std::time::Duration::from_secs(3)).await.unwrap();
    assert_eq!(outcome, StopOutcome::Stopped);
    assert!(pid_gone(pid), "root pid {pid} still alive");
}

#[tokio::test]
async fn stop_escalates_to_kill_for_term_ignorers() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    let pid = sup
        .start(
            "sh",
            &["-c".into(), "trap '' TERM; sleep 60".into()],
            dir.path(),
        )
        .await
        .unwrap();
    // give the shell a beat to install the trap
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let outcome = sup.stop(std::time::Duration::from_millis(300)).await.unwrap();
    assert_eq!(outcome, StopOutcome::Stopped);
    assert!(pid_gone(pid));
}

#[tokio::test]
async fn stop_is_idempotent() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    sup.start("sleep", &["60".into()], dir.path()).await.unwrap();

    assert_eq!(
        sup.stop(std::time::Duration::from_secs(3)).await.unwrap(),
        StopOutcome::Stopped
    );
    assert_eq!(
        sup.stop(std::time::Duration::from_secs(1)).await.unwrap(),
        StopOutcome::NotRunning
    );
}

#[tokio::test]
async fn stop_without_child_is_a_noop() {
    let sup = supervisor();
    assert_eq!(
        sup.stop(std::time::Duration::from_millis(50)).await.unwrap(),
        StopOutcome::NotRunning
    );
}

#[tokio::test]
async fn second_start_while_running_is_refused() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    let pid = sup.start("sleep", &["60".into()], dir.path()).await.unwrap();
    let err = sup.start("sleep", &["60".into()], dir.path()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning { pid: p } if p == pid));
    sup.stop(std::time::Duration::from_secs(3)).await.unwrap();
}

#[tokio::test]
async fn start_after_exit_is_allowed() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    sup.start("true", &[], dir.path()).await.unwrap();
    let mut rx = sup.exit_receiver().unwrap();
    rx.wait_for(|e| e.is_some()).await.unwrap();
    // previous run finished; a new run may start
    sup.start("true", &[], dir.path()).await.unwrap();
}

#[tokio::test]
async fn spawn_failure_is_reported() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    let err = sup
        .start("definitely-not-a-binary-xyz", &[], dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn { .. }));
}
