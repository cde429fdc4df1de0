use super::*;
use crate::output::OutputRing;
use flowforge_core::Redactor;

fn supervisor() -> Supervisor {
    Supervisor::new(OutputRing::new(16, Redactor::new()))
}

#[tokio::test]
async fn trap_stops_child_on_user_signal() {
    let sup = supervisor();
    let dir = tempfile::tempdir().unwrap();
    let pid = sup.start("sleep", &["60".into()], dir.path()).await.unwrap();

    let mut trap = SignalTrap::install(
        sup.clone(),
        Duration::from_secs(3),
        &[SignalKind::user_defined1()],
    )
    .unwrap();
    assert!(!trap.triggered());

    // Deliver SIGUSR1 to ourselves; the trap must tear the child down.
    nix::sys::signal::kill(
        nix::unistd::Pid::this(),
        nix::sys::signal::Signal::SIGUSR1,
    )
    .unwrap();

    trap.wait_triggered().await;
    assert!(trap.triggered());
    assert!(!sup.is_running(), "child pid {pid} survived the trap");
}

#[tokio::test]
async fn untrap_releases_without_firing() {
    let sup = supervisor();
    let trap = SignalTrap::install(sup, Duration::from_millis(100), &[]).unwrap();
    assert!(!trap.triggered());
    trap.untrap();
}
