use super::*;

#[yare::parameterized(
    kill = { "KILL", Some(DecisionAction::Kill) },
    lower = { "kill", Some(DecisionAction::Kill) },
    padded = { "  alert ", Some(DecisionAction::Alert) },
    cont = { "CONTINUE", Some(DecisionAction::Continue) },
    restart = { "Restart", Some(DecisionAction::Restart) },
    unknown = { "EXPLODE", None },
    empty = { "", None },
)]
fn parse_decision_action(input: &str, expected: Option<DecisionAction>) {
    assert_eq!(DecisionAction::parse(input), expected);
}

#[test]
fn accepted_carries_pid_and_phase() {
    let d = LifecycleDecision::accepted(Some(9), LifecyclePhase::Starting);
    assert_eq!(d.status, CommandStatus::Accepted);
    assert!(d.accepted_new);
    assert_eq!(d.pid, Some(9));
    assert!(d.error_kind.is_none());
}

#[test]
fn rejected_with_retry_after() {
    let d = LifecycleDecision::rejected(LifecyclePhase::Running, ErrorKind::BudgetExceeded)
        .with_retry_after(42);
    assert!(d.is_rejected());
    assert_eq!(d.retry_after_seconds, Some(42));
    assert_eq!(d.error_kind, Some(ErrorKind::BudgetExceeded));
}

#[test]
fn replay_does_not_accept_new_work() {
    let d = LifecycleDecision::replayed(Some(7), LifecyclePhase::Running);
    assert!(!d.accepted_new);
    assert_eq!(d.status.to_string(), "REPLAYED");
}

#[test]
fn command_status_serializes_screaming() {
    let json = serde_json::to_string(&CommandStatus::InProgress).unwrap();
    assert_eq!(json, "\"IN_PROGRESS\"");
}
