use super::*;

/// Evaluate-then-commit, the way the actor takes a slot.
fn take(budget: &mut RestartBudget, now_ms: u64) -> BudgetCheck {
    let check = budget.evaluate(now_ms);
    if check == BudgetCheck::Accepted {
        budget.commit(now_ms);
    }
    check
}

#[test]
fn budget_allows_up_to_max_in_window() {
    // window=60s, max=3, four requests within 10s
    let mut budget = RestartBudget::new(3, Duration::from_secs(60));
    assert_eq!(take(&mut budget, 1_000), BudgetCheck::Accepted);
    assert_eq!(take(&mut budget, 4_000), BudgetCheck::Accepted);
    assert_eq!(take(&mut budget, 7_000), BudgetCheck::Accepted);
    match take(&mut budget, 10_000) {
        BudgetCheck::Denied { retry_after_seconds } => {
            // oldest accept at t=1s frees at t=61s → 51s remaining
            assert_eq!(retry_after_seconds, 51);
            assert!(retry_after_seconds <= 60);
        }
        other => panic!("expected denial, got {other:?}"),
    }
}

#[test]
fn evaluate_alone_does_not_consume_a_slot() {
    let mut budget = RestartBudget::new(1, Duration::from_secs(60));
    // an evaluation whose follow-up work failed never reached commit
    assert_eq!(budget.evaluate(1_000), BudgetCheck::Accepted);
    assert_eq!(budget.evaluate(2_000), BudgetCheck::Accepted);
    assert_eq!(budget.in_window(2_000), 0);

    budget.commit(3_000);
    assert!(matches!(budget.evaluate(4_000), BudgetCheck::Denied { .. }));
}

#[test]
fn slots_free_as_the_window_slides() {
    let mut budget = RestartBudget::new(2, Duration::from_secs(10));
    take(&mut budget, 0);
    take(&mut budget, 1_000);
    assert!(matches!(take(&mut budget, 2_000), BudgetCheck::Denied { .. }));
    // oldest (t=0) leaves the window after 10s
    assert_eq!(take(&mut budget, 10_001), BudgetCheck::Accepted);
}

#[test]
fn denied_requests_do_not_consume_slots() {
    let mut budget = RestartBudget::new(1, Duration::from_secs(10));
    take(&mut budget, 0);
    for t in [1_000, 2_000, 3_000] {
        assert!(matches!(take(&mut budget, t), BudgetCheck::Denied { .. }));
    }
    assert_eq!(budget.in_window(3_000), 1);
}

#[test]
fn retry_after_is_at_least_one_second() {
    let mut budget = RestartBudget::new(1, Duration::from_secs(10));
    take(&mut budget, 0);
    match take(&mut budget, 9_999) {
        BudgetCheck::Denied { retry_after_seconds } => assert_eq!(retry_after_seconds, 1),
        other => panic!("{other:?}"),
    }
}

#[test]
fn seeding_reloads_persisted_accepts() {
    let mut budget = RestartBudget::new(2, Duration::from_secs(60));
    budget.seed([5_000, 1_000]);
    assert!(matches!(budget.evaluate(10_000), BudgetCheck::Denied { .. }));
    assert_eq!(budget.in_window(10_000), 2);
}

#[test]
fn zero_max_means_unlimited() {
    let mut budget = RestartBudget::new(0, Duration::from_secs(10));
    for t in 0..10u64 {
        assert_eq!(take(&mut budget, t * 100), BudgetCheck::Accepted);
    }
}

#[test]
fn backoff_doubles_per_class_and_caps() {
    let mut backoff = BackoffTracker::default();
    assert_eq!(backoff.next_delay(RestartClass::Crash), Duration::from_millis(500));
    assert_eq!(backoff.next_delay(RestartClass::Crash), Duration::from_millis(1_000));
    assert_eq!(backoff.next_delay(RestartClass::Crash), Duration::from_millis(2_000));
    // classes are independent
    assert_eq!(
        backoff.next_delay(RestartClass::UserInitiated),
        Duration::from_millis(500)
    );
    // cap
    for _ in 0..20 {
        backoff.next_delay(RestartClass::PolicyInitiated);
    }
    assert_eq!(
        backoff.next_delay(RestartClass::PolicyInitiated),
        Duration::from_secs(30)
    );
}

#[test]
fn reset_clears_one_class_only() {
    let mut backoff = BackoffTracker::default();
    backoff.next_delay(RestartClass::Crash);
    backoff.next_delay(RestartClass::Crash);
    backoff.next_delay(RestartClass::UserInitiated);
    backoff.reset(RestartClass::Crash);
    assert_eq!(backoff.next_delay(RestartClass::Crash), Duration::from_millis(500));
    assert_eq!(
        backoff.next_delay(RestartClass::UserInitiated),
        Duration::from_millis(1_000)
    );
}

#[test]
fn jitter_stays_within_bounds() {
    let backoff = BackoffTracker::default();
    let base = Duration::from_millis(1_000);
    assert_eq!(backoff.with_jitter(base, 0.0), base);
    assert_eq!(backoff.with_jitter(base, 1.0), Duration::from_millis(1_100));
    assert_eq!(backoff.with_jitter(base, -1.0), Duration::from_millis(900));
    // out-of-range units clamp
    assert_eq!(backoff.with_jitter(base, 5.0), Duration::from_millis(1_100));
}
