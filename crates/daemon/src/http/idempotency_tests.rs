use super::*;

#[test]
fn scope_strips_the_version_prefix() {
    let req = Request::builder()
        .method("POST")
        .uri("/v1/process/kill")
        .body(Body::empty())
        .unwrap();
    assert_eq!(scope_of(&req), "POST /process/kill");

    let legacy = Request::builder()
        .method("POST")
        .uri("/process/kill")
        .body(Body::empty())
        .unwrap();
    // legacy and versioned routes share a replay scope
    assert_eq!(scope_of(&legacy), "POST /process/kill");
}

#[test]
fn slots_are_shared_per_key_and_reclaimed() {
    let keys = InFlightKeys::new();
    let a = keys.slot("POST /process/kill", "hash-1");
    let b = keys.slot("POST /process/kill", "hash-1");
    assert!(Arc::ptr_eq(&a, &b), "same key must share a slot");

    let other = keys.slot("POST /process/restart", "hash-1");
    assert!(!Arc::ptr_eq(&a, &other), "scopes are independent");

    drop(a);
    drop(b);
    drop(other);
    // next access sweeps released slots
    let _fresh = keys.slot("POST /process/kill", "hash-2");
    assert_eq!(keys.locks.lock().len(), 1);
}

#[tokio::test]
async fn slot_serializes_concurrent_holders() {
    let keys = Arc::new(InFlightKeys::new());
    let slot = keys.slot("POST /process/restart", "hash-x");
    let guard = slot.lock().await;

    let slot2 = keys.slot("POST /process/restart", "hash-x");
    assert!(slot2.try_lock().is_err(), "second holder must wait");
    drop(guard);
    assert!(slot2.try_lock().is_ok());
}
