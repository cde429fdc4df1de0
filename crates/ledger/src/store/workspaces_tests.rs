use super::super::test_ledger;

#[test]
fn upsert_then_list() {
    let ledger = test_ledger();
    ledger
        .upsert_integration_workspace("cache", "redis", "127.0.0.1:6379", "2026-01-01T00:00:00Z")
        .unwrap();
    ledger
        .upsert_integration_workspace("db", "postgres", "127.0.0.1:5432", "2026-01-01T00:00:00Z")
        .unwrap();

    let items = ledger.list_integration_workspaces().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "cache");
    assert_eq!(items[1].kind, "postgres");
}

#[test]
fn upsert_refreshes_endpoint() {
    let ledger = test_ledger();
    ledger
        .upsert_integration_workspace("db", "postgres", "old:5432", "2026-01-01T00:00:00Z")
        .unwrap();
    ledger
        .upsert_integration_workspace("db", "postgres", "new:5432", "2026-01-02T00:00:00Z")
        .unwrap();
    let items = ledger.list_integration_workspaces().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].endpoint, "new:5432");
}
