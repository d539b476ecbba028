/// Legacy MCC/MNC migration tests
///
/// Run with: cargo test --test migration_tests

use apnstore::lookup::{StaticCarrierIdentity, StaticDefaults};
use apnstore::prelude::*;
use std::sync::Arc;

fn identity() -> StaticCarrierIdentity {
    StaticCarrierIdentity::new(1).with_known(["99910", "999110", "999060", "99905"])
}

fn legacy(apn: &str, mcc: u16, mnc: u16) -> ApnRecord {
    ApnRecord::new(apn, apn, "").with_legacy_codes(mcc, mnc)
}

fn legacy_rows() -> Vec<ApnRecord> {
    vec![
        legacy("ten", 999, 10),
        legacy("one-ten", 999, 110),
        legacy("sixty", 999, 60),
        legacy("five", 999, 5),
        legacy("us", 310, 26),
        legacy("de", 262, 1),
    ]
}

fn setup(config: ProviderConfig, rows: Vec<ApnRecord>) -> (ApnProvider, Arc<InMemoryApnStore>) {
    let store = Arc::new(InMemoryApnStore::with_rows(rows).unwrap());
    let provider = ApnProvider::new(
        config,
        store.clone(),
        Arc::new(identity()),
        Arc::new(StaticDefaults::default()),
    )
    .unwrap();
    (provider, store)
}

async fn codes_by_apn(store: &InMemoryApnStore) -> Vec<(String, String, String, String)> {
    let mut rows: Vec<_> = store
        .query(&Predicate::All, Order::IdAscending)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.apn, r.mcc, r.mnc, r.numeric))
        .collect();
    rows.sort();
    rows
}

fn expected() -> Vec<(String, String, String, String)> {
    let mut rows: Vec<_> = [
        ("de", "262", "01"),
        ("five", "999", "05"),
        ("one-ten", "999", "110"),
        ("sixty", "999", "060"),
        ("ten", "999", "10"),
        ("us", "310", "026"),
    ]
    .into_iter()
    .map(|(apn, mcc, mnc)| (apn.to_string(), mcc.to_string(), mnc.to_string(), format!("{}{}", mcc, mnc)))
    .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn test_query_migrates_and_writes_back() {
    let (provider, store) = setup(ProviderConfig::default(), legacy_rows());

    let rows = provider
        .query(&Caller::phone(), Target::table(Scope::General), &Predicate::All, Order::IdAscending)
        .await
        .unwrap();
    assert!(rows.iter().all(|r| !r.mcc.is_empty() && !r.mnc.is_empty()));

    assert_eq!(codes_by_apn(&store).await, expected());
}

#[tokio::test]
async fn test_query_filters_on_migrated_values() {
    let (provider, _) = setup(ProviderConfig::default(), legacy_rows());

    let rows = provider
        .query(
            &Caller::phone(),
            Target::table(Scope::General),
            &Predicate::eq(Field::Numeric, "999060"),
            Order::IdAscending,
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].apn, "sixty");
}

#[tokio::test]
async fn test_migrate_all_is_idempotent() {
    let (provider, store) = setup(ProviderConfig::default(), legacy_rows());
    let caller = Caller::system();

    assert_eq!(provider.migrate_all(&caller).await.unwrap(), 6);
    assert_eq!(codes_by_apn(&store).await, expected());
    assert_eq!(provider.migrate_all(&caller).await.unwrap(), 0);
}

#[tokio::test]
async fn test_migrate_all_notifies_once() {
    let (provider, _) = setup(ProviderConfig::default(), legacy_rows());
    let mut rx = provider.subscribe();

    provider.migrate_all(&Caller::system()).await.unwrap();
    assert!(matches!(rx.try_recv(), Ok(Notification::ApnTable { subscription: None, .. })));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_lazy_migration_can_be_disabled() {
    let config = ProviderConfig::new().lazy_mcc_mnc_migration(false);
    let (provider, store) = setup(config, legacy_rows());

    let rows = provider
        .query(&Caller::phone(), Target::table(Scope::General), &Predicate::All, Order::IdAscending)
        .await
        .unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r.mcc.is_empty()));

    let stored = store.query(&Predicate::All, Order::IdAscending).await.unwrap();
    assert!(stored.iter().all(|r| r.mcc.is_empty() && r.numeric.is_empty()));
}

#[tokio::test]
async fn test_modern_rows_are_left_alone() {
    let modern = ApnRecord::new("internet", "n", "310260").with_mcc_mnc("310", "260");
    let (provider, store) = setup(ProviderConfig::default(), vec![modern.clone()]);

    assert_eq!(provider.migrate_all(&Caller::system()).await.unwrap(), 0);
    let stored = store.query(&Predicate::All, Order::IdAscending).await.unwrap();
    assert_eq!(stored[0].mnc, "260");
    assert_eq!(stored[0].numeric, "310260");
}

#[tokio::test]
async fn test_insert_migrates_legacy_codes() {
    let (provider, store) = setup(ProviderConfig::default(), Vec::new());

    let id = provider
        .insert(&Caller::phone(), Target::table(Scope::General), legacy("sixty", 999, 60))
        .await
        .unwrap()
        .unwrap();

    let row = store.get(id).await.unwrap().unwrap();
    assert_eq!(row.mcc, "999");
    assert_eq!(row.mnc, "060");
    assert_eq!(row.numeric, "999060");
}

#[tokio::test]
async fn test_legacy_insert_merges_with_migrated_row() {
    let (provider, store) = setup(ProviderConfig::default(), Vec::new());
    let caller = Caller::phone();
    let general = Target::table(Scope::General);

    let first = provider
        .insert(&caller, general, ApnRecord::new("sixty", "modern", "999060").with_mcc_mnc("999", "060"))
        .await
        .unwrap();
    let second = provider
        .insert(&caller, general, legacy("sixty", 999, 60))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.row_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_read_merges_legacy_row_with_its_modern_spelling() {
    let (provider, store) = setup(ProviderConfig::default(), vec![legacy("web", 999, 5)]);
    let caller = Caller::phone();
    let general = Target::table(Scope::General);
    let modern = || ApnRecord::new("web", "new", "99905").with_mcc_mnc("999", "05");

    provider.insert(&caller, general, modern()).await.unwrap();
    assert_eq!(store.row_count().await.unwrap(), 2);

    let rows = provider
        .query(&caller, general, &Predicate::All, Order::IdAscending)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(store.row_count().await.unwrap(), 1);

    let third = provider.insert(&caller, general, modern()).await.unwrap();
    assert_eq!(third, rows[0].id);
    assert_eq!(store.row_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_migrate_all_merges_colliding_rows() {
    let rows = vec![
        legacy("web", 999, 5),
        ApnRecord::new("web", "new", "99905").with_mcc_mnc("999", "05"),
    ];
    let (provider, store) = setup(ProviderConfig::default(), rows);

    assert_eq!(provider.migrate_all(&Caller::system()).await.unwrap(), 1);
    let stored = store.query(&Predicate::All, Order::IdAscending).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].numeric, "99905");
}

#[tokio::test]
async fn test_legacy_dpc_row_yields_to_existing_dpc_row() {
    let rows = vec![
        legacy("web", 999, 5).with_owner(Ownership::Dpc),
        ApnRecord::new("web", "managed", "99905")
            .with_mcc_mnc("999", "05")
            .with_owner(Ownership::Dpc),
    ];
    let (provider, store) = setup(ProviderConfig::default(), rows);

    assert_eq!(provider.migrate_all(&Caller::system()).await.unwrap(), 1);
    let stored = store.query(&Predicate::All, Order::IdAscending).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "managed");
}
