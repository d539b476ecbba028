/// Restore-to-default tests
///
/// Single- and multi-SIM scopes, preservation of user intent, notification
/// counts and retry of transient datastore failures.
/// Run with: cargo test --test restore_tests

use apnstore::lookup::{SimIdentity, StaticCarrierIdentity, StaticDefaults};
use apnstore::prelude::*;
use apnstore::storage::{BatchOutcome, WriteBatch};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const SUB0: SubscriptionId = SubscriptionId(0);
const SUB1: SubscriptionId = SubscriptionId(1);

/// Store whose first `failures` batches fail with a retryable error.
struct FlakyStore {
    inner: InMemoryApnStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    fn new(inner: InMemoryApnStore, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl ApnStore for FlakyStore {
    async fn get(&self, id: RowId) -> Result<Option<ApnRecord>> {
        self.inner.get(id).await
    }

    async fn put(&self, record: ApnRecord) -> Result<RowId> {
        self.inner.put(record).await
    }

    async fn delete(&self, predicate: &Predicate) -> Result<usize> {
        self.inner.delete(predicate).await
    }

    async fn query(&self, predicate: &Predicate, order: Order) -> Result<Vec<ApnRecord>> {
        self.inner.query(predicate, order).await
    }

    async fn apply(&self, batch: WriteBatch) -> Result<BatchOutcome> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(DbError::Transient("injected failure".into()));
        }
        self.inner.apply(batch).await
    }

    async fn row_count(&self) -> Result<usize> {
        self.inner.row_count().await
    }
}

fn provider(
    store: Arc<dyn ApnStore>,
    identity: StaticCarrierIdentity,
    defaults: Vec<ApnRecord>,
) -> ApnProvider {
    ApnProvider::new(
        ProviderConfig::default(),
        store,
        Arc::new(identity),
        Arc::new(StaticDefaults::new(defaults)),
    )
    .unwrap()
}

fn single_sim() -> StaticCarrierIdentity {
    StaticCarrierIdentity::new(1).with_sim(SUB0, SimIdentity::new("123456"))
}

fn dual_sim() -> StaticCarrierIdentity {
    StaticCarrierIdentity::new(2)
        .with_sim(SUB0, SimIdentity::new("123456").with_spn("Fi"))
        .with_sim(SUB1, SimIdentity::new("654321"))
}

async fn visible_apns(provider: &ApnProvider) -> Vec<String> {
    let mut apns: Vec<String> = provider
        .query(&Caller::phone(), Target::table(Scope::General), &Predicate::All, Order::IdAscending)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.apn)
        .collect();
    apns.sort();
    apns
}

#[tokio::test]
async fn test_single_sim_restore_keeps_intent() {
    let store = InMemoryApnStore::with_rows(vec![
        ApnRecord::new("stale", "n", "123456"),
        ApnRecord::new("mine", "n", "123456").with_status(EditedStatus::UserEdited),
        ApnRecord::new("factory", "n", "123456").with_status(EditedStatus::UserDeleted),
        ApnRecord::new("carrier", "n", "123456").with_status(EditedStatus::CarrierDeletedButPresentInXml),
    ])
    .unwrap();
    let defaults = vec![
        ApnRecord::new("factory", "n", "123456"),
        ApnRecord::new("extra", "n", "123456"),
    ];
    let provider = provider(Arc::new(store), single_sim(), defaults);

    let report = provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();
    assert_eq!(report.deleted, 3);
    assert_eq!(report.preserved, 1);
    assert_eq!(report.seeded, 2);

    assert_eq!(visible_apns(&provider).await, vec!["extra", "factory", "mine"]);
}

#[tokio::test]
async fn test_deleted_but_present_in_xml_stays_hidden() {
    let store = InMemoryApnStore::with_rows(vec![
        ApnRecord::new("factory", "n", "123456").with_status(EditedStatus::UserDeletedButPresentInXml),
    ])
    .unwrap();
    let defaults = vec![ApnRecord::new("factory", "n", "123456")];
    let provider = provider(Arc::new(store), single_sim(), defaults);

    let report = provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();
    assert_eq!(report.preserved, 1);
    assert_eq!(report.seeded, 0);
    assert!(visible_apns(&provider).await.is_empty());
}

#[tokio::test]
async fn test_edited_rows_are_not_overwritten_by_defaults() {
    let mut mine = ApnRecord::new("internet", "Mine", "123456").with_status(EditedStatus::UserEdited);
    mine.password = "secret".into();
    let store = InMemoryApnStore::with_rows(vec![mine]).unwrap();
    let provider = provider(
        Arc::new(store),
        single_sim(),
        vec![ApnRecord::new("internet", "Factory", "123456")],
    );

    provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();

    let rows = provider
        .query(&Caller::phone(), Target::table(Scope::General), &Predicate::All, Order::IdAscending)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Mine");
    assert_eq!(rows[0].password, "secret");
}

#[tokio::test]
async fn test_multi_sim_restore_is_scoped_to_subscription() {
    let store = InMemoryApnStore::with_rows(vec![
        ApnRecord::new("sub0-generic", "n", "123456"),
        ApnRecord::new("sub0-edited", "n", "123456").with_status(EditedStatus::UserEdited),
        ApnRecord::new("sub0-fi", "n", "123456").with_mvno(MvnoType::Spn, "Fi"),
        ApnRecord::new("other-mvno", "n", "123456").with_mvno(MvnoType::Spn, "Other"),
        ApnRecord::new("sub1-generic", "n", "654321"),
        ApnRecord::new("pinned-sub1", "n", "123456").with_subscription(SUB1),
    ])
    .unwrap();
    let provider = provider(Arc::new(store), dual_sim(), Vec::new());
    let mut rx = provider.subscribe();

    let report = provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();
    assert_eq!(report.deleted, 2);
    assert_eq!(report.preserved, 1);

    assert_eq!(
        visible_apns(&provider).await,
        vec!["other-mvno", "pinned-sub1", "sub0-edited", "sub1-generic"]
    );

    let mut restores = 0;
    while let Ok(n) = rx.try_recv() {
        if n.is_restore() {
            restores += 1;
        }
    }
    assert_eq!(restores, 1);
}

#[tokio::test]
async fn test_multi_sim_defaults_seed_only_the_subscription_operator() {
    let defaults = vec![
        ApnRecord::new("generic", "n", "123456"),
        ApnRecord::new("fi", "n", "123456").with_mvno(MvnoType::Spn, "Fi"),
        ApnRecord::new("other", "n", "123456").with_mvno(MvnoType::Spn, "Other"),
        ApnRecord::new("sub1", "n", "654321"),
    ];
    let provider = provider(Arc::new(InMemoryApnStore::new()), dual_sim(), defaults);

    let report = provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();
    assert_eq!(report.seeded, 2);
    assert_eq!(visible_apns(&provider).await, vec!["fi", "generic"]);

    let list = provider.sim_apn_list(&Caller::phone(), SUB0).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].apn, "fi");
}

#[tokio::test]
async fn test_one_restore_notification_per_call() {
    let provider = provider(Arc::new(InMemoryApnStore::new()), single_sim(), Vec::new());
    let mut rx = provider.subscribe();

    provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();
    provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();

    let mut restores = Vec::new();
    while let Ok(n) = rx.try_recv() {
        if let Notification::Restore { subscription, .. } = n {
            restores.push(subscription);
        }
    }
    assert_eq!(restores, vec![Some(SUB0), Some(SUB0)]);
}

#[tokio::test]
async fn test_restore_clears_preferred_apn() {
    let store = InMemoryApnStore::with_rows(vec![ApnRecord::new("a", "n", "123456")]).unwrap();
    let provider = provider(Arc::new(store), single_sim(), vec![ApnRecord::new("a", "n", "123456")]);
    let caller = Caller::phone();

    let id = provider.apn_set(&caller, SUB0).await.unwrap()[0].id.unwrap();
    provider.set_preferred(&caller, SUB0, id).await.unwrap();

    provider.restore_to_default(&caller, SUB0).await.unwrap();
    assert!(provider.preferred(&caller, SUB0).await.unwrap().is_none());
}

#[tokio::test]
async fn test_restore_retries_transient_failures() {
    let inner = InMemoryApnStore::with_rows(vec![ApnRecord::new("stale", "n", "123456")]).unwrap();
    let store = Arc::new(FlakyStore::new(inner, 2));
    let provider = provider(store, single_sim(), vec![ApnRecord::new("fresh", "n", "123456")]);

    let report = provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap();
    assert_eq!(report.seeded, 1);
    assert_eq!(visible_apns(&provider).await, vec!["fresh"]);
}

#[tokio::test]
async fn test_restore_gives_up_and_leaves_table_untouched() {
    let inner = InMemoryApnStore::with_rows(vec![ApnRecord::new("stale", "n", "123456")]).unwrap();
    let store = Arc::new(FlakyStore::new(inner, 3));
    let provider = provider(store, single_sim(), vec![ApnRecord::new("fresh", "n", "123456")]);
    let mut rx = provider.subscribe();

    let err = provider.restore_to_default(&Caller::phone(), SUB0).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(visible_apns(&provider).await, vec!["stale"]);
    assert!(rx.try_recv().is_err());
}
