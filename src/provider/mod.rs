// ============================================================================
// APN Provider
// ============================================================================
//
// Scoped CRUD verbs over the APN table. Every verb authorizes the caller,
// serializes against writers of the same (owner, subscription) scope, plans
// its writes against rows read under those locks, and hands the datastore a
// single batch. Notifications go out only after the batch is applied.
//
// ============================================================================

pub mod locks;
pub mod notify;
pub mod target;

pub use locks::{LockScope, ScopeGuard, ScopeLocks};
pub use notify::{Notification, Notifier};
pub use target::Target;

use crate::access::{AccessPolicy, Caller, EnforcedFlag, Partition, Scope, Verb};
use crate::config::ProviderConfig;
use crate::core::{
    ApnRecord, ApnUpdate, DbError, EditedStatus, Field, Order, Ownership, Predicate, Result, RowId,
    SubscriptionId,
};
use crate::lookup::{CarrierIdentity, DefaultApnSource};
use crate::merge;
use crate::migration;
use crate::restore::{self, RestoreReport, RestoreScope};
use crate::selector::{self, PreferenceStore};
use crate::storage::{ApnStore, WriteBatch};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLockReadGuard, broadcast};
use tracing::{Instrument, Level, event, info_span};

/// Re-planning limit for predicate writes whose rows keep changing scope.
const MAX_REPLANS: usize = 8;

/// Where one record of an insert request ended up.
enum Slot {
    Rejected,
    Existing(RowId),
    Pending(usize),
}

/// Access-controlled entry point to the APN table.
///
/// ```
/// use apnstore::prelude::*;
/// use std::sync::Arc;
///
/// tokio_test::block_on(async {
///     let provider = ApnProvider::new(
///         ProviderConfig::default(),
///         Arc::new(InMemoryApnStore::new()),
///         Arc::new(StaticCarrierIdentity::new(1)),
///         Arc::new(StaticDefaults::default()),
///     )?;
///
///     let caller = Caller::phone();
///     let general = Target::table(Scope::General);
///     provider.insert(&caller, general, ApnRecord::new("internet", "Carrier", "310260")).await?;
///
///     let rows = provider.query(&caller, general, &Predicate::All, Order::IdAscending).await?;
///     assert_eq!(rows.len(), 1);
///     Ok::<(), DbError>(())
/// })
/// .unwrap();
/// ```
pub struct ApnProvider {
    store: Arc<dyn ApnStore>,
    identity: Arc<dyn CarrierIdentity>,
    defaults: Arc<dyn DefaultApnSource>,
    config: ProviderConfig,
    policy: AccessPolicy,
    enforced: EnforcedFlag,
    preferences: PreferenceStore,
    locks: ScopeLocks,
    notifier: Notifier,
}

impl ApnProvider {
    pub fn new(
        config: ProviderConfig,
        store: Arc<dyn ApnStore>,
        identity: Arc<dyn CarrierIdentity>,
        defaults: Arc<dyn DefaultApnSource>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "apn provider ready: {} privileged uids, enforced={}",
            config.privileged_uids.len(),
            config.enforce_managed_default
        );

        Ok(Self {
            store,
            identity,
            defaults,
            policy: AccessPolicy::new(config.privileged_uids.iter().copied()),
            enforced: EnforcedFlag::new(config.enforce_managed_default),
            preferences: PreferenceStore::new(),
            locks: ScopeLocks::new(),
            notifier: Notifier::new(config.notification_capacity),
            config,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    // ------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------

    /// Authorize and, for FILTERED, pin the enforcement flag until the
    /// returned guard is dropped.
    async fn authorize(
        &self,
        caller: &Caller,
        scope: Scope,
        verb: Verb,
    ) -> Result<(Partition, Option<RwLockReadGuard<'_, bool>>)> {
        if scope == Scope::Filtered {
            let hold = self.enforced.hold().await;
            let partition = self.policy.authorize(caller, scope, verb, *hold)?;
            return Ok((partition, Some(hold)));
        }
        let partition = self.policy.authorize(caller, scope, verb, false)?;
        Ok((partition, None))
    }

    /// Authorization for verbs that touch rows.
    async fn authorize_rows(
        &self,
        caller: &Caller,
        target: &Target,
        verb: Verb,
    ) -> Result<(Partition, Option<RwLockReadGuard<'_, bool>>)> {
        let authorized = self.authorize(caller, target.scope(), verb).await?;
        if target.scope() == Scope::EnforceManaged {
            return Err(DbError::InvalidInput(
                "the enforce_managed scope only exposes the enforcement flag".into(),
            ));
        }
        Ok(authorized)
    }

    fn target_predicate(&self, target: &Target) -> Predicate {
        let rows = target.row_predicate();
        match target.subscription_id() {
            Some(sub) => {
                let operator = self.identity.sim_operator(sub);
                rows.and(selector::subscription_predicate(sub, operator.as_deref()))
            }
            None => rows,
        }
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// Visible rows of the target matching `predicate`.
    pub async fn query(
        &self,
        caller: &Caller,
        target: Target,
        predicate: &Predicate,
        order: Order,
    ) -> Result<Vec<ApnRecord>> {
        let (partition, _hold) = self.authorize_rows(caller, &target, Verb::Query).await?;
        let known = self.identity.known_mcc_mnc();
        let mut rows = self.store.query(&partition.predicate(), order).await?;
        if self.config.lazy_mcc_mnc_migration && self.migrate_rows(&rows, &known).await? > 0 {
            rows = self.store.query(&partition.predicate(), order).await?;
        }

        let filter = self.target_predicate(&target).and(predicate.clone());
        let mut visible = Vec::new();
        for row in rows.into_iter().filter(ApnRecord::is_visible) {
            let row = if self.config.lazy_mcc_mnc_migration {
                migration::migrate_row(&row, &known).unwrap_or(row)
            } else {
                row
            };
            if filter.matches(&row) {
                visible.push(row);
            }
        }
        Ok(visible)
    }

    /// Write back every legacy row of `rows`. Returns the number rewritten.
    async fn migrate_rows(&self, rows: &[ApnRecord], known: &HashSet<String>) -> Result<usize> {
        let mut migrated = 0;
        for row in rows {
            if let Some(next) = migration::migrate_row(row, known) {
                if self.write_back_migration(row, next).await? {
                    migrated += 1;
                }
            }
        }
        Ok(migrated)
    }

    /// Store a migrated row unless someone changed the original meanwhile.
    ///
    /// The migrated codes can give the row the merge key of a row already in
    /// its scope. It is then merged onto that row and removed, in one batch.
    /// A DPC row never merges: the DPC row already holding the key stays and
    /// the legacy one is dropped.
    async fn write_back_migration(&self, original: &ApnRecord, migrated: ApnRecord) -> Result<bool> {
        let Some(id) = original.id else {
            return Ok(false);
        };
        let _guard = self.locks.lock([original.scope()]).await?;
        if self.store.get(id).await?.as_ref() != Some(original) {
            return Ok(false);
        }

        let same_scope = self
            .store
            .query(&Self::scopes_predicate(&[original.scope()]), Order::IdAscending)
            .await?;

        let mut batch = WriteBatch::new();
        if original.owned_by == Ownership::Dpc {
            match merge::resolve_dpc(migrated, &same_scope) {
                Ok(res) => {
                    batch.replace(res.stored);
                }
                Err(DbError::ConflictRejected(reason)) => {
                    event!(Level::WARN, row = %id, %reason, "legacy dpc row dropped");
                    batch.delete(id);
                }
                Err(err) => return Err(err),
            }
        } else {
            let res = merge::resolve(migrated, &same_scope)?;
            if res.stored.id != Some(id) {
                batch.delete(id);
            }
            batch.replace(res.stored);
        }

        self.store.apply(batch).await?;
        event!(Level::DEBUG, row = %id, "legacy mcc/mnc migrated");
        Ok(true)
    }

    /// Migrate every legacy row now. Returns the number of rows rewritten.
    pub async fn migrate_all(&self, caller: &Caller) -> Result<usize> {
        self.authorize(caller, Scope::General, Verb::Update).await?;
        let known = self.identity.known_mcc_mnc();
        let rows = self.store.query(&Predicate::All, Order::IdAscending).await?;

        let migrated = self.migrate_rows(&rows, &known).await?;
        if migrated > 0 {
            info!("migrated {} legacy mcc/mnc rows", migrated);
            self.notifier.publish(Notification::apn_table(None));
        }
        Ok(migrated)
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Insert one record.
    ///
    /// Returns `None` when a DPC record collides with an existing DPC row.
    pub async fn insert(
        &self,
        caller: &Caller,
        target: Target,
        record: ApnRecord,
    ) -> Result<Option<RowId>> {
        let ids = self.insert_records(caller, &target, vec![record]).await?;
        let id = ids.into_iter().next().flatten();
        if id.is_some() {
            self.notifier.publish(Notification::apn_table(target.subscription_id()));
        }
        Ok(id)
    }

    /// Insert many records in one batch with a single notification.
    pub async fn bulk_insert(
        &self,
        caller: &Caller,
        target: Target,
        records: Vec<ApnRecord>,
    ) -> Result<usize> {
        let ids = self.insert_records(caller, &target, records).await?;
        let inserted = ids.iter().filter(|id| id.is_some()).count();
        if inserted > 0 {
            self.notifier.publish(Notification::apn_table(target.subscription_id()));
        }
        Ok(inserted)
    }

    async fn insert_records(
        &self,
        caller: &Caller,
        target: &Target,
        records: Vec<ApnRecord>,
    ) -> Result<Vec<Option<RowId>>> {
        let (partition, _hold) = self.authorize_rows(caller, target, Verb::Insert).await?;
        let Target::Table { subscription, .. } = target else {
            return Err(DbError::InvalidInput("insert needs a table target".into()));
        };
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let known = self.identity.known_mcc_mnc();
        let records: Vec<ApnRecord> = records
            .into_iter()
            .map(|mut rec| {
                rec.id = None;
                if let Some(owner) = partition.forced_owner {
                    rec.owned_by = owner;
                }
                if let Some(sub) = subscription {
                    if !rec.subscription_id.is_specified() {
                        rec.subscription_id = *sub;
                    }
                }
                migration::migrate_row(&rec, &known).unwrap_or(rec)
            })
            .collect();

        let _guard = self.locks.lock(records.iter().map(ApnRecord::scope)).await?;

        let numerics: BTreeSet<&str> = records.iter().map(|r| r.numeric.as_str()).collect();
        let mut working: BTreeMap<RowId, ApnRecord> = self
            .store
            .query(&Predicate::is_in(Field::Numeric, numerics), Order::IdAscending)
            .await?
            .into_iter()
            .filter_map(|r| r.id.map(|id| (id, r)))
            .collect();

        let mut pending: Vec<ApnRecord> = Vec::new();
        let mut touched: BTreeSet<RowId> = BTreeSet::new();
        let mut removed: BTreeSet<RowId> = BTreeSet::new();
        let mut slots = Vec::with_capacity(records.len());

        for rec in records {
            if rec.owned_by == Ownership::Dpc {
                let seen: Vec<ApnRecord> = working.values().chain(pending.iter()).cloned().collect();
                match merge::resolve_dpc(rec, &seen) {
                    Ok(res) => {
                        pending.push(res.stored);
                        slots.push(Slot::Pending(pending.len() - 1));
                    }
                    Err(DbError::ConflictRejected(reason)) => {
                        event!(Level::WARN, %reason, "dpc insert rejected");
                        slots.push(Slot::Rejected);
                    }
                    Err(err) => return Err(err),
                }
                continue;
            }

            let key = rec.merge_key();
            if let Some(i) = pending.iter().position(|p| p.merge_key() == key) {
                let res = merge::resolve(rec, std::slice::from_ref(&pending[i]))?;
                pending[i] = res.stored;
                slots.push(Slot::Pending(i));
                continue;
            }

            let existing: Vec<ApnRecord> = working.values().cloned().collect();
            let res = merge::resolve(rec, &existing)?;
            for id in res.removed_ids {
                working.remove(&id);
                removed.insert(id);
            }
            match res.stored.id {
                Some(id) => {
                    working.insert(id, res.stored);
                    touched.insert(id);
                    slots.push(Slot::Existing(id));
                }
                None => {
                    pending.push(res.stored);
                    slots.push(Slot::Pending(pending.len() - 1));
                }
            }
        }

        let mut batch = WriteBatch::new();
        for id in &removed {
            batch.delete(*id);
        }
        for id in touched.difference(&removed) {
            if let Some(rec) = working.get(id) {
                batch.replace(rec.clone());
            }
        }
        for rec in pending {
            batch.insert(rec);
        }

        let outcome = self.store.apply(batch).await?;
        debug!(
            "insert batch: {} new, {} merged, {} rejected",
            outcome.inserted.len(),
            outcome.replaced,
            slots.iter().filter(|s| matches!(s, Slot::Rejected)).count()
        );

        Ok(slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Rejected => None,
                Slot::Existing(id) => Some(id),
                Slot::Pending(i) => outcome.inserted.get(i).copied(),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Update / Delete
    // ------------------------------------------------------------------

    /// Lock the scopes of the visible rows matching `filter` and return those
    /// rows read under the locks.
    async fn lock_matching(&self, filter: &Predicate) -> Result<Option<(ScopeGuard, Vec<ApnRecord>)>> {
        for _ in 0..MAX_REPLANS {
            let planned = self.store.query(filter, Order::IdAscending).await?;
            let scopes: BTreeSet<LockScope> = planned
                .iter()
                .filter(|r| r.is_visible())
                .map(ApnRecord::scope)
                .collect();
            if scopes.is_empty() {
                return Ok(None);
            }

            let guard = self.locks.lock(scopes).await?;
            let rows: Vec<ApnRecord> = self
                .store
                .query(filter, Order::IdAscending)
                .await?
                .into_iter()
                .filter(ApnRecord::is_visible)
                .collect();

            if rows.iter().all(|r| guard.covers(&r.scope())) {
                return Ok(Some((guard, rows)));
            }
            debug!("matched rows moved to an unlocked scope, re-planning");
        }
        Err(DbError::Transient(
            "matched rows kept changing scope while locking".into(),
        ))
    }

    fn scopes_predicate(scopes: &[LockScope]) -> Predicate {
        let mut parts = scopes.iter().map(|(owner, sub)| {
            Predicate::eq(Field::OwnedBy, owner.code()).and(Predicate::eq(Field::SubscriptionId, sub.0))
        });
        match parts.next() {
            Some(first) => parts.fold(first, Predicate::or),
            None => Predicate::All.not(),
        }
    }

    /// Apply `changes` to the matching rows.
    ///
    /// GENERAL updates stamp USER_EDITED (CARRIER_EDITED for carrier callers)
    /// unless `changes` sets a status. A DPC update colliding with another
    /// row changes nothing and returns 0.
    pub async fn update(
        &self,
        caller: &Caller,
        target: Target,
        predicate: &Predicate,
        changes: ApnUpdate,
    ) -> Result<usize> {
        let (partition, _hold) = self.authorize_rows(caller, &target, Verb::Update).await?;
        if changes.is_empty() {
            return Ok(0);
        }

        let changes = if partition.ownership == Ownership::Others && changes.edited_status.is_none() {
            let stamp = if caller.is_carrier() {
                EditedStatus::CarrierEdited
            } else {
                EditedStatus::UserEdited
            };
            changes.status(stamp)
        } else {
            changes
        };

        let filter = partition
            .predicate()
            .and(self.target_predicate(&target))
            .and(predicate.clone());
        let Some((guard, matched)) = self.lock_matching(&filter).await? else {
            return Ok(0);
        };

        let mut working: BTreeMap<RowId, ApnRecord> = self
            .store
            .query(&Self::scopes_predicate(guard.scopes()), Order::IdAscending)
            .await?
            .into_iter()
            .filter_map(|r| r.id.map(|id| (id, r)))
            .collect();

        let mut touched: BTreeSet<RowId> = BTreeSet::new();
        let mut removed: BTreeSet<RowId> = BTreeSet::new();
        let mut affected = 0;

        for id in matched.iter().filter_map(|r| r.id) {
            let Some(current) = working.get(&id).cloned() else {
                continue;
            };
            let same_scope: Vec<ApnRecord> = working
                .values()
                .filter(|r| r.scope() == current.scope())
                .cloned()
                .collect();

            let res = match merge::resolve_update(&current, &changes, &same_scope) {
                Ok(res) => res,
                Err(DbError::ConflictRejected(reason)) => {
                    event!(Level::WARN, %reason, "dpc update rejected");
                    return Ok(0);
                }
                Err(err) => return Err(err),
            };

            for gone in res.removed_ids {
                working.remove(&gone);
                removed.insert(gone);
            }
            if let Some(stored_id) = res.stored.id {
                working.insert(stored_id, res.stored);
                touched.insert(stored_id);
            }
            affected += 1;
        }

        let mut batch = WriteBatch::new();
        for id in &removed {
            batch.delete(*id);
        }
        for id in touched.difference(&removed) {
            if let Some(rec) = working.get(id) {
                batch.replace(rec.clone());
            }
        }
        self.store.apply(batch).await?;
        drop(guard);

        event!(Level::DEBUG, affected, merged = removed.len(), "apn update applied");
        if affected > 0 {
            self.notifier.publish(Notification::apn_table(target.subscription_id()));
        }
        Ok(affected)
    }

    /// Delete the matching rows.
    ///
    /// In the OTHERS partition edited rows are removed and every other row is
    /// kept as a tombstone, so a factory reseed cannot bring it back. DPC
    /// rows are always removed.
    pub async fn delete(&self, caller: &Caller, target: Target, predicate: &Predicate) -> Result<usize> {
        let (partition, _hold) = self.authorize_rows(caller, &target, Verb::Delete).await?;
        let filter = partition
            .predicate()
            .and(self.target_predicate(&target))
            .and(predicate.clone());
        let Some((guard, matched)) = self.lock_matching(&filter).await? else {
            return Ok(0);
        };

        let tombstone = if caller.is_carrier() {
            EditedStatus::CarrierDeleted
        } else {
            EditedStatus::UserDeleted
        };

        let mut batch = WriteBatch::new();
        let mut hidden = 0;
        for rec in matched {
            let Some(id) = rec.id else { continue };
            if rec.owned_by == Ownership::Dpc || rec.edited_status.is_edited() {
                batch.delete(id);
            } else {
                batch.replace(rec.with_status(tombstone));
                hidden += 1;
            }
        }

        let affected = batch.len();
        self.store.apply(batch).await?;
        drop(guard);

        event!(Level::DEBUG, affected, tombstoned = hidden, "apn delete applied");
        if affected > 0 {
            self.notifier.publish(Notification::apn_table(target.subscription_id()));
        }
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Preferred APN / APN set / SIM list
    // ------------------------------------------------------------------

    pub async fn preferred(&self, caller: &Caller, subscription: SubscriptionId) -> Result<Option<ApnRecord>> {
        self.authorize(caller, Scope::General, Verb::Query).await?;
        let Some(id) = self.preferences.get(subscription).await else {
            return Ok(None);
        };
        Ok(self.store.get(id).await?.filter(selector::is_preferable))
    }

    pub async fn set_preferred(&self, caller: &Caller, subscription: SubscriptionId, id: RowId) -> Result<()> {
        self.authorize(caller, Scope::General, Verb::Update).await?;

        let row = self.store.get(id).await?;
        if !row.as_ref().is_some_and(selector::is_preferable) {
            error!("preferred apn {} for subscription {} is not a visible row", id, subscription);
            return Err(DbError::integrity(format!(
                "row {} cannot be the preferred apn",
                id
            )));
        }

        self.preferences.set(subscription, id).await;
        self.notifier.publish(Notification::apn_table(Some(subscription)));
        Ok(())
    }

    pub async fn clear_preferred(&self, caller: &Caller, subscription: SubscriptionId) -> Result<bool> {
        self.authorize(caller, Scope::General, Verb::Update).await?;
        let cleared = self.preferences.clear(subscription).await.is_some();
        if cleared {
            self.notifier.publish(Notification::apn_table(Some(subscription)));
        }
        Ok(cleared)
    }

    /// Rows of the preferred APN's set, or all rows when nothing is preferred.
    pub async fn apn_set(&self, caller: &Caller, subscription: SubscriptionId) -> Result<Vec<ApnRecord>> {
        let rows = self
            .query(
                caller,
                Target::subscription(Scope::General, subscription),
                &Predicate::All,
                Order::IdAscending,
            )
            .await?;
        let preferred = self.preferred(caller, subscription).await?;
        Ok(selector::apn_set(rows, preferred.as_ref()))
    }

    pub async fn sim_apn_list(&self, caller: &Caller, subscription: SubscriptionId) -> Result<Vec<ApnRecord>> {
        let rows = self
            .query(
                caller,
                Target::subscription(Scope::General, subscription),
                &Predicate::All,
                Order::IdAscending,
            )
            .await?;
        let sim = self.identity.sim_identity(subscription);
        selector::sim_apn_list(rows, &sim)
    }

    // ------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------

    /// Reset the subscription (multi-SIM) or the whole OTHERS partition
    /// (single SIM) to factory defaults, keeping user and carrier intent.
    pub async fn restore_to_default(
        &self,
        caller: &Caller,
        subscription: SubscriptionId,
    ) -> Result<RestoreReport> {
        self.authorize(caller, Scope::General, Verb::Update).await?;

        let multi_sim = self.identity.phone_count() > 1;
        let sim = self.identity.sim_identity(subscription);
        let span = info_span!("apnstore.restore", subscription = %subscription, multi_sim);

        let report = async {
            let report = if multi_sim {
                let _guard = self
                    .locks
                    .lock([
                        (Ownership::Others, subscription),
                        (Ownership::Others, SubscriptionId::UNSPECIFIED),
                    ])
                    .await?;
                let scope = RestoreScope::subscription(subscription, sim);
                let report = restore::run(
                    self.store.as_ref(),
                    self.defaults.as_ref(),
                    &scope,
                    self.config.restore_max_attempts,
                )
                .await?;
                self.preferences.clear(subscription).await;
                report
            } else {
                let _guard = self.locks.lock_partition(Ownership::Others).await;
                let scope = RestoreScope::device(sim);
                let report = restore::run(
                    self.store.as_ref(),
                    self.defaults.as_ref(),
                    &scope,
                    self.config.restore_max_attempts,
                )
                .await?;
                self.preferences.clear_all().await;
                report
            };
            event!(
                Level::INFO,
                deleted = report.deleted,
                preserved = report.preserved,
                seeded = report.seeded,
                "restore applied"
            );
            Ok::<_, DbError>(report)
        }
        .instrument(span)
        .await;

        let report = match report {
            Ok(report) => report,
            Err(err) => {
                warn!("restore of subscription {} failed: {}", subscription, err);
                return Err(err);
            }
        };

        self.notifier.publish(Notification::restore(Some(subscription)));
        self.notifier.publish(Notification::apn_table(Some(subscription)));
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Enforcement flag
    // ------------------------------------------------------------------

    pub async fn enforced(&self, caller: &Caller) -> Result<bool> {
        self.authorize(caller, Scope::EnforceManaged, Verb::Query).await?;
        Ok(self.enforced.get().await)
    }

    pub async fn set_enforced(&self, caller: &Caller, enforced: bool) -> Result<()> {
        self.authorize(caller, Scope::EnforceManaged, Verb::Update).await?;
        if self.enforced.set(enforced).await {
            info!("dpc apn enforcement set to {}", enforced);
            self.notifier.publish(Notification::enforced_changed(enforced));
        }
        Ok(())
    }
}
