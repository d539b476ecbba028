// ============================================================================
// Restore to Factory Defaults
// ============================================================================
//
// A restore deletes the rows of its scope that carry no user or carrier
// intent and re-seeds the factory list through the merge engine. The whole
// plan goes to the datastore as one batch, so the table is never seen half
// restored. A batch failing with a retryable error is planned again from a
// fresh read.
//
// ============================================================================

use crate::core::{ApnRecord, EditedStatus, Order, Ownership, Predicate, Result, SubscriptionId};
use crate::lookup::{DefaultApnSource, SimIdentity};
use crate::merge::{self, MergeOutcome};
use crate::selector::{self, mvno};
use crate::storage::{ApnStore, WriteBatch};
use log::{debug, warn};
use serde::Serialize;

/// Rows a restore may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreScope {
    /// `None` restores every OTHERS row of the device.
    pub subscription: Option<SubscriptionId>,
    /// SIM of the restored subscription; orders MVNO defaults first.
    pub sim: SimIdentity,
}

impl RestoreScope {
    pub fn device(sim: SimIdentity) -> Self {
        Self {
            subscription: None,
            sim,
        }
    }

    pub fn subscription(subscription: SubscriptionId, sim: SimIdentity) -> Self {
        Self {
            subscription: Some(subscription),
            sim,
        }
    }

    /// Existing row falls inside the restore.
    pub fn contains(&self, rec: &ApnRecord) -> Result<bool> {
        if rec.owned_by != Ownership::Others {
            return Ok(false);
        }
        match self.subscription {
            None => Ok(true),
            Some(sub) => {
                let belongs =
                    selector::subscription_predicate(sub, self.sim.mcc_mnc.as_deref()).matches(rec);
                Ok(belongs && mvno::admits(rec, &self.sim)?)
            }
        }
    }

    /// Factory default gets seeded by this restore.
    fn admits_default(&self, rec: &ApnRecord) -> Result<bool> {
        match self.subscription {
            None => Ok(true),
            Some(_) => {
                let same_operator = self.sim.mcc_mnc.as_deref() == Some(rec.numeric.as_str());
                Ok(same_operator && mvno::admits(rec, &self.sim)?)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub deleted: usize,
    pub preserved: usize,
    pub seeded: usize,
}

/// A restore drops the row, or keeps it untouched.
fn is_dropped(status: EditedStatus) -> bool {
    matches!(
        status,
        EditedStatus::Unedited
            | EditedStatus::UserDeleted
            | EditedStatus::CarrierDeleted
            | EditedStatus::CarrierDeletedButPresentInXml
    )
}

/// Build the restore batch from a snapshot of the table.
pub fn plan(
    rows: &[ApnRecord],
    defaults: Vec<ApnRecord>,
    scope: &RestoreScope,
) -> Result<(WriteBatch, RestoreReport)> {
    let mut batch = WriteBatch::new();
    let mut report = RestoreReport::default();
    let mut survivors: Vec<ApnRecord> = Vec::with_capacity(rows.len());

    for rec in rows {
        if !scope.contains(rec)? {
            survivors.push(rec.clone());
            continue;
        }
        match rec.id {
            Some(id) if is_dropped(rec.edited_status) => {
                batch.delete(id);
                report.deleted += 1;
            }
            _ => {
                report.preserved += 1;
                survivors.push(rec.clone());
            }
        }
    }

    let mut mvno_first: Vec<ApnRecord> = Vec::new();
    let mut generic: Vec<ApnRecord> = Vec::new();
    for mut rec in defaults {
        if !scope.admits_default(&rec)? {
            continue;
        }
        rec.id = None;
        rec.owned_by = Ownership::Others;
        rec.subscription_id = SubscriptionId::UNSPECIFIED;
        rec.edited_status = EditedStatus::Unedited;
        if rec.has_mvno() && mvno::matches(&rec, &scope.sim)? {
            mvno_first.push(rec);
        } else {
            generic.push(rec);
        }
    }

    let mut seeded: Vec<ApnRecord> = Vec::new();
    for rec in mvno_first.into_iter().chain(generic) {
        let key = rec.merge_key();
        if let Some(pending) = seeded.iter_mut().find(|s| s.merge_key() == key) {
            let res = merge::resolve(rec, std::slice::from_ref(pending))?;
            *pending = res.stored;
            continue;
        }

        let res = merge::resolve(rec, &survivors)?;
        match res.outcome {
            MergeOutcome::Inserted => seeded.push(res.stored),
            MergeOutcome::PreservedIntent => {
                debug!("restore keeps edited row {:?}", res.stored.id);
            }
            MergeOutcome::Merged | MergeOutcome::Updated => {
                batch.replace(res.stored);
            }
        }
    }

    report.seeded = seeded.len();
    for rec in seeded {
        batch.insert(rec);
    }
    Ok((batch, report))
}

/// Plan and apply a restore, re-planning after retryable failures.
pub async fn run(
    store: &dyn ApnStore,
    defaults: &dyn DefaultApnSource,
    scope: &RestoreScope,
    max_attempts: u32,
) -> Result<RestoreReport> {
    let mut attempt = 1;
    loop {
        let rows = store.query(&Predicate::All, Order::IdAscending).await?;
        let (batch, report) = plan(&rows, defaults.default_apns(), scope)?;

        match store.apply(batch).await {
            Ok(_) => return Ok(report),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                warn!("restore attempt {} of {} failed: {}", attempt, max_attempts, err);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
