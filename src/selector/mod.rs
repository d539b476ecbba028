// ============================================================================
// Preferred / APN-set / SIM-list Selection
// ============================================================================
//
// Derived read views over the OTHERS partition. The functions here are pure
// and work on rows already read (visible, ordered by id); the provider owns
// the reads and the preference pointers.
//
// ============================================================================

pub mod mvno;
pub mod preference;

pub use preference::PreferenceStore;

use crate::core::{ApnRecord, Field, Ownership, Predicate, Result, SubscriptionId};
use crate::lookup::SimIdentity;

/// Rows belonging to `subscription`: pinned to it, or unpinned and carrying
/// the SIM operator's numeric.
pub fn subscription_predicate(subscription: SubscriptionId, sim_operator: Option<&str>) -> Predicate {
    let pinned = Predicate::eq(Field::SubscriptionId, subscription.0);
    match sim_operator {
        Some(op) => pinned.or(Predicate::eq(Field::SubscriptionId, SubscriptionId::UNSPECIFIED.0)
            .and(Predicate::eq(Field::Numeric, op))),
        None => pinned,
    }
}

/// A row can be the preferred APN only while it is a visible OTHERS row.
pub fn is_preferable(rec: &ApnRecord) -> bool {
    rec.is_visible() && rec.owned_by == Ownership::Others
}

/// Rows of the preferred row's APN set, or every row when nothing is preferred.
pub fn apn_set(rows: Vec<ApnRecord>, preferred: Option<&ApnRecord>) -> Vec<ApnRecord> {
    match preferred {
        Some(p) => rows
            .into_iter()
            .filter(|r| r.apn_set_id == p.apn_set_id)
            .collect(),
        None => rows,
    }
}

/// Best candidates for the inserted SIM.
///
/// MVNO rows matching the SIM win; otherwise the rows for the MCC+MNC without
/// any MVNO constraint.
pub fn sim_apn_list(rows: Vec<ApnRecord>, sim: &SimIdentity) -> Result<Vec<ApnRecord>> {
    let Some(operator) = sim.mcc_mnc.as_deref() else {
        return Ok(Vec::new());
    };

    let (mvno_rows, generic): (Vec<ApnRecord>, Vec<ApnRecord>) = rows
        .into_iter()
        .filter(|r| r.numeric == operator)
        .partition(ApnRecord::has_mvno);

    let mut matching = Vec::new();
    for rec in mvno_rows {
        if mvno::matches(&rec, sim)? {
            matching.push(rec);
        }
    }

    Ok(if matching.is_empty() { generic } else { matching })
}
