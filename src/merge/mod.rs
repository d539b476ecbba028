// ============================================================================
// Merge Engine
// ============================================================================
//
// Decides what survives when an incoming row shares its merge key with rows
// already in the table. The engine is pure: it returns a `Resolution` and the
// caller turns it into a write batch.
//
// Precedence of `edited_status`: UNEDITED loses to every other status, and
// between two non-UNEDITED statuses the incoming one wins.
//
// ============================================================================

pub mod apn_types;

use crate::core::{ApnRecord, ApnUpdate, DbError, EditedStatus, Ownership, Result, RowId};
use log::{debug, error, warn};
use serde::Serialize;

/// How an incoming row was reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeOutcome {
    /// No collision; the row is stored as a new row.
    Inserted,
    /// Collided and was merged last-write-wins onto the existing row.
    Merged,
    /// Collided with a user/carrier edited row whose intent was kept.
    PreservedIntent,
    /// An update that collided with nothing.
    Updated,
}

/// Result of a merge decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Row to write. Carries an id when it overwrites an existing row.
    pub stored: ApnRecord,
    /// Rows that must disappear for `stored` to be written.
    pub removed_ids: Vec<RowId>,
    pub outcome: MergeOutcome,
}

/// Status kept when `incoming` lands on a row that has `existing`.
pub fn status_precedence(existing: EditedStatus, incoming: EditedStatus) -> EditedStatus {
    if incoming.is_unedited() { existing } else { incoming }
}

fn colliding<'a>(incoming: &ApnRecord, existing: &'a [ApnRecord]) -> Vec<&'a ApnRecord> {
    let key = incoming.merge_key();
    existing
        .iter()
        .filter(|e| (incoming.id.is_none() || e.id != incoming.id) && e.merge_key() == key)
        .collect()
}

fn too_many(count: usize, incoming: &ApnRecord) -> DbError {
    error!(
        "{} rows share the merge key of apn '{}' ({})",
        count, incoming.apn, incoming.numeric
    );
    DbError::integrity(format!(
        "{} existing rows collide with apn '{}' numeric '{}'",
        count, incoming.apn, incoming.numeric
    ))
}

/// Combine `incoming` with the single row it collides with.
fn merge_onto(existing: &ApnRecord, incoming: &ApnRecord) -> (ApnRecord, MergeOutcome) {
    let apn_types = apn_types::union(&existing.apn_types, &incoming.apn_types);

    if !existing.edited_status.is_unedited() && incoming.edited_status.is_unedited() {
        let mut kept = existing.clone();
        kept.name = incoming.name.clone();
        kept.apn_types = apn_types;
        return (kept, MergeOutcome::PreservedIntent);
    }

    let mut merged = incoming.clone();
    merged.id = existing.id;
    merged.apn_types = apn_types;
    merged.edited_status = status_precedence(existing.edited_status, incoming.edited_status);
    (merged, MergeOutcome::Merged)
}

/// Reconcile an insert in the OTHERS partition.
///
/// `existing` may contain unrelated rows; only those sharing the incoming
/// merge key take part.
pub fn resolve(incoming: ApnRecord, existing: &[ApnRecord]) -> Result<Resolution> {
    let hits = colliding(&incoming, existing);

    match hits.as_slice() {
        [] => Ok(Resolution {
            stored: incoming,
            removed_ids: Vec::new(),
            outcome: MergeOutcome::Inserted,
        }),
        [existing] => {
            let (stored, outcome) = merge_onto(existing, &incoming);
            debug!(
                "merge of apn '{}' onto row {:?}: {:?}, status {:?}",
                incoming.apn, existing.id, outcome, stored.edited_status
            );
            Ok(Resolution {
                stored,
                removed_ids: Vec::new(),
                outcome,
            })
        }
        many => Err(too_many(many.len(), &incoming)),
    }
}

/// Reconcile an insert in the DPC partition. Any collision is rejected.
pub fn resolve_dpc(incoming: ApnRecord, existing: &[ApnRecord]) -> Result<Resolution> {
    let hits = colliding(&incoming, existing);
    if let Some(hit) = hits.first() {
        warn!(
            "rejecting DPC apn '{}' ({}): collides with row {:?}",
            incoming.apn, incoming.numeric, hit.id
        );
        return Err(DbError::ConflictRejected(format!(
            "DPC apn '{}' collides with an existing row",
            incoming.apn
        )));
    }
    Ok(Resolution {
        stored: incoming,
        removed_ids: Vec::new(),
        outcome: MergeOutcome::Inserted,
    })
}

/// Reconcile an update of `current`.
///
/// When the updated row takes the merge key of another row `E`, the update is
/// applied on top of `E` and `current` is removed. DPC rows never merge.
pub fn resolve_update(
    current: &ApnRecord,
    update: &ApnUpdate,
    existing: &[ApnRecord],
) -> Result<Resolution> {
    let updated = update.applied(current);
    let hits = colliding(&updated, existing);

    match hits.as_slice() {
        [] => Ok(Resolution {
            stored: updated,
            removed_ids: Vec::new(),
            outcome: MergeOutcome::Updated,
        }),
        [hit] if current.owned_by == Ownership::Dpc => {
            warn!(
                "rejecting DPC update of row {:?}: collides with row {:?}",
                current.id, hit.id
            );
            Err(DbError::ConflictRejected(format!(
                "DPC update of row {:?} collides with row {:?}",
                current.id, hit.id
            )))
        }
        [hit] => {
            let (stored, outcome) =
                if !hit.edited_status.is_unedited() && updated.edited_status.is_unedited() {
                    merge_onto(hit, &updated)
                } else {
                    let mut stored = update.applied(hit);
                    stored.apn_types = apn_types::union(&hit.apn_types, &updated.apn_types);
                    stored.edited_status = status_precedence(hit.edited_status, updated.edited_status);
                    (stored, MergeOutcome::Merged)
                };
            debug!(
                "update of row {:?} merged into row {:?}: {:?}, status {:?}",
                current.id, hit.id, outcome, stored.edited_status
            );
            Ok(Resolution {
                stored,
                removed_ids: current.id.into_iter().collect(),
                outcome,
            })
        }
        many if current.owned_by == Ownership::Dpc => Err(DbError::ConflictRejected(format!(
            "DPC update of row {:?} collides with {} rows",
            current.id,
            many.len()
        ))),
        many => Err(too_many(many.len(), &updated)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: u64, rec: ApnRecord) -> ApnRecord {
        let mut rec = rec;
        rec.id = Some(RowId(id));
        rec
    }

    #[test]
    fn test_no_collision_inserts_unchanged() {
        let incoming = ApnRecord::new("internet", "n", "123456");
        let other = stored(1, ApnRecord::new("mms", "n", "123456"));
        let res = resolve(incoming.clone(), &[other]).unwrap();
        assert_eq!(res.outcome, MergeOutcome::Inserted);
        assert_eq!(res.stored, incoming);
    }

    #[test]
    fn test_status_precedence() {
        use EditedStatus::*;
        assert_eq!(status_precedence(UserEdited, Unedited), UserEdited);
        assert_eq!(status_precedence(Unedited, CarrierEdited), CarrierEdited);
        assert_eq!(status_precedence(UserDeleted, CarrierEdited), CarrierEdited);
        assert_eq!(status_precedence(Unedited, Unedited), Unedited);
    }

    #[test]
    fn test_unedited_incoming_keeps_user_intent() {
        let existing = stored(
            3,
            ApnRecord::new("internet", "old", "123456")
                .with_status(EditedStatus::UserEdited)
                .with_types("default"),
        );
        let mut edited = existing.clone();
        edited.user = "alice".into();

        let mut incoming = ApnRecord::new("internet", "refreshed", "123456").with_types("mms");
        incoming.user = "factory".into();

        let res = resolve(incoming, &[edited]).unwrap();
        assert_eq!(res.outcome, MergeOutcome::PreservedIntent);
        assert_eq!(res.stored.id, Some(RowId(3)));
        assert_eq!(res.stored.name, "refreshed");
        assert_eq!(res.stored.user, "alice");
        assert_eq!(res.stored.apn_types, "default,mms");
        assert_eq!(res.stored.edited_status, EditedStatus::UserEdited);
    }

    #[test]
    fn test_last_write_wins_between_unedited() {
        let existing = stored(5, ApnRecord::new("internet", "old", "123456"));
        let mut incoming = ApnRecord::new("internet", "new", "123456");
        incoming.password = "secret".into();

        let res = resolve(incoming, &[existing]).unwrap();
        assert_eq!(res.outcome, MergeOutcome::Merged);
        assert_eq!(res.stored.id, Some(RowId(5)));
        assert_eq!(res.stored.password, "secret");
        assert!(res.removed_ids.is_empty());
    }

    #[test]
    fn test_multiple_collisions_are_integrity_violation() {
        let a = stored(1, ApnRecord::new("internet", "a", "123456"));
        let b = stored(2, ApnRecord::new("internet", "b", "123456"));
        let err = resolve(ApnRecord::new("internet", "c", "123456"), &[a, b]).unwrap_err();
        assert!(matches!(err, DbError::IntegrityViolation(_)));
    }

    #[test]
    fn test_dpc_collision_rejected() {
        let existing = stored(1, ApnRecord::new("internet", "a", "123456").with_owner(Ownership::Dpc));
        let incoming = ApnRecord::new("internet", "b", "123456").with_owner(Ownership::Dpc);
        let err = resolve_dpc(incoming, &[existing]).unwrap_err();
        assert!(matches!(err, DbError::ConflictRejected(_)));
    }

    #[test]
    fn test_update_collision_merges_into_existing() {
        let target = stored(1, ApnRecord::new("apn1", "carrier1", "123456").with_types("default"));
        let other = stored(
            2,
            ApnRecord::new("apn2", "carrier2", "123456")
                .with_types("mms")
                .with_apn_set(4),
        );

        let update = ApnUpdate::new().apn("apn2").status(EditedStatus::UserEdited);
        let res = resolve_update(&target, &update, &[other]).unwrap();

        assert_eq!(res.outcome, MergeOutcome::Merged);
        assert_eq!(res.stored.id, Some(RowId(2)));
        assert_eq!(res.stored.apn_set_id, 4);
        assert_eq!(res.stored.apn_types, "mms,default");
        assert_eq!(res.stored.edited_status, EditedStatus::UserEdited);
        assert_eq!(res.removed_ids, vec![RowId(1)]);
    }

    #[test]
    fn test_unedited_update_collision_keeps_user_intent() {
        let target = stored(1, ApnRecord::new("apn1", "carrier1", "123456").with_types("default"));
        let mut edited = stored(
            2,
            ApnRecord::new("apn2", "carrier2", "123456")
                .with_types("mms")
                .with_status(EditedStatus::UserEdited),
        );
        edited.user = "alice".into();

        let update = ApnUpdate::new()
            .apn("apn2")
            .user("factory")
            .status(EditedStatus::Unedited);
        let res = resolve_update(&target, &update, &[edited]).unwrap();

        assert_eq!(res.outcome, MergeOutcome::PreservedIntent);
        assert_eq!(res.stored.id, Some(RowId(2)));
        assert_eq!(res.stored.user, "alice");
        assert_eq!(res.stored.name, "carrier1");
        assert_eq!(res.stored.apn_types, "mms,default");
        assert_eq!(res.stored.edited_status, EditedStatus::UserEdited);
        assert_eq!(res.removed_ids, vec![RowId(1)]);
    }

    #[test]
    fn test_update_without_collision() {
        let target = stored(1, ApnRecord::new("apn1", "carrier1", "123456"));
        let res = resolve_update(&target, &ApnUpdate::new().name("x"), &[target.clone()]).unwrap();
        assert_eq!(res.outcome, MergeOutcome::Updated);
        assert_eq!(res.stored.name, "x");
        assert_eq!(res.stored.id, Some(RowId(1)));
    }

    #[test]
    fn test_dpc_update_collision_rejected() {
        let target = stored(1, ApnRecord::new("apn1", "n", "123456").with_owner(Ownership::Dpc));
        let other = stored(2, ApnRecord::new("apn2", "n", "123456").with_owner(Ownership::Dpc));
        let err = resolve_update(&target, &ApnUpdate::new().apn("apn2"), &[other]).unwrap_err();
        assert!(matches!(err, DbError::ConflictRejected(_)));
    }
}
