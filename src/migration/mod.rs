// ============================================================================
// MCC/MNC Migration
// ============================================================================
//
// Old rows stored MCC and MNC as integers, which loses the leading zero that
// tells "05" from "005". The migration rebuilds the string columns, asking the
// carrier identity lookup which spelling actually exists.
//
// ============================================================================

use crate::core::ApnRecord;
use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// Countries whose operators use 3-digit MNCs.
    static ref THREE_DIGIT_MNC_COUNTRIES: HashSet<u16> = [
        302, 310, 311, 312, 313, 314, 315, 316, 334, 338, 342, 344, 346, 348, 354, 356, 358,
        360, 365, 366, 376, 405, 708, 722, 732, 750,
    ]
    .into_iter()
    .collect();
}

pub fn uses_three_digit_mnc(mcc: u16) -> bool {
    THREE_DIGIT_MNC_COUNTRIES.contains(&mcc)
}

/// Candidate string forms of a legacy MNC, longest first.
fn mnc_candidates(mnc: u16) -> Vec<String> {
    if mnc >= 100 {
        return vec![format!("{:03}", mnc)];
    }
    let two = format!("{:02}", mnc);
    vec![format!("0{}", two), two]
}

/// Pick the MNC string for a legacy (mcc, mnc) pair.
pub fn mnc_string(mcc: u16, mnc: u16, known_mcc_mnc: &HashSet<String>) -> String {
    let mcc_str = format!("{:03}", mcc);
    let candidates = mnc_candidates(mnc);

    if let Some(hit) = candidates
        .iter()
        .find(|c| known_mcc_mnc.contains(&format!("{}{}", mcc_str, c)))
    {
        return hit.clone();
    }

    match candidates.as_slice() {
        [_, two] if !uses_three_digit_mnc(mcc) => two.clone(),
        [first, ..] => first.clone(),
        [] => String::new(),
    }
}

/// Row with its string MCC/MNC columns filled from the legacy integers.
///
/// `None` when there is nothing to do: the strings are already there, or the
/// row never had legacy codes. Applying it to its own output is a no-op.
pub fn migrate_row(row: &ApnRecord, known_mcc_mnc: &HashSet<String>) -> Option<ApnRecord> {
    if !row.mcc.is_empty() && !row.mnc.is_empty() {
        return None;
    }
    let (mcc, mnc) = (row.legacy_mcc?, row.legacy_mnc?);

    let mut migrated = row.clone();
    migrated.mcc = format!("{:03}", mcc);
    migrated.mnc = mnc_string(mcc, mnc, known_mcc_mnc);
    if migrated.numeric.is_empty() {
        migrated.numeric = format!("{}{}", migrated.mcc, migrated.mnc);
    }
    Some(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> HashSet<String> {
        ["99910", "999110", "999060", "99905"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn legacy(mcc: u16, mnc: u16) -> ApnRecord {
        ApnRecord::new("internet", "n", "").with_legacy_codes(mcc, mnc)
    }

    #[test]
    fn test_known_set_decides_padding() {
        let known = known();
        for (mnc, expected) in [(10, "10"), (110, "110"), (60, "060"), (5, "05")] {
            let row = migrate_row(&legacy(999, mnc), &known).unwrap();
            assert_eq!(row.mcc, "999");
            assert_eq!(row.mnc, expected);
            assert!(known.contains(&row.numeric));
        }
    }

    #[test]
    fn test_fallback_by_country() {
        let known = HashSet::new();
        assert_eq!(mnc_string(310, 26, &known), "026");
        assert_eq!(mnc_string(262, 1, &known), "01");
        assert_eq!(mnc_string(262, 123, &known), "123");
    }

    #[test]
    fn test_migration_is_idempotent() {
        let known = known();
        let once = migrate_row(&legacy(999, 60), &known).unwrap();
        assert!(migrate_row(&once, &known).is_none());
    }

    #[test]
    fn test_rows_without_legacy_codes_are_skipped() {
        assert!(migrate_row(&ApnRecord::new("a", "a", "123456"), &known()).is_none());

        let populated = legacy(999, 5).with_mcc_mnc("999", "05");
        assert!(migrate_row(&populated, &known()).is_none());
    }

    #[test]
    fn test_existing_numeric_is_kept() {
        let mut row = legacy(999, 5);
        row.numeric = "99905".into();
        let migrated = migrate_row(&row, &HashSet::new()).unwrap();
        assert_eq!(migrated.numeric, "99905");
    }
}
