//! Display order of a user's credential list.
//!
//! Pinned records come first, most recently pinned on top; unpinned records
//! follow, newest first. The store is queried without any server-side sort, so
//! this is the only place the order is decided.

use std::cmp::Ordering;

use crate::CredentialRecord;

/// Compares two records for display.
///
/// A pinned record with no `pinned_at` breaks the record invariant; it is
/// ordered as if it had been pinned at the earliest possible time.
#[must_use]
pub fn compare(a: &CredentialRecord, b: &CredentialRecord) -> Ordering {
    match (a.is_pinned, b.is_pinned) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => b.pinned_at.cmp(&a.pinned_at),
        (false, false) => b.created_at.cmp(&a.created_at),
    }
}

/// Returns the records in display order. Ties keep their input order.
#[must_use]
pub fn order(records: &[CredentialRecord]) -> Vec<CredentialRecord> {
    let mut ordered = records.to_vec();
    ordered.sort_by(compare);
    ordered
}

/// Exported to foreign bindings; same as [`order`].
#[uniffi::export]
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn order_records(records: Vec<CredentialRecord>) -> Vec<CredentialRecord> {
    order(&records)
}
