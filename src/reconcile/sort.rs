//! Newest-first ordering for display lists.

use std::cmp::Reverse;

use super::DisplayRecord;
use crate::constants::MISSING_DATE_SENTINEL;
use crate::mail::types::Header;

/// Timestamp used for ordering. Missing or unparsable dates map to the
/// sentinel so they sort after every dated header.
pub fn sort_key(header: &Header) -> i64 {
    header.timestamp().unwrap_or(MISSING_DATE_SENTINEL)
}

/// Sort by timestamp descending, breaking ties by ascending uid.
pub fn sort_newest_first(records: &mut [DisplayRecord]) {
    records.sort_by_cached_key(|r| (Reverse(sort_key(&r.header)), r.header.uid));
}
