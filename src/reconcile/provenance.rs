//! Identity and provenance helpers shared by the view modes.

use std::collections::{HashMap, HashSet};

use super::{DisplayRecord, Source};
use crate::mail::types::{Header, Uid};

/// Deduplicate headers by uid. A later entry replaces an earlier one with
/// the same uid but keeps the slot of the first occurrence.
pub fn collapse_last_seen(headers: &[Header]) -> Vec<&Header> {
    let mut slots: HashMap<Uid, usize> = HashMap::with_capacity(headers.len());
    let mut unique: Vec<&Header> = Vec::with_capacity(headers.len());

    for header in headers {
        match slots.get(&header.uid) {
            Some(&slot) => unique[slot] = header,
            None => {
                slots.insert(header.uid, unique.len());
                unique.push(header);
            }
        }
    }

    unique
}

pub fn uid_set(headers: &[Header]) -> HashSet<Uid> {
    headers.iter().map(|h| h.uid).collect()
}

/// Provenance of an archived local copy.
///
/// An empty server set is read as "not loaded yet", so nothing is reported
/// as gone from the server until a listing with content has arrived.
pub fn classify_local(uid: Uid, server_uids: &HashSet<Uid>) -> Source {
    if !server_uids.is_empty() && !server_uids.contains(&uid) {
        Source::LocalOnly
    } else {
        Source::Local
    }
}

impl DisplayRecord {
    /// Record for a header the server currently reports.
    pub fn server(header: &Header, is_archived: bool) -> Self {
        Self {
            header: header.clone(),
            source: Source::Server,
            is_archived,
        }
    }

    /// Record for a user-archived local copy.
    pub fn archived(header: &Header, source: Source) -> Self {
        Self {
            header: header.clone(),
            source,
            is_archived: true,
        }
    }
}
