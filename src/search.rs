//! Header search over the local archive.
//!
//! Matches subject and sender only; message bodies are never searched here.

use aho_corasick::AhoCorasick;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::cache::ArchiveStore;
use crate::error::Result;
use crate::mail::types::Header;
use crate::provider::SearchProvider;
use crate::reconcile::sort::sort_newest_first;
use crate::reconcile::{DisplayRecord, Source};

/// Optional restrictions applied on top of the free-text query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Substring of the sender name or address
    pub from: Option<String>,
    /// Substring of the subject
    pub subject: Option<String>,
    /// Messages dated on or after this day (UTC)
    pub since: Option<NaiveDate>,
    /// Messages dated strictly before this day (UTC)
    pub before: Option<NaiveDate>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.subject.is_none() && self.since.is_none() && self.before.is_none()
    }
}

/// Case-insensitive substring matcher. An empty needle matches everything.
struct Needle(Option<AhoCorasick>);

impl Needle {
    fn new(pattern: Option<&str>) -> Self {
        let pattern = pattern.map(str::trim).filter(|p| !p.is_empty());
        Self(pattern.and_then(|p| AhoCorasick::new([p.to_lowercase()]).ok()))
    }

    fn matches<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
        match &self.0 {
            None => true,
            Some(ac) => fields
                .into_iter()
                .any(|text| ac.is_match(&text.to_lowercase())),
        }
    }
}

fn day_start(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Headers matching the query and every filter, in input order.
/// Headers without a readable date never pass a date filter.
pub fn matching_headers<'a>(
    headers: &'a [Header],
    query: &str,
    filters: &SearchFilters,
) -> Vec<&'a Header> {
    let query = Needle::new(Some(query));
    let from = Needle::new(filters.from.as_deref());
    let subject = Needle::new(filters.subject.as_deref());
    let since = filters.since.map(day_start);
    let before = filters.before.map(day_start);

    headers
        .iter()
        .filter(|h| {
            let sender = [h.from.address.as_str(), h.from.name.as_deref().unwrap_or("")];
            query.matches([h.subject.as_str(), sender[0], sender[1]])
                && from.matches(sender)
                && subject.matches([h.subject.as_str()])
        })
        .filter(|h| {
            if since.is_none() && before.is_none() {
                return true;
            }
            let Some(ts) = h.timestamp() else {
                return false;
            };
            since.is_none_or(|s| ts >= s) && before.is_none_or(|b| ts < b)
        })
        .collect()
}

/// Search provider backed by the archived copies in an [`ArchiveStore`].
#[derive(Clone)]
pub struct LocalSearch {
    store: ArchiveStore,
}

impl LocalSearch {
    pub fn new(store: ArchiveStore) -> Self {
        Self { store }
    }
}

impl SearchProvider for LocalSearch {
    async fn search(
        &self,
        account: &str,
        folder: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<DisplayRecord>> {
        let headers = self.store.get_all(account, folder).await?;
        let archived = self.store.archived_ids(account, folder).await?;

        let mut records: Vec<DisplayRecord> = matching_headers(&headers, query, filters)
            .into_iter()
            .filter(|h| archived.contains(&h.uid))
            .map(|h| DisplayRecord::archived(h, Source::Local))
            .collect();
        sort_newest_first(&mut records);

        tracing::debug!(
            "Local search '{}' in {}/{}: {} hit(s)",
            query,
            account,
            folder,
            records.len()
        );
        Ok(records)
    }
}
