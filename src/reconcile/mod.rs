//! Reconciliation of the remote mailbox, the local archive and search results
//! into the single list shown to the user.
//!
//! - `mod.rs` - view modes, display records and [`compute`]
//! - `provenance.rs` - uid identity helpers and source tagging
//! - `sort.rs` - newest-first ordering with a fixed missing-date sentinel
//!
//! [`compute`] is a pure function of its [`Snapshot`]: it never mutates the
//! inputs and the same snapshot always yields an equal list.

pub mod provenance;
pub mod sort;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::mail::types::{Header, Uid};
use provenance::{classify_local, collapse_last_seen, uid_set};
use sort::sort_newest_first;

/// Which sources are visible and how they are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Exactly what the remote mailbox reports
    Server,
    /// Only user-archived local copies
    Local,
    /// Server listing plus archived copies the server no longer has
    #[default]
    All,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Local => "local",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown view mode '{0}' (expected server, local or all)")]
pub struct ParseViewModeError(String);

impl FromStr for ViewMode {
    type Err = ParseViewModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "local" => Ok(Self::Local),
            "all" => Ok(Self::All),
            _ => Err(ParseViewModeError(s.to_string())),
        }
    }
}

/// Where a displayed message comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Confirmed present on the server
    Server,
    /// Archived locally; present on the server or server state unknown
    Local,
    /// Archived locally and confirmed gone from the server
    LocalOnly,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Local => "local",
            Self::LocalOnly => "local-only",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A header annotated for display. Derived on every render, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRecord {
    #[serde(flatten)]
    pub header: Header,
    pub source: Source,
    pub is_archived: bool,
}

/// Point-in-time view of every input the engine reads.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    /// `Some` while a search is active; the results replace everything else
    pub search: Option<&'a [DisplayRecord]>,
    /// Current remote listing. Empty is read as "not loaded yet".
    pub server: &'a [Header],
    /// Every locally stored header, archived or merely cached
    pub local: &'a [Header],
    /// Uids the user archived on purpose
    pub archived: &'a HashSet<Uid>,
    pub mode: ViewMode,
}

/// Build the display list for one snapshot.
///
/// An active search is returned verbatim. Otherwise the records for the
/// selected mode are sorted newest first (see [`sort::sort_newest_first`]).
/// Duplicate uids within one source collapse to the last occurrence.
pub fn compute(snapshot: &Snapshot<'_>) -> Vec<DisplayRecord> {
    if let Some(results) = snapshot.search {
        return results.to_vec();
    }

    let mut records = match snapshot.mode {
        ViewMode::Server => server_view(snapshot),
        ViewMode::Local => local_view(snapshot),
        ViewMode::All => merged_view(snapshot),
    };
    sort_newest_first(&mut records);
    records
}

fn server_view(snapshot: &Snapshot<'_>) -> Vec<DisplayRecord> {
    collapse_last_seen(snapshot.server)
        .into_iter()
        .map(|h| DisplayRecord::server(h, snapshot.archived.contains(&h.uid)))
        .collect()
}

fn local_view(snapshot: &Snapshot<'_>) -> Vec<DisplayRecord> {
    let server_uids = uid_set(snapshot.server);

    collapse_last_seen(snapshot.local)
        .into_iter()
        .filter(|h| snapshot.archived.contains(&h.uid))
        .map(|h| DisplayRecord::archived(h, classify_local(h.uid, &server_uids)))
        .collect()
}

fn merged_view(snapshot: &Snapshot<'_>) -> Vec<DisplayRecord> {
    let server_uids = uid_set(snapshot.server);
    let mut records = server_view(snapshot);

    // Archived copies already on the server are represented by the server record.
    // With an empty listing nothing is confirmed gone, so those stay `Local`.
    records.extend(
        collapse_last_seen(snapshot.local)
            .into_iter()
            .filter(|h| snapshot.archived.contains(&h.uid) && !server_uids.contains(&h.uid))
            .map(|h| DisplayRecord::archived(h, classify_local(h.uid, &server_uids))),
    );

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(uid: Uid, date: &str) -> Header {
        Header::new(uid, format!("Subject {}", uid)).with_date(date)
    }

    fn archived(uids: &[Uid]) -> HashSet<Uid> {
        uids.iter().copied().collect()
    }

    fn snapshot<'a>(
        server: &'a [Header],
        local: &'a [Header],
        archived: &'a HashSet<Uid>,
        mode: ViewMode,
    ) -> Snapshot<'a> {
        Snapshot {
            search: None,
            server,
            local,
            archived,
            mode,
        }
    }

    fn summary(records: &[DisplayRecord]) -> Vec<(Uid, Source, bool)> {
        records
            .iter()
            .map(|r| (r.header.uid, r.source, r.is_archived))
            .collect()
    }

    const D1: &str = "2024-01-01T00:00:00Z";
    const D2: &str = "2024-02-01T00:00:00Z";
    const D3: &str = "2024-03-01T00:00:00Z";

    #[test]
    fn test_all_mode_server_only() {
        let server = vec![header(1, D1)];
        let ids = archived(&[]);
        let out = compute(&snapshot(&server, &[], &ids, ViewMode::All));
        assert_eq!(summary(&out), vec![(1, Source::Server, false)]);
    }

    #[test]
    fn test_all_mode_archived_on_server_not_duplicated() {
        let server = vec![header(1, D1)];
        let local = vec![header(1, D1)];
        let ids = archived(&[1]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::All));
        assert_eq!(summary(&out), vec![(1, Source::Server, true)]);
    }

    #[test]
    fn test_all_mode_adds_local_only() {
        let server = vec![header(10, D2)];
        let local = vec![header(1, D1)];
        let ids = archived(&[1]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::All));
        assert_eq!(
            summary(&out),
            vec![(10, Source::Server, false), (1, Source::LocalOnly, true)]
        );
    }

    #[test]
    fn test_local_mode_empty_server_is_optimistic() {
        let local = vec![header(1, D1), header(2, D2)];
        let ids = archived(&[1, 2]);
        let out = compute(&snapshot(&[], &local, &ids, ViewMode::Local));
        assert_eq!(
            summary(&out),
            vec![(2, Source::Local, true), (1, Source::Local, true)]
        );
    }

    #[test]
    fn test_local_mode_marks_server_deleted() {
        let server = vec![header(1, D1)];
        let local = vec![header(1, D1), header(2, D2)];
        let ids = archived(&[1, 2]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::Local));
        assert_eq!(
            summary(&out),
            vec![(2, Source::LocalOnly, true), (1, Source::Local, true)]
        );
    }

    #[test]
    fn test_local_mode_hides_cached_only() {
        let server = vec![header(1, D1), header(2, D2)];
        let local = vec![header(1, D1), header(2, D2), header(3, D3)];
        let ids = archived(&[2]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::Local));
        assert_eq!(summary(&out), vec![(2, Source::Local, true)]);
    }

    #[test]
    fn test_all_mode_hides_cached_only() {
        let server = vec![header(1, D1)];
        let local = vec![header(5, D3)];
        let ids = archived(&[]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::All));
        assert_eq!(summary(&out), vec![(1, Source::Server, false)]);
    }

    #[test]
    fn test_empty_server_never_local_only() {
        let local = vec![header(1, D1), header(2, D2), header(3, D3)];
        let ids = archived(&[1, 3]);
        for mode in [ViewMode::Local, ViewMode::All] {
            let out = compute(&snapshot(&[], &local, &ids, mode));
            assert_eq!(
                summary(&out),
                vec![(3, Source::Local, true), (1, Source::Local, true)],
                "mode {}",
                mode
            );
        }
    }

    #[test]
    fn test_server_mode_bijection() {
        let server = vec![header(1, D1), header(2, D3), header(3, D2)];
        let local = vec![header(2, D3), header(99, D1)];
        let ids = archived(&[2, 99]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::Server));

        assert_eq!(out.len(), server.len());
        assert!(out.iter().all(|r| r.source == Source::Server));
        let mut seen: Vec<Uid> = out.iter().map(|r| r.header.uid).collect();
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(
            summary(&out),
            vec![
                (2, Source::Server, true),
                (3, Source::Server, false),
                (1, Source::Server, false)
            ]
        );
    }

    #[test]
    fn test_search_override_is_verbatim() {
        let hit = DisplayRecord {
            header: header(42, D1),
            // Contradicts every other input on purpose
            source: Source::LocalOnly,
            is_archived: false,
        };
        let older = DisplayRecord::server(&header(7, "2000-01-01T00:00:00Z"), true);
        let results = vec![older.clone(), hit.clone()];

        let server = vec![header(1, D3)];
        let local = vec![header(1, D3)];
        let ids = archived(&[1]);
        for mode in [ViewMode::Server, ViewMode::Local, ViewMode::All] {
            let snap = Snapshot {
                search: Some(results.as_slice()),
                ..snapshot(&server, &local, &ids, mode)
            };
            assert_eq!(compute(&snap), results);
        }
    }

    #[test]
    fn test_active_empty_search_returns_nothing() {
        let server = vec![header(1, D1)];
        let ids = archived(&[]);
        let snap = Snapshot {
            search: Some(&[][..]),
            ..snapshot(&server, &[], &ids, ViewMode::All)
        };
        assert!(compute(&snap).is_empty());
    }

    #[test]
    fn test_all_mode_sorted_descending() {
        let server = vec![header(1, D1), header(2, D3)];
        let local = vec![header(3, D2), header(4, "2023-06-01T00:00:00Z")];
        let ids = archived(&[3, 4]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::All));

        let stamps: Vec<i64> = out.iter().map(|r| sort::sort_key(&r.header)).collect();
        assert!(stamps.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(
            summary(&out),
            vec![
                (2, Source::Server, false),
                (3, Source::LocalOnly, true),
                (1, Source::Server, false),
                (4, Source::LocalOnly, true)
            ]
        );
    }

    #[test]
    fn test_compute_is_idempotent_and_pure() {
        let server = vec![header(1, D1), header(2, D2)];
        let local = vec![header(2, D2), header(3, "invalid"), header(4, D3)];
        let ids = archived(&[2, 3]);
        let server_before = server.clone();
        let local_before = local.clone();
        let ids_before = ids.clone();

        for mode in [ViewMode::Server, ViewMode::Local, ViewMode::All] {
            let snap = snapshot(&server, &local, &ids, mode);
            assert_eq!(compute(&snap), compute(&snap));
        }

        assert_eq!(server, server_before);
        assert_eq!(local, local_before);
        assert_eq!(ids, ids_before);
    }

    #[test]
    fn test_duplicate_uids_collapse_to_last_seen() {
        let server = vec![
            Header::new(1, "stale").with_date(D1),
            Header::new(1, "fresh").with_date(D2),
        ];
        let local = vec![
            Header::new(8, "old copy").with_date(D1),
            Header::new(8, "new copy").with_date(D1),
        ];
        let ids = archived(&[8]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::All));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].header.subject, "fresh");
        assert_eq!(out[1].header.subject, "new copy");
        assert_eq!(out[1].source, Source::LocalOnly);
    }

    #[test]
    fn test_archived_id_without_local_header_is_ignored() {
        let server = vec![header(1, D1)];
        let ids = archived(&[1, 77]);
        let out = compute(&snapshot(&server, &[], &ids, ViewMode::All));
        assert_eq!(summary(&out), vec![(1, Source::Server, true)]);

        let out = compute(&snapshot(&server, &[], &ids, ViewMode::Local));
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_dates_sort_last_in_all_mode() {
        let server = vec![Header::new(5, "undated"), header(6, D1)];
        let local = vec![header(7, "not a date")];
        let ids = archived(&[7]);
        let out = compute(&snapshot(&server, &local, &ids, ViewMode::All));
        let order: Vec<Uid> = out.iter().map(|r| r.header.uid).collect();
        assert_eq!(order, vec![6, 5, 7]);
    }

    #[test]
    fn test_view_mode_parse_and_display() {
        assert_eq!("server".parse::<ViewMode>(), Ok(ViewMode::Server));
        assert_eq!(" Local ".parse::<ViewMode>(), Ok(ViewMode::Local));
        assert_eq!("ALL".parse::<ViewMode>(), Ok(ViewMode::All));
        assert!("starred".parse::<ViewMode>().is_err());
        assert_eq!(ViewMode::default(), ViewMode::All);
        assert_eq!(Source::LocalOnly.to_string(), "local-only");
        // Column layouts rely on width and alignment being honoured
        assert_eq!(format!("[{:<10}]", Source::Local), "[local     ]");
        assert_eq!(format!("[{:>6}]", ViewMode::All), "[   all]");
    }
}
