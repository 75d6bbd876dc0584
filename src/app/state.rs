//! Single owner of every input the reconciliation engine reads.
//!
//! All mutations are synchronous: whatever a method changes is visible to
//! the very next [`MailboxState::display`] call.

use std::collections::HashSet;

use crate::mail::types::{EmailFlags, Flag, Header, Uid};
use crate::reconcile::{self, DisplayRecord, Snapshot, Source, ViewMode};

/// Handle for an in-flight server listing. Only the most recent ticket of
/// the current mailbox may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

#[derive(Debug, Default)]
pub struct MailboxState {
    account: String,
    folder: String,
    server: Vec<Header>,
    local: Vec<Header>,
    archived: HashSet<Uid>,
    /// Active search results, if any
    search: Option<Vec<DisplayRecord>>,
    mode: ViewMode,
    generation: u64,
    server_loaded: bool,
}

/// Replace the header with the same uid, or append it.
fn upsert(headers: &mut Vec<Header>, header: Header) {
    match headers.iter_mut().find(|h| h.uid == header.uid) {
        Some(slot) => *slot = header,
        None => headers.push(header),
    }
}

impl MailboxState {
    pub fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn server(&self) -> &[Header] {
        &self.server
    }

    pub fn local(&self) -> &[Header] {
        &self.local
    }

    pub fn archived(&self) -> &HashSet<Uid> {
        &self.archived
    }

    pub fn is_archived(&self, uid: Uid) -> bool {
        self.archived.contains(&uid)
    }

    /// Whether a listing has been applied since the mailbox was opened.
    /// Informational only: the engine still reads an empty listing as
    /// "not loaded".
    pub fn is_server_loaded(&self) -> bool {
        self.server_loaded
    }

    /// Look a header up by uid, preferring the server copy.
    pub fn find(&self, uid: Uid) -> Option<&Header> {
        self.server
            .iter()
            .rev()
            .find(|h| h.uid == uid)
            .or_else(|| self.local.iter().rev().find(|h| h.uid == uid))
    }

    //
    // Mailbox lifecycle
    //

    /// Point the state at another mailbox. Drops every input and invalidates
    /// outstanding fetch tickets.
    pub fn switch_mailbox(&mut self, account: &str, folder: &str) {
        self.account = account.to_string();
        self.folder = folder.to_string();
        self.clear_inputs();
    }

    /// Drop every input but stay on the current mailbox.
    pub fn reset(&mut self) {
        self.clear_inputs();
    }

    fn clear_inputs(&mut self) {
        self.server.clear();
        self.local.clear();
        self.archived.clear();
        self.search = None;
        self.server_loaded = false;
        self.generation += 1;
    }

    /// Install the archive snapshot read from the store.
    pub fn load_local(&mut self, headers: Vec<Header>, archived: HashSet<Uid>) {
        self.local = headers;
        self.archived = archived;
    }

    /// Show a previously saved listing until the first fetch lands.
    /// Ignored once a fetch has been applied.
    pub fn seed_server(&mut self, headers: Vec<Header>) {
        if !self.server_loaded {
            self.server = headers;
        }
    }

    //
    // Fetches
    //

    /// Start a server listing. Any earlier ticket becomes stale.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Apply a completed listing. Returns `false` and leaves the state alone
    /// when the ticket has been superseded.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, headers: Vec<Header>) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                "Discarding stale listing for {}/{} ({} headers)",
                self.account,
                self.folder,
                headers.len()
            );
            return false;
        }
        self.server = headers;
        self.server_loaded = true;
        true
    }

    //
    // Local store mirror
    //

    pub fn archive(&mut self, header: Header) {
        self.archived.insert(header.uid);
        if let Some(results) = &mut self.search {
            for record in results.iter_mut().filter(|r| r.header.uid == header.uid) {
                record.is_archived = true;
            }
        }
        upsert(&mut self.local, header);
    }

    /// Clear the archived mark. The cached copy stays.
    pub fn unarchive(&mut self, uid: Uid) -> bool {
        let removed = self.archived.remove(&uid);
        if let Some(results) = &mut self.search {
            // A local-only hit has nothing left to show once unarchived
            results.retain(|r| r.header.uid != uid || r.source != Source::LocalOnly);
            for record in results.iter_mut().filter(|r| r.header.uid == uid) {
                record.is_archived = false;
            }
        }
        removed
    }

    /// Drop a cached copy unless it is archived.
    pub fn remove_cached_only(&mut self, uid: Uid) -> bool {
        if self.archived.contains(&uid) {
            return false;
        }
        let before = self.local.len();
        self.local.retain(|h| h.uid != uid);
        self.local.len() != before
    }

    /// Opportunistic cache insert. Never archives.
    pub fn cache_header(&mut self, header: Header) {
        upsert(&mut self.local, header);
    }

    //
    // Server-side mutations
    //

    /// Reflect a server delete. The uid leaves the server listing at once and
    /// any in-flight fetch, which may still carry it, is invalidated. An
    /// archived copy stays behind. It shows up as local-only while other
    /// server messages remain; once the listing is empty it is tagged local
    /// like every other stored header.
    pub fn delete_from_server(&mut self, uid: Uid) {
        self.server.retain(|h| h.uid != uid);
        self.generation += 1;

        let archived = self.archived.contains(&uid);
        if !archived {
            self.local.retain(|h| h.uid != uid);
        }

        if let Some(results) = &mut self.search {
            if archived {
                for record in results.iter_mut().filter(|r| r.header.uid == uid) {
                    record.source = Source::LocalOnly;
                    record.is_archived = true;
                }
            } else {
                results.retain(|r| r.header.uid != uid);
            }
        }
    }

    pub fn set_flag(&mut self, uid: Uid, flag: &Flag, on: bool) {
        let headers = self
            .server
            .iter_mut()
            .chain(self.local.iter_mut())
            .chain(self.search.iter_mut().flatten().map(|r| &mut r.header));

        for header in headers.filter(|h| h.uid == uid) {
            header.set_flag(flag, on);
        }
    }

    pub fn set_seen(&mut self, uid: Uid, seen: bool) {
        self.set_flag(uid, &Flag::System(EmailFlags::SEEN), seen);
    }

    //
    // View
    //

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn start_search(&mut self, results: Vec<DisplayRecord>) {
        self.search = Some(results);
    }

    pub fn end_search(&mut self) {
        self.search = None;
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            search: self.search.as_deref(),
            server: &self.server,
            local: &self.local,
            archived: &self.archived,
            mode: self.mode,
        }
    }

    pub fn display(&self) -> Vec<DisplayRecord> {
        reconcile::compute(&self.snapshot())
    }
}
