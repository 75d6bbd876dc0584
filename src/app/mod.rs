//! Application core - drives the collaborators and keeps the mailbox state in step

mod archive;
pub mod state;

use std::collections::HashMap;

use crate::actor::retry::{RetryConfig, with_retry};
use crate::cache::ArchiveStore;
use crate::config::CacheConfig;
use crate::error::{MailError, Result};
use crate::mail::types::{EmailFlags, Flag, Header, Uid};
use crate::provider::{MailboxProvider, SearchProvider};
use crate::reconcile::{DisplayRecord, ViewMode};
use crate::search::SearchFilters;
use state::MailboxState;

pub use archive::ArchiveProgress;

/// Owns the mailbox state and the collaborators that feed it.
///
/// Every mutating call updates [`MailboxState`] before it returns, so the
/// next [`Controller::display`] already reflects it.
pub struct Controller<M, S> {
    mailbox: M,
    search: S,
    store: ArchiveStore,
    state: MailboxState,
    retry: RetryConfig,
    listing_cache: bool,
}

impl<M: MailboxProvider, S: SearchProvider> Controller<M, S> {
    pub fn new(
        mailbox: M,
        search: S,
        store: ArchiveStore,
        cache: &CacheConfig,
        mode: ViewMode,
    ) -> Self {
        Self {
            mailbox,
            search,
            store,
            state: MailboxState::new(mode),
            retry: RetryConfig::from(cache),
            listing_cache: cache.listing_cache,
        }
    }

    pub fn state(&self) -> &MailboxState {
        &self.state
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    /// Switch to a mailbox and load what the store knows about it.
    pub async fn open_mailbox(&mut self, account: &str, folder: &str) -> Result<()> {
        self.state.switch_mailbox(account, folder);

        let headers = self.store.get_all(account, folder).await?;
        let archived = self.store.archived_ids(account, folder).await?;
        tracing::debug!(
            "Opened {}/{}: {} stored, {} archived",
            account,
            folder,
            headers.len(),
            archived.len()
        );
        self.state.load_local(headers, archived);

        if self.listing_cache
            && let Some(listing) = self.store.load_listing(account, folder).await?
        {
            tracing::debug!("Seeding {} headers from saved listing", listing.len());
            self.state.seed_server(listing);
        }

        Ok(())
    }

    /// Fetch the server listing for the open mailbox.
    ///
    /// Returns `Ok(false)` when the result arrived for a superseded fetch.
    /// On failure the current inputs are kept, so the display falls back to
    /// whatever was already known.
    pub async fn refresh(&mut self) -> Result<bool> {
        let ticket = self.state.begin_fetch();
        let account = self.state.account().to_string();
        let folder = self.state.folder().to_string();

        let mailbox = &self.mailbox;
        let listing = with_retry(&self.retry, || mailbox.list_current(&account, &folder)).await;
        let headers = match listing {
            Ok(headers) => headers,
            Err(e) => {
                tracing::warn!("Listing {}/{} failed, keeping local view: {}", account, folder, e);
                return Err(e);
            }
        };

        if !self.state.apply_fetch(ticket, headers.clone()) {
            return Ok(false);
        }
        tracing::info!("Fetched {} headers for {}/{}", headers.len(), account, folder);

        // Both writes are opportunistic; the state is already up to date.
        if self.listing_cache
            && let Err(e) = self.store.save_listing(&account, &folder, &headers).await
        {
            tracing::warn!("Failed to save listing for {}/{}: {}", account, folder, e);
        }
        if let Err(e) = self.store.put_cached(&account, &folder, &headers).await {
            tracing::warn!("Failed to cache headers for {}/{}: {}", account, folder, e);
        }
        self.cache_in_state(headers);

        Ok(true)
    }

    fn cache_in_state(&mut self, headers: Vec<Header>) {
        let known: HashMap<Uid, &Header> = self.state.local().iter().map(|h| (h.uid, h)).collect();
        let changed: Vec<Header> = headers
            .into_iter()
            .filter(|h| known.get(&h.uid).is_none_or(|old| *old != h))
            .collect();
        for header in changed {
            self.state.cache_header(header);
        }
    }

    /// Keep a durable copy of a message.
    pub async fn archive(&mut self, uid: Uid) -> Result<()> {
        let header = self.state.find(uid).cloned().ok_or(MailError::NotFound(uid))?;

        self.store
            .archive(self.state.account(), self.state.folder(), &header)
            .await?;
        self.state.archive(header);
        tracing::info!("Archived {} in {}/{}", uid, self.state.account(), self.state.folder());
        Ok(())
    }

    /// Drop the archived mark; the cached copy stays.
    pub async fn unarchive(&mut self, uid: Uid) -> Result<bool> {
        let removed = self
            .store
            .unarchive(self.state.account(), self.state.folder(), uid)
            .await?;
        self.state.unarchive(uid);
        if removed {
            tracing::info!("Unarchived {}", uid);
        }
        Ok(removed)
    }

    /// Remove a cached copy that was never archived.
    pub async fn forget(&mut self, uid: Uid) -> Result<bool> {
        let removed = self
            .store
            .remove_cached_only(self.state.account(), self.state.folder(), uid)
            .await?;
        self.state.remove_cached_only(uid);
        Ok(removed)
    }

    /// Delete on the server, then drop the message from the view at once.
    /// An archived copy survives. It reads as local-only while the listing
    /// still holds other messages, and as local once the listing is empty.
    pub async fn delete(&mut self, uid: Uid) -> Result<()> {
        let account = self.state.account().to_string();
        let folder = self.state.folder().to_string();

        self.mailbox.delete(&account, &folder, uid).await?;
        self.state.delete_from_server(uid);

        self.store.remove_cached_only(&account, &folder, uid).await?;
        if self.listing_cache {
            // Otherwise the next open would seed the deleted message back in
            self.store
                .save_listing(&account, &folder, self.state.server())
                .await?;
        }
        tracing::info!("Deleted {} from {}/{}", uid, account, folder);
        Ok(())
    }

    pub async fn mark_seen(&mut self, uid: Uid, seen: bool) -> Result<()> {
        self.set_flag(uid, &Flag::System(EmailFlags::SEEN), seen).await
    }

    /// Set or clear a system flag or keyword on the server and every local copy.
    pub async fn set_flag(&mut self, uid: Uid, flag: &Flag, on: bool) -> Result<()> {
        let account = self.state.account().to_string();
        let folder = self.state.folder().to_string();

        self.mailbox.set_flag(&account, &folder, uid, flag, on).await?;
        self.state.set_flag(uid, flag, on);

        if let Some(header) = self.state.find(uid) {
            self.store.update_flags(&account, &folder, header).await?;
        }
        tracing::debug!("Set {}={} on {} in {}/{}", flag, on, uid, account, folder);
        Ok(())
    }

    /// Run a query. Its results replace the reconciled view until
    /// [`Controller::clear_search`].
    pub async fn search(&mut self, query: &str, filters: &SearchFilters) -> Result<usize> {
        let results = self
            .search
            .search(self.state.account(), self.state.folder(), query, filters)
            .await?;
        let count = results.len();
        self.state.start_search(results);
        tracing::debug!("Search '{}' returned {} results", query, count);
        Ok(count)
    }

    pub fn clear_search(&mut self) {
        self.state.end_search();
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.state.set_mode(mode);
    }

    pub fn display(&self) -> Vec<DisplayRecord> {
        self.state.display()
    }
}
