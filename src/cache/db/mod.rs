//! SQLite store for archived and cached headers.
//!
//! This module is split into:
//! - `mod.rs` - ArchiveStore struct, connection pool, delegating operations
//! - `schema.rs` - Database schema initialization
//! - `header.rs` - Header rows and the archived index
//! - `listing.rs` - Last known server listing per folder

mod header;
mod listing;
mod schema;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DB_BUSY_TIMEOUT_SECS, SQLITE_POOL_SIZE};
use crate::error::Result;
use crate::mail::types::{Header, Uid};

/// Durable local store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct ArchiveStore {
    pool: SqlitePool,
}

impl ArchiveStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(DB_BUSY_TIMEOUT_SECS))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(SQLITE_POOL_SIZE)
            .connect_with(options)
            .await?;

        schema::init_schema(&pool).await?;
        tracing::debug!("Opened archive store at {}", path.display());

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single connection, otherwise every connection gets its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    //
    // Header Operations (delegated to header module)
    //

    /// Every stored header of the folder, archived or merely cached.
    pub async fn get_all(&self, account_id: &str, folder: &str) -> Result<Vec<Header>> {
        header::get_all(&self.pool, account_id, folder).await
    }

    pub async fn get(&self, account_id: &str, folder: &str, uid: Uid) -> Result<Option<Header>> {
        header::get_header(&self.pool, account_id, folder, uid).await
    }

    pub async fn archived_ids(&self, account_id: &str, folder: &str) -> Result<HashSet<Uid>> {
        header::archived_ids(&self.pool, account_id, folder).await
    }

    /// Opportunistic cache write. Never changes archived state.
    pub async fn put_cached(&self, account_id: &str, folder: &str, headers: &[Header]) -> Result<()> {
        header::upsert_cached(&self.pool, account_id, folder, headers).await
    }

    pub async fn archive(&self, account_id: &str, folder: &str, header: &Header) -> Result<()> {
        header::archive_header(&self.pool, account_id, folder, header).await
    }

    pub async fn unarchive(&self, account_id: &str, folder: &str, uid: Uid) -> Result<bool> {
        header::unarchive(&self.pool, account_id, folder, uid).await
    }

    pub async fn remove_cached_only(&self, account_id: &str, folder: &str, uid: Uid) -> Result<bool> {
        header::remove_cached_only(&self.pool, account_id, folder, uid).await
    }

    pub async fn delete(&self, account_id: &str, folder: &str, uid: Uid) -> Result<()> {
        header::delete_header(&self.pool, account_id, folder, uid).await
    }

    /// Persist the flags and keywords of an already stored header.
    pub async fn update_flags(&self, account_id: &str, folder: &str, header: &Header) -> Result<()> {
        header::update_flags(&self.pool, account_id, folder, header).await
    }

    //
    // Listing Operations (delegated to listing module)
    //

    pub async fn save_listing(&self, account_id: &str, folder: &str, headers: &[Header]) -> Result<()> {
        listing::save_listing(&self.pool, account_id, folder, headers).await
    }

    pub async fn load_listing(&self, account_id: &str, folder: &str) -> Result<Option<Vec<Header>>> {
        listing::load_listing(&self.pool, account_id, folder).await
    }

    pub async fn clear_listing(&self, account_id: &str, folder: Option<&str>) -> Result<()> {
        listing::clear_listing(&self.pool, account_id, folder).await
    }

    //
    // Clear Operations
    //

    /// Remove everything stored for an account, archived copies included.
    pub async fn clear_account(&self, account_id: &str) -> Result<()> {
        header::clear_account(&self.pool, account_id).await?;
        listing::clear_listing(&self.pool, account_id, None).await?;
        tracing::info!("Cleared local store for {}", account_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::types::{EmailAddress, EmailFlags, Flag};

    const ACCOUNT: &str = "test@example.com";
    const INBOX: &str = "INBOX";

    fn header(uid: Uid, subject: &str) -> Header {
        Header {
            uid,
            message_id: Some(format!("<{}@example.com>", uid)),
            subject: subject.to_string(),
            from: EmailAddress {
                name: Some("Sender".to_string()),
                address: "sender@example.com".to_string(),
            },
            date: Some("Mon, 1 Jan 2024 10:00:00 +0000".to_string()),
            flags: EmailFlags::SEEN,
            keywords: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_cached_headers_are_not_archived() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        store
            .put_cached(ACCOUNT, INBOX, &[header(1, "One"), header(2, "Two")])
            .await
            .unwrap();

        let all = store.get_all(ACCOUNT, INBOX).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], header(1, "One"));
        assert!(store.archived_ids(ACCOUNT, INBOX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_survives_cache_refresh() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        store.archive(ACCOUNT, INBOX, &header(1, "Keep me")).await.unwrap();
        // A later opportunistic write must not clear the archived bit
        store
            .put_cached(ACCOUNT, INBOX, &[header(1, "Keep me (updated)")])
            .await
            .unwrap();

        let ids = store.archived_ids(ACCOUNT, INBOX).await.unwrap();
        assert!(ids.contains(&1));
        let stored = store.get(ACCOUNT, INBOX, 1).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Keep me (updated)");
    }

    #[tokio::test]
    async fn test_unarchive_keeps_cached_copy() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        store.archive(ACCOUNT, INBOX, &header(3, "Three")).await.unwrap();
        assert!(store.unarchive(ACCOUNT, INBOX, 3).await.unwrap());
        assert!(!store.unarchive(ACCOUNT, INBOX, 99).await.unwrap());

        assert!(store.archived_ids(ACCOUNT, INBOX).await.unwrap().is_empty());
        assert!(store.get(ACCOUNT, INBOX, 3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_cached_only_spares_archived() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        store.put_cached(ACCOUNT, INBOX, &[header(1, "Cached")]).await.unwrap();
        store.archive(ACCOUNT, INBOX, &header(2, "Archived")).await.unwrap();

        assert!(store.remove_cached_only(ACCOUNT, INBOX, 1).await.unwrap());
        assert!(!store.remove_cached_only(ACCOUNT, INBOX, 2).await.unwrap());

        let all = store.get_all(ACCOUNT, INBOX).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].uid, 2);

        store.delete(ACCOUNT, INBOX, 2).await.unwrap();
        assert!(store.get_all(ACCOUNT, INBOX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flags_update() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        store.archive(ACCOUNT, INBOX, &header(5, "Flags")).await.unwrap();
        let mut changed = header(5, "Flags");
        changed.flags = EmailFlags::FLAGGED;
        changed.set_flag(&Flag::Keyword("$Important".into()), true);
        store.update_flags(ACCOUNT, INBOX, &changed).await.unwrap();

        let stored = store.get(ACCOUNT, INBOX, 5).await.unwrap().unwrap();
        assert_eq!(stored.flags, EmailFlags::FLAGGED);
        assert!(stored.keywords.contains("$Important"));
    }

    #[tokio::test]
    async fn test_custom_keywords_round_trip() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        let tagged = header(7, "Tagged").with_imap_flags(["\\Seen", "$Junk", "archived"]);
        store.archive(ACCOUNT, INBOX, &tagged).await.unwrap();
        store.put_cached(ACCOUNT, INBOX, &[header(8, "Plain")]).await.unwrap();
        store.save_listing(ACCOUNT, INBOX, &[tagged.clone()]).await.unwrap();

        assert_eq!(store.get(ACCOUNT, INBOX, 7).await.unwrap(), Some(tagged.clone()));
        let plain = store.get(ACCOUNT, INBOX, 8).await.unwrap().unwrap();
        assert!(plain.keywords.is_empty());
        assert_eq!(
            store.load_listing(ACCOUNT, INBOX).await.unwrap(),
            Some(vec![tagged])
        );
    }

    #[tokio::test]
    async fn test_folder_and_account_isolation() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        store.archive(ACCOUNT, INBOX, &header(1, "Inbox")).await.unwrap();
        store.archive(ACCOUNT, "Sent", &header(1, "Sent")).await.unwrap();
        store
            .archive("other@example.com", INBOX, &header(1, "Other"))
            .await
            .unwrap();

        let inbox = store.get_all(ACCOUNT, INBOX).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].subject, "Inbox");

        store.clear_account(ACCOUNT).await.unwrap();
        assert!(store.get_all(ACCOUNT, INBOX).await.unwrap().is_empty());
        assert!(store.get_all(ACCOUNT, "Sent").await.unwrap().is_empty());
        assert_eq!(
            store.get_all("other@example.com", INBOX).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_listing_distinguishes_never_saved_from_empty() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        assert!(store.load_listing(ACCOUNT, INBOX).await.unwrap().is_none());

        store.save_listing(ACCOUNT, INBOX, &[]).await.unwrap();
        assert_eq!(store.load_listing(ACCOUNT, INBOX).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_listing_preserves_server_order() {
        let store = ArchiveStore::open_in_memory().await.unwrap();

        let listing = vec![header(9, "Nine"), header(2, "Two"), header(5, "Five")];
        store.save_listing(ACCOUNT, INBOX, &listing).await.unwrap();
        assert_eq!(
            store.load_listing(ACCOUNT, INBOX).await.unwrap(),
            Some(listing)
        );

        // Saving again replaces rather than appends
        store
            .save_listing(ACCOUNT, INBOX, &[header(2, "Two")])
            .await
            .unwrap();
        let reloaded = store.load_listing(ACCOUNT, INBOX).await.unwrap().unwrap();
        assert_eq!(reloaded.len(), 1);

        store.clear_listing(ACCOUNT, Some(INBOX)).await.unwrap();
        assert!(store.load_listing(ACCOUNT, INBOX).await.unwrap().is_none());
    }
}
