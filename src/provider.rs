//! Boundaries to the collaborators that feed the reconciliation engine.
//!
//! The engine only ever sees the materialized output of these calls; the
//! controller owns the calls themselves.

use std::future::Future;

use crate::error::{MailError, Result};
use crate::mail::types::{Flag, Header, Uid};
use crate::reconcile::DisplayRecord;
use crate::search::SearchFilters;

/// Remote mailbox access (IMAP or similar).
pub trait MailboxProvider {
    /// Headers the server currently reports for a folder.
    fn list_current(&self, account: &str, folder: &str)
    -> impl Future<Output = Result<Vec<Header>>>;

    fn delete(&self, account: &str, folder: &str, uid: Uid) -> impl Future<Output = Result<()>>;

    fn set_flag(
        &self,
        account: &str,
        folder: &str,
        uid: Uid,
        flag: &Flag,
        on: bool,
    ) -> impl Future<Output = Result<()>>;
}

/// Executes a query and returns final, already ordered display records.
pub trait SearchProvider {
    fn search(
        &self,
        account: &str,
        folder: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> impl Future<Output = Result<Vec<DisplayRecord>>>;
}

/// Mailbox provider for running without a network connection.
/// Every call fails with a connection error, so callers fall back to
/// whatever the local store holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl MailboxProvider for Offline {
    async fn list_current(&self, account: &str, folder: &str) -> Result<Vec<Header>> {
        Err(MailError::Connection(format!(
            "offline: cannot list {} for {}",
            folder, account
        )))
    }

    async fn delete(&self, account: &str, _folder: &str, uid: Uid) -> Result<()> {
        Err(MailError::Connection(format!(
            "offline: cannot delete {} for {}",
            uid, account
        )))
    }

    async fn set_flag(
        &self,
        account: &str,
        _folder: &str,
        uid: Uid,
        flag: &Flag,
        _on: bool,
    ) -> Result<()> {
        Err(MailError::Connection(format!(
            "offline: cannot set {} on {} for {}",
            flag, uid, account
        )))
    }
}
