//! Bulk archiving with bounded concurrency.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::Controller;
use super::state::MailboxState;
use crate::constants::ARCHIVE_CONCURRENCY;
use crate::error::{MailError, Result};
use crate::mail::types::{Header, Uid};
use crate::provider::{MailboxProvider, SearchProvider};

/// Summary of a bulk archive run, reported after every finished message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveProgress {
    pub total: usize,
    pub completed: usize,
    pub errors: usize,
    /// Set when the run stopped before every uid was attempted
    pub cancelled: bool,
    pub last_error: Option<String>,
}

impl ArchiveProgress {
    /// Messages not yet accounted for as archived or failed.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed + self.errors)
    }
}

type ArchiveOutcome = std::result::Result<(Header, Result<()>), JoinError>;

impl<M: MailboxProvider, S: SearchProvider> Controller<M, S> {
    /// Archive several messages of the open mailbox, at most
    /// [`ARCHIVE_CONCURRENCY`] at a time.
    ///
    /// A failing uid is counted and the run goes on. Every success reaches
    /// the mailbox state before `on_progress` sees it. Cancelling stops new
    /// work; archives already under way still finish and are applied.
    pub async fn archive_many(
        &mut self,
        uids: &[Uid],
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(&ArchiveProgress),
    ) -> ArchiveProgress {
        let account = self.state.account().to_string();
        let folder = self.state.folder().to_string();
        let mut progress = ArchiveProgress {
            total: uids.len(),
            ..Default::default()
        };

        let semaphore = Arc::new(Semaphore::new(ARCHIVE_CONCURRENCY));
        let mut tasks = JoinSet::new();

        for &uid in uids {
            if cancel.is_cancelled() {
                progress.cancelled = true;
                break;
            }

            let Some(header) = self.state.find(uid).cloned() else {
                progress.errors += 1;
                progress.last_error = Some(MailError::NotFound(uid).to_string());
                tracing::warn!("Bulk archive: {} not in {}/{}", uid, account, folder);
                on_progress(&progress);
                continue;
            };

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit,
                _ = cancel.cancelled() => {
                    progress.cancelled = true;
                    break;
                }
            };
            let Ok(permit) = permit else {
                break;
            };

            while let Some(outcome) = tasks.try_join_next() {
                finish(&mut self.state, &mut progress, outcome, &mut on_progress);
            }
            if cancel.is_cancelled() {
                progress.cancelled = true;
                break;
            }

            let store = self.store.clone();
            let account = account.clone();
            let folder = folder.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = store.archive(&account, &folder, &header).await;
                (header, result)
            });
        }

        while let Some(outcome) = tasks.join_next().await {
            finish(&mut self.state, &mut progress, outcome, &mut on_progress);
        }

        tracing::info!(
            "Bulk archive in {}/{}: {}/{} archived, {} failed{}",
            account,
            folder,
            progress.completed,
            progress.total,
            progress.errors,
            if progress.cancelled { " (cancelled)" } else { "" }
        );
        progress
    }
}

fn finish(
    state: &mut MailboxState,
    progress: &mut ArchiveProgress,
    outcome: ArchiveOutcome,
    on_progress: &mut impl FnMut(&ArchiveProgress),
) {
    match outcome {
        Ok((header, Ok(()))) => {
            state.archive(header);
            progress.completed += 1;
        }
        Ok((header, Err(e))) => {
            tracing::warn!("Failed to archive {}: {}", header.uid, e);
            progress.errors += 1;
            progress.last_error = Some(e.to_string());
        }
        Err(e) => {
            tracing::error!("Archive task panicked: {}", e);
            progress.errors += 1;
            progress.last_error = Some(e.to_string());
        }
    }
    on_progress(progress);
}
