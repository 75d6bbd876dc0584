//! Errors raised by the collaborators around the reconciliation engine.
//!
//! The engine itself is total and never fails; these cover the remote
//! mailbox, the local archive store and search providers.

use crate::mail::types::Uid;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Message {0} not found")]
    NotFound(Uid),
}

impl MailError {
    /// Transient transport failures are worth another attempt; everything
    /// else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, MailError>;
