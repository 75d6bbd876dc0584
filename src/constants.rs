//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Folder opened when none is given on the command line or in config.
pub const DEFAULT_FOLDER: &str = "INBOX";

/// Sort key for headers whose date is missing or unparsable.
/// Such headers always sort as the oldest entries of a list.
pub const MISSING_DATE_SENTINEL: i64 = i64::MIN;

/// Connection pool size for the archive database.
/// Reads for display and writes from archive actions may overlap.
pub const SQLITE_POOL_SIZE: u32 = 4;

/// Seconds SQLite waits on a locked database before giving up.
pub const DB_BUSY_TIMEOUT_SECS: u64 = 5;

/// Retries after the first failed mailbox listing.
pub const DEFAULT_FETCH_RETRIES: u32 = 3;

/// Initial backoff before the first listing retry in milliseconds.
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Upper bound for the listing retry backoff in milliseconds.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Messages a bulk archive run writes to the store at once.
pub const ARCHIVE_CONCURRENCY: usize = 3;
