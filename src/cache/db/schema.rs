//! Database schema initialization and migrations.

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize database schema with all tables and indexes.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Locally stored headers. archived = 1 marks a copy the user chose to
        -- keep; archived = 0 rows are opportunistic cache entries.
        CREATE TABLE IF NOT EXISTS headers (
            account_id TEXT NOT NULL,
            folder TEXT NOT NULL,
            uid INTEGER NOT NULL,
            message_id TEXT,
            subject TEXT NOT NULL DEFAULT '',
            from_name TEXT,
            from_addr TEXT NOT NULL DEFAULT '',
            date TEXT,
            flags INTEGER NOT NULL DEFAULT 0,
            keywords TEXT NOT NULL DEFAULT '',
            archived INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (account_id, folder, uid)
        );

        CREATE INDEX IF NOT EXISTS idx_headers_archived ON headers(account_id, folder, archived);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        -- Last listing the server reported for a folder, in server order
        CREATE TABLE IF NOT EXISTS server_listing (
            account_id TEXT NOT NULL,
            folder TEXT NOT NULL,
            position INTEGER NOT NULL,
            uid INTEGER NOT NULL,
            message_id TEXT,
            subject TEXT NOT NULL DEFAULT '',
            from_name TEXT,
            from_addr TEXT NOT NULL DEFAULT '',
            date TEXT,
            flags INTEGER NOT NULL DEFAULT 0,
            keywords TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (account_id, folder, position)
        );

        -- Presence of a row distinguishes "saved an empty listing" from "never saved"
        CREATE TABLE IF NOT EXISTS listing_meta (
            account_id TEXT NOT NULL,
            folder TEXT NOT NULL,
            saved_at INTEGER NOT NULL,
            PRIMARY KEY (account_id, folder)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Migration: keyword columns for databases created before version 2
    for table in ["headers", "server_listing"] {
        sqlx::query(&format!(
            "ALTER TABLE {} ADD COLUMN keywords TEXT NOT NULL DEFAULT ''",
            table
        ))
        .execute(pool)
        .await
        .ok(); // Ignore error if column already exists
    }

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (2)")
        .execute(pool)
        .await?;

    Ok(())
}
