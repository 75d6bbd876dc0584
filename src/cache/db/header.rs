//! Header rows of the local archive: cached copies and the archived index.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeSet, HashSet};

use crate::error::Result;
use crate::mail::types::{EmailAddress, EmailFlags, Header, Uid};

/// Keywords are IMAP atoms and never contain spaces.
pub(super) fn encode_keywords(keywords: &BTreeSet<String>) -> String {
    keywords.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn decode_keywords(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Convert a SQLite row to a Header. Shared with the listing table,
/// which uses the same column names.
pub(super) fn row_to_header(row: SqliteRow) -> Header {
    Header {
        uid: row.get::<i64, _>("uid") as Uid,
        message_id: row.get("message_id"),
        subject: row.get("subject"),
        from: EmailAddress {
            name: row.get("from_name"),
            address: row.get("from_addr"),
        },
        date: row.get("date"),
        flags: EmailFlags::from_bits_truncate(row.get::<i64, _>("flags") as u32),
        keywords: decode_keywords(row.get::<&str, _>("keywords")),
    }
}

/// Insert or refresh cached headers. An existing archived bit is left alone.
pub async fn upsert_cached(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
    headers: &[Header],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for header in headers {
        sqlx::query(
            r#"
            INSERT INTO headers
            (account_id, folder, uid, message_id, subject, from_name, from_addr, date, flags, keywords, archived)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(account_id, folder, uid) DO UPDATE SET
                message_id = excluded.message_id,
                subject = excluded.subject,
                from_name = excluded.from_name,
                from_addr = excluded.from_addr,
                date = excluded.date,
                flags = excluded.flags,
                keywords = excluded.keywords
            "#,
        )
        .bind(account_id)
        .bind(folder)
        .bind(header.uid as i64)
        .bind(&header.message_id)
        .bind(&header.subject)
        .bind(&header.from.name)
        .bind(&header.from.address)
        .bind(&header.date)
        .bind(header.flags.bits() as i64)
        .bind(encode_keywords(&header.keywords))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Store a header and mark it archived in one statement.
pub async fn archive_header(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
    header: &Header,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO headers
        (account_id, folder, uid, message_id, subject, from_name, from_addr, date, flags, keywords, archived)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
        ON CONFLICT(account_id, folder, uid) DO UPDATE SET
            message_id = excluded.message_id,
            subject = excluded.subject,
            from_name = excluded.from_name,
            from_addr = excluded.from_addr,
            date = excluded.date,
            flags = excluded.flags,
            keywords = excluded.keywords,
            archived = 1
        "#,
    )
    .bind(account_id)
    .bind(folder)
    .bind(header.uid as i64)
    .bind(&header.message_id)
    .bind(&header.subject)
    .bind(&header.from.name)
    .bind(&header.from.address)
    .bind(&header.date)
    .bind(header.flags.bits() as i64)
    .bind(encode_keywords(&header.keywords))
    .execute(pool)
    .await?;
    Ok(())
}

/// Clear the archived bit, keeping the row as a cached copy.
/// Returns false when no such header is stored.
pub async fn unarchive(pool: &SqlitePool, account_id: &str, folder: &str, uid: Uid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE headers SET archived = 0 WHERE account_id = ? AND folder = ? AND uid = ?",
    )
    .bind(account_id)
    .bind(folder)
    .bind(uid as i64)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// All stored headers of a folder, archived or not, ordered by uid.
pub async fn get_all(pool: &SqlitePool, account_id: &str, folder: &str) -> Result<Vec<Header>> {
    let rows = sqlx::query(
        r#"
        SELECT uid, message_id, subject, from_name, from_addr, date, flags, keywords
        FROM headers
        WHERE account_id = ? AND folder = ?
        ORDER BY uid
        "#,
    )
    .bind(account_id)
    .bind(folder)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_header).collect())
}

pub async fn get_header(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
    uid: Uid,
) -> Result<Option<Header>> {
    let row = sqlx::query(
        r#"
        SELECT uid, message_id, subject, from_name, from_addr, date, flags, keywords
        FROM headers
        WHERE account_id = ? AND folder = ? AND uid = ?
        "#,
    )
    .bind(account_id)
    .bind(folder)
    .bind(uid as i64)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_header))
}

pub async fn archived_ids(pool: &SqlitePool, account_id: &str, folder: &str) -> Result<HashSet<Uid>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT uid FROM headers WHERE account_id = ? AND folder = ? AND archived = 1",
    )
    .bind(account_id)
    .bind(folder)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(uid,)| uid as Uid).collect())
}

/// Delete a header only if it is not archived. Returns whether a row went away.
pub async fn remove_cached_only(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
    uid: Uid,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM headers WHERE account_id = ? AND folder = ? AND uid = ? AND archived = 0",
    )
    .bind(account_id)
    .bind(folder)
    .bind(uid as i64)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a header regardless of its archived state.
pub async fn delete_header(pool: &SqlitePool, account_id: &str, folder: &str, uid: Uid) -> Result<()> {
    sqlx::query("DELETE FROM headers WHERE account_id = ? AND folder = ? AND uid = ?")
        .bind(account_id)
        .bind(folder)
        .bind(uid as i64)
        .execute(pool)
        .await?;
    Ok(())
}

/// Overwrite the stored flags and keywords with those of `header`.
pub async fn update_flags(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
    header: &Header,
) -> Result<()> {
    sqlx::query(
        "UPDATE headers SET flags = ?, keywords = ? WHERE account_id = ? AND folder = ? AND uid = ?",
    )
    .bind(header.flags.bits() as i64)
    .bind(encode_keywords(&header.keywords))
    .bind(account_id)
    .bind(folder)
    .bind(header.uid as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_account(pool: &SqlitePool, account_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM headers WHERE account_id = ?")
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(())
}
