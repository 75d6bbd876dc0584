//! Last known server listing per folder, so a restart can show the
//! previous remote snapshot before the first fetch completes.

use chrono::Utc;
use sqlx::SqlitePool;

use super::header::{encode_keywords, row_to_header};
use crate::error::Result;
use crate::mail::types::Header;

/// Replace the saved listing for a folder, preserving server order.
pub async fn save_listing(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
    headers: &[Header],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM server_listing WHERE account_id = ? AND folder = ?")
        .bind(account_id)
        .bind(folder)
        .execute(&mut *tx)
        .await?;

    for (position, header) in headers.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO server_listing
            (account_id, folder, position, uid, message_id, subject, from_name, from_addr, date, flags, keywords)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(folder)
        .bind(position as i64)
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

    sqlx::query("INSERT OR REPLACE INTO listing_meta (account_id, folder, saved_at) VALUES (?, ?, ?)")
        .bind(account_id)
        .bind(folder)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Load the saved listing. `None` means nothing was ever saved for the folder,
/// which is different from a saved empty listing.
pub async fn load_listing(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
) -> Result<Option<Vec<Header>>> {
    let saved: Option<(i64,)> =
        sqlx::query_as("SELECT saved_at FROM listing_meta WHERE account_id = ? AND folder = ?")
            .bind(account_id)
            .bind(folder)
            .fetch_optional(pool)
            .await?;

    if saved.is_none() {
        return Ok(None);
    }

    let rows = sqlx::query(
        r#"
        SELECT uid, message_id, subject, from_name, from_addr, date, flags, keywords
        FROM server_listing
        WHERE account_id = ? AND folder = ?
        ORDER BY position
        "#,
    )
    .bind(account_id)
    .bind(folder)
    .fetch_all(pool)
    .await?;

    Ok(Some(rows.into_iter().map(row_to_header).collect()))
}

/// Drop saved listings for one folder, or for every folder of the account.
pub async fn clear_listing(pool: &SqlitePool, account_id: &str, folder: Option<&str>) -> Result<()> {
    let mut tx = pool.begin().await?;

    match folder {
        Some(folder) => {
            sqlx::query("DELETE FROM server_listing WHERE account_id = ? AND folder = ?")
                .bind(account_id)
                .bind(folder)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM listing_meta WHERE account_id = ? AND folder = ?")
                .bind(account_id)
                .bind(folder)
                .execute(&mut *tx)
                .await?;
        }
        None => {
            sqlx::query("DELETE FROM server_listing WHERE account_id = ?")
                .bind(account_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM listing_meta WHERE account_id = ?")
                .bind(account_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}
