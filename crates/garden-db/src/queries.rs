use crate::models::{AccountRow, LetterRow, MediaRow};
use crate::{Database, format_timestamp, parse_timestamp};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use garden_types::models::MediaKind;
use rusqlite::{Connection, ErrorCode, Row};

impl Database {
    // -- Account --

    pub fn get_account(&self) -> Result<Option<AccountRow>> {
        self.with_conn(query_account)
    }

    /// Inserts the sole account. Returns `false` when an account already
    /// exists; the schema rejects a second row, so concurrent callers can
    /// never both succeed.
    pub fn create_account(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO account (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, created_at),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn account_count(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM account", [], |r| r.get(0))?))
    }

    // -- Media --

    pub fn list_media(&self, kind: MediaKind) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, name, stored_name, url, category, created_at FROM {}
                 ORDER BY created_at DESC, id",
                kind.plural()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], media_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_media(&self, kind: MediaKind, id: &str) -> Result<Option<MediaRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, name, stored_name, url, category, created_at FROM {} WHERE id = ?1",
                kind.plural()
            );
            conn.query_row(&sql, [id], media_from_row).optional()
        })
    }

    /// Inserts a whole upload batch in one transaction: either every row is
    /// committed or none is.
    pub fn insert_media_batch(&self, kind: MediaKind, rows: &[MediaRow]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let sql = format!(
                    "INSERT INTO {} (id, name, stored_name, url, category, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    kind.plural()
                );
                let mut stmt = tx.prepare(&sql)?;
                for row in rows {
                    stmt.execute((
                        &row.id,
                        &row.name,
                        &row.stored_name,
                        &row.url,
                        &row.category,
                        &row.created_at,
                    ))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Returns `false` if no row had that id.
    pub fn delete_media(&self, kind: MediaKind, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let sql = format!("DELETE FROM {} WHERE id = ?1", kind.plural());
            Ok(conn.execute(&sql, [id])? > 0)
        })
    }

    // -- Letters --

    pub fn list_letters(&self) -> Result<Vec<LetterRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, content, created_at, updated_at FROM letters
                 ORDER BY updated_at DESC, created_at DESC",
            )?;
            let rows = stmt
                .query_map([], letter_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn insert_letter(&self, row: &LetterRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO letters (id, title, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (&row.id, &row.title, &row.content, &row.created_at, &row.updated_at),
            )?;
            Ok(())
        })
    }

    /// Merges the supplied fields over the stored letter and refreshes
    /// `updated_at`. Returns `None` if the letter does not exist.
    pub fn update_letter(
        &self,
        id: &str,
        title: Option<&str>,
        content: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<LetterRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut letter) = query_letter(&tx, id)? else {
                return Ok(None);
            };

            if let Some(title) = title {
                letter.title = title.to_string();
            }
            if let Some(content) = content {
                letter.content = content.to_string();
            }
            letter.updated_at = format_timestamp(next_update_time(&letter.updated_at, now)?);

            tx.execute(
                "UPDATE letters SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
                (&letter.title, &letter.content, &letter.updated_at, &letter.id),
            )?;
            tx.commit()?;
            Ok(Some(letter))
        })
    }

    pub fn delete_letter(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM letters WHERE id = ?1", [id])? > 0))
    }
}

/// `updated_at` must strictly advance, even when the clock has not moved
/// past the stored value at microsecond resolution.
fn next_update_time(previous: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let floor = parse_timestamp(previous)? + Duration::microseconds(1);
    Ok(now.max(floor))
}

fn query_account(conn: &Connection) -> Result<Option<AccountRow>> {
    conn.query_row(
        "SELECT id, username, password, created_at FROM account LIMIT 1",
        [],
        |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
}

fn query_letter(conn: &Connection, id: &str) -> Result<Option<LetterRow>> {
    conn.query_row(
        "SELECT id, title, content, created_at, updated_at FROM letters WHERE id = ?1",
        [id],
        letter_from_row,
    )
    .optional()
}

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRow> {
    Ok(MediaRow {
        id: row.get(0)?,
        name: row.get(1)?,
        stored_name: row.get(2)?,
        url: row.get(3)?,
        category: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn letter_from_row(row: &Row<'_>) -> rusqlite::Result<LetterRow> {
    Ok(LetterRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
