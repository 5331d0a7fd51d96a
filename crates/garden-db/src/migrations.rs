use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            -- The singleton column caps the table at one row: it may only
            -- hold 1 and must be unique.
            CREATE TABLE account (
                id          TEXT PRIMARY KEY,
                singleton   INTEGER NOT NULL DEFAULT 1 UNIQUE CHECK (singleton = 1),
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE photos (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                stored_name TEXT NOT NULL UNIQUE,
                url         TEXT NOT NULL UNIQUE,
                category    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_photos_created ON photos(created_at);

            CREATE TABLE videos (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                stored_name TEXT NOT NULL UNIQUE,
                url         TEXT NOT NULL UNIQUE,
                category    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_videos_created ON videos(created_at);

            CREATE TABLE letters (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_letters_updated ON letters(updated_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
