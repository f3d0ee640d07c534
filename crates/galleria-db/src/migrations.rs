//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use galleria_core::{Error, Result};
use rusqlite::Connection;

/// V1: initial schema -- images, tags, their link table and reference images.
const V1_INITIAL: &str = r#"
CREATE TABLE images (
    id             TEXT PRIMARY KEY,
    title          TEXT NOT NULL,
    author         TEXT NOT NULL DEFAULT '',
    prompt         TEXT NOT NULL DEFAULT '',
    description    TEXT NOT NULL DEFAULT '',
    type           TEXT NOT NULL DEFAULT 'txt2img',
    category       TEXT NOT NULL DEFAULT 'gallery',
    status         TEXT NOT NULL DEFAULT 'pending',
    file_path      TEXT NOT NULL,
    thumbnail_path TEXT,
    heat_score     INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL
);

CREATE TABLE tags (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    is_sensitive INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE image_tags (
    image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    tag_id   TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (image_id, tag_id)
);

CREATE TABLE reference_images (
    id        TEXT PRIMARY KEY,
    image_id  TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    position  INTEGER NOT NULL DEFAULT 0,
    seq       INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_images_status       ON images(status);
CREATE INDEX idx_images_category     ON images(category);
CREATE INDEX idx_images_heat         ON images(heat_score);
CREATE INDEX idx_image_tags_tag      ON image_tags(tag_id);
CREATE INDEX idx_reference_images_im ON reference_images(image_id, position, seq);
"#;

/// V2: lookup index for the (title, author) duplicate check run by imports.
///
/// Deliberately not UNIQUE: regular uploads may share a title and author.
const V2_TITLE_AUTHOR_INDEX: &str = r#"
CREATE INDEX idx_images_title_author ON images(title, author);
"#;

/// V3: visitor counters feeding `heat_score`.
const V3_ENGAGEMENT_COUNTERS: &str = r#"
ALTER TABLE images ADD COLUMN views_count  INTEGER NOT NULL DEFAULT 0;
ALTER TABLE images ADD COLUMN copies_count INTEGER NOT NULL DEFAULT 0;
"#;

const MIGRATIONS: &[(i64, &str)] = &[
    (1, V1_INITIAL),
    (2, V2_TITLE_AUTHOR_INDEX),
    (3, V3_ENGAGEMENT_COUNTERS),
];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction. Returns
/// the number of migrations applied.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    let mut applied = 0;
    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        tracing::debug!("Applied migration V{version}");
        applied += 1;
    }

    Ok(applied)
}

/// Latest schema version known to this build.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|&(v, _)| v).unwrap_or(0)
}
