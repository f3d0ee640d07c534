//! Tag lookup and image-tag linking.

use galleria_core::{Error, ImageId, Result, TagId};
use rusqlite::{Connection, OptionalExtension};

use crate::models::Tag;

const COLS: &str = "id, name, is_sensitive";

/// Return the tag with this exact name, creating it if needed.
///
/// Tag names are global and case-sensitive; two imports naming the same
/// tag share one row.
pub fn find_or_create_tag(conn: &Connection, name: &str) -> Result<Tag> {
    if name.trim().is_empty() {
        return Err(Error::Validation("tag name must not be blank".into()));
    }

    conn.execute(
        "INSERT INTO tags (id, name) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        rusqlite::params![TagId::new().to_string(), name],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    get_tag_by_name(conn, name)?.ok_or_else(|| Error::not_found("tag", name))
}

/// Get a tag by its exact name.
pub fn get_tag_by_name(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    let q = format!("SELECT {COLS} FROM tags WHERE name = ?1");
    conn.query_row(&q, [name], Tag::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// List all tags ordered by name.
pub fn list_tags(conn: &Connection) -> Result<Vec<Tag>> {
    let q = format!("SELECT {COLS} FROM tags ORDER BY name");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Tag::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Tags used by at least one approved image, ordered by name.
///
/// Scoped to `category` when given; sensitive tags are left out when
/// `hide_sensitive` is set.
pub fn list_visible_tags(
    conn: &Connection,
    category: Option<&str>,
    hide_sensitive: bool,
) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT t.id, t.name, t.is_sensitive FROM tags t
             INNER JOIN image_tags it ON it.tag_id = t.id
             INNER JOIN images i ON i.id = it.image_id
             WHERE i.status = 'approved'
               AND (?1 IS NULL OR i.category = ?1)
               AND (?2 = 0 OR t.is_sensitive = 0)
             ORDER BY t.name",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![category, hide_sensitive], Tag::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Link a tag to an image. Returns `false` if the link already existed.
pub fn attach_tag(conn: &Connection, image_id: ImageId, tag_id: TagId) -> Result<bool> {
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?1, ?2)",
            rusqlite::params![image_id.to_string(), tag_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Remove every tag link of an image.
pub fn detach_all_tags(conn: &Connection, image_id: ImageId) -> Result<usize> {
    conn.execute(
        "DELETE FROM image_tags WHERE image_id = ?1",
        [image_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Tags of an image in the order they were attached.
pub fn list_tags_for_image(conn: &Connection, image_id: ImageId) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.name, t.is_sensitive FROM tags t
             INNER JOIN image_tags it ON it.tag_id = t.id
             WHERE it.image_id = ?1
             ORDER BY it.rowid",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([image_id.to_string()], Tag::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Flag or unflag a tag as sensitive. Returns `false` if no such tag exists.
pub fn set_sensitive(conn: &Connection, name: &str, sensitive: bool) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE tags SET is_sensitive = ?1 WHERE name = ?2",
            rusqlite::params![sensitive, name],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

pub fn count_tags(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}
