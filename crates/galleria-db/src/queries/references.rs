//! Reference images attached to a primary image.

use galleria_core::{Error, ImageId, ReferenceImageId, Result};
use rusqlite::Connection;

use crate::models::ReferenceImage;

/// Attach a reference file to an image at the given display position.
///
/// References sharing a position keep their attachment order.
pub fn attach_reference(
    conn: &Connection,
    image_id: ImageId,
    file_path: &str,
    position: i64,
) -> Result<ReferenceImage> {
    let id = ReferenceImageId::new();
    conn.execute(
        "INSERT INTO reference_images (id, image_id, file_path, position, seq)
         VALUES (?1, ?2, ?3, ?4,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM reference_images WHERE image_id = ?2))",
        rusqlite::params![id.to_string(), image_id.to_string(), file_path, position],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(ReferenceImage {
        id,
        image_id,
        file_path: file_path.to_string(),
        position,
    })
}

/// References of an image ordered by position, then attachment order.
pub fn list_references(conn: &Connection, image_id: ImageId) -> Result<Vec<ReferenceImage>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, image_id, file_path, position FROM reference_images
             WHERE image_id = ?1 ORDER BY position, seq",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([image_id.to_string()], ReferenceImage::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

pub fn delete_references_for_image(conn: &Connection, image_id: ImageId) -> Result<usize> {
    conn.execute(
        "DELETE FROM reference_images WHERE image_id = ?1",
        [image_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))
}
