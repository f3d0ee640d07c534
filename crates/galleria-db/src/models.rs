//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use galleria_core::{ImageId, ImageStatus, ReferenceImageId, TagId};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

fn parse_status(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<ImageStatus> {
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub id: ImageId,
    pub title: String,
    pub author: String,
    pub prompt: String,
    pub description: String,
    #[serde(rename = "type")]
    pub image_type: String,
    pub category: String,
    pub status: ImageStatus,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub heat_score: i64,
    pub created_at: String,
}

impl Image {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            prompt: row.get(3)?,
            description: row.get(4)?,
            image_type: row.get(5)?,
            category: row.get(6)?,
            status: parse_status(row, 7)?,
            file_path: row.get(8)?,
            thumbnail_path: row.get(9)?,
            heat_score: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

/// Field values for a new image row; id and `created_at` are assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub title: String,
    pub author: String,
    pub prompt: String,
    pub description: String,
    pub image_type: String,
    pub category: String,
    pub status: ImageStatus,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub heat_score: i64,
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub is_sensitive: bool,
}

impl Tag {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            is_sensitive: row.get(2)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ReferenceImage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceImage {
    pub id: ReferenceImageId,
    pub image_id: ImageId,
    pub file_path: String,
    pub position: i64,
}

impl ReferenceImage {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            image_id: parse_id(row, 1)?,
            file_path: row.get(2)?,
            position: row.get(3)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ImageRecord
// ---------------------------------------------------------------------------

/// An image together with its tags and its references in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub image: Image,
    pub tags: Vec<Tag>,
    pub refs: Vec<ReferenceImage>,
}

impl ImageRecord {
    /// Tag names in attachment order.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }
}
