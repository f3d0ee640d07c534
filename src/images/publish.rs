//! Single-image publishing.
//!
//! An upload is written into the [`UploadStore`] and recorded with the
//! status the moderation policy assigns to its category.

use std::io::Read;
use std::path::Path;

use galleria_core::paths::{archive_basename, is_image_file, secure_filename};
use galleria_core::{
    Error, ImageId, Result, CATEGORY_GALLERY, CATEGORY_TEMPLATE, DEFAULT_IMAGE_TYPE,
};
use galleria_db::models::{Image, NewImage};
use galleria_db::queries::{images, tags};
use rusqlite::Connection;
use serde::Deserialize;

use super::UploadStore;
use crate::config::ModerationConfig;

/// Metadata sent alongside an uploaded image.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadForm {
    /// Client-side file name; only its extension and base name are used.
    pub filename: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub image_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-separated tag names.
    #[serde(default)]
    pub tags: String,
}

impl UploadForm {
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.split(',').map(str::trim).filter(|t| !t.is_empty())
    }

    fn category(&self) -> Result<&str> {
        match self.category.as_deref().map(str::trim) {
            None | Some("") => Ok(CATEGORY_GALLERY),
            Some(c) if c == CATEGORY_GALLERY || c == CATEGORY_TEMPLATE => Ok(c),
            Some(other) => Err(Error::Validation(format!("unknown category: {other}"))),
        }
    }
}

/// Store the bytes of `reader` and create the image row with its tags.
///
/// The stored file name is the sanitized client name behind a short
/// unique prefix. If the database write fails the file is removed again.
pub fn publish_image<R: Read + ?Sized>(
    conn: &Connection,
    store: &UploadStore,
    policy: &ModerationConfig,
    form: &UploadForm,
    reader: &mut R,
) -> Result<Image> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title is required".into()));
    }
    let category = form.category()?;

    if !is_image_file(Path::new(&form.filename)) {
        return Err(Error::Validation(format!(
            "unsupported image type: {:?}",
            form.filename
        )));
    }
    let base = secure_filename(archive_basename(&form.filename));
    if base.is_empty() {
        return Err(Error::Validation(format!(
            "file name {:?} has no usable characters",
            form.filename
        )));
    }
    let prefix = ImageId::new().to_string();
    let file_name = format!("{}_{base}", &prefix[..8]);

    store.ensure_root()?;
    let written = store.write_from(reader, &file_name)?;
    tracing::debug!("Stored upload {file_name} ({written} bytes)");

    let status = policy.initial_status(category);
    let new = NewImage {
        title: title.to_string(),
        author: form.author.trim().to_string(),
        prompt: form.prompt.clone(),
        description: form.description.clone(),
        image_type: form
            .image_type
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string()),
        category: category.to_string(),
        status,
        file_path: store.web_path(&file_name),
        thumbnail_path: None,
        heat_score: 0,
    };

    match insert_with_tags(conn, &new, form) {
        Ok(image) => {
            tracing::info!("Published image {} ({}) as {status}", image.id, image.title);
            Ok(image)
        }
        Err(e) => {
            let path = store.path_for(&file_name);
            if let Err(rm) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove orphaned upload {}: {rm}", path.display());
            }
            Err(e)
        }
    }
}

fn insert_with_tags(conn: &Connection, new: &NewImage, form: &UploadForm) -> Result<Image> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let image = images::create_image(&tx, new)?;
    for name in form.tag_names() {
        let tag = tags::find_or_create_tag(&tx, name)?;
        tags::attach_tag(&tx, image.id, tag.id)?;
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use galleria_core::ImageStatus;
    use galleria_db::pool::{get_conn, init_memory_pool};
    use tempfile::TempDir;

    fn form(filename: &str, title: &str) -> UploadForm {
        UploadForm {
            filename: filename.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    fn setup() -> (TempDir, UploadStore, galleria_db::pool::DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"), "static/uploads");
        (dir, store, init_memory_pool().unwrap())
    }

    #[test]
    fn publishes_with_policy_status_and_tags() {
        let (_dir, store, pool) = setup();
        let conn = get_conn(&pool).unwrap();
        let policy = ModerationConfig {
            template_requires_approval: false,
            ..Default::default()
        };

        let mut f = form("C:\\Users\\me\\My Fox.PNG", " Fox ");
        f.category = Some("template".into());
        f.tags = "animal, , winter".into();
        let image = publish_image(&conn, &store, &policy, &f, &mut &b"fox"[..]).unwrap();

        assert_eq!(image.title, "Fox");
        assert_eq!(image.status, ImageStatus::Approved);
        assert_eq!(image.category, "template");
        assert_eq!(image.image_type, DEFAULT_IMAGE_TYPE);
        assert!(image.file_path.starts_with("/static/uploads/"));
        assert!(image.file_path.ends_with("_My_Fox.PNG"));

        let stored = store.resolve_web_path(&image.file_path).unwrap();
        assert_eq!(std::fs::read(stored).unwrap(), b"fox");

        let record = images::load_image_record(&conn, image.id).unwrap().unwrap();
        assert_eq!(record.tag_names(), vec!["animal", "winter"]);

        let gallery = publish_image(&conn, &store, &policy, &form("a.jpg", "A"), &mut &b"a"[..])
            .unwrap();
        assert_eq!(gallery.status, ImageStatus::Pending);
        assert_eq!(gallery.category, CATEGORY_GALLERY);
    }

    #[test]
    fn rejects_bad_input_before_writing() {
        let (_dir, store, pool) = setup();
        let conn = get_conn(&pool).unwrap();
        let policy = ModerationConfig::default();

        let cases = [
            form("notes.txt", "Notes"),
            form("a.png", "   "),
            form("no-extension", "Bare"),
            UploadForm {
                category: Some("poster".into()),
                ..form("a.png", "A")
            },
        ];
        for f in &cases {
            let err = publish_image(&conn, &store, &policy, f, &mut &b"x"[..]).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{f:?}: {err}");
        }
        assert_eq!(images::count_images(&conn).unwrap(), 0);
        assert!(!store.root().exists());
    }

    #[test]
    fn failed_insert_removes_the_stored_file() {
        let (_dir, store, pool) = setup();
        let conn = get_conn(&pool).unwrap();
        conn.execute_batch("DROP TABLE image_tags").unwrap();

        let mut f = form("a.png", "A");
        f.tags = "animal".into();
        let err = publish_image(&conn, &store, &ModerationConfig::default(), &f, &mut &b"a"[..])
            .unwrap_err();
        assert!(matches!(err, Error::Database { .. }));

        assert_eq!(images::count_images(&conn).unwrap(), 0);
        let leftovers = std::fs::read_dir(store.root()).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
