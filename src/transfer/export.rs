//! Export of gallery images into an archive the importer accepts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use galleria_core::paths::archive_basename;
use galleria_core::{Error, ImageStatus, Result};
use galleria_db::models::ImageRecord;
use galleria_db::queries::images::{self, ImageFilter};
use rusqlite::Connection;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::images::UploadStore;
use crate::transfer::manifest::{
    ImportManifest, ManifestItem, RefEntry, StructuredRef, ASSET_DIR, MANIFEST_NAME,
};

/// What an export wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub images: usize,
    pub assets: usize,
}

/// Builds an export archive from the store and the upload folder.
pub struct ExportBuilder<'a> {
    conn: &'a Connection,
    store: &'a UploadStore,
    status: Option<ImageStatus>,
}

impl<'a> ExportBuilder<'a> {
    pub fn new(conn: &'a Connection, store: &'a UploadStore) -> Self {
        Self {
            conn,
            store,
            status: None,
        }
    }

    /// Only export images with this moderation status.
    pub fn with_status(mut self, status: Option<ImageStatus>) -> Self {
        self.status = status;
        self
    }

    /// Write the archive to a new file at `path`.
    pub fn write_file(&self, path: &Path) -> Result<ExportSummary> {
        let file = File::create(path)?;
        self.write_to(file)
    }

    /// Write the archive into `writer`.
    ///
    /// `data.json` comes first, followed by one `images/<name>` entry per
    /// distinct asset that exists on disk.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<ExportSummary> {
        let filter = ImageFilter {
            status: self.status,
            category: None,
            ..Default::default()
        };
        let rows = images::list_images(self.conn, &filter)?;

        let mut assets = AssetSet::default();
        let mut manifest = ImportManifest::default();
        for image in rows {
            let record = images::load_image_record(self.conn, image.id)?
                .ok_or_else(|| Error::not_found("image", image.id))?;
            manifest.images.push(self.manifest_item(&record, &mut assets));
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(writer);

        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| Error::Internal(format!("cannot encode {MANIFEST_NAME}: {e}")))?;
        zip.start_file(MANIFEST_NAME, options)
            .map_err(Error::archive)?;
        zip.write_all(&json)?;

        for (name, path) in &assets.files {
            let mut src = File::open(path)?;
            zip.start_file(name.as_str(), options)
                .map_err(Error::archive)?;
            io::copy(&mut src, &mut zip)?;
        }
        zip.finish().map_err(Error::archive)?;

        let summary = ExportSummary {
            images: manifest.images.len(),
            assets: assets.files.len(),
        };
        tracing::info!(
            images = summary.images,
            assets = summary.assets,
            "Export written"
        );
        Ok(summary)
    }

    fn manifest_item(&self, record: &ImageRecord, assets: &mut AssetSet) -> ManifestItem {
        let image = &record.image;
        let zip_image_path = assets
            .add(self.store, &image.file_path)
            .or_else(|| Some(asset_name(&image.file_path)));
        let zip_thumb_path = image
            .thumbnail_path
            .as_deref()
            .and_then(|thumb| assets.add(self.store, thumb));

        let refs = record
            .refs
            .iter()
            .filter(|r| assets.add(self.store, &r.file_path).is_some())
            .map(|r| {
                RefEntry::Structured(StructuredRef {
                    file_path: Some(r.file_path.clone()),
                    position: Some(r.position),
                    is_placeholder: false,
                })
            })
            .collect();

        ManifestItem {
            title: image.title.clone(),
            author: image.author.clone(),
            prompt: image.prompt.clone(),
            description: image.description.clone(),
            image_type: image.image_type.clone(),
            category: image.category.clone(),
            zip_image_path,
            zip_thumb_path,
            tags: record.tag_names(),
            refs,
            heat_score: image.heat_score,
        }
    }
}

fn asset_name(web_path: &str) -> String {
    format!("{ASSET_DIR}/{}", archive_basename(web_path))
}

/// Archive entry name to source file, one entry per distinct name.
#[derive(Default)]
struct AssetSet {
    files: BTreeMap<String, PathBuf>,
}

impl AssetSet {
    /// Register the file behind `web_path`. Returns its archive name, or
    /// `None` if the file is not on disk.
    fn add(&mut self, store: &UploadStore, web_path: &str) -> Option<String> {
        let name = asset_name(web_path);
        if self.files.contains_key(&name) {
            return Some(name);
        }

        match store.resolve_web_path(web_path) {
            Some(path) if path.is_file() => {
                self.files.insert(name.clone(), path);
                Some(name)
            }
            _ => {
                tracing::warn!("Export skipping missing asset {web_path}");
                None
            }
        }
    }
}
