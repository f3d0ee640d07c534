//! Bulk import of a gallery archive.
//!
//! [`ImportPipeline`] is a pull-driven iterator. Every call to `next()`
//! performs one unit of work and returns the [`ImportEvent`] describing it;
//! the event's `Display` form is the progress text shown to the operator.
//! Nothing happens until the iterator is polled, and the run only completes
//! once it has been drained.
//!
//! Output order is: start line, record count, one status per item, then a
//! summary. Fatal problems (unreadable archive, missing or corrupt
//! `data.json`) end the sequence with a single error line and no summary.
//!
//! Each item is committed in its own transaction. Copied asset files are
//! not rolled back when an item fails. The source archive is deleted when
//! the run ends, fails, or the pipeline is dropped early.

use std::fmt;
use std::iter::{Enumerate, FusedIterator};
use std::path::{Path, PathBuf};
use std::time::Duration;

use galleria_core::paths::{archive_basename, secure_filename};
use galleria_core::{Error, ImageId, ImageStatus, Result};
use galleria_db::models::NewImage;
use galleria_db::pool::{get_conn, DbPool};
use galleria_db::queries::{images, references, tags};
use serde::Serialize;
use serde_json::Value;

use crate::images::UploadStore;
use crate::transfer::archive::ImportArchive;
use crate::transfer::manifest::{raw_title, ManifestItem, RefEntry, ASSET_DIR, MANIFEST_NAME};

/// Pause inserted after each processed or failed item by default.
pub const DEFAULT_PACE: Duration = Duration::from_millis(10);

/// Per-run counters reported in the summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// A single progress step of an import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    /// The archive opened and contains a manifest.
    Started,
    /// The manifest parsed; `count` entries follow.
    Found { count: usize },
    /// An image with the same title and author already exists.
    Skipped { title: String },
    /// Work on an item begins. Rendered without a newline; the next event
    /// is always its outcome.
    Importing { title: String },
    Imported,
    Failed { error: String },
    /// The entry could not be decoded or checked, so no import was attempted.
    Rejected { index: usize, error: String },
    /// The run stopped before any item was processed.
    Fatal { message: String },
    Finished(ImportStats),
}

impl ImportEvent {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ImportEvent::Fatal { .. })
    }
}

impl fmt::Display for ImportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportEvent::Started => writeln!(f, "[import] processing archive..."),
            ImportEvent::Found { count } => {
                writeln!(f, "[import] found {count} record(s), importing...")
            }
            ImportEvent::Skipped { title } => writeln!(f, "  [skip] {title}"),
            ImportEvent::Importing { title } => write!(f, "  [import] {title}... "),
            ImportEvent::Imported => writeln!(f, "OK"),
            ImportEvent::Failed { error } => writeln!(f, "FAILED: {error}"),
            ImportEvent::Rejected { index, error } => {
                writeln!(f, "  [invalid] item #{}: {error}", index + 1)
            }
            ImportEvent::Fatal { message } => writeln!(f, "[error] {message}"),
            ImportEvent::Finished(stats) => writeln!(
                f,
                "\n[done] processed {}, skipped {}, errors {}",
                stats.processed, stats.skipped, stats.errors
            ),
        }
    }
}

enum Stage {
    Open,
    Manifest(ImportArchive),
    Items {
        archive: ImportArchive,
        entries: Enumerate<std::vec::IntoIter<Value>>,
        current: Option<ManifestItem>,
    },
    Done,
}

enum Admission {
    Duplicate(String),
    Accepted(ManifestItem),
}

/// Lazily imports one archive into the store and the upload folder.
pub struct ImportPipeline {
    archive_path: PathBuf,
    db: DbPool,
    store: UploadStore,
    pace: Duration,
    pace_due: bool,
    stage: Stage,
    stats: ImportStats,
    cleaned_up: bool,
}

impl ImportPipeline {
    /// Prepare an import of the archive at `archive_path`.
    ///
    /// The pipeline takes ownership of the file: it is deleted once the run
    /// is over, whatever the outcome.
    pub fn new(archive_path: impl Into<PathBuf>, db: DbPool, store: UploadStore) -> Self {
        Self {
            archive_path: archive_path.into(),
            db,
            store,
            pace: DEFAULT_PACE,
            pace_due: false,
            stage: Stage::Open,
            stats: ImportStats::default(),
            cleaned_up: false,
        }
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Counters so far.
    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    fn open(&mut self) -> ImportEvent {
        if let Err(e) = self.store.ensure_root() {
            return self.abort(format!("cannot create upload directory: {e}"));
        }

        let archive = match ImportArchive::open(&self.archive_path) {
            Ok(archive) => archive,
            Err(e) => return self.abort(format!("cannot read ZIP archive: {e}")),
        };

        if !archive.has_manifest() {
            drop(archive);
            return self.abort(format!("{MANIFEST_NAME} not found in archive"));
        }

        tracing::info!(
            "Importing archive {} ({} entries)",
            self.archive_path.display(),
            archive.len()
        );
        self.stage = Stage::Manifest(archive);
        ImportEvent::Started
    }

    fn read_manifest(&mut self, mut archive: ImportArchive) -> ImportEvent {
        match archive.read_manifest() {
            Ok(entries) => {
                let count = entries.len();
                tracing::debug!("Manifest lists {count} item(s)");
                self.stage = Stage::Items {
                    archive,
                    entries: entries.into_iter().enumerate(),
                    current: None,
                };
                ImportEvent::Found { count }
            }
            Err(e) => {
                drop(archive);
                self.abort(format!("cannot read {MANIFEST_NAME}: {e}"))
            }
        }
    }

    fn step(
        &mut self,
        mut archive: ImportArchive,
        mut entries: Enumerate<std::vec::IntoIter<Value>>,
        current: Option<ManifestItem>,
    ) -> ImportEvent {
        if let Some(item) = current {
            let event = match self.import_item(&mut archive, &item) {
                Ok(id) => {
                    self.stats.processed += 1;
                    tracing::debug!("Imported {:?} as {id}", item.title);
                    ImportEvent::Imported
                }
                Err(e) => {
                    self.stats.errors += 1;
                    tracing::warn!("Import of {:?} failed: {e}", item.title);
                    ImportEvent::Failed {
                        error: e.to_string(),
                    }
                }
            };
            self.pace_due = true;
            self.stage = Stage::Items {
                archive,
                entries,
                current: None,
            };
            return event;
        }

        let Some((index, value)) = entries.next() else {
            drop(archive);
            return self.finish();
        };

        let title = raw_title(&value).map(str::to_owned);
        let (event, current) = match self.admit(value) {
            Ok(Admission::Duplicate(title)) => {
                self.stats.skipped += 1;
                tracing::debug!("Skipping existing image {title:?}");
                (ImportEvent::Skipped { title }, None)
            }
            Ok(Admission::Accepted(item)) => {
                let title = item.title.clone();
                (ImportEvent::Importing { title }, Some(item))
            }
            Err(e) => {
                self.stats.errors += 1;
                self.pace_due = true;
                tracing::warn!("Rejected manifest item #{} ({title:?}): {e}", index + 1);
                (
                    ImportEvent::Rejected {
                        index,
                        error: e.to_string(),
                    },
                    None,
                )
            }
        };

        self.stage = Stage::Items {
            archive,
            entries,
            current,
        };
        event
    }

    /// Decode an entry and run the duplicate check on it.
    fn admit(&self, value: Value) -> Result<Admission> {
        let item = ManifestItem::from_value(value)?;
        let conn = get_conn(&self.db)?;
        if images::find_by_title_author(&conn, &item.title, &item.author)?.is_some() {
            return Ok(Admission::Duplicate(item.title));
        }
        Ok(Admission::Accepted(item))
    }

    /// Copy an item's assets and persist it with its tags and references.
    fn import_item(&self, archive: &mut ImportArchive, item: &ManifestItem) -> Result<ImageId> {
        let primary = item
            .zip_image_path
            .as_deref()
            .filter(|p| archive.contains(p))
            .ok_or_else(|| {
                Error::MissingAsset(format!(
                    "main image {}",
                    item.zip_image_path.as_deref().unwrap_or("(not given)")
                ))
            })?;

        let file_name = secure_filename(archive_basename(primary));
        if file_name.is_empty() {
            return Err(Error::Validation(format!(
                "main image name {primary:?} has no usable characters"
            )));
        }
        archive.copy_to(primary, &self.store, &file_name)?;

        let thumbnail_path = match item.zip_thumb_path.as_deref() {
            Some(thumb) if archive.contains(thumb) => self.copy_sanitized(archive, thumb)?,
            _ => None,
        };

        let conn = get_conn(&self.db)?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        let image = images::create_image(
            &tx,
            &NewImage {
                title: item.title.clone(),
                author: item.author.clone(),
                prompt: item.prompt.clone(),
                description: item.description.clone(),
                image_type: item.image_type.clone(),
                category: item.category.clone(),
                status: ImageStatus::Pending,
                file_path: self.store.web_path(&file_name),
                thumbnail_path,
                heat_score: item.heat_score,
            },
        )?;

        for name in item.tags.iter().filter(|n| !n.trim().is_empty()) {
            let tag = tags::find_or_create_tag(&tx, name)?;
            tags::attach_tag(&tx, image.id, tag.id)?;
        }

        for entry in &item.refs {
            if let Some((path, position)) = self.stage_reference(archive, entry)? {
                references::attach_reference(&tx, image.id, &path, position)?;
            }
        }

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        Ok(image.id)
    }

    /// Copy a reference asset if the entry points at one. Returns its web
    /// path and display position.
    fn stage_reference(
        &self,
        archive: &mut ImportArchive,
        entry: &RefEntry,
    ) -> Result<Option<(String, i64)>> {
        match entry {
            RefEntry::Legacy(path) => {
                if !archive.contains(path) {
                    return Ok(None);
                }
                Ok(self.copy_sanitized(archive, path)?.map(|web| (web, 0)))
            }
            RefEntry::Structured(r) => {
                if r.is_placeholder {
                    return Ok(None);
                }
                let Some(file_path) = r.file_path.as_deref() else {
                    return Ok(None);
                };

                // Stored under its original name, so only reject what
                // cannot be a plain file name.
                let name = archive_basename(file_path);
                if matches!(name, "" | "." | "..") {
                    return Ok(None);
                }
                let zip_path = format!("{ASSET_DIR}/{name}");
                if !archive.contains(&zip_path) {
                    return Ok(None);
                }
                archive.copy_to(&zip_path, &self.store, name)?;
                Ok(Some((self.store.web_path(name), r.position.unwrap_or(0))))
            }
            RefEntry::Unrecognized(_) => Ok(None),
        }
    }

    /// Copy an archive entry under its sanitized base name.
    ///
    /// Returns `None` when sanitizing leaves nothing usable.
    fn copy_sanitized(&self, archive: &mut ImportArchive, path: &str) -> Result<Option<String>> {
        let name = secure_filename(archive_basename(path));
        if name.is_empty() {
            tracing::debug!("Ignoring asset {path:?}: no usable file name");
            return Ok(None);
        }
        archive.copy_to(path, &self.store, &name)?;
        Ok(Some(self.store.web_path(&name)))
    }

    fn finish(&mut self) -> ImportEvent {
        self.cleanup();
        let stats = self.stats;
        tracing::info!(
            processed = stats.processed,
            skipped = stats.skipped,
            errors = stats.errors,
            "Import finished"
        );
        ImportEvent::Finished(stats)
    }

    fn abort(&mut self, message: String) -> ImportEvent {
        self.cleanup();
        tracing::warn!("Import aborted: {message}");
        ImportEvent::Fatal { message }
    }

    /// Close the archive and delete it. Runs at most once.
    fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.stage = Stage::Done;

        match std::fs::remove_file(&self.archive_path) {
            Ok(()) => tracing::debug!("Removed {}", self.archive_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove import archive {}: {e}",
                self.archive_path.display()
            ),
        }
    }
}

impl Iterator for ImportPipeline {
    type Item = ImportEvent;

    fn next(&mut self) -> Option<ImportEvent> {
        if std::mem::take(&mut self.pace_due) && !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }

        match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Open => Some(self.open()),
            Stage::Manifest(archive) => Some(self.read_manifest(archive)),
            Stage::Items {
                archive,
                entries,
                current,
            } => Some(self.step(archive, entries, current)),
            Stage::Done => None,
        }
    }
}

impl FusedIterator for ImportPipeline {}

impl Drop for ImportPipeline {
    fn drop(&mut self) {
        self.cleanup();
    }
}
