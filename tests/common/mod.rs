//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires an in-memory DB, a temporary data
//! directory and a full [`AppContext`], plus [`ArchiveBuilder`] for writing
//! import archives on the fly.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use galleria::config::Config;
use galleria::images::UploadStore;
use galleria::server::{create_router, AppContext};
use galleria::transfer::{ImportEvent, ImportPipeline};
use galleria_db::pool::{get_conn, init_memory_pool, DbPool, PooledConnection};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Test harness wrapping a fully-constructed [`AppContext`] backed by an
/// in-memory database and a temporary data directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with pacing disabled.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.storage.upload_folder = "static/uploads".into();
        config.import.temp_dir = Some(dir.path().join("spool"));
        config.import.pace_ms = 0;

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(config, db.clone());

        Self { ctx, db, dir }
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.db).expect("failed to get db connection")
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.ctx.uploads
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Files currently in the upload folder, sorted.
    pub fn uploaded_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.uploads().root()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Write `archive` to a fresh file in the temp dir and return its path.
    pub fn write_archive(&self, archive: &ArchiveBuilder) -> PathBuf {
        let path = tempfile::Builder::new()
            .suffix(".zip")
            .tempfile_in(self.dir.path())
            .unwrap()
            .into_temp_path()
            .keep()
            .unwrap();
        std::fs::write(&path, archive.to_bytes()).unwrap();
        path
    }

    pub fn pipeline(&self, archive_path: &Path) -> ImportPipeline {
        ImportPipeline::new(archive_path, self.db.clone(), self.uploads().clone())
            .with_pace(Duration::ZERO)
    }

    /// Write `archive` to disk and drain a full import of it.
    pub fn import(&self, archive: &ArchiveBuilder) -> Vec<ImportEvent> {
        let path = self.write_archive(archive);
        self.pipeline(&path).collect()
    }
}

/// Builds ZIP archives entry by entry.
#[derive(Default, Clone)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `data.json` with the given document.
    pub fn manifest(self, doc: serde_json::Value) -> Self {
        self.file("data.json", doc.to_string().as_bytes())
    }

    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push((name.to_string(), data.to_vec()));
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in &self.entries {
            zip.start_file(name.as_str(), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

/// Concatenate the progress text of a run.
pub fn render(events: &[ImportEvent]) -> String {
    events.iter().map(ToString::to_string).collect()
}

/// The summary event of a run, if it produced one.
pub fn summary(events: &[ImportEvent]) -> Option<galleria::transfer::ImportStats> {
    events.iter().find_map(|e| match e {
        ImportEvent::Finished(stats) => Some(*stats),
        _ => None,
    })
}
