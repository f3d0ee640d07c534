//! Filesystem storage for uploaded and imported assets.
//!
//! All assets live flat under one upload root. Their database rows store
//! a web path of the form `/{upload_folder}/{filename}`, which this module
//! maps back to a file on disk.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use galleria_core::paths;
use galleria_core::{Error, Result};

use crate::config::StorageConfig;

/// Flat asset directory plus the web prefix it is served under.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    folder: String,
}

impl UploadStore {
    /// Create a store writing into `root` and served under `/{folder}`.
    pub fn new(root: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            folder: folder.into().trim_matches('/').to_string(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.upload_root(), storage.upload_folder.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Create the upload root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Disk location for a stored filename.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Web path recorded in the database for a stored filename.
    pub fn web_path(&self, filename: &str) -> String {
        paths::web_path(&self.folder, filename)
    }

    /// Stream `reader` into `{root}/{filename}`, replacing any existing file.
    ///
    /// `filename` must be a single plain path component. Returns the number
    /// of bytes written.
    pub fn write_from<R: Read + ?Sized>(&self, reader: &mut R, filename: &str) -> Result<u64> {
        if !is_plain_filename(filename) {
            return Err(Error::Validation(format!(
                "refusing to store unsafe filename {filename:?}"
            )));
        }

        let path = self.path_for(filename);
        let mut out = BufWriter::new(File::create(&path)?);
        let written = io::copy(reader, &mut out)?;
        out.flush()?;

        tracing::trace!("Stored {} bytes at {}", written, path.display());
        Ok(written)
    }

    /// Map a stored web path back to its file under the upload root.
    ///
    /// Returns `None` for paths outside this store's prefix or paths that
    /// would escape the root.
    pub fn resolve_web_path(&self, web_path: &str) -> Option<PathBuf> {
        let prefix = format!("/{}/", self.folder);
        let name = web_path.strip_prefix(&prefix)?;
        is_plain_filename(name).then(|| self.path_for(name))
    }
}

/// A single normal path component: no separators, not `.` or `..`.
fn is_plain_filename(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
