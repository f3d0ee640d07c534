//! Read access to an uploaded import archive.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use galleria_core::{Error, Result};
use serde_json::Value;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::images::UploadStore;
use crate::transfer::manifest::{self, MANIFEST_NAME};

/// An opened ZIP archive plus the set of entry names it contains.
pub struct ImportArchive {
    zip: ZipArchive<BufReader<File>>,
    names: HashSet<String>,
}

impl ImportArchive {
    /// Open `path` as a ZIP archive.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::archive(format!("cannot open {}: {e}", path.display())))?;
        let zip = ZipArchive::new(BufReader::new(file)).map_err(Error::archive)?;
        let names = zip.file_names().map(str::to_owned).collect();
        Ok(Self { zip, names })
    }

    /// Whether the archive has an entry with exactly this name.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn has_manifest(&self) -> bool {
        self.contains(MANIFEST_NAME)
    }

    /// Parse the manifest into its raw `images` entries.
    pub fn read_manifest(&mut self) -> Result<Vec<Value>> {
        let entry = self.zip.by_name(MANIFEST_NAME).map_err(|e| match e {
            ZipError::FileNotFound => Error::MissingAsset(MANIFEST_NAME.to_string()),
            other => Error::archive(other),
        })?;
        manifest::read_entries(entry)
    }

    /// Stream entry `name` into the upload store as `filename`.
    pub fn copy_to(&mut self, name: &str, store: &UploadStore, filename: &str) -> Result<u64> {
        let mut entry = self.zip.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => Error::MissingAsset(name.to_string()),
            other => Error::archive(format!("{name}: {other}")),
        })?;
        store.write_from(&mut entry, filename)
    }
}
