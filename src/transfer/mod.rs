//! Bulk transfer of gallery content as ZIP archives.
//!
//! An archive holds a `data.json` manifest plus the binary assets it
//! names. [`pipeline`] imports one, [`export`] produces one.

pub mod archive;
pub mod export;
pub mod manifest;
pub mod pipeline;

pub use export::{ExportBuilder, ExportSummary};
pub use pipeline::{ImportEvent, ImportPipeline, ImportStats};

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use galleria_core::{Error, Result};

/// Copy an incoming archive into a uniquely named file under `dir`.
///
/// The import pipeline deletes its input when done, so callers hand it
/// this staged copy rather than the original.
pub fn stage_archive<R: Read + ?Sized>(dir: &Path, reader: &mut R) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix("galleria-import-")
        .suffix(".zip")
        .tempfile_in(dir)?;
    let bytes = io::copy(reader, &mut staged)?;
    staged.flush()?;

    let (_, path) = staged.keep().map_err(|e| Error::from(e.error))?;
    tracing::debug!("Staged {bytes} byte archive at {}", path.display());
    Ok(path)
}
