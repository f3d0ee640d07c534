//! Spooling request bodies to disk.
//!
//! Uploads are streamed chunk by chunk into a temp file so an archive is
//! never held in memory whole.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Body;
use galleria_core::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;

/// Stream `body` into a new file under `dir` named `{prefix}*{suffix}`.
///
/// Empty bodies are a validation error and bodies longer than `limit`
/// bytes are refused with [`Error::PayloadTooLarge`]; in both cases the
/// partial file is removed. On success the caller owns the returned path.
pub async fn stage_body(
    dir: &Path,
    body: Body,
    limit: usize,
    prefix: &str,
    suffix: &str,
) -> Result<PathBuf, Error> {
    tokio::fs::create_dir_all(dir).await?;
    let staged = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)?;

    let mut file = tokio::fs::File::from_std(staged.as_file().try_clone()?);
    let stream = body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other));
    let cap = u64::try_from(limit).unwrap_or(u64::MAX);
    let mut reader = StreamReader::new(stream).take(cap.saturating_add(1));

    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    drop(file);

    if written == 0 {
        return Err(Error::Validation("request body is empty".into()));
    }
    if written > cap {
        return Err(Error::PayloadTooLarge(format!(
            "upload exceeds {} MB",
            limit / (1024 * 1024)
        )));
    }

    let path = staged
        .into_temp_path()
        .keep()
        .map_err(|e| Error::from(e.error))?;
    tracing::debug!("Staged {written} byte upload at {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spooled(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn stages_the_whole_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage_body(dir.path(), Body::from("zip bytes"), 1024, "t-", ".zip")
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"zip bytes");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("t-") && name.ends_with(".zip"));
    }

    #[tokio::test]
    async fn body_at_the_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage_body(dir.path(), Body::from(vec![7u8; 16]), 16, "t-", "")
            .await
            .unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), 16);
    }

    #[tokio::test]
    async fn oversized_body_is_refused_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let err = stage_body(dir.path(), Body::from(vec![7u8; 17]), 16, "t-", "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(_)));
        assert_eq!(spooled(dir.path()), 0);
    }

    #[tokio::test]
    async fn empty_body_is_refused_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let err = stage_body(dir.path(), Body::empty(), 16, "t-", "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(spooled(dir.path()), 0);
    }
}
