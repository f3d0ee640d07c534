//! Administrative routes: bulk import/export and tag moderation.

use std::convert::Infallible;
use std::io::Seek;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use galleria_core::{Error, ImageStatus};
use galleria_db::models::Tag;
use galleria_db::pool::get_conn;
use galleria_db::queries::tags;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

use super::error::AppError;
use super::staging::stage_body;
use super::AppContext;
use crate::transfer::{ExportBuilder, ImportPipeline};

/// Progress lines buffered between the import thread and the response body.
const PROGRESS_BUFFER: usize = 32;

/// Create admin routes.
pub fn admin_routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/import", post(import_archive))
        .route("/admin/export", get(export_archive))
        .route("/admin/tags", get(list_tags))
        .route("/admin/tags/{name}/sensitive", put(set_tag_sensitive))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SensitiveRequest {
    pub sensitive: bool,
}

/// Import a ZIP archive sent as the raw request body.
///
/// The body is spooled to disk as it arrives, capped at
/// `import.max_upload_mb`. The response is a chunked `text/plain` stream
/// of progress lines. Only one import runs at a time; a concurrent
/// request gets `409 Conflict`.
async fn import_archive(
    State(ctx): State<AppContext>,
    body: Body,
) -> Result<Response, AppError> {
    let guard = ctx
        .import_lock
        .clone()
        .try_lock_owned()
        .map_err(|_| Error::Conflict("an import is already running".into()))?;

    let staged = stage_body(
        &ctx.config.import.staging_dir(),
        body,
        ctx.config.import.max_upload_bytes(),
        "galleria-import-",
        ".zip",
    )
    .await?;

    tracing::info!("Starting import of uploaded archive {}", staged.display());

    let pipeline = ImportPipeline::new(staged, ctx.db.clone(), ctx.uploads.clone())
        .with_pace(ctx.config.import.pace());
    let (tx, rx) = mpsc::channel::<String>(PROGRESS_BUFFER);

    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        for event in pipeline {
            if tx.blocking_send(event.to_string()).is_err() {
                tracing::warn!("Import client disconnected, stopping import");
                break;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Download the gallery as an importable ZIP archive.
async fn export_archive(
    State(ctx): State<AppContext>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ImageStatus>)
        .transpose()?;

    let staging_dir = ctx.config.import.staging_dir();
    let (file, summary) = tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&staging_dir)?;
        let mut file = tempfile::tempfile_in(&staging_dir)?;
        let conn = get_conn(&ctx.db)?;
        let summary = ExportBuilder::new(&conn, &ctx.uploads)
            .with_status(status)
            .write_to(&mut file)?;
        file.rewind()?;
        Ok::<_, Error>((file, summary))
    })
    .await
    .map_err(|e| Error::Internal(format!("export task failed: {e}")))??;

    tracing::info!(
        "Exporting {} image(s) with {} asset(s)",
        summary.images,
        summary.assets
    );

    let stream = ReaderStream::new(tokio::fs::File::from_std(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"galleria-export.zip\"",
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// All tags with their sensitive flag, ordered by name.
async fn list_tags(State(ctx): State<AppContext>) -> Result<Json<Vec<Tag>>, AppError> {
    let conn = get_conn(&ctx.db)?;
    Ok(Json(tags::list_tags(&conn)?))
}

/// Flag or unflag a tag as sensitive.
async fn set_tag_sensitive(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
    Json(req): Json<SensitiveRequest>,
) -> Result<Json<Tag>, AppError> {
    let conn = get_conn(&ctx.db)?;
    if !tags::set_sensitive(&conn, &name, req.sensitive)? {
        return Err(Error::not_found("tag", &name).into());
    }
    tracing::info!("Tag {name:?} sensitive = {}", req.sensitive);
    let tag = tags::get_tag_by_name(&conn, &name)?.ok_or_else(|| Error::not_found("tag", &name))?;
    Ok(Json(tag))
}
