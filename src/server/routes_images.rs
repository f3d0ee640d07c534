//! Image upload, listing and moderation API routes.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use galleria_core::{Error, ImageId, ImageStatus};
use galleria_db::models::ImageRecord;
use galleria_db::pool::get_conn;
use galleria_db::queries::images::{self, ImageFilter, ImageSort};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::error::AppError;
use super::staging::stage_body;
use super::AppContext;
use crate::images::{publish_image, UploadForm};

/// Create image-related routes.
pub fn image_routes() -> Router<AppContext> {
    Router::new()
        .route("/images", get(list_images).post(upload_image))
        .route("/images/{id}", get(get_image).delete(delete_image))
        .route("/images/{id}/approve", post(approve_image))
        .route("/images/{id}/reject", post(reject_image))
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListImagesQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
}

/// An image with its tag names and reference paths in display order.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: String,
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
    pub tags: Vec<String>,
    pub refs: Vec<String>,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        let tags = record.tag_names();
        let image = record.image;
        Self {
            id: image.id.to_string(),
            title: image.title,
            author: image.author,
            prompt: image.prompt,
            description: image.description,
            image_type: image.image_type,
            category: image.category,
            status: image.status,
            file_path: image.file_path,
            thumbnail_path: image.thumbnail_path,
            heat_score: image.heat_score,
            created_at: image.created_at,
            tags,
            refs: record.refs.into_iter().map(|r| r.file_path).collect(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_images(
    State(ctx): State<AppContext>,
    Query(query): Query<ListImagesQuery>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ImageStatus>)
        .transpose()?;
    let sort = query
        .sort
        .as_deref()
        .map(str::parse::<ImageSort>)
        .transpose()?
        .unwrap_or_default();
    let filter = ImageFilter {
        status,
        category: non_blank(&query.category),
        tag: non_blank(&query.tag),
        search: non_blank(&query.q),
        hide_sensitive: false,
        sort,
    };

    let conn = get_conn(&ctx.db)?;
    Ok(Json(load_all(&conn, &filter)?))
}

/// Publish a single image sent as the raw request body.
///
/// Metadata travels in the query string (`filename`, `title`, optional
/// `author`, `prompt`, `description`, `type`, `category` and a
/// comma-separated `tags`). The initial status follows the moderation
/// policy of the category.
async fn upload_image(
    State(ctx): State<AppContext>,
    Query(form): Query<UploadForm>,
    body: Body,
) -> Result<(StatusCode, Json<ImageResponse>), AppError> {
    let staged = stage_body(
        &ctx.config.import.staging_dir(),
        body,
        ctx.config.storage.max_image_bytes(),
        "galleria-upload-",
        ".part",
    )
    .await?;

    let record = tokio::task::spawn_blocking(move || {
        let result = publish_staged(&ctx, &form, &staged);
        if let Err(e) = std::fs::remove_file(&staged) {
            tracing::warn!("Failed to remove staged upload {}: {e}", staged.display());
        }
        result
    })
    .await
    .map_err(|e| Error::Internal(format!("upload task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(record.into())))
}

async fn get_image(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, AppError> {
    let id = parse_id(&id)?;
    let conn = get_conn(&ctx.db)?;
    Ok(Json(load(&conn, id)?.into()))
}

async fn approve_image(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, AppError> {
    moderate(&ctx, &id, ImageStatus::Approved)
}

async fn reject_image(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, AppError> {
    moderate(&ctx, &id, ImageStatus::Rejected)
}

/// Delete an image with its references and tag links. Asset files stay.
async fn delete_image(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    let conn = get_conn(&ctx.db)?;
    if !images::delete_image(&conn, id)? {
        return Err(Error::not_found("image", id).into());
    }
    tracing::info!("Deleted image {id}");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

fn moderate(
    ctx: &AppContext,
    id: &str,
    status: ImageStatus,
) -> Result<Json<ImageResponse>, AppError> {
    let id = parse_id(id)?;
    let conn = get_conn(&ctx.db)?;
    if !images::set_status(&conn, id, status)? {
        return Err(Error::not_found("image", id).into());
    }
    tracing::info!("Image {id} is now {status}");
    Ok(Json(load(&conn, id)?.into()))
}

pub(super) fn parse_id(raw: &str) -> Result<ImageId, Error> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("invalid image id: {raw}")))
}

pub(super) fn load(conn: &Connection, id: ImageId) -> Result<ImageRecord, Error> {
    images::load_image_record(conn, id)?.ok_or_else(|| Error::not_found("image", id))
}

/// Run `filter` and load every match with its tags and references.
pub(super) fn load_all(
    conn: &Connection,
    filter: &ImageFilter<'_>,
) -> Result<Vec<ImageResponse>, Error> {
    images::list_images(conn, filter)?
        .into_iter()
        .map(|image| load(conn, image.id).map(ImageResponse::from))
        .collect()
}

/// Treat missing and whitespace-only query values alike.
pub(super) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn publish_staged(
    ctx: &AppContext,
    form: &UploadForm,
    staged: &std::path::Path,
) -> Result<ImageRecord, Error> {
    let mut file = std::fs::File::open(staged)?;
    let conn = get_conn(&ctx.db)?;
    let image = publish_image(&conn, &ctx.uploads, &ctx.config.moderation, form, &mut file)?;
    load(&conn, image.id)
}
