//! Public browse routes: approved gallery and template listings, plus the
//! view/copy counters behind `sort=hot`.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use galleria_core::{Error, ImageStatus, CATEGORY_GALLERY, CATEGORY_TEMPLATE};
use galleria_db::pool::get_conn;
use galleria_db::queries::images::{self, Engagement, ImageFilter, ImageSort};
use galleria_db::queries::tags;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::AppError;
use super::routes_images::{load_all, non_blank, parse_id, ImageResponse};
use super::AppContext;

/// Create public listing routes.
pub fn public_routes() -> Router<AppContext> {
    Router::new()
        .route("/gallery", get(list_gallery))
        .route("/gallery/tags", get(gallery_tags))
        .route("/templates", get(list_templates))
        .route("/templates/tags", get(template_tags))
        .route("/stats/view/{id}", post(count_view))
        .route("/stats/copy/{id}", post(count_copy))
}

#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub tag: Option<String>,
    pub q: Option<String>,
    /// `date` (default), `hot` or `random`
    pub sort: Option<String>,
    /// Opt in to images carrying sensitive tags, if the site allows it
    #[serde(default)]
    pub show_sensitive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagsQuery {
    #[serde(default)]
    pub show_sensitive: bool,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub name: String,
    pub is_sensitive: bool,
}

async fn list_gallery(
    State(ctx): State<AppContext>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    browse(&ctx, CATEGORY_GALLERY, &query)
}

async fn list_templates(
    State(ctx): State<AppContext>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    browse(&ctx, CATEGORY_TEMPLATE, &query)
}

async fn gallery_tags(
    State(ctx): State<AppContext>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    visible_tags(&ctx, CATEGORY_GALLERY, &query)
}

async fn template_tags(
    State(ctx): State<AppContext>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    visible_tags(&ctx, CATEGORY_TEMPLATE, &query)
}

async fn count_view(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    engage(&ctx, &id, Engagement::View)
}

async fn count_copy(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    engage(&ctx, &id, Engagement::Copy)
}

fn engage(ctx: &AppContext, id: &str, kind: Engagement) -> Result<Json<Value>, AppError> {
    let id = parse_id(id)?;
    let conn = get_conn(&ctx.db)?;
    if !images::record_engagement(&conn, id, kind)? {
        return Err(Error::not_found("image", id).into());
    }
    Ok(Json(json!({ "status": "ok" })))
}

fn browse(
    ctx: &AppContext,
    category: &str,
    query: &BrowseQuery,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let sort = match non_blank(&query.sort) {
        Some(s) => s.parse::<ImageSort>()?,
        None => ImageSort::Newest,
    };
    let filter = ImageFilter {
        status: Some(ImageStatus::Approved),
        category: Some(category),
        tag: non_blank(&query.tag),
        search: non_blank(&query.q),
        hide_sensitive: !ctx.config.moderation.shows_sensitive(query.show_sensitive),
        sort,
    };

    let conn = get_conn(&ctx.db)?;
    Ok(Json(load_all(&conn, &filter)?))
}

fn visible_tags(
    ctx: &AppContext,
    category: &str,
    query: &TagsQuery,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let hide_sensitive = !ctx.config.moderation.shows_sensitive(query.show_sensitive);
    let conn = get_conn(&ctx.db)?;
    let tags = tags::list_visible_tags(&conn, Some(category), hide_sensitive)?
        .into_iter()
        .map(|t| TagResponse {
            name: t.name,
            is_sensitive: t.is_sensitive,
        })
        .collect();
    Ok(Json(tags))
}
