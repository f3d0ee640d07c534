use crate::config::Config;
use crate::images::UploadStore;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use galleria_db::pool::DbPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod error;
pub mod routes_admin;
pub mod routes_images;
pub mod routes_public;
pub mod staging;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    pub config: Arc<Config>,
    /// Upload folder the importer writes into and `ServeDir` serves from
    pub uploads: UploadStore,
    /// Held for the whole run of an import; imports never overlap
    pub import_lock: Arc<Mutex<()>>,
}

impl AppContext {
    pub fn new(config: Config, db: DbPool) -> Self {
        let uploads = UploadStore::from_config(&config.storage);
        Self {
            db,
            config: Arc::new(config),
            uploads,
            import_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let uploads_prefix = format!("/{}", ctx.uploads.folder());
    let uploads_dir = ServeDir::new(ctx.uploads.root());

    let api = routes_images::image_routes()
        .merge(routes_public::public_routes())
        .merge(routes_admin::admin_routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .nest_service(&uploads_prefix, uploads_dir)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config, db: DbPool) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config, db);
    ctx.uploads
        .ensure_root()
        .with_context(|| format!("Failed to create upload folder {:?}", ctx.uploads.root()))?;

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
