//! HTTP front end.
//!
//! The service is stateless between requests apart from scratch storage and
//! the page cache. Clients upload files, receive page descriptors, render
//! pages on demand and finally post the page order they want merged.
//!
//! | Method   | Path                     | Purpose                                  |
//! |----------|--------------------------|------------------------------------------|
//! | `GET`    | `/health`                | Liveness and version                     |
//! | `POST`   | `/upload`                | Multipart upload, field `pdfs`           |
//! | `GET`    | `/uploads/:file_id`      | Stored bytes of one upload               |
//! | `DELETE` | `/uploads/:file_id`      | Drop an upload and its rendered pages    |
//! | `GET`    | `/pages/:page_id/:tier`  | JPEG of one page, `preview` or `full`    |
//! | `POST`   | `/merge`                 | Merge an ordered page list into one PDF  |

pub mod errors;
pub mod handlers;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::{CacheOptions, PageCache};
use crate::config::Config;
use crate::error::{PageMergeError, Result};
use crate::ingest::Ingestor;
use crate::merge::MergeEngine;
use crate::render::{PdfiumRasterizer, Rasterizer};
use crate::storage::ScratchStorage;

pub use errors::ApiError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Scratch storage for uploads and output.
    pub storage: ScratchStorage,
    /// Parses and stores uploads.
    pub ingestor: Ingestor,
    /// Builds merged documents.
    pub engine: MergeEngine,
    /// Rendered page images.
    pub cache: PageCache,
    /// Largest accepted upload body, in bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Assemble state around an already opened storage and rasteriser.
    pub fn new(
        storage: ScratchStorage,
        rasterizer: Arc<dyn Rasterizer>,
        cache_options: CacheOptions,
        jobs: usize,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            ingestor: Ingestor::new(storage.clone(), jobs),
            engine: MergeEngine::new(storage.clone()),
            cache: PageCache::new(storage.clone(), rasterizer, cache_options),
            storage,
            max_upload_bytes,
        }
    }

    /// Open storage and bind pdfium as described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let storage = ScratchStorage::open(&config.storage_dir).await?;

        let rasterizer = match &config.pdfium_library_dir {
            Some(dir) => PdfiumRasterizer::with_library_dir(dir),
            None => PdfiumRasterizer::new(),
        };

        Ok(Self::new(
            storage,
            Arc::new(rasterizer),
            config.cache,
            config.effective_jobs(),
            config.max_upload_bytes,
        ))
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload).layer(upload_limit))
        .route(
            "/uploads/:file_id",
            get(handlers::get_upload).delete(handlers::delete_upload),
        )
        .route("/pages/:page_id/:tier", get(handlers::page_image))
        .route("/merge", post(handlers::merge))
        .with_state(state)
}

/// Run the service until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    config.validate()?;

    let state = AppState::from_config(&config).await?;
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.bind_address)
        .await
        .map_err(|e| {
            PageMergeError::other(format!("Failed to bind {}: {e}", config.bind_address))
        })?;

    info!(
        "pagemerge listening on {} (storage: {})",
        config.bind_address,
        config.storage_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pagemerge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
