//! Request handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use super::AppState;
use super::errors::ApiError;
use crate::document::{FileId, PageDescriptor, PageId};
use crate::error::PageMergeError;
use crate::ingest::{IngestReport, RawFile, RejectedFile};
use crate::order::PageOrder;
use crate::render::RenderTier;

/// Multipart field carrying the uploaded documents.
pub const UPLOAD_FIELD: &str = "pdfs";

/// Name used for a file part that has no file name.
const UNNAMED_UPLOAD: &str = "upload.pdf";

/// Storage key and display name of one accepted upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedName {
    /// Storage key of the file.
    pub filename: String,
    /// Name the client uploaded the file with.
    pub original: String,
}

/// Response body of `POST /upload`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Descriptors of every page of every accepted file, in upload order.
    pub pages: Vec<PageDescriptor>,
    /// Storage key of each accepted file, by file id.
    pub file_map: BTreeMap<FileId, String>,
    /// Accepted files, in upload order.
    pub file_names: Vec<UploadedName>,
    /// Files that could not be ingested.
    pub rejected: Vec<RejectedFile>,
}

impl From<IngestReport> for UploadResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            file_map: report
                .files
                .iter()
                .map(|f| (f.file_id.clone(), f.storage_key.clone()))
                .collect(),
            file_names: report
                .files
                .into_iter()
                .map(|f| UploadedName {
                    filename: f.storage_key,
                    original: f.original_name,
                })
                .collect(),
            pages: report.pages,
            rejected: report.rejected,
        }
    }
}

/// Request body of `POST /merge`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Pages of the output, in order.
    pub order: Vec<PageDescriptor>,
    /// Storage key of every file referenced by `order`, by file id.
    pub file_map: HashMap<FileId, String>,
    /// Output name without extension. Defaults to `merged`.
    #[serde(default)]
    pub new_name: Option<String>,
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": crate::NAME,
    }))
}

/// `POST /upload`
///
/// Every part of field [`UPLOAD_FIELD`] is one document. Unreadable
/// documents are reported in `rejected` and do not fail the request.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }

        let name = field.file_name().unwrap_or(UNNAMED_UPLOAD).to_string();
        let bytes = field.bytes().await?;
        files.push(RawFile::new(name, bytes));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "No files in multipart field '{UPLOAD_FIELD}'"
        )));
    }

    let report = state.ingestor.ingest(files).await;
    info!(
        accepted = report.files.len(),
        rejected = report.rejected.len(),
        pages = report.pages.len(),
        "upload ingested"
    );

    Ok(Json(report.into()))
}

/// `GET /uploads/:file_id`
pub async fn get_upload(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.storage.read(&file_id).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

/// `DELETE /uploads/:file_id`
pub async fn delete_upload(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let file = FileId::from(file_id);
    let evicted = state.cache.evict_file(&file);

    if !state.storage.remove(file.as_str()).await? {
        return Err(PageMergeError::unknown_file(file.as_str()).into());
    }

    debug!(file = %file, evicted, "deleted upload");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /pages/:page_id/:tier`
pub async fn page_image(
    State(state): State<AppState>,
    Path((page_id, tier)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let tier: RenderTier = tier
        .parse()
        .map_err(|e: PageMergeError| ApiError::BadRequest(e.to_string()))?;
    let page = PageDescriptor::from_id(&PageId::from(page_id))?;

    if !state.storage.exists(page.file.as_str()).await {
        return Err(PageMergeError::unknown_file(page.file.as_str()).into());
    }

    let image = state.cache.get_or_render(tier, &page).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        image,
    ))
}

/// `POST /merge`
///
/// Responds with the merged PDF as an attachment. The sources named by the
/// order are removed whether or not the merge succeeds.
///
/// A page's `rotation` is added to the `/Rotate` the page already carries,
/// modulo 360. It does not replace it: a page stored at 90 degrees and sent
/// with rotation 90 comes out at 180.
pub async fn merge(
    State(state): State<AppState>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    if let Some(forged) = request
        .order
        .iter()
        .find(|p| PageId::derive(&p.file, p.page_index) != p.id)
    {
        return Err(PageMergeError::InvalidPageId {
            id: forged.id.to_string(),
        }
        .into());
    }

    let mut order = PageOrder::new();
    order.append(request.order)?;
    let pages = order.snapshot();

    let output_name = request.new_name.as_deref().unwrap_or_default();
    let result = state
        .engine
        .merge(&pages, &request.file_map, output_name)
        .await;

    let files: HashSet<&FileId> = pages.iter().map(|p| &p.file).collect();
    for file in files {
        state.cache.evict_file(file);
    }

    let merged = result?;
    info!(
        file = %merged.file_name,
        pages = merged.statistics.total_pages,
        "merge delivered"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", merged.file_name),
            ),
        ],
        merged.bytes,
    ))
}
