//! Shared helpers for integration tests.
//!
//! Fixtures are generated in memory with lopdf. Every page draws a text
//! label so tests can identify pages after they have been merged.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use pagemerge::cache::CacheOptions;
use pagemerge::render::{Rasterizer, TierSettings};
use pagemerge::server::AppState;
use pagemerge::storage::ScratchStorage;

/// Boundary used by [`multipart_upload`].
pub const BOUNDARY: &str = "pagemerge-test-boundary";

/// Serialized PDF whose page `n` (one-based) shows `"{label}-{n}"`.
pub fn labeled_pdf(label: &str, pages: usize) -> Vec<u8> {
    labeled_pdf_with_rotation(label, pages, None)
}

/// Like [`labeled_pdf`], with `/Rotate` set on every page.
pub fn labeled_pdf_with_rotation(label: &str, pages: usize, rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let kids: Vec<Object> = (1..=pages)
        .map(|n| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 18.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("{label}-{n}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "Contents" => content_id,
            };
            if let Some(rotate) = rotate {
                page.set("Rotate", rotate);
            }
            doc.add_object(page).into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }
        .into(),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Text labels of the pages of a serialized PDF, in page order.
pub fn page_labels(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .find(|op| op.operator == "Tj")
                .and_then(|op| op.operands.first())
                .and_then(|text| text.as_str().ok())
                .map(|text| String::from_utf8_lossy(text).into_owned())
                .unwrap_or_default()
        })
        .collect()
}

/// Effective `/Rotate` of every page of a serialized PDF.
pub fn page_rotations(pdf: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id: ObjectId| {
            doc.get_dictionary(page_id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}

/// Number of entries in `dir`.
pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Rasteriser returning `"<scale>:<page index>"` instead of an image.
pub struct StubRasterizer;

impl Rasterizer for StubRasterizer {
    fn rasterize(
        &self,
        pdf: &[u8],
        page_index: u32,
        settings: &TierSettings,
    ) -> pagemerge::Result<Vec<u8>> {
        let page_count = Document::load_mem(pdf)
            .map_err(|e| pagemerge::PageMergeError::other(e.to_string()))?
            .get_pages()
            .len() as u32;
        if page_index >= page_count {
            return Err(pagemerge::PageMergeError::other("page out of range"));
        }
        Ok(format!("{}:{}", settings.scale, page_index).into_bytes())
    }
}

/// Server state over a fresh temporary storage directory.
pub async fn test_state() -> (TempDir, AppState) {
    test_state_with_limit(10 * 1024 * 1024).await
}

/// Like [`test_state`] with a custom upload limit.
pub async fn test_state_with_limit(max_upload_bytes: usize) -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let storage = ScratchStorage::open(dir.path()).await.unwrap();
    let state = AppState::new(
        storage,
        Arc::new(StubRasterizer),
        CacheOptions::default(),
        2,
        max_upload_bytes,
    );
    (dir, state)
}

/// `POST /upload` request carrying `files` in the `pdfs` field.
pub fn multipart_upload<B: AsRef<[u8]>>(files: &[(&str, B)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"pdfs\"; filename=\"{name}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes.as_ref());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// JSON request for `uri`.
pub fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Body-less request for `uri`.
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Collect a response body.
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Collect a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
