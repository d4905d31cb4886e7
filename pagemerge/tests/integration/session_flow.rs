//! End-to-end editing sessions: upload, arrange, render and merge.

use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;

use pagemerge::cache::{CacheOptions, PageCache, RenderState};
use pagemerge::ingest::RawFile;
use pagemerge::render::RenderTier;
use pagemerge::session::EditSession;
use pagemerge::storage::ScratchStorage;

use crate::common::{
    StubRasterizer, count_files, labeled_pdf, labeled_pdf_with_rotation, page_labels,
    page_rotations,
};

async fn new_session() -> (TempDir, EditSession) {
    let dir = TempDir::new().unwrap();
    let storage = ScratchStorage::open(dir.path()).await.unwrap();
    let cache = PageCache::new(
        storage.clone(),
        Arc::new(StubRasterizer),
        CacheOptions::default(),
    );
    (dir, EditSession::new(storage, cache, 4))
}

fn raw(label: &str, pages: usize) -> RawFile {
    RawFile::new(format!("{label}.pdf"), labeled_pdf(label, pages))
}

#[tokio::test]
async fn test_upload_assigns_pages_in_upload_order() {
    let (_dir, mut session) = new_session().await;

    let report = session
        .upload(vec![raw("A", 2), raw("B", 3)])
        .await
        .unwrap();

    assert_eq!(report.files.len(), 2);
    assert!(report.rejected.is_empty());
    let labels: Vec<_> = session.pages().iter().map(|p| p.display_label()).collect();
    assert_eq!(
        labels,
        vec![
            "A.pdf - Pg 1",
            "A.pdf - Pg 2",
            "B.pdf - Pg 1",
            "B.pdf - Pg 2",
            "B.pdf - Pg 3"
        ]
    );
}

#[tokio::test]
async fn test_second_upload_appends() {
    let (_dir, mut session) = new_session().await;

    session.upload(vec![raw("A", 1)]).await.unwrap();
    session.upload(vec![raw("B", 1)]).await.unwrap();

    let merged = session.merge("two-uploads").await.unwrap();
    assert_eq!(page_labels(&merged.bytes), vec!["A-1", "B-1"]);
    assert_eq!(merged.file_name, "two-uploads.pdf");
}

#[tokio::test]
async fn test_same_file_uploaded_twice_gets_distinct_pages() {
    let (_dir, mut session) = new_session().await;
    let bytes = labeled_pdf("Same", 1);

    session
        .upload(vec![
            RawFile::new("same.pdf", bytes.clone()),
            RawFile::new("same.pdf", bytes),
        ])
        .await
        .unwrap();

    let pages = session.pages();
    assert_eq!(pages.len(), 2);
    assert_ne!(pages[0].id, pages[1].id);
    assert_eq!(pages[0].display_label(), pages[1].display_label());
}

#[tokio::test]
async fn test_full_workflow() {
    let (dir, mut session) = new_session().await;
    session
        .upload(vec![raw("A", 3), raw("B", 2)])
        .await
        .unwrap();

    let report = session.render_previews().await;
    assert_eq!(report.rendered.len(), 5);
    assert!(report.failed.is_empty());

    // B-2, A-1, A-3 with A-2 and B-1 dropped.
    let ids = session.order().ids();
    session.remove_page(&ids[1]).unwrap();
    session.remove_page(&ids[3]).unwrap();
    session
        .reorder(&[ids[4].clone(), ids[0].clone(), ids[2].clone()])
        .unwrap();
    session.rotate(&ids[0], 90).unwrap();
    session.rotate(&ids[0], 90).unwrap();
    session.rotate(&ids[2], -90).unwrap();

    let full = session.full(&ids[4]).await.unwrap();
    assert_eq!(full, Bytes::from_static(b"2:1"));

    let merged = session.merge("result").await.unwrap();

    assert_eq!(page_labels(&merged.bytes), vec!["B-2", "A-1", "A-3"]);
    assert_eq!(page_rotations(&merged.bytes), vec![0, 180, 270]);
    assert_eq!(merged.statistics.total_pages, 3);
    assert_eq!(count_files(dir.path()), 0);
}

#[tokio::test]
async fn test_rotation_adds_to_existing_page_rotation() {
    let (_dir, mut session) = new_session().await;
    session
        .upload(vec![RawFile::new(
            "scan.pdf",
            labeled_pdf_with_rotation("S", 2, Some(90)),
        )])
        .await
        .unwrap();

    let ids = session.order().ids();
    session.rotate(&ids[0], 270).unwrap();
    session.rotate(&ids[1], 90).unwrap();

    let merged = session.merge("scan").await.unwrap();
    assert_eq!(page_rotations(&merged.bytes), vec![0, 180]);
}

#[tokio::test]
async fn test_reorder_rejects_non_permutations() {
    let (_dir, mut session) = new_session().await;
    session.upload(vec![raw("A", 3)]).await.unwrap();
    let ids = session.order().ids();

    assert!(session.reorder(&ids[..2]).is_err());
    assert!(
        session
            .reorder(&[ids[0].clone(), ids[0].clone(), ids[1].clone()])
            .is_err()
    );
    assert_eq!(session.order().ids(), ids);
}

#[tokio::test]
async fn test_render_events_are_published() {
    let dir = TempDir::new().unwrap();
    let storage = ScratchStorage::open(dir.path()).await.unwrap();
    let cache = PageCache::new(
        storage.clone(),
        Arc::new(StubRasterizer),
        CacheOptions::default(),
    );
    let mut events = cache.subscribe();
    let mut session = EditSession::new(storage, cache, 1);
    session.upload(vec![raw("A", 1)]).await.unwrap();
    let id = session.order().ids()[0].clone();

    session.preview(&id).await.unwrap();

    let pending = events.recv().await.unwrap();
    assert_eq!(pending.page_id, id);
    assert_eq!(pending.tier, RenderTier::Preview);
    assert!(matches!(pending.state, RenderState::Pending));
    let ready = events.recv().await.unwrap();
    assert!(matches!(ready.state, RenderState::Ready(ref bytes) if bytes.as_ref() == b"0.5:0"));
}

#[tokio::test]
async fn test_close_removes_everything() {
    let (dir, mut session) = new_session().await;
    session
        .upload(vec![raw("A", 2), raw("B", 1)])
        .await
        .unwrap();
    assert_eq!(count_files(dir.path()), 2);

    session.close().await;

    assert_eq!(count_files(dir.path()), 0);
}
