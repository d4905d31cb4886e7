//! HTTP API tests driven through the router without a network socket.

use axum::http::{StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use pagemerge::PageId;
use pagemerge::render::RenderTier;
use pagemerge::server::build_router;

use crate::common::{
    body_bytes, body_json, count_files, empty_request, json_request, labeled_pdf,
    labeled_pdf_with_rotation, multipart_upload, page_labels, page_rotations, test_state,
    test_state_with_limit,
};

#[tokio::test]
async fn test_health() {
    let (_dir, state) = test_state().await;

    let response = build_router(state)
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "pagemerge");
    assert_eq!(body["version"], pagemerge::VERSION);
}

#[tokio::test]
async fn test_upload_returns_pages_and_file_map() {
    let (dir, state) = test_state().await;
    let a = labeled_pdf("A", 2);
    let b = labeled_pdf("B", 1);

    let response = build_router(state)
        .oneshot(multipart_upload(&[("a.pdf", &a), ("b.pdf", &b)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let pages = body["pages"].as_array().unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0]["originalFile"], "a.pdf");
    assert_eq!(pages[0]["originalPage"], 1);
    assert_eq!(pages[2]["originalFile"], "b.pdf");
    assert_eq!(pages[2]["rotation"], 0);

    let file_map = body["fileMap"].as_object().unwrap();
    assert_eq!(file_map.len(), 2);
    let first_file = pages[0]["file"].as_str().unwrap();
    assert!(file_map.contains_key(first_file));

    let names = body["fileNames"].as_array().unwrap();
    assert_eq!(names[0]["original"], "a.pdf");
    assert_eq!(names[1]["original"], "b.pdf");
    assert!(body["rejected"].as_array().unwrap().is_empty());
    assert_eq!(count_files(dir.path()), 2);
}

#[tokio::test]
async fn test_upload_reports_rejected_files() {
    let (_dir, state) = test_state().await;
    let good = labeled_pdf("A", 1);

    let response = build_router(state)
        .oneshot(multipart_upload(&[
            ("notes.pdf", b"plain text".to_vec()),
            ("a.pdf", good),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["pages"].as_array().unwrap().len(), 1);
    assert_eq!(body["rejected"][0]["original"], "notes.pdf");
}

#[tokio::test]
async fn test_upload_without_files_is_bad_request() {
    let (_dir, state) = test_state().await;

    let response = build_router(state)
        .oneshot(multipart_upload::<&[u8]>(&[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let (_dir, state) = test_state_with_limit(1024).await;
    let big = labeled_pdf("Big", 40);
    assert!(big.len() > 1024);

    let response = build_router(state)
        .oneshot(multipart_upload(&[("big.pdf", &big)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

async fn upload<B: AsRef<[u8]>>(app: &axum::Router, files: &[(&str, B)]) -> Value {
    let response = app
        .clone()
        .oneshot(multipart_upload(files))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_page_images_for_both_tiers() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);
    let a = labeled_pdf("A", 2);
    let uploaded = upload(&app, &[("a.pdf", &a)]).await;
    let page_id = uploaded["pages"][1]["id"].as_str().unwrap().to_string();

    let preview = app
        .clone()
        .oneshot(empty_request("GET", &format!("/pages/{page_id}/preview")))
        .await
        .unwrap();
    assert_eq!(preview.status(), StatusCode::OK);
    assert_eq!(preview.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(body_bytes(preview).await, b"0.5:1");

    let full = app
        .clone()
        .oneshot(empty_request("GET", &format!("/pages/{page_id}/full")))
        .await
        .unwrap();
    assert_eq!(body_bytes(full).await, b"2:1");
}

#[tokio::test]
async fn test_page_image_errors() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);
    let a = labeled_pdf("A", 1);
    let uploaded = upload(&app, &[("a.pdf", &a)]).await;
    let page_id = uploaded["pages"][0]["id"].as_str().unwrap().to_string();
    let file_id = uploaded["pages"][0]["file"].as_str().unwrap().to_string();

    let cases = [
        (format!("/pages/{page_id}/huge"), StatusCode::BAD_REQUEST),
        ("/pages/not-a-page/preview".to_string(), StatusCode::BAD_REQUEST),
        (
            "/pages/0000_page_0/preview".to_string(),
            StatusCode::NOT_FOUND,
        ),
        (
            format!("/pages/{file_id}_page_5/preview"),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
    ];

    for (uri, expected) in cases {
        let response = app
            .clone()
            .oneshot(empty_request("GET", &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "GET {uri}");
    }
}

#[tokio::test]
async fn test_out_of_range_page_requests_leave_no_cache_entries() {
    let (_dir, state) = test_state().await;
    let app = build_router(state.clone());
    let a = labeled_pdf("A", 1);
    let uploaded = upload(&app, &[("a.pdf", &a)]).await;
    let file_id = uploaded["pages"][0]["file"].as_str().unwrap().to_string();

    for index in 100..120 {
        let id = format!("{file_id}_page_{index}");
        let response = app
            .clone()
            .oneshot(empty_request("GET", &format!("/pages/{id}/preview")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.cache.state(RenderTier::Preview, &PageId::from(id)), None);
    }
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn test_get_and_delete_upload() {
    let (dir, state) = test_state().await;
    let app = build_router(state);
    let a = labeled_pdf("A", 1);
    let uploaded = upload(&app, &[("a.pdf", &a)]).await;
    let file_id = uploaded["pages"][0]["file"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/uploads/{file_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(body_bytes(response).await, a);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/uploads/{file_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(count_files(dir.path()), 0);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/uploads/{file_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_merge_interleaved_pages() {
    let (dir, state) = test_state().await;
    let app = build_router(state);
    let a = labeled_pdf("A", 2);
    let b = labeled_pdf("B", 2);
    let uploaded = upload(&app, &[("a.pdf", &a), ("b.pdf", &b)]).await;

    let pages = uploaded["pages"].as_array().unwrap();
    let mut b2 = pages[3].clone();
    b2["rotation"] = json!(90);
    let order = json!([b2, pages[0], pages[2]]);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({
                "order": order,
                "fileMap": uploaded["fileMap"],
                "newName": "My Report",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"My Report.pdf\""
    );

    let pdf = body_bytes(response).await;
    assert_eq!(page_labels(&pdf), vec!["B-2", "A-1", "B-1"]);
    assert_eq!(page_rotations(&pdf), vec![90, 0, 0]);
    // A-2 was not merged, its file is still removed.
    assert_eq!(count_files(dir.path()), 0);
}

#[tokio::test]
async fn test_merge_default_name() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);
    let a = labeled_pdf("A", 1);
    let uploaded = upload(&app, &[("a.pdf", &a)]).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({ "order": uploaded["pages"], "fileMap": uploaded["fileMap"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"merged.pdf\""
    );
}

#[tokio::test]
async fn test_merge_rotation_adds_to_page_rotate() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);
    let sideways = labeled_pdf_with_rotation("S", 2, Some(90));
    let uploaded = upload(&app, &[("sideways.pdf", &sideways)]).await;

    let mut first = uploaded["pages"][0].clone();
    first["rotation"] = json!(90);
    let mut second = uploaded["pages"][1].clone();
    second["rotation"] = json!(270);

    let response = app
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({ "order": [first, second], "fileMap": uploaded["fileMap"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let pdf = body_bytes(response).await;
    assert_eq!(page_rotations(&pdf), vec![180, 0]);
}

#[tokio::test]
async fn test_merge_errors() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);
    let a = labeled_pdf("A", 1);
    let uploaded = upload(&app, &[("a.pdf", &a)]).await;
    let page = uploaded["pages"][0].clone();

    let empty = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({ "order": [], "fileMap": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let duplicate = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({ "order": [page, page], "fileMap": uploaded["fileMap"] }),
        ))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let mut forged = page.clone();
    forged["id"] = json!("other_page_0");
    let forged = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({ "order": [page, forged], "fileMap": uploaded["fileMap"] }),
        ))
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .clone()
        .oneshot(json_request("POST", "/merge", &json!({ "order": "all" })))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(malformed).await["error"]["code"], "BAD_REQUEST");

    let missing_source = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({ "order": [page], "fileMap": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(missing_source.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(missing_source).await["error"]["code"],
        "MERGE_FAILED"
    );
}

#[tokio::test]
async fn test_merge_evicts_rendered_pages() {
    let (_dir, state) = test_state().await;
    let cache = state.cache.clone();
    let app = build_router(state);
    let a = labeled_pdf("A", 1);
    let uploaded = upload(&app, &[("a.pdf", &a)]).await;
    let page_id = uploaded["pages"][0]["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(empty_request("GET", &format!("/pages/{page_id}/preview")))
        .await
        .unwrap();
    assert_eq!(cache.len(), 1);

    let response = app
        .oneshot(json_request(
            "POST",
            "/merge",
            &json!({ "order": uploaded["pages"], "fileMap": uploaded["fileMap"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cache.is_empty());
}
