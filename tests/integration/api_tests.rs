//! HTTP API tests for the local GUI.
//!
//! Tests verify:
//! - The page, health check and folder browser
//! - Compression and verification over JSON
//! - Error responses (missing path, busy, bad input)
//! - PNG verification plots

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use tiff_squeeze::{create_router, AppState, CompressionMethod, RouterConfig, TiffCompressorManager};

use super::test_utils::sample_stack;

fn router_for(state: AppState) -> Router {
    create_router(state, RouterConfig::new().with_tracing(false))
}

async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn encode(path: &Path) -> String {
    urlencoding::encode(&path.to_string_lossy()).into_owned()
}

// =============================================================================
// Page, Health and Browse
// =============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = get(router_for(AppState::new(dir.path())), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_index_page() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = get(router_for(AppState::new(dir.path())), "/").await;

    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<html"));
    assert!(html.contains("/api/compress"));
}

#[tokio::test]
async fn test_browse_lists_dirs_and_tiffs() {
    let dir = tempfile::tempdir().unwrap();
    sample_stack(dir.path(), "scan.tif");
    sample_stack(dir.path(), "scan_compressed_lzw.tif");
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"hidden from picker").unwrap();

    let (status, body) = get(router_for(AppState::new(dir.path())), "/api/browse").await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["path"], dir.path().to_string_lossy().as_ref());
    let entries = json["entries"].as_array().unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["nested", "scan.tif", "scan_compressed_lzw.tif"]);
    assert_eq!(entries[0]["kind"], "dir");
    assert_eq!(entries[1]["kind"], "tiff");
    assert_eq!(entries[1]["compressed"], false);
    assert_eq!(entries[2]["compressed"], true);
}

#[tokio::test]
async fn test_browse_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).unwrap();
    sample_stack(&nested, "inner.tif");

    let uri = format!("/api/browse?path={}", encode(&nested));
    let (status, body) = get(router_for(AppState::new(dir.path())), &uri).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["parent"], dir.path().to_string_lossy().as_ref());
    assert_eq!(json["entries"][0]["name"], "inner.tif");
}

#[tokio::test]
async fn test_browse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let file = sample_stack(dir.path(), "scan.tif");

    let uri = format!("/api/browse?path={}", encode(&dir.path().join("missing")));
    let (status, _) = get(router_for(AppState::new(dir.path())), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/api/browse?path={}", encode(&file));
    let (status, body) = get(router_for(AppState::new(dir.path())), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(json["status"], 400);
}

// =============================================================================
// Compress
// =============================================================================

#[tokio::test]
async fn test_compress_file() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");
    let state = AppState::new(dir.path());

    let (status, json) = post_json(
        router_for(state.clone()),
        "/api/compress",
        json!({ "path": original, "method": "lzw" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["files"].as_array().unwrap().len(), 1);
    assert_eq!(json["files"][0]["verified"], true);
    assert!(!original.exists());
    assert!(dir.path().join("scan_compressed_lzw.tif").exists());

    let progress = state.progress().clone();
    assert!(!progress.running);
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.status, "Compression completed!");
    assert!(progress.log.iter().any(|l| l == "Verification: Success"));

    let (status, body) = get(router_for(state), "/api/progress").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["percent"], 100);
}

#[tokio::test]
async fn test_compress_keep_both() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");

    let (status, json) = post_json(
        router_for(AppState::new(dir.path())),
        "/api/compress",
        json!({ "path": dir.path(), "retention": "keep-both" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["files"][0]["verified"], true);
    assert!(original.exists());
    assert!(dir.path().join("scan_compressed_zip.tif").exists());
}

#[tokio::test]
async fn test_compress_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = post_json(
        router_for(AppState::new(dir.path())),
        "/api/compress",
        json!({ "path": dir.path().join("missing.tif") }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_compress_empty_path() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = post_json(
        router_for(AppState::new(dir.path())),
        "/api/compress",
        json!({ "path": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Please select a file or folder first");
}

#[tokio::test]
async fn test_compress_bad_options() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");

    let (status, _) = post_json(
        router_for(AppState::new(dir.path())),
        "/api/compress",
        json!({ "path": original, "method": "jpeg" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        router_for(AppState::new(dir.path())),
        "/api/compress",
        json!({ "path": original, "retention": "backup" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(original.exists());
}

#[tokio::test]
async fn test_compress_non_tiff_file() {
    let dir = tempfile::tempdir().unwrap();
    let junk = dir.path().join("junk.tif");
    std::fs::write(&junk, b"not a tiff").unwrap();
    let state = AppState::new(dir.path());

    let (status, json) = post_json(
        router_for(state.clone()),
        "/api/compress",
        json!({ "path": junk }),
    )
    .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["error"], "unsupported_format");
    assert_eq!(state.progress().status, "Error occurred!");
}

#[tokio::test]
async fn test_compress_refuses_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");
    let taken = dir.path().join("scan_compressed_zip.tif");
    std::fs::write(&taken, b"not ours").unwrap();

    let (status, json) = post_json(
        router_for(AppState::new(dir.path())),
        "/api/compress",
        json!({ "path": original }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
    assert!(original.exists());
    assert_eq!(std::fs::read(&taken).unwrap(), b"not ours");
}

#[tokio::test]
async fn test_compress_while_busy() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");
    let state = AppState::new(dir.path());

    let guard = state.job_lock.clone().try_lock_owned().unwrap();
    let (status, json) = post_json(
        router_for(state.clone()),
        "/api/compress",
        json!({ "path": original }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "busy");
    assert!(original.exists());

    drop(guard);
    let (status, _) = post_json(
        router_for(state),
        "/api/compress",
        json!({ "path": original }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Verify and Diff
// =============================================================================

#[tokio::test]
async fn test_verify_pair() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");
    let (compressed, _) =
        TiffCompressorManager::compress_file(&original, CompressionMethod::Zip).unwrap();
    let router = router_for(AppState::new(dir.path()));

    let (status, json) = post_json(
        router.clone(),
        "/api/verify",
        json!({ "original": original, "compressed": compressed }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["passed"], true);
    assert_eq!(json["failed_checks"], json!([]));
    assert_eq!(json["report"]["pixel_values_match"], true);

    let (status, json) = post_json(
        router,
        "/api/verify",
        json!({ "original": original, "compressed": original }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["passed"], false);
    assert_eq!(json["failed_checks"], json!(["file_hash_different"]));
}

#[tokio::test]
async fn test_diff_png() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");
    let (compressed, _) =
        TiffCompressorManager::compress_file(&original, CompressionMethod::Zip).unwrap();

    let uri = format!(
        "/api/diff?original={}&compressed={}&frame=1",
        encode(&original),
        encode(&compressed)
    );
    let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let response = router_for(AppState::new(dir.path()))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_diff_frame_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let original = sample_stack(dir.path(), "scan.tif");
    let (compressed, _) =
        TiffCompressorManager::compress_file(&original, CompressionMethod::Zip).unwrap();

    let uri = format!(
        "/api/diff?original={}&compressed={}&frame=9",
        encode(&original),
        encode(&compressed)
    );
    let (status, _) = get(router_for(AppState::new(dir.path())), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
