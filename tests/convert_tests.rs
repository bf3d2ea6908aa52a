//! Integration tests for `POST /api/convert`

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use toolverse_media::{
    create_router, AppState, ArtifactRegistry, DownloadPipeline, Metrics, ServiceConfig,
};

const BOUNDARY: &str = "toolverse-test-boundary";

enum Part<'a> {
    File { name: &'a str, data: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

fn router(dir: &TempDir) -> (Router, Arc<Metrics>) {
    let config = ServiceConfig {
        scratch_dir: dir.path().to_path_buf(),
        ..ServiceConfig::default()
    };
    let metrics = Metrics::new();
    let registry = ArtifactRegistry::new(Arc::clone(&metrics));
    let pipeline = DownloadPipeline::new(Arc::new(config), registry, Arc::clone(&metrics));
    (create_router(AppState::new(pipeline, Arc::clone(&metrics))), metrics)
}

fn sample_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(16, 9, |x, y| Rgba([(x * 15) as u8, (y * 25) as u8, 64, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn multipart(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File { name, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}").as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post(router: &Router, parts: &[Part<'_>]) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/api/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(parts)))
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn error_of(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_png_to_webp() {
    let dir = TempDir::new().unwrap();
    let (router, metrics) = router(&dir);
    let png = sample_png();

    let response = post(
        &router,
        &[
            Part::File { name: "holiday.png", data: &png },
            Part::Text { name: "format", value: "webp" },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"holiday (converted_with_toolverse).webp\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(infer::get(&bytes).unwrap().mime_type(), "image/webp");
    assert_eq!(metrics.snapshot().operations.convert, 1);
}

#[tokio::test]
async fn test_png_to_jpg_decodes() {
    let dir = TempDir::new().unwrap();
    let (router, _) = router(&dir);
    let png = sample_png();

    let response = post(
        &router,
        &[
            Part::Text { name: "format", value: "jpg" },
            Part::File { name: "scan.png", data: &png },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 9));
}

#[tokio::test]
async fn test_missing_fields_are_invalid_input() {
    let dir = TempDir::new().unwrap();
    let (router, _) = router(&dir);
    let png = sample_png();

    let response = post(&router, &[Part::File { name: "a.png", data: &png }]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "Invalid input");

    let response = post(&router, &[Part::Text { name: "format", value: "png" }]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "Invalid input");
}

#[tokio::test]
async fn test_unknown_target_format() {
    let dir = TempDir::new().unwrap();
    let (router, metrics) = router(&dir);
    let png = sample_png();

    let response = post(
        &router,
        &[
            Part::File { name: "a.png", data: &png },
            Part::Text { name: "format", value: "gif" },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "Unsupported format");
    assert_eq!(metrics.snapshot().failed_requests, 1);
}

#[tokio::test]
async fn test_non_image_upload() {
    let dir = TempDir::new().unwrap();
    let (router, _) = router(&dir);

    let response = post(
        &router,
        &[
            Part::File { name: "notes.txt", data: b"just some text, not pixels" },
            Part::Text { name: "format", value: "png" },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "Unsupported format");
}

#[tokio::test]
async fn test_corrupt_image_is_internal_error() {
    let dir = TempDir::new().unwrap();
    let (router, _) = router(&dir);
    // Valid PNG signature, truncated body
    let mut png = sample_png();
    png.truncate(24);

    let response = post(
        &router,
        &[
            Part::File { name: "broken.png", data: &png },
            Part::Text { name: "format", value: "bmp" },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_of(response).await, "Internal server error");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (router, _) = router(&dir);
    let big = vec![0u8; 11 * 1024 * 1024];

    let response = post(
        &router,
        &[
            Part::File { name: "huge.png", data: &big },
            Part::Text { name: "format", value: "png" },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
