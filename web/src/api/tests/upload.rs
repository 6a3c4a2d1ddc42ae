use super::*;
use test_log::test;
use crate::{api::upload::MAX_IMAGE_SIZE, images::LocalImageStore};
use std::sync::Arc;

const BOUNDARY: &str = "PUPOBOUNDARY";

fn multipart_request(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .uri("/api/upload")
        .method("POST")
        .header(crate::auth::ADMIN_PASSWORD_HEADER, ADMIN_PASSWORD)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("Failed to build request")
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_upload_not_configured(pool: Pool<Sqlite>) {
    let (mut app, _state) = test_app(SharedState::test(pool));
    let response = send(
        &mut app,
        multipart_request("file", "pupo.png", "image/png", b"fake png"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_upload_local(pool: Pool<Sqlite>) {
    let dir = tempfile::tempdir().unwrap();
    let mut state = SharedState::test(pool);
    state.images = Some(Arc::new(LocalImageStore::new(dir.path())));
    let (mut app, _state) = test_app(state);

    let response = send(
        &mut app,
        multipart_request("file", "pupo.png", "image/png", b"fake png"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let url = body_json(response).await["url"]
        .as_str()
        .expect("missing url")
        .to_string();
    let name = url.strip_prefix("/uploads/").expect("unexpected url");
    assert!(name.starts_with("pupi/"));
    assert!(name.ends_with(".png"));
    assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"fake png");

    let response = send(
        &mut app,
        multipart_request("file", "notes.txt", "text/plain", b"hello"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "File must be an image"})
    );

    let response = send(
        &mut app,
        multipart_request("other", "pupo.png", "image/png", b"fake png"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "No file provided"})
    );
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_upload_too_large(pool: Pool<Sqlite>) {
    let dir = tempfile::tempdir().unwrap();
    let mut state = SharedState::test(pool);
    state.images = Some(Arc::new(LocalImageStore::new(dir.path())));
    let (mut app, _state) = test_app(state);

    // one byte over the image limit, still inside the request body limit
    let response = send(
        &mut app,
        multipart_request("file", "big.jpg", "image/jpeg", &vec![0; MAX_IMAGE_SIZE + 1]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "File size must be less than 5MB"})
    );

    // over the request body limit
    let response = send(
        &mut app,
        multipart_request("file", "huge.jpg", "image/jpeg", &vec![0; 6 * 1024 * 1024]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "File size must be less than 5MB"})
    );

    let response = send(
        &mut app,
        multipart_request("file", "ok.jpg", "image/jpeg", &vec![0; MAX_IMAGE_SIZE]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(std::fs::read_dir(dir.path().join("pupi")).unwrap().count() == 1);
}
