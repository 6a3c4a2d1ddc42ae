use crate::{state::SharedState, test_util::test_app};
use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};
use test_log::test;
use tower::Service;

mod upload;

const ADMIN_PASSWORD: &str = "topsecret";

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is not json")
}

/// Build a json request, optionally carrying the admin password and a
/// session cookie
fn request(
    method: &str,
    uri: &str,
    body: Option<Value>,
    admin: Option<&str>,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(password) = admin {
        builder = builder.header(crate::auth::ADMIN_PASSWORD_HEADER, password);
    }
    if let Some(cookie) = cookie {
        builder = builder.header("Cookie", cookie);
    }
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request")
}

async fn send(app: &mut Router, request: Request<Body>) -> Response<Body> {
    app.as_service()
        .call(request)
        .await
        .expect("Failed to execute request")
}

/// logs a user into the app and returns a cookie value that can be used in
/// subsequent requests
async fn login(app: &mut Router, id: &str) -> Result<String> {
    let query = serde_urlencoded::to_string([("id", id), ("name", "Mario Rossi")])?;
    let response = send(
        app,
        request("POST", &format!("/test/login?{query}"), None, None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get("set-cookie")
        .expect("no set-cookie header")
        .to_str()?;
    Ok(cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_health(pool: Pool<Sqlite>) {
    let (mut app, _state) = test_app(SharedState::test(pool));
    let response = send(&mut app, request("GET", "/api/health", None, None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "ok", "backend": "sqlite"})
    );
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_auth_me(pool: Pool<Sqlite>) {
    let (mut app, _state) = test_app(SharedState::test(pool));
    let response = send(&mut app, request("GET", "/auth/me", None, None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Authentication required"})
    );

    let cookie = login(&mut app, "google-555").await.expect("Failed to log in");
    let response = send(
        &mut app,
        request("GET", "/auth/me", None, None, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["id"], "google-555");
    assert_eq!(me["firstName"], "Mario");
    assert_eq!(me["lastName"], "Rossi");

    let response = send(
        &mut app,
        request("POST", "/auth/logout", None, None, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"success": true}));

    let response = send(
        &mut app,
        request("GET", "/auth/me", None, None, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_oauth_not_configured(pool: Pool<Sqlite>) {
    let (mut app, _state) = test_app(SharedState::test(pool));
    let response = send(&mut app, request("GET", "/auth/login", None, None, None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_chat(pool: Pool<Sqlite>) {
    let (mut app, _state) = test_app(SharedState::test(pool));
    let response = send(
        &mut app,
        request(
            "POST",
            "/api/chat",
            Some(json!({
                "history": [{"role": "model", "text": "Ciao!"}],
                "message": "Cosa sono i pupi?"
            })),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    // no api key is configured in tests
    assert_eq!(
        body_json(response).await,
        json!({"text": crate::chat::MISSING_KEY_REPLY})
    );

    let response = send(
        &mut app,
        request("POST", "/api/chat", Some(json!({"message": "  "})), None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test(sqlx::test(migrations = "../db/migrations/sqlite"))]
async fn test_geocode_validation(pool: Pool<Sqlite>) {
    let (mut app, _state) = test_app(SharedState::test(pool));
    let response = send(
        &mut app,
        request("GET", "/api/geocode?address=Gallipoli", None, None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &mut app,
        request(
            "GET",
            "/api/geocode?address=%20",
            None,
            Some(ADMIN_PASSWORD),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Address is required"})
    );
}
