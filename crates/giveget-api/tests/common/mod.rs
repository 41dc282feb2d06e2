//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use giveget_store::pg_chat_sink::PgChatSink;
use giveget_store::pg_listing_directory::PgListingDirectory;
use giveget_store::pg_negotiation_repository::PgNegotiationRepository;
use giveget_test_support::{FixedClock, TestIdentityResolver};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use giveget_api::routes;
use giveget_api::state::AppState;

/// Build the full app router over the Postgres adapters, with a fixed clock
/// and `user-<id>` bearer tokens. Uses the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    let app_state = AppState::new(
        Arc::new(PgNegotiationRepository::new(pool.clone())),
        Arc::new(PgListingDirectory::new(pool.clone())),
        Arc::new(PgChatSink::new(pool, 16)),
        Arc::new(TestIdentityResolver),
        Arc::new(FixedClock::standard()),
    );

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/offers", routes::negotiation::router())
        .with_state(app_state)
}

/// Insert a listing owned by `owner_id` and return its id.
pub async fn seed_listing(pool: &PgPool, owner_id: i64, kind: &str, price: f64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO listings (owner_id, kind, title, price) VALUES ($1, $2, 'Test listing', $3) RETURNING id",
    )
    .bind(owner_id)
    .bind(kind)
    .bind(price)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Current price of a listing.
pub async fn listing_price(pool: &PgPool, listing_id: i64) -> f64 {
    sqlx::query_scalar("SELECT price FROM listings WHERE id = $1")
        .bind(listing_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    user_id: i64,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri).header(
        "authorization",
        format!("Bearer {}", TestIdentityResolver::token_for(user_id)),
    );
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send an authenticated POST request with a JSON body.
pub async fn post_json(
    app: Router,
    uri: &str,
    user_id: i64,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, user_id, Some(body)).await
}

/// Send an authenticated POST request with a raw body and an optional
/// content type.
pub async fn post_raw(
    app: Router,
    uri: &str,
    user_id: i64,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        "authorization",
        format!("Bearer {}", TestIdentityResolver::token_for(user_id)),
    );
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let request = builder.body(Body::from(body.to_owned())).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send an authenticated POST request without a body.
pub async fn post_empty(app: Router, uri: &str, user_id: i64) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, user_id, None).await
}

/// Send an authenticated GET request.
pub async fn get_json(app: Router, uri: &str, user_id: i64) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, user_id, None).await
}

/// Send an unauthenticated GET request.
pub async fn get_anonymous(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or_default();

    (status, json)
}
