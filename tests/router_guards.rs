//! Requests that must be rejected before any database access. The state's pool
//! points at a closed port, so reaching persistence would surface as a 500.

mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::Duration;
use rstest::rstest;
use serde_json::Value;
use storefront_api::{
    entity::users::Role, routes::create_app, services::auth_service::TokenService,
};
use tower::ServiceExt;
use uuid::Uuid;

async fn send(request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let app = create_app(common::offline_state());
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn customer_token() -> String {
    common::offline_state()
        .tokens
        .issue(Uuid::new_v4(), "shopper@example.com", Role::Customer)
        .unwrap()
}

#[tokio::test]
async fn admin_routes_require_a_token() {
    let (status, _, body) = send(get("/api/admin/dashboard")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");
}

#[rstest]
#[case(Method::GET, "/api/admin/dashboard")]
#[case(Method::GET, "/api/admin/orders")]
#[case(Method::POST, "/api/admin/products")]
#[case(Method::DELETE, "/api/admin/categories/00000000-0000-0000-0000-000000000001")]
#[case(Method::POST, "/api/admin/users")]
#[case(Method::PUT, "/api/admin/users/00000000-0000-0000-0000-000000000001")]
#[case(Method::DELETE, "/api/admin/users/00000000-0000-0000-0000-000000000001")]
#[tokio::test]
async fn customer_tokens_are_rejected_on_admin_routes(#[case] method: Method, #[case] uri: &str) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", customer_token()),
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customer_cookie_is_rejected_on_admin_routes() {
    let request = Request::builder()
        .uri("/api/admin/users")
        .header(header::COOKIE, format!("token={}", customer_token()))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_and_forged_tokens_are_rejected() {
    let stale = TokenService::new("test-secret", Duration::hours(-1), Duration::hours(0), false);
    let foreign = TokenService::new("other-secret", Duration::hours(1), Duration::hours(0), false);
    let expired = stale.issue(Uuid::new_v4(), "a@b.c", Role::Admin).unwrap();
    let forged = foreign.issue(Uuid::new_v4(), "a@b.c", Role::Admin).unwrap();
    for token in [expired, forged, "garbage".to_string()] {
        let request = Request::builder()
            .uri("/api/admin/dashboard")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[rstest]
#[case("/api/cart")]
#[case("/api/wishlist")]
#[case("/api/orders")]
#[case("/api/auth/me")]
#[case("/api/user/profile")]
#[tokio::test]
async fn customer_routes_require_a_token(#[case] uri: &str) {
    let (status, _, _) = send(get(uri)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[case("/api/shop/products?limit=0")]
#[case("/api/shop/products?limit=101")]
#[case("/api/shop/products?page=0")]
#[case("/api/shop/products?page=abc")]
#[case("/api/shop/products?sort=rating")]
#[case("/api/shop/products?order=sideways")]
#[case("/api/shop/products?page=9223372036854775807&limit=100")]
#[case("/api/shop/products/bestsellers?limit=0")]
#[tokio::test]
async fn invalid_catalog_queries_are_bad_requests(#[case] uri: &str) {
    let (status, _, body) = send(get(uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["error"].is_string());
}

#[rstest]
#[case("/api/shop/products/not-a-uuid")]
#[case("/api/shop/products/not-a-uuid/reviews")]
#[tokio::test]
async fn malformed_ids_use_the_error_envelope(#[case] uri: &str) {
    let (status, _, body) = send(get(uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
    assert_eq!(body["data"]["error"], body["message"]);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();
    let (status, _, _) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(request).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let (status, _, body) = send(get("/api/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route /api/nowhere not found");
}

#[tokio::test]
async fn health_is_public() {
    let (status, _, body) = send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}
