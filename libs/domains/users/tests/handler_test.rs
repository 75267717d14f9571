//! Handler tests for the Users domain
//!
//! Drive the users router directly (no `/api` prefix, no app layers) over the
//! in-memory repositories:
//! - request validation and status codes
//! - response bodies (never carrying a password)
//! - identity-dependent routes behind the JWT middleware

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum_helpers::{JwtConfig, JwtVerifier, identity_middleware};
use database::repository::MemoryRepository;
use domain_users::models::{ListUsersResponse, ResetTokenResponse};
use domain_users::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt; // For oneshot()

const SECRET: &str = "handler-test-secret-with-at-least-32-chars";

fn app() -> Router {
    let service = UserService::new(MemoryRepository::new(), MemoryRepository::new());
    handlers::router(service)
}

fn verifier() -> JwtVerifier {
    JwtVerifier::new(&JwtConfig::new(SECRET).unwrap())
}

fn authenticated_app() -> Router {
    app().layer(from_fn_with_state(verifier(), identity_middleware))
}

fn bearer(user_id: &str) -> String {
    format!("Bearer {}", verifier().issue_token(user_id, 300).unwrap())
}

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create(app: &Router, body: Value) -> UserResponse {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response.into_body()).await
}

#[tokio::test]
async fn test_create_user_returns_201_without_password() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/",
            json!({"email": "a@b.com", "password": "secret1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["active"], false);
    assert_eq!(body["roles"], json!(["user"]));
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_create_user_validates_input() {
    let app = app();
    for body in [
        json!({"email": "not-an-email", "password": "secret1"}),
        json!({"email": "a@b.com", "password": "abc"}),
        json!({"email": "a@b.com"}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn test_create_duplicate_email_returns_400() {
    let app = app();
    create(&app, json!({"email": "a@b.com", "password": "secret1"})).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            json!({"email": "a@b.com", "password": "secret2"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_registration_scenario() {
    let app = app();
    let user = create(
        &app,
        json!({"email": "a@b.com", "password": "secret1", "token": "scenario-token"}),
    )
    .await;
    assert!(!user.active);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/find",
            json!({"email": "a@b.com", "password": "secret1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let found: UserResponse = json_body(response.into_body()).await;
    assert_eq!(found.email, "a@b.com");

    let response = app
        .clone()
        .oneshot(get("/verify?token=scenario-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/{}", user.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: UserResponse = json_body(response.into_body()).await;
    assert!(fetched.active);

    let response = app
        .oneshot(get("/verify?token=scenario-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_find_wrong_password_is_404() {
    let app = app();
    create(&app, json!({"email": "a@b.com", "password": "secret1"})).await;

    for body in [
        json!({"email": "a@b.com", "password": "wrong-pass"}),
        json!({"email": "nobody@b.com", "password": "secret1"}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/find", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_find_by_email() {
    let app = app();
    create(&app, json!({"email": "a@b.com", "external_id": "gh|7"})).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/find/email", json!({"email": "a@b.com"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user: UserResponse = json_body(response.into_body()).await;
    assert_eq!(user.external_id.as_deref(), Some("gh|7"));

    let response = app
        .oneshot(json_request("POST", "/find/email", json!({"email": "x@b.com"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_user_errors() {
    let app = app();
    let response = app.clone().oneshot(get("/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get("/0190c8a4-7e1b-7000-8000-000000000001"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_verify_requires_token() {
    let response = app().oneshot(get("/verify")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_user() {
    let app = app();
    let user = create(&app, json!({"email": "a@b.com", "password": "secret1"})).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/{}", user.id),
            json!({"roles": ["admin"], "organizations": ["acme"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: UserResponse = json_body(response.into_body()).await;
    assert_eq!(updated.roles, vec!["admin".to_string()]);
    assert_eq!(updated.organizations, vec!["acme".to_string()]);
    assert_eq!(updated.email, "a@b.com");

    let response = app
        .oneshot(json_request(
            "PUT",
            "/0190c8a4-7e1b-7000-8000-000000000001",
            json!({"active": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_me_and_list_need_identity() {
    let app = app();
    let response = app.clone().oneshot(get("/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_me_and_list_with_identity() {
    let app = authenticated_app();
    let user = create(
        &app,
        json!({"email": "a@b.com", "password": "secret1", "token": "t-1"}),
    )
    .await;
    let auth = bearer(&user.id);

    let request = Request::builder()
        .uri("/me")
        .header("authorization", &auth)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me: UserResponse = json_body(response.into_body()).await;
    assert_eq!(me.id, user.id);

    let list = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header("authorization", &auth)
            .body(Body::empty())
            .unwrap()
    };

    // Nobody is active yet
    let response = app.clone().oneshot(list("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.clone().oneshot(get("/verify?token=t-1")).await.unwrap();

    let response = app
        .clone()
        .oneshot(list("/?order=email&sorting=asc&limit=10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page: ListUsersResponse = json_body(response.into_body()).await;
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.limit, 10);
    assert_eq!(page.offset, 0);

    let response = app.oneshot(list("/?offset=3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_verification_token() {
    let app = app();
    create(
        &app,
        json!({"email": "a@b.com", "password": "secret1", "token": "old-token"}),
    )
    .await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/verification/reset",
            json!({"email": "a@b.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reset: ResetTokenResponse = json_body(response.into_body()).await;
    assert_eq!(reset.email, "a@b.com");
    assert_ne!(reset.token, "old-token");

    let response = app
        .clone()
        .oneshot(get("/verify?token=old-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/verify?token={}", reset.token);
    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "POST",
            "/verification/reset",
            json!({"email": "a@b.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forgot_password_is_silent_for_unknown_email() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/password/forgot",
            json!({"email": "nobody@b.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_update_rejects_bad_token() {
    let app = app();
    create(&app, json!({"email": "a@b.com", "password": "secret1"})).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/password/forgot",
            json!({"email": "a@b.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/password/forgot",
            json!({"email": "a@b.com", "token": "guess", "password": "newsecret"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/password/forgot",
            json!({"email": "x@b.com", "token": "guess", "password": "newsecret"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The old password still works
    let response = app
        .oneshot(json_request(
            "POST",
            "/find",
            json!({"email": "a@b.com", "password": "secret1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
