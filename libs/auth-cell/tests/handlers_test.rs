use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::handlers::{validate_token, verify_token};
use auth_cell::router::auth_routes;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_config() -> AppConfig {
    TestConfig::default().to_app_config()
}

fn create_auth_header(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_validate_supabase_token_after_promotion() {
    let config = Arc::new(create_test_config());
    // Signed up as a patient, later promoted through app_metadata.
    let user = TestUser::patient("new-doc@example.com");
    let token = JwtTestUtils::create_supabase_token(&user, &config.supabase_jwt_secret, Some("doctor"));

    let response = validate_token(State(config), create_auth_header(&token)).await.unwrap().0;

    assert!(response.valid);
    assert_eq!(response.role.as_deref(), Some("doctor"));
}

#[tokio::test]
async fn test_validate_token_success() {
    let config = Arc::new(create_test_config());
    let user = TestUser::default();
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let response = validate_token(State(config), create_auth_header(&token)).await.unwrap().0;

    assert!(response.valid);
    assert_eq!(response.user_id, user.id);
    assert_eq!(response.email, Some(user.email));
    assert_eq!(response.role, Some(user.role));
}

#[tokio::test]
async fn test_validate_token_missing_header() {
    let config = Arc::new(create_test_config());

    let result = validate_token(State(config), HeaderMap::new()).await;

    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Missing authorization header"),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validate_token_expired() {
    let config = Arc::new(create_test_config());
    let token = JwtTestUtils::create_expired_token(&TestUser::default(), &config.supabase_jwt_secret);

    let result = validate_token(State(config), create_auth_header(&token)).await;

    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Token expired"),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_verify_token_never_errors() {
    let config = Arc::new(create_test_config());
    let good = JwtTestUtils::create_test_token(&TestUser::default(), &config.supabase_jwt_secret, None);

    let ok = verify_token(State(config.clone()), create_auth_header(&good)).await.unwrap().0;
    assert_eq!(ok["valid"], true);

    let bad = verify_token(State(config.clone()), create_auth_header("garbage")).await.unwrap().0;
    assert_eq!(bad["valid"], false);

    let missing = verify_token(State(config), HeaderMap::new()).await.unwrap().0;
    assert_eq!(missing["valid"], false);
}

#[tokio::test]
async fn test_profile_requires_authentication() {
    let app = auth_routes(Arc::new(create_test_config()));

    let response = app
        .oneshot(Request::builder().uri("/profile").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_includes_role_record() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config();
    config.supabase_url = mock_server.uri();

    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, None);

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": doctor.id, "email": doctor.email})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::account_profile_response(&doctor.id, "doctor")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor.id)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = auth_routes(Arc::new(config));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user_id"], doctor.id);
    assert_eq!(json["account"]["role"], "doctor");
    assert_eq!(json["role_profile"]["specialty"], "General Practice");
}

#[tokio::test]
async fn test_register_creates_patient_account() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config();
    config.supabase_url = mock_server.uri();

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 3600,
            "user": {"id": "3f1c6a9e-1111-4a4a-9b9b-000000000001", "email": "new@example.com"}
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::account_profile_response("3f1c6a9e-1111-4a4a-9b9b-000000000001", "patient")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = auth_routes(Arc::new(config));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({
                    "email": "New@Example.com",
                    "password": "correct-horse",
                    "full_name": "New Patient"
                }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["email"], "new@example.com");
    assert_eq!(json["role"], "patient");
    assert_eq!(json["confirmation_required"], false);
    assert_eq!(json["session"]["access_token"], "new-access");
}

#[tokio::test]
async fn test_register_rejects_doctor_role() {
    let app = auth_routes(Arc::new(create_test_config()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({
                    "email": "doc@example.com",
                    "password": "correct-horse",
                    "full_name": "Self Promoted",
                    "role": "doctor"
                }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_bad_credentials() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config();
    config.supabase_url = mock_server.uri();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            MockSupabaseResponses::error_response("Invalid login credentials", "invalid_grant"),
        ))
        .mount(&mock_server)
        .await;

    let app = auth_routes(Arc::new(config));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header("content-type", "application/json")
                .body(Body::from(json!({"email": "a@b.io", "password": "nope-nope"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_reads_role_from_app_metadata() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config();
    config.supabase_url = mock_server.uri();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc",
            "refresh_token": "def",
            "expires_in": 3600,
            "user": {
                "id": "u-1",
                "email": "doc@example.com",
                "app_metadata": {"provider": "email", "role": "doctor"},
                "user_metadata": {"full_name": "Dr. Test"}
            }
        })))
        .mount(&mock_server)
        .await;

    let app = auth_routes(Arc::new(config));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header("content-type", "application/json")
                .body(Body::from(json!({"email": "doc@example.com", "password": "secret-pass"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["role"], "doctor");
    assert_eq!(json["access_token"], "abc");
}
