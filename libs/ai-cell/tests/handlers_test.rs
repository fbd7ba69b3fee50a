use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ai_cell::{ai_routes, DiagnosisEngine};
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn enabled_app(config: &AppConfig) -> Router {
    let engine = Arc::new(DiagnosisEngine::new(&config.ai_model_path));
    ai_routes(Arc::new(config.clone()), Some(engine))
}

fn bearer(user: &TestUser, config: &AppConfig) -> String {
    format!("Bearer {}", JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, None))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn post_json(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// ==============================================================================
// DISABLED STUB
// ==============================================================================

#[tokio::test]
async fn test_disabled_diagnose_returns_stub() {
    let config = TestConfig::default().to_arc();
    let app = ai_routes(config, None);

    let (status, json) = send(app, post_json("/diagnose", None, json!({"symptoms": ["fever"]}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "AI diagnosis service is currently unavailable");
    assert_eq!(json["code"], "AI_DISABLED");
    assert_eq!(json["available"], false);
}

#[tokio::test]
async fn test_disabled_stub_covers_unknown_paths() {
    let app = ai_routes(TestConfig::default().to_arc(), None);

    let (status, json) = send(
        app,
        Request::builder().uri("/anything/else").body(Body::empty()).unwrap(),
    ).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "AI_DISABLED");
}

#[tokio::test]
async fn test_disabled_status_reports_disabled() {
    let app = ai_routes(TestConfig::default().to_arc(), None);

    let (status, json) = send(app, Request::builder().uri("/status").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"enabled": false, "status": "disabled"}));
}

#[tokio::test]
async fn test_flag_wins_over_supplied_engine() {
    let config = TestConfig::default().to_app_config();
    let engine = Arc::new(DiagnosisEngine::new(&config.ai_model_path));
    let app = ai_routes(Arc::new(config), Some(engine));

    let (status, _) = send(app, Request::builder().uri("/symptoms").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ==============================================================================
// ENABLED PIPELINE
// ==============================================================================

#[tokio::test]
async fn test_enabled_status_and_symptoms() {
    let config = TestConfig::with_ai_enabled().to_app_config();

    let (status, json) = send(
        enabled_app(&config),
        Request::builder().uri("/status").body(Body::empty()).unwrap(),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enabled"], true);
    assert_eq!(json["status"], "ready");

    let (status, json) = send(
        enabled_app(&config),
        Request::builder().uri("/symptoms").body(Body::empty()).unwrap(),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["symptoms"].as_array().unwrap().contains(&json!("fever")));
}

#[tokio::test]
async fn test_diagnose_requires_token() {
    let config = TestConfig::with_ai_enabled().to_app_config();

    let (status, _) = send(
        enabled_app(&config),
        post_json("/diagnose", None, json!({"symptoms": ["fever"]})),
    ).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_diagnose_returns_ranked_conditions() {
    let config = TestConfig::with_ai_enabled().to_app_config();
    let patient = TestUser::patient("p@example.com");

    let (status, json) = send(
        enabled_app(&config),
        post_json(
            "/diagnose",
            Some(&bearer(&patient, &config)),
            json!({"symptoms": ["Painful urination", "frequent urination"], "top_k": 2}),
        ),
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["predictions"].as_array().unwrap().len(), 2);
    assert_eq!(json["predictions"][0]["condition"], "urinary_tract_infection");
    assert!(json["disclaimer"].as_str().unwrap().contains("not a medical diagnosis"));
}

#[tokio::test]
async fn test_diagnose_rejects_unknown_only() {
    let config = TestConfig::with_ai_enabled().to_app_config();
    let patient = TestUser::patient("p@example.com");

    let (status, _) = send(
        enabled_app(&config),
        post_json("/diagnose", Some(&bearer(&patient, &config)), json!({"symptoms": ["blue hair"]})),
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback_is_doctor_only() {
    let config = TestConfig::with_ai_enabled().to_app_config();
    let patient = TestUser::patient("p@example.com");

    let (status, _) = send(
        enabled_app(&config),
        post_json(
            "/feedback",
            Some(&bearer(&patient, &config)),
            json!({"consultation_id": Uuid::new_v4(), "symptoms": ["fever"], "confirmed_condition": "influenza"}),
        ),
    ).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_doctor_records_feedback() {
    let server = MockServer::start().await;
    let mut config = TestConfig::with_ai_enabled().to_app_config();
    config.supabase_url = server.uri();
    let doctor = TestUser::doctor("d@example.com");
    let consultation_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/diagnosis_feedback"))
        .and(body_partial_json(json!({
            "doctor_id": doctor.id,
            "symptoms": ["sore_throat", "fever"],
            "condition": "strep_throat",
            "confirmed": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "consultation_id": consultation_id,
            "doctor_id": doctor.id,
            "symptoms": ["sore_throat", "fever"],
            "condition": "strep_throat",
            "confirmed": true,
            "created_at": "2024-05-01T12:00:00Z"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let (status, json) = send(
        enabled_app(&config),
        post_json(
            "/feedback",
            Some(&bearer(&doctor, &config)),
            json!({
                "consultation_id": consultation_id,
                "symptoms": ["Sore Throat", "fever"],
                "confirmed_condition": "Strep Throat"
            }),
        ),
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["condition"], "strep_throat");
}

#[tokio::test]
async fn test_retrain_is_admin_only() {
    let config = TestConfig::with_ai_enabled().to_app_config();
    let doctor = TestUser::doctor("d@example.com");

    let (status, _) = send(
        enabled_app(&config),
        post_json("/retrain", Some(&bearer(&doctor, &config)), json!({})),
    ).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_retrain_below_threshold() {
    let server = MockServer::start().await;
    let mut config = TestConfig::with_ai_enabled().to_app_config();
    config.supabase_url = server.uri();
    let admin = TestUser::admin("a@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/diagnosis_feedback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (status, json) = send(
        enabled_app(&config),
        post_json("/retrain", Some(&bearer(&admin, &config)), json!({})),
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["retrained"], false);
    assert_eq!(json["model_version"], 1);
}
