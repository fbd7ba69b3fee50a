use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use call_cell::router::call_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

struct Fixture {
    server: MockServer,
    config: AppConfig,
    patient: TestUser,
    doctor: TestUser,
    consultation_id: String,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let mut config = TestConfig::default().to_app_config();
        config.supabase_url = server.uri();

        Self {
            server,
            config,
            patient: TestUser::patient("p@example.com"),
            doctor: TestUser::doctor("d@example.com"),
            consultation_id: Uuid::new_v4().to_string(),
        }
    }

    fn app(&self) -> Router {
        call_routes(Arc::new(self.config.clone()))
    }

    fn bearer(&self, user: &TestUser) -> String {
        format!("Bearer {}", JwtTestUtils::create_test_token(user, &self.config.supabase_jwt_secret, None))
    }

    async fn mount_consultation(&self, status: &str, consultation_type: &str) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/consultations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::consultation_response(
                    &self.consultation_id,
                    &self.patient.id,
                    &self.doctor.id,
                    status,
                    consultation_type,
                )
            ])))
            .mount(&self.server)
            .await;
    }

    /// A call from the patient to the doctor, rung `seconds_ago`.
    fn call_row(&self, call_id: &str, status: &str, seconds_ago: i64) -> Value {
        let mut call = MockSupabaseResponses::call_response(
            call_id,
            &self.consultation_id,
            &self.patient.id,
            &self.doctor.id,
            status,
        );
        call["initiated_at"] = json!((Utc::now() - Duration::seconds(seconds_ago)).to_rfc3339());
        call
    }

    async fn mount_call(&self, call_id: &str, status: &str, seconds_ago: i64) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/calls"))
            .and(query_param("id", format!("eq.{}", call_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                self.call_row(call_id, status, seconds_ago)
            ])))
            .mount(&self.server)
            .await;
    }
}

async fn send(app: Router, method: &str, uri: &str, auth: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri).header("Authorization", auth);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_patient_calls_doctor() {
    let fx = Fixture::new().await;
    fx.mount_consultation("scheduled", "video").await;
    let call_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .and(query_param("status", "in.(initiated,active)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/calls"))
        .and(body_partial_json(json!({
            "caller_id": fx.patient.id,
            "callee_id": fx.doctor.id,
            "status": "initiated"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            fx.call_row(&call_id, "initiated", 0)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, json) = send(
        fx.app(),
        "POST",
        "/",
        &fx.bearer(&fx.patient),
        Some(json!({"consultation_id": fx.consultation_id, "call_type": "video"})),
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], call_id);
    assert_eq!(json["callee_id"], fx.doctor.id);
}

#[tokio::test]
async fn test_video_call_refused_in_voice_consultation() {
    let fx = Fixture::new().await;
    fx.mount_consultation("active", "voice").await;

    let (status, json) = send(
        fx.app(),
        "POST",
        "/",
        &fx.bearer(&fx.doctor),
        Some(json!({"consultation_id": fx.consultation_id, "call_type": "video"})),
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("voice consultation"));
}

#[tokio::test]
async fn test_call_requires_open_consultation() {
    let fx = Fixture::new().await;
    fx.mount_consultation("pending", "video").await;

    let (status, _) = send(
        fx.app(),
        "POST",
        "/",
        &fx.bearer(&fx.patient),
        Some(json!({"consultation_id": fx.consultation_id, "call_type": "voice"})),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_outsider_cannot_place_call() {
    let fx = Fixture::new().await;
    fx.mount_consultation("active", "video").await;
    let outsider = TestUser::patient("o@example.com");

    let (status, _) = send(
        fx.app(),
        "POST",
        "/",
        &fx.bearer(&outsider),
        Some(json!({"consultation_id": fx.consultation_id, "call_type": "voice"})),
    ).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_second_call_conflicts_while_one_is_ringing() {
    let fx = Fixture::new().await;
    fx.mount_consultation("active", "video").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .and(query_param("status", "in.(initiated,active)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&Uuid::new_v4().to_string(), "initiated", 5)
        ])))
        .mount(&fx.server)
        .await;

    let (status, _) = send(
        fx.app(),
        "POST",
        "/",
        &fx.bearer(&fx.doctor),
        Some(json!({"consultation_id": fx.consultation_id, "call_type": "voice"})),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_caller_cannot_accept_own_call() {
    let fx = Fixture::new().await;
    let call_id = Uuid::new_v4().to_string();
    fx.mount_call(&call_id, "initiated", 5).await;

    let (status, _) = send(fx.app(), "POST", &format!("/{}/accept", call_id), &fx.bearer(&fx.patient), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_accept_starts_scheduled_consultation() {
    let fx = Fixture::new().await;
    let call_id = Uuid::new_v4().to_string();
    fx.mount_call(&call_id, "initiated", 5).await;
    fx.mount_consultation("scheduled", "video").await;

    let mut active = fx.call_row(&call_id, "active", 5);
    active["answered_at"] = json!(Utc::now().to_rfc3339());
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calls"))
        .and(query_param("status", "eq.initiated"))
        .and(body_partial_json(json!({"status": "active"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([active])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("status", "eq.scheduled"))
        .and(body_partial_json(json!({"status": "active"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::consultation_response(
                &fx.consultation_id, &fx.patient.id, &fx.doctor.id, "active", "video"
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, json) = send(fx.app(), "POST", &format!("/{}/accept", call_id), &fx.bearer(&fx.doctor), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "active");
}

#[tokio::test]
async fn test_accept_after_ring_timeout_marks_missed() {
    let fx = Fixture::new().await;
    let call_id = Uuid::new_v4().to_string();
    fx.mount_call(&call_id, "initiated", 90).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calls"))
        .and(body_partial_json(json!({"status": "missed", "end_reason": "timeout"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&call_id, "missed", 90)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, json) = send(fx.app(), "POST", &format!("/{}/accept", call_id), &fx.bearer(&fx.doctor), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("missed"));
}

#[tokio::test]
async fn test_reject_closes_ringing_call() {
    let fx = Fixture::new().await;
    let call_id = Uuid::new_v4().to_string();
    fx.mount_call(&call_id, "initiated", 5).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calls"))
        .and(body_partial_json(json!({"status": "rejected", "end_reason": "rejected"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&call_id, "rejected", 5)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, json) = send(fx.app(), "POST", &format!("/{}/reject", call_id), &fx.bearer(&fx.doctor), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "rejected");
}

#[tokio::test]
async fn test_ending_unanswered_call_is_cancel() {
    let fx = Fixture::new().await;
    let call_id = Uuid::new_v4().to_string();
    fx.mount_call(&call_id, "initiated", 5).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calls"))
        .and(body_partial_json(json!({
            "status": "ended",
            "duration_seconds": 0,
            "end_reason": "cancelled"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&call_id, "ended", 5)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, _) = send(fx.app(), "POST", &format!("/{}/end", call_id), &fx.bearer(&fx.patient), None).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_ended_call_cannot_be_ended_again() {
    let fx = Fixture::new().await;
    let call_id = Uuid::new_v4().to_string();
    fx.mount_call(&call_id, "ended", 300).await;

    let (status, json) = send(
        fx.app(),
        "POST",
        &format!("/{}/end", call_id),
        &fx.bearer(&fx.doctor),
        Some(json!({"reason": "hangup"})),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Call is ended and cannot be ended");
}

#[tokio::test]
async fn test_expire_requires_admin() {
    let fx = Fixture::new().await;

    let (status, _) = send(fx.app(), "POST", "/admin/expire", &fx.bearer(&fx.doctor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calls"))
        .and(query_param("status", "eq.initiated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&Uuid::new_v4().to_string(), "missed", 120),
            fx.call_row(&Uuid::new_v4().to_string(), "missed", 300)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let admin = TestUser::admin("a@example.com");
    let (status, json) = send(fx.app(), "POST", "/admin/expire", &fx.bearer(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["expired"], 2);
}

#[tokio::test]
async fn test_active_call_lookup() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    let (status, json) = send(fx.app(), "GET", "/active", &fx.bearer(&fx.doctor), None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["call"].is_null());
}

#[tokio::test]
async fn test_active_call_skips_rung_out_call() {
    let fx = Fixture::new().await;
    let rung_out = Uuid::new_v4().to_string();
    let connected = Uuid::new_v4().to_string();
    let mut connected_row = fx.call_row(&connected, "active", 300);
    connected_row["answered_at"] = json!((Utc::now() - Duration::seconds(290)).to_rfc3339());

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .and(query_param("status", "in.(initiated,active)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&rung_out, "initiated", 120),
            connected_row
        ])))
        .mount(&fx.server)
        .await;
    let mut missed = fx.call_row(&rung_out, "missed", 120);
    missed["end_reason"] = json!("timeout");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calls"))
        .and(query_param("id", format!("eq.{}", rung_out)))
        .and(query_param("status", "eq.initiated"))
        .and(body_partial_json(json!({"status": "missed", "end_reason": "timeout"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([missed])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, json) = send(fx.app(), "GET", "/active", &fx.bearer(&fx.doctor), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["call"]["id"], connected);
    assert_eq!(json["call"]["status"], "active");
}

#[tokio::test]
async fn test_active_call_is_none_when_only_call_rang_out() {
    let fx = Fixture::new().await;
    let rung_out = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&rung_out, "initiated", 90)
        ])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.call_row(&rung_out, "missed", 90)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, json) = send(fx.app(), "GET", "/active", &fx.bearer(&fx.patient), None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["call"].is_null());
}
