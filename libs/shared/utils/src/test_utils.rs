use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub service_role_key: String,
    pub ai_disabled: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            service_role_key: "test-service-role-key".to_string(),
            ai_disabled: true,
        }
    }
}

impl TestConfig {
    pub fn with_ai_enabled() -> Self {
        Self {
            ai_disabled: false,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: self.service_role_key.clone(),
            ai_disabled: self.ai_disabled,
            ai_model_path: std::env::temp_dir()
                .join(format!("symptom_model_{}.json", Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
            ai_retrain_interval_minutes: 60,
            ai_min_training_samples: 2,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap_or_else(|_| Uuid::nil())
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        Self::sign(&payload, secret)
    }

    /// Token shaped the way Supabase Auth issues it: the top-level role is
    /// `authenticated`, `user_metadata` holds whatever the user signed up
    /// with (`user.role`), and `app_metadata.role` is only present once set
    /// through the admin API.
    pub fn create_supabase_token(user: &TestUser, secret: &str, app_role: Option<&str>) -> String {
        let now = Utc::now();
        let mut app_metadata = json!({ "provider": "email", "providers": ["email"] });
        if let Some(role) = app_role {
            app_metadata["role"] = json!(role);
        }

        let payload = json!({
            "aud": "authenticated",
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": app_metadata,
            "user_metadata": { "full_name": "Test User", "role": user.role },
            "iat": now.timestamp(),
            "exp": (now + Duration::hours(1)).timestamp()
        });

        Self::sign(&payload, secret)
    }

    fn sign(payload: &serde_json::Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows shaped like the tables each cell reads.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn account_profile_response(user_id: &str, role: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "email": "test@example.com",
            "full_name": "Test User",
            "role": role,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_response(user_id: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "full_name": "Test Patient",
            "email": "patient@example.com",
            "phone_number": "+353000000",
            "date_of_birth": "1990-01-01",
            "gender": "female",
            "blood_type": null,
            "allergies": [],
            "chronic_conditions": [],
            "current_medications": [],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(user_id: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "full_name": "Dr. Test",
            "email": "doctor@example.com",
            "specialty": "General Practice",
            "license_number": "MD123456",
            "years_experience": 10,
            "bio": "Experienced general practitioner",
            "is_verified": true,
            "is_available": true,
            "rating": 4.5,
            "total_consultations": 12,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn consultation_response(
        consultation_id: &str,
        patient_id: &str,
        doctor_id: &str,
        status: &str,
        consultation_type: &str,
    ) -> serde_json::Value {
        json!({
            "id": consultation_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "status": status,
            "consultation_type": consultation_type,
            "reason": "Persistent headache",
            "symptoms": ["headache", "fatigue"],
            "scheduled_at": "2024-12-25T10:00:00Z",
            "started_at": null,
            "ended_at": null,
            "doctor_notes": null,
            "diagnosis": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn call_response(
        call_id: &str,
        consultation_id: &str,
        caller_id: &str,
        callee_id: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": call_id,
            "consultation_id": consultation_id,
            "caller_id": caller_id,
            "callee_id": callee_id,
            "call_type": "video",
            "status": status,
            "initiated_at": Utc::now().to_rfc3339(),
            "answered_at": null,
            "ended_at": null,
            "duration_seconds": null,
            "end_reason": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
