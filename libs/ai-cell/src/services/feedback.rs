use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{AiError, DiagnosisFeedback, FeedbackRequest, TrainingSample};
use crate::services::engine::MAX_SYMPTOMS;
use crate::services::model::normalize_symptom;

/// Doctor-confirmed diagnoses stored as training samples.
pub struct FeedbackService {
    supabase: SupabaseClient,
}

impl FeedbackService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn record_feedback(
        &self,
        user: &User,
        request: FeedbackRequest,
        auth_token: &str,
    ) -> Result<DiagnosisFeedback, AiError> {
        if !user.is_doctor() {
            return Err(AiError::Unauthorized("only doctors can confirm diagnoses".to_string()));
        }

        let symptoms: Vec<String> = request.symptoms.iter()
            .map(|s| normalize_symptom(s))
            .filter(|s| !s.is_empty())
            .collect();
        if symptoms.is_empty() || symptoms.len() > MAX_SYMPTOMS {
            return Err(AiError::ValidationError(format!(
                "Between 1 and {} symptoms are required",
                MAX_SYMPTOMS
            )));
        }
        let condition = normalize_symptom(&request.confirmed_condition);
        if condition.is_empty() {
            return Err(AiError::ValidationError("Confirmed condition is required".to_string()));
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "consultation_id": request.consultation_id,
            "doctor_id": user.id,
            "symptoms": symptoms,
            "condition": condition,
            "confirmed": true,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<DiagnosisFeedback> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/diagnosis_feedback",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| AiError::DatabaseError(e.to_string()))?;

        let feedback = result
            .into_iter()
            .next()
            .ok_or_else(|| AiError::DatabaseError("Feedback was not stored".to_string()))?;

        info!(
            "Diagnosis feedback {} ({}) recorded by doctor {}",
            feedback.id, feedback.condition, user.id
        );
        Ok(feedback)
    }

    pub async fn confirmed_samples(&self, auth_token: Option<&str>) -> Result<Vec<TrainingSample>, AiError> {
        let rows: Vec<TrainingSample> = self.supabase.request(
            Method::GET,
            "/rest/v1/diagnosis_feedback?confirmed=eq.true&select=symptoms,condition",
            auth_token,
            None,
        ).await.map_err(|e| AiError::DatabaseError(e.to_string()))?;

        debug!("Fetched {} confirmed training samples", rows.len());
        Ok(rows)
    }
}
