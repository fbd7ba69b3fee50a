use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::{DoctorError, DoctorService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};
use shared_utils::validation::validate_length;

use crate::models::{
    Consultation, ConsultationError, ConsultationListQuery, ConsultationStatus,
    CreateConsultationRequest, Participant, UpdateNotesRequest, UpdateStatusRequest,
};
use crate::services::lifecycle::ConsultationLifecycle;

const MAX_SYMPTOMS: usize = 30;
const DEFAULT_PAGE_SIZE: i32 = 50;

pub struct ConsultationService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    lifecycle: ConsultationLifecycle,
}

impl ConsultationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            lifecycle: ConsultationLifecycle::new(),
        }
    }

    pub fn lifecycle(&self) -> &ConsultationLifecycle {
        &self.lifecycle
    }

    pub fn validate_request(request: &CreateConsultationRequest) -> Result<(), ConsultationError> {
        if let Some(reason) = &request.reason {
            if !validate_length(reason, 1, 1000) {
                return Err(ConsultationError::ValidationError(
                    "Reason must be between 1 and 1000 characters".to_string(),
                ));
            }
        }
        if request.symptoms.len() > MAX_SYMPTOMS {
            return Err(ConsultationError::ValidationError(format!(
                "At most {} symptoms may be listed",
                MAX_SYMPTOMS
            )));
        }
        if let Some(scheduled_at) = request.scheduled_at {
            if scheduled_at <= Utc::now() {
                return Err(ConsultationError::ValidationError(
                    "Scheduled time must be in the future".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn build_list_path(user: &User, query: &ConsultationListQuery) -> String {
        let mut parts = vec![format!("or=(patient_id.eq.{0},doctor_id.eq.{0})", user.id)];
        if let Some(status) = query.status {
            parts.push(format!("status=eq.{}", status));
        }
        parts.push("order=created_at.desc".to_string());
        parts.push(format!("limit={}", query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100)));
        parts.push(format!("offset={}", query.offset.unwrap_or(0).max(0)));

        format!("/rest/v1/consultations?{}", parts.join("&"))
    }

    pub async fn create_consultation(
        &self,
        user: &User,
        request: CreateConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        if user.role_kind() != Role::Patient {
            return Err(ConsultationError::Unauthorized("only patients can request consultations".to_string()));
        }
        Self::validate_request(&request)?;

        let doctor = self.doctors
            .get_doctor(request.doctor_id, Some(auth_token))
            .await
            .map_err(|e| match e {
                DoctorError::NotFound => ConsultationError::DoctorNotFound,
                other => ConsultationError::DatabaseError(other.to_string()),
            })?;

        if !doctor.accepts_consultations() {
            return Err(ConsultationError::DoctorUnavailable);
        }

        let now = Utc::now().to_rfc3339();
        let symptoms: Vec<String> = request.symptoms.iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let body = json!({
            "id": Uuid::new_v4(),
            "patient_id": user.id,
            "doctor_id": doctor.id,
            "status": ConsultationStatus::Pending,
            "consultation_type": request.consultation_type,
            "reason": request.reason.map(|r| r.trim().to_string()),
            "symptoms": symptoms,
            "scheduled_at": request.scheduled_at.map(|t| t.to_rfc3339()),
            "started_at": null,
            "ended_at": null,
            "doctor_notes": null,
            "diagnosis": null,
            "created_at": now,
            "updated_at": now,
        });

        let result: Vec<Consultation> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/consultations",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        let consultation = result
            .into_iter()
            .next()
            .ok_or_else(|| ConsultationError::DatabaseError("Consultation was not stored".to_string()))?;

        info!(
            "Consultation {} requested by patient {} with doctor {}",
            consultation.id, user.id, consultation.doctor_id
        );
        Ok(consultation)
    }

    /// Loads a consultation without any ownership check.
    pub async fn get_consultation(&self, consultation_id: Uuid, auth_token: &str) -> Result<Consultation, ConsultationError> {
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let result: Vec<Consultation> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(ConsultationError::NotFound)
    }

    pub async fn get_for_user(
        &self,
        user: &User,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.get_consultation(consultation_id, auth_token).await?;

        if consultation.participant(&user.id).is_none() && !user.is_admin() {
            return Err(ConsultationError::Unauthorized("not a participant of this consultation".to_string()));
        }

        Ok(consultation)
    }

    pub async fn list_for_user(
        &self,
        user: &User,
        query: &ConsultationListQuery,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        let path = Self::build_list_path(user, query);
        debug!("Listing consultations for {}", user.id);

        self.supabase.request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))
    }

    pub async fn update_status(
        &self,
        user: &User,
        consultation_id: Uuid,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.get_consultation(consultation_id, auth_token).await?;

        let actor = consultation.participant(&user.id).ok_or_else(|| {
            ConsultationError::Unauthorized("not a participant of this consultation".to_string())
        })?;

        self.lifecycle.validate_transition(consultation.status, request.status)?;

        if !self.lifecycle.can_transition_by(request.status, actor) {
            return Err(ConsultationError::Unauthorized(format!(
                "only the doctor can mark a consultation {}",
                request.status
            )));
        }

        let updated = self.set_status(&consultation, request.status, request.scheduled_at, auth_token).await?;

        info!(
            "Consultation {} moved {} -> {} by {}",
            consultation.id, consultation.status, updated.status, user.id
        );
        Ok(updated)
    }

    /// Applies a lifecycle transition and its timestamps. The write is guarded
    /// on the status the caller read so racing transitions fail cleanly.
    pub async fn set_status(
        &self,
        consultation: &Consultation,
        next: ConsultationStatus,
        scheduled_at: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        self.lifecycle.validate_transition(consultation.status, next)?;

        let now = Utc::now().to_rfc3339();
        let mut update = Map::new();
        update.insert("status".to_string(), json!(next));
        update.insert("updated_at".to_string(), json!(now));

        match next {
            ConsultationStatus::Active => {
                update.insert("started_at".to_string(), json!(now));
            }
            ConsultationStatus::Completed | ConsultationStatus::Cancelled => {
                update.insert("ended_at".to_string(), json!(now));
            }
            _ => {}
        }
        if let Some(at) = scheduled_at {
            update.insert("scheduled_at".to_string(), json!(at.to_rfc3339()));
        }

        let path = format!(
            "/rest/v1/consultations?id=eq.{}&status=eq.{}",
            consultation.id, consultation.status
        );
        let result: Vec<Consultation> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(ConsultationError::StaleConsultation)
    }

    pub async fn update_notes(
        &self,
        user: &User,
        consultation_id: Uuid,
        request: UpdateNotesRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.get_consultation(consultation_id, auth_token).await?;

        if consultation.participant(&user.id) != Some(Participant::Doctor) {
            return Err(ConsultationError::Unauthorized(
                "only the consulting doctor can write notes".to_string(),
            ));
        }
        if consultation.status == ConsultationStatus::Cancelled {
            return Err(ConsultationError::NotesLocked);
        }

        let mut update = Map::new();
        if let Some(notes) = request.doctor_notes {
            update.insert("doctor_notes".to_string(), json!(notes));
        }
        if let Some(diagnosis) = request.diagnosis {
            update.insert("diagnosis".to_string(), json!(diagnosis));
        }
        if update.is_empty() {
            return Err(ConsultationError::ValidationError("Nothing to update".to_string()));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/consultations?id=eq.{}", consultation.id);
        let result: Vec<Consultation> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(ConsultationError::NotFound)
    }
}
