use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};
use shared_utils::validation::{validate_email, validate_length};

use crate::models::{
    ApplicationListQuery, ApplicationStatus, DoctorApplication, DoctorError, ReviewApplicationRequest,
    ReviewDecision, ReviewOutcome, SubmitApplicationRequest,
};
use crate::services::doctor::{validate_years, DoctorService};

/// Doctor-role requests submitted by patients and reviewed by admins.
pub struct DoctorApplicationService {
    supabase: SupabaseClient,
    doctors: DoctorService,
}

impl DoctorApplicationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    pub fn validate_submission(request: &SubmitApplicationRequest) -> Result<(), DoctorError> {
        if !validate_length(&request.full_name, 1, 200) {
            return Err(DoctorError::ValidationError("Full name is required".to_string()));
        }
        if !validate_email(request.email.trim()) {
            return Err(DoctorError::ValidationError("Invalid email address".to_string()));
        }
        if !validate_length(&request.specialty, 1, 100) {
            return Err(DoctorError::ValidationError("Specialty is required".to_string()));
        }
        if !validate_length(&request.license_number, 1, 64) {
            return Err(DoctorError::ValidationError("License number is required".to_string()));
        }
        validate_years(request.years_experience)?;
        if request.document_urls.iter().any(|url| !url.starts_with("https://")) {
            return Err(DoctorError::ValidationError("Document links must use https".to_string()));
        }
        Ok(())
    }

    async fn fetch_application(&self, application_id: Uuid, auth_token: &str) -> Result<DoctorApplication, DoctorError> {
        let path = format!("/rest/v1/doctor_applications?id=eq.{}", application_id);
        let result: Vec<DoctorApplication> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(DoctorError::ApplicationNotFound)
    }

    async fn update_application(
        &self,
        application_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<DoctorApplication, DoctorError> {
        // Guard on status so a concurrent review cannot overwrite a closed application.
        let path = format!(
            "/rest/v1/doctor_applications?id=eq.{}&status=eq.pending",
            application_id
        );
        let result: Vec<DoctorApplication> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(DoctorError::StaleApplication)
    }

    pub async fn submit(
        &self,
        user: &User,
        request: SubmitApplicationRequest,
        auth_token: &str,
    ) -> Result<DoctorApplication, DoctorError> {
        match user.role_kind() {
            Role::Patient => {}
            Role::Doctor => return Err(DoctorError::AlreadyDoctor),
            Role::Admin => {
                return Err(DoctorError::Unauthorized("administrators cannot apply for the doctor role".to_string()))
            }
        }
        Self::validate_submission(&request)?;

        // Covers accounts promoted after their token was issued.
        if self.doctors.find_doctor(&user.id, Some(auth_token)).await?.is_some() {
            return Err(DoctorError::AlreadyDoctor);
        }

        let pending_path = format!(
            "/rest/v1/doctor_applications?user_id=eq.{}&status=eq.pending&select=id",
            user.id
        );
        let pending: Vec<Value> = self.supabase.request(
            Method::GET,
            &pending_path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if !pending.is_empty() {
            return Err(DoctorError::PendingApplicationExists);
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "user_id": user.id,
            "full_name": request.full_name.trim(),
            "email": request.email.trim().to_lowercase(),
            "specialty": request.specialty.trim(),
            "license_number": request.license_number.trim(),
            "years_experience": request.years_experience,
            "bio": request.bio,
            "document_urls": request.document_urls,
            "status": ApplicationStatus::Pending,
            "reviewer_id": null,
            "review_notes": null,
            "submitted_at": Utc::now().to_rfc3339(),
            "reviewed_at": null,
        });

        let result: Vec<DoctorApplication> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_applications",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let application = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Application was not stored".to_string()))?;

        info!("Doctor application {} submitted by {}", application.id, user.id);
        Ok(application)
    }

    pub async fn list_mine(&self, user: &User, auth_token: &str) -> Result<Vec<DoctorApplication>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_applications?user_id=eq.{}&order=submitted_at.desc",
            user.id
        );
        self.supabase.request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    pub async fn list_all(
        &self,
        user: &User,
        query: &ApplicationListQuery,
        auth_token: &str,
    ) -> Result<Vec<DoctorApplication>, DoctorError> {
        if !user.is_admin() {
            return Err(DoctorError::Unauthorized("only administrators can list applications".to_string()));
        }

        let mut parts = Vec::new();
        if let Some(status) = query.status {
            parts.push(format!("status=eq.{}", status));
        }
        parts.push("order=submitted_at.asc".to_string());
        parts.push(format!("limit={}", query.limit.unwrap_or(50).clamp(1, 100)));
        parts.push(format!("offset={}", query.offset.unwrap_or(0).max(0)));

        let path = format!("/rest/v1/doctor_applications?{}", parts.join("&"));
        self.supabase.request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    pub async fn get(&self, user: &User, application_id: Uuid, auth_token: &str) -> Result<DoctorApplication, DoctorError> {
        let application = self.fetch_application(application_id, auth_token).await?;

        if application.user_id.to_string() != user.id && !user.is_admin() {
            return Err(DoctorError::Unauthorized("not your application".to_string()));
        }

        Ok(application)
    }

    pub async fn review(
        &self,
        reviewer: &User,
        application_id: Uuid,
        request: ReviewApplicationRequest,
        auth_token: &str,
    ) -> Result<ReviewOutcome, DoctorError> {
        if !reviewer.is_admin() {
            return Err(DoctorError::Unauthorized("only administrators can review applications".to_string()));
        }

        let current = self.fetch_application(application_id, auth_token).await?;

        let next = match request.decision {
            ReviewDecision::Approve => ApplicationStatus::Approved,
            ReviewDecision::Reject => ApplicationStatus::Rejected,
        };
        if !current.status.can_transition_to(next) {
            return Err(DoctorError::ApplicationClosed { status: current.status });
        }

        let notes = request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if next == ApplicationStatus::Rejected && notes.is_none() {
            return Err(DoctorError::ValidationError("A rejection must include review notes".to_string()));
        }

        // The account is made a doctor before the application closes, so a
        // failure here leaves it pending and the review can be retried.
        let doctor = if next == ApplicationStatus::Approved {
            let doctor = match self.doctors.find_doctor(&current.user_id.to_string(), Some(auth_token)).await? {
                Some(existing) => {
                    debug!("Doctor row for {} already exists, reusing it", current.user_id);
                    existing
                }
                None => self.doctors.create_from_application(&current, auth_token).await?,
            };
            self.promote_account(current.user_id, auth_token).await?;
            Some(doctor)
        } else {
            None
        };

        let application = self.update_application(
            application_id,
            json!({
                "status": next,
                "reviewer_id": reviewer.id,
                "review_notes": notes,
                "reviewed_at": Utc::now().to_rfc3339(),
            }),
            auth_token,
        ).await?;

        info!(
            "Application {} {} by admin {}",
            application.id, application.status, reviewer.id
        );

        Ok(ReviewOutcome { application, doctor })
    }

    pub async fn withdraw(&self, user: &User, application_id: Uuid, auth_token: &str) -> Result<DoctorApplication, DoctorError> {
        let current = self.fetch_application(application_id, auth_token).await?;

        if current.user_id.to_string() != user.id {
            return Err(DoctorError::Unauthorized("only the applicant can withdraw".to_string()));
        }
        if !current.status.can_transition_to(ApplicationStatus::Withdrawn) {
            return Err(DoctorError::ApplicationClosed { status: current.status });
        }

        debug!("Withdrawing application {}", application_id);
        self.update_application(
            application_id,
            json!({ "status": ApplicationStatus::Withdrawn }),
            auth_token,
        ).await
    }

    async fn promote_account(&self, user_id: Uuid, auth_token: &str) -> Result<(), DoctorError> {
        let path = format!("/rest/v1/profiles?id=eq.{}", user_id);
        let updated: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "role": Role::Doctor })),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            warn!("No account profile found to promote for user {}", user_id);
        }

        // Tokens carry the role from app_metadata, not from profiles.
        self.supabase
            .update_app_metadata(&user_id.to_string(), json!({ "role": Role::Doctor }))
            .await
            .map_err(|e| DoctorError::DatabaseError(format!("promoting auth user: {}", e)))?;

        info!("Account {} promoted to doctor", user_id);
        Ok(())
    }
}
