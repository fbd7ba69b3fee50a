use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::validate_length;

use crate::models::{Doctor, DoctorApplication, DoctorError, DoctorSearchQuery, UpdateDoctorRequest};

const DEFAULT_PAGE_SIZE: i32 = 20;
const MAX_PAGE_SIZE: i32 = 100;

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Public search defaults to verified doctors only.
    pub fn build_search_path(query: &DoctorSearchQuery) -> String {
        let mut parts = vec!["select=*".to_string()];

        if query.verified_only.unwrap_or(true) {
            parts.push("is_verified=eq.true".to_string());
        }
        if query.available_only.unwrap_or(false) {
            parts.push("is_available=eq.true".to_string());
        }
        if let Some(specialty) = &query.specialty {
            parts.push(format!("specialty=ilike.*{}*", urlencoding::encode(specialty.trim())));
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);
        parts.push("order=rating.desc".to_string());
        parts.push(format!("limit={}", limit));
        parts.push(format!("offset={}", offset));

        format!("/rest/v1/doctors?{}", parts.join("&"))
    }

    pub async fn search_doctors(
        &self,
        query: &DoctorSearchQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Searching doctors: {:?}", query);

        self.supabase.request(
            Method::GET,
            &Self::build_search_path(query),
            auth_token,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Doctor, DoctorError> {
        self.find_doctor(&doctor_id.to_string(), auth_token)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    /// Doctor rows share the account id, so this also answers "is this
    /// account a doctor".
    pub async fn find_doctor(&self, doctor_id: &str, auth_token: Option<&str>) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    async fn patch_doctor(
        &self,
        doctor_id: Uuid,
        update: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    pub async fn update_doctor(
        &self,
        user: &User,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        if user.id != doctor_id.to_string() && !user.is_admin() {
            return Err(DoctorError::Unauthorized("only the doctor or an admin may edit this profile".to_string()));
        }

        let mut update = Map::new();
        if let Some(full_name) = request.full_name {
            if !validate_length(&full_name, 1, 200) {
                return Err(DoctorError::ValidationError("Full name cannot be empty".to_string()));
            }
            update.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(specialty) = request.specialty {
            if !validate_length(&specialty, 1, 100) {
                return Err(DoctorError::ValidationError("Specialty cannot be empty".to_string()));
            }
            update.insert("specialty".to_string(), json!(specialty.trim()));
        }
        if let Some(years) = request.years_experience {
            validate_years(years)?;
            update.insert("years_experience".to_string(), json!(years));
        }
        if let Some(bio) = request.bio {
            update.insert("bio".to_string(), json!(bio));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        debug!("Updating doctor profile {}", doctor_id);
        self.patch_doctor(doctor_id, update, auth_token).await
    }

    pub async fn set_availability(
        &self,
        user: &User,
        doctor_id: Uuid,
        is_available: bool,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        if user.id != doctor_id.to_string() {
            return Err(DoctorError::Unauthorized("doctors can only change their own availability".to_string()));
        }

        let mut update = Map::new();
        update.insert("is_available".to_string(), json!(is_available));
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        info!("Doctor {} availability -> {}", doctor_id, is_available);
        self.patch_doctor(doctor_id, update, auth_token).await
    }

    pub async fn verify_doctor(
        &self,
        user: &User,
        doctor_id: Uuid,
        is_verified: bool,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        if !user.is_admin() {
            return Err(DoctorError::Unauthorized("only administrators can verify doctors".to_string()));
        }

        let mut update = Map::new();
        update.insert("is_verified".to_string(), json!(is_verified));
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        info!("Doctor {} verification -> {} by {}", doctor_id, is_verified, user.id);
        self.patch_doctor(doctor_id, update, auth_token).await
    }

    /// Creates the doctor row for an approved application.
    pub async fn create_from_application(
        &self,
        application: &DoctorApplication,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "id": application.user_id,
            "full_name": application.full_name,
            "email": application.email,
            "specialty": application.specialty,
            "license_number": application.license_number,
            "years_experience": application.years_experience,
            "bio": application.bio,
            "is_verified": true,
            "is_available": true,
            "rating": 0.0,
            "total_consultations": 0,
            "created_at": now,
            "updated_at": now,
        });

        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| {
            let message = e.to_string();
            // Unique license or id violations come back as 409.
            if message.starts_with("Conflict") {
                DoctorError::DoctorConflict(message)
            } else {
                DoctorError::DatabaseError(message)
            }
        })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Doctor row was not returned".to_string()))
    }
}

pub(crate) fn validate_years(years: i32) -> Result<(), DoctorError> {
    if !(0..=70).contains(&years) {
        return Err(DoctorError::ValidationError(
            "Years of experience must be between 0 and 70".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_defaults_to_verified() {
        let path = DoctorService::build_search_path(&DoctorSearchQuery::default());
        assert!(path.contains("is_verified=eq.true"));
        assert!(!path.contains("is_available"));
        assert!(path.contains("limit=20"));
    }

    #[test]
    fn search_filters() {
        let query = DoctorSearchQuery {
            specialty: Some("cardio".to_string()),
            available_only: Some(true),
            verified_only: Some(false),
            limit: Some(0),
            offset: None,
        };
        let path = DoctorService::build_search_path(&query);
        assert!(!path.contains("is_verified"));
        assert!(path.contains("is_available=eq.true"));
        assert!(path.contains("specialty=ilike.*cardio*"));
        assert!(path.contains("limit=1"));
    }

    #[test]
    fn years_bounds() {
        assert!(validate_years(0).is_ok());
        assert!(validate_years(70).is_ok());
        assert!(validate_years(-1).is_err());
        assert!(validate_years(71).is_err());
    }
}
