use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};
use shared_utils::validation::{validate_email, validate_length, validate_phone};

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest,
    BLOOD_TYPES,
};

const DEFAULT_SEARCH_LIMIT: i32 = 50;
const MAX_SEARCH_LIMIT: i32 = 100;

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Patients see themselves; doctors and admins see everyone.
    pub fn can_view(user: &User, patient_id: &str) -> bool {
        user.id == patient_id || matches!(user.role_kind(), Role::Doctor | Role::Admin)
    }

    pub fn can_edit(user: &User, patient_id: &str) -> bool {
        user.id == patient_id || user.is_admin()
    }

    fn validate_optional_fields(
        phone_number: Option<&str>,
        date_of_birth: Option<chrono::NaiveDate>,
        blood_type: Option<&str>,
    ) -> Result<(), PatientError> {
        if let Some(phone) = phone_number {
            if !validate_phone(phone) {
                return Err(PatientError::ValidationError("Invalid phone number".to_string()));
            }
        }
        if let Some(dob) = date_of_birth {
            if dob > Utc::now().date_naive() {
                return Err(PatientError::InvalidDateOfBirth);
            }
        }
        if let Some(blood_type) = blood_type {
            if !BLOOD_TYPES.contains(&blood_type) {
                return Err(PatientError::ValidationError(format!(
                    "Unknown blood type '{}'", blood_type
                )));
            }
        }
        Ok(())
    }

    pub fn validate_create(request: &CreatePatientRequest) -> Result<(), PatientError> {
        if !validate_length(&request.full_name, 1, 200) {
            return Err(PatientError::ValidationError("Full name is required".to_string()));
        }
        if !validate_email(request.email.trim()) {
            return Err(PatientError::ValidationError("Invalid email address".to_string()));
        }
        Self::validate_optional_fields(
            request.phone_number.as_deref(),
            request.date_of_birth,
            request.blood_type.as_deref(),
        )
    }

    async fn fetch_patient(&self, patient_id: &str, auth_token: &str) -> Result<Option<Patient>, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Patient> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    pub async fn create_patient(
        &self,
        user: &User,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Creating patient profile for user {}", user.id);
        Self::validate_create(&request)?;

        if self.fetch_patient(&user.id, auth_token).await?.is_some() {
            return Err(PatientError::ProfileExists);
        }

        let email = request.email.trim().to_lowercase();
        let existing_path = format!(
            "/rest/v1/patients?email=eq.{}&select=id",
            urlencoding::encode(&email)
        );
        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &existing_path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(PatientError::EmailAlreadyExists { email });
        }

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "id": user.id,
            "full_name": request.full_name.trim(),
            "email": email,
            "phone_number": request.phone_number,
            "date_of_birth": request.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            "gender": request.gender,
            "blood_type": request.blood_type,
            "allergies": request.allergies,
            "chronic_conditions": request.chronic_conditions,
            "current_medications": request.current_medications,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Patient> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(auth_token),
            Some(patient_data),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let patient = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create patient profile".to_string()))?;

        info!("Patient profile created with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        user: &User,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let patient_id = patient_id.to_string();
        if !Self::can_view(user, &patient_id) {
            return Err(PatientError::Unauthorized);
        }

        self.fetch_patient(&patient_id, auth_token)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn get_own_profile(&self, user: &User, auth_token: &str) -> Result<Patient, PatientError> {
        self.fetch_patient(&user.id, auth_token)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub fn build_update(request: &UpdatePatientRequest) -> Result<Map<String, Value>, PatientError> {
        Self::validate_optional_fields(
            request.phone_number.as_deref(),
            request.date_of_birth,
            request.blood_type.as_deref(),
        )?;

        let mut update_data = Map::new();

        if let Some(full_name) = &request.full_name {
            if !validate_length(full_name, 1, 200) {
                return Err(PatientError::ValidationError("Full name cannot be empty".to_string()));
            }
            update_data.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(phone_number) = &request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }
        if let Some(dob) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(dob.format("%Y-%m-%d").to_string()));
        }
        if let Some(gender) = &request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(blood_type) = &request.blood_type {
            update_data.insert("blood_type".to_string(), json!(blood_type));
        }
        if let Some(allergies) = &request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(conditions) = &request.chronic_conditions {
            update_data.insert("chronic_conditions".to_string(), json!(conditions));
        }
        if let Some(medications) = &request.current_medications {
            update_data.insert("current_medications".to_string(), json!(medications));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        Ok(update_data)
    }

    pub async fn update_patient(
        &self,
        user: &User,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let patient_id = patient_id.to_string();
        debug!("Updating patient profile: {}", patient_id);

        if !Self::can_edit(user, &patient_id) {
            return Err(PatientError::Unauthorized);
        }

        let update_data = Self::build_update(&request)?;

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Patient> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(PatientError::NotFound)
    }

    pub fn build_search_path(query: &PatientSearchQuery) -> String {
        let mut query_parts = vec!["select=*".to_string()];

        if let Some(name) = &query.name {
            query_parts.push(format!("full_name=ilike.*{}*", urlencoding::encode(name.trim())));
        }
        if let Some(email) = &query.email {
            query_parts.push(format!("email=ilike.*{}*", urlencoding::encode(email.trim())));
        }
        if let Some(phone) = &query.phone {
            query_parts.push(format!("phone_number=ilike.*{}*", urlencoding::encode(phone.trim())));
        }

        let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);
        query_parts.push("order=full_name.asc".to_string());
        query_parts.push(format!("limit={}", limit));
        query_parts.push(format!("offset={}", offset));

        format!("/rest/v1/patients?{}", query_parts.join("&"))
    }

    pub async fn search_patients(
        &self,
        user: &User,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        if !matches!(user.role_kind(), Role::Doctor | Role::Admin) {
            return Err(PatientError::Unauthorized);
        }
        debug!("Searching patients with query: {:?}", query);

        self.supabase.request(
            Method::GET,
            &Self::build_search_path(&query),
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}
