use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use shared_models::error::AppError;

// ==============================================================================
// DOCTOR PROFILE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialty: String,
    pub license_number: String,
    #[serde(default)]
    pub years_experience: i32,
    pub bio: Option<String>,
    pub is_verified: bool,
    pub is_available: bool,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub total_consultations: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    /// Patients can only open consultations with verified, available doctors.
    pub fn accepts_consultations(&self) -> bool {
        self.is_verified && self.is_available
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub years_experience: Option<i32>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationUpdate {
    pub is_verified: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
    pub available_only: Option<bool>,
    pub verified_only: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// DOCTOR APPLICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }

    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Pending, ApplicationStatus::Approved)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
                | (ApplicationStatus::Pending, ApplicationStatus::Withdrawn)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "pending"),
            ApplicationStatus::Approved => write!(f, "approved"),
            ApplicationStatus::Rejected => write!(f, "rejected"),
            ApplicationStatus::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialty: String,
    pub license_number: String,
    #[serde(default)]
    pub years_experience: i32,
    pub bio: Option<String>,
    #[serde(default)]
    pub document_urls: Vec<String>,
    pub status: ApplicationStatus,
    pub reviewer_id: Option<Uuid>,
    pub review_notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApplicationRequest {
    pub full_name: String,
    pub email: String,
    pub specialty: String,
    pub license_number: String,
    #[serde(default)]
    pub years_experience: i32,
    pub bio: Option<String>,
    #[serde(default)]
    pub document_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewApplicationRequest {
    pub decision: ReviewDecision,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<ApplicationStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ReviewOutcome {
    pub application: DoctorApplication,
    pub doctor: Option<Doctor>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor application not found")]
    ApplicationNotFound,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("You already have a pending doctor application")]
    PendingApplicationExists,

    #[error("Account already holds the doctor role")]
    AlreadyDoctor,

    #[error("Application is {status} and can no longer be changed")]
    ApplicationClosed { status: ApplicationStatus },

    #[error("Application was changed by another request")]
    StaleApplication,

    #[error("Doctor record conflicts with an existing one: {0}")]
    DoctorConflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::ApplicationNotFound => AppError::NotFound(err.to_string()),
            DoctorError::Unauthorized(_) => AppError::Forbidden(err.to_string()),
            DoctorError::PendingApplicationExists
            | DoctorError::AlreadyDoctor
            | DoctorError::ApplicationClosed { .. }
            | DoctorError::StaleApplication
            | DoctorError::DoctorConflict(_) => AppError::Conflict(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
