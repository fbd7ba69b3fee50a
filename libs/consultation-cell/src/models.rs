use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CONSULTATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationStatus::Pending => write!(f, "pending"),
            ConsultationStatus::Scheduled => write!(f, "scheduled"),
            ConsultationStatus::Active => write!(f, "active"),
            ConsultationStatus::Completed => write!(f, "completed"),
            ConsultationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    #[default]
    Chat,
    Voice,
    Video,
}

impl ConsultationType {
    /// Voice consultations never escalate to video.
    pub fn allows_video(&self) -> bool {
        !matches!(self, ConsultationType::Voice)
    }
}

impl fmt::Display for ConsultationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationType::Chat => write!(f, "chat"),
            ConsultationType::Voice => write!(f, "voice"),
            ConsultationType::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub status: ConsultationStatus,
    pub consultation_type: ConsultationType,
    pub reason: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub doctor_notes: Option<String>,
    pub diagnosis: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which side of a consultation the caller sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Patient,
    Doctor,
}

impl Consultation {
    pub fn participant(&self, user_id: &str) -> Option<Participant> {
        if self.patient_id.to_string() == user_id {
            Some(Participant::Patient)
        } else if self.doctor_id.to_string() == user_id {
            Some(Participant::Doctor)
        } else {
            None
        }
    }

    /// The participant on the other end from `user_id`.
    pub fn counterpart_of(&self, user_id: &str) -> Option<Uuid> {
        match self.participant(user_id)? {
            Participant::Patient => Some(self.doctor_id),
            Participant::Doctor => Some(self.patient_id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateConsultationRequest {
    pub doctor_id: Uuid,
    #[serde(default)]
    pub consultation_type: ConsultationType,
    pub reason: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ConsultationStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateNotesRequest {
    pub doctor_notes: Option<String>,
    pub diagnosis: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConsultationListQuery {
    pub status: Option<ConsultationStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// MESSAGE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting consultations")]
    DoctorUnavailable,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Consultation cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    #[error("Consultation is {0}; messaging is closed")]
    CommunicationClosed(ConsultationStatus),

    #[error("Notes cannot be edited on a cancelled consultation")]
    NotesLocked,

    #[error("Consultation was changed by another request")]
    StaleConsultation,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::NotFound | ConsultationError::DoctorNotFound => AppError::NotFound(err.to_string()),
            ConsultationError::Unauthorized(_) => AppError::Forbidden(err.to_string()),
            ConsultationError::DoctorUnavailable
            | ConsultationError::InvalidStatusTransition { .. }
            | ConsultationError::CommunicationClosed(_)
            | ConsultationError::NotesLocked
            | ConsultationError::StaleConsultation => AppError::Conflict(err.to_string()),
            ConsultationError::ValidationError(msg) => AppError::ValidationError(msg),
            ConsultationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
