use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use consultation_cell::{ConsultationError, ConsultationStatus, ConsultationType};

// ==============================================================================
// CALL MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Voice,
    Video,
}

impl CallType {
    pub fn permitted_in(&self, consultation_type: ConsultationType) -> bool {
        match self {
            CallType::Voice => true,
            CallType::Video => consultation_type.allows_video(),
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallType::Voice => write!(f, "voice"),
            CallType::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Active,
    Ended,
    Rejected,
    Missed,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Initiated => write!(f, "initiated"),
            CallStatus::Active => write!(f, "active"),
            CallStatus::Ended => write!(f, "ended"),
            CallStatus::Rejected => write!(f, "rejected"),
            CallStatus::Missed => write!(f, "missed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub call_type: CallType,
    pub status: CallStatus,
    pub initiated_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub end_reason: Option<String>,
}

impl Call {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.caller_id.to_string() == user_id || self.callee_id.to_string() == user_id
    }

    pub fn is_callee(&self, user_id: &str) -> bool {
        self.callee_id.to_string() == user_id
    }
}

#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    pub consultation_id: Uuid,
    pub call_type: CallType,
}

#[derive(Debug, Deserialize, Default)]
pub struct EndCallRequest {
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Call not found")]
    CallNotFound,

    #[error("Consultation not found")]
    ConsultationNotFound,

    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    #[error("Call is {status} and cannot be {action}")]
    InvalidCallState { status: CallStatus, action: String },

    #[error("Consultation is {status}; calls are not possible")]
    ConsultationClosed { status: ConsultationStatus },

    #[error("A {call_type} call is not permitted in a {consultation_type} consultation")]
    CallTypeNotPermitted {
        call_type: CallType,
        consultation_type: ConsultationType,
    },

    #[error("Another call is already in progress for this consultation")]
    CallInProgress,

    #[error("Call was not answered in time and has been marked missed")]
    CallExpired,

    #[error("Call was changed by another request")]
    StaleCall,

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CallError {
    pub fn unauthorized(message: &str) -> Self {
        CallError::Unauthorized { message: message.to_string() }
    }
}

impl From<anyhow::Error> for CallError {
    fn from(err: anyhow::Error) -> Self {
        CallError::DatabaseError {
            message: err.to_string(),
        }
    }
}

impl From<ConsultationError> for CallError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::NotFound => CallError::ConsultationNotFound,
            ConsultationError::Unauthorized(message) => CallError::Unauthorized { message },
            ConsultationError::DatabaseError(message) => CallError::DatabaseError { message },
            other => CallError::Internal {
                message: other.to_string(),
            },
        }
    }
}
