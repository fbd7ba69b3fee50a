use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

pub const DIAGNOSIS_DISCLAIMER: &str = "These suggestions are generated by a statistical model and are not a medical diagnosis. Always consult a qualified doctor.";

// ==============================================================================
// DIAGNOSIS MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnoseRequest {
    pub symptoms: Vec<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConditionPrediction {
    pub condition: String,
    pub probability: f64,
    pub matched_symptoms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisResponse {
    pub predictions: Vec<ConditionPrediction>,
    pub recognized_symptoms: Vec<String>,
    pub unrecognized_symptoms: Vec<String>,
    pub model_version: u64,
    pub disclaimer: &'static str,
}

/// One labelled example: a symptom set and the condition a doctor confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingSample {
    pub symptoms: Vec<String>,
    pub condition: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub enabled: bool,
    pub status: &'static str,
    pub model_version: u64,
    pub conditions: usize,
    pub vocabulary_size: usize,
    pub trained_samples: u64,
    pub last_trained_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrainOutcome {
    pub retrained: bool,
    pub samples: usize,
    pub model_version: u64,
}

// ==============================================================================
// FEEDBACK MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub consultation_id: Uuid,
    pub symptoms: Vec<String>,
    pub confirmed_condition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisFeedback {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub doctor_id: Uuid,
    pub symptoms: Vec<String>,
    pub condition: String,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("None of the given symptoms are known to the model")]
    NoKnownSymptoms,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Model persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::ValidationError(msg) => AppError::ValidationError(msg),
            AiError::NoKnownSymptoms => AppError::ValidationError(err.to_string()),
            AiError::Unauthorized(_) => AppError::Forbidden(err.to_string()),
            AiError::Persistence(msg) => AppError::Internal(msg),
            AiError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
