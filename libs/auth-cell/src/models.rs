use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_models::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user_id: String,
    pub email: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub auth_profile: Value,
    pub account: Option<AccountProfile>,
    pub role_profile: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Full name is required")]
    MissingName,

    #[error("Accounts can only self-register as patients")]
    RoleNotAllowed,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    AlreadyRegistered,

    #[error("Auth provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail
            | AuthError::WeakPassword(_)
            | AuthError::MissingName => AppError::ValidationError(err.to_string()),
            AuthError::RoleNotAllowed => AppError::Forbidden(err.to_string()),
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::AlreadyRegistered => AppError::Conflict(err.to_string()),
            AuthError::Provider(msg) => AppError::ExternalService(msg),
            AuthError::Database(msg) => AppError::Database(msg),
        }
    }
}
