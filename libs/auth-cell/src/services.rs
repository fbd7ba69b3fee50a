use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};
use shared_utils::validation::{validate_email, validate_length};

use crate::models::{
    AccountProfile, AuthError, AuthSession, LoginRequest, ProfileResponse, RegisterRequest,
};

const MIN_PASSWORD_LENGTH: usize = 8;

pub struct AuthService {
    supabase: SupabaseClient,
}

#[derive(Debug, serde::Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub confirmation_required: bool,
    pub session: Option<AuthSession>,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
        if !validate_email(request.email.trim()) {
            return Err(AuthError::InvalidEmail);
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH));
        }
        if !validate_length(&request.full_name, 1, 200) {
            return Err(AuthError::MissingName);
        }
        match request.role.as_deref().map(Role::parse) {
            None | Some(Some(Role::Patient)) => Ok(()),
            _ => Err(AuthError::RoleNotAllowed),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AuthError> {
        Self::validate_registration(&request)?;

        let email = request.email.trim().to_lowercase();
        let full_name = request.full_name.trim().to_string();
        let role = Role::Patient.to_string();
        debug!("Registering new account for {}", email);

        let signup: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({
                "email": email,
                "password": request.password,
                "data": {
                    "full_name": full_name,
                }
            })),
        ).await.map_err(|e| {
            let message = e.to_string();
            if message.to_lowercase().contains("already registered") {
                AuthError::AlreadyRegistered
            } else {
                AuthError::Provider(message)
            }
        })?;

        // With email confirmation on, GoTrue answers with the bare user object.
        let user_value = signup.get("user").cloned().unwrap_or_else(|| signup.clone());
        let user_id = user_value["id"]
            .as_str()
            .ok_or_else(|| AuthError::Provider("Sign-up response missing user id".to_string()))?
            .to_string();

        let session = signup["access_token"].as_str().map(|token| AuthSession {
            access_token: token.to_string(),
            refresh_token: signup["refresh_token"].as_str().map(str::to_string),
            expires_in: signup["expires_in"].as_i64(),
            user_id: user_id.clone(),
            email: Some(email.clone()),
            role: role.clone(),
        });

        let profile_token = session.as_ref().map(|s| s.access_token.as_str());
        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/profiles",
            profile_token,
            Some(json!({
                "id": user_id,
                "email": email,
                "full_name": full_name,
                "role": role,
            })),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| AuthError::Database(e.to_string()))?;

        info!("Registered account {} as {}", user_id, role);

        Ok(RegisterResponse {
            user_id,
            email,
            role,
            confirmation_required: session.is_none(),
            session,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        debug!("Password login for {}", request.email);

        let response: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({
                "email": request.email.trim().to_lowercase(),
                "password": request.password,
            })),
        ).await.map_err(|e| {
            warn!("Login rejected: {}", e);
            let message = e.to_string();
            if message.starts_with("Bad request") || message.starts_with("Authentication error") {
                AuthError::InvalidCredentials
            } else {
                AuthError::Provider(message)
            }
        })?;

        let access_token = response["access_token"]
            .as_str()
            .ok_or(AuthError::InvalidCredentials)?
            .to_string();
        let user = &response["user"];
        let user_id = user["id"]
            .as_str()
            .ok_or_else(|| AuthError::Provider("Token response missing user".to_string()))?
            .to_string();
        let role = Role::from_app_metadata(&user["app_metadata"])
            .unwrap_or(Role::Patient)
            .to_string();

        Ok(AuthSession {
            access_token,
            refresh_token: response["refresh_token"].as_str().map(str::to_string),
            expires_in: response["expires_in"].as_i64(),
            user_id,
            email: user["email"].as_str().map(str::to_string),
            role,
        })
    }

    pub async fn get_profile(&self, user: &User, auth_token: &str) -> Result<ProfileResponse, AuthError> {
        debug!("Getting profile for user: {}", user.id);

        let auth_profile = self.supabase.get_user_profile(auth_token)
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let accounts: Vec<AccountProfile> = self.supabase.request(
            Method::GET,
            &format!("/rest/v1/profiles?id=eq.{}", user.id),
            Some(auth_token),
            None,
        ).await.map_err(|e| AuthError::Database(e.to_string()))?;

        let table = match user.role_kind() {
            Role::Patient => Some("patients"),
            Role::Doctor => Some("doctors"),
            Role::Admin => None,
        };

        let role_profile = match table {
            Some(table) => {
                let rows: Vec<Value> = self.supabase.request(
                    Method::GET,
                    &format!("/rest/v1/{}?id=eq.{}", table, user.id),
                    Some(auth_token),
                    None,
                ).await.map_err(|e| AuthError::Database(e.to_string()))?;
                rows.into_iter().next()
            }
            None => None,
        };

        Ok(ProfileResponse {
            user_id: user.id.clone(),
            auth_profile,
            account: accounts.into_iter().next(),
            role_profile,
        })
    }
}
