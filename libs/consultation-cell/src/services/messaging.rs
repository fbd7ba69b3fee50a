use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::validate_length;

use crate::models::{ConsultationError, Message};
use crate::services::consultation::ConsultationService;

pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Chat messages exchanged inside a consultation.
pub struct MessageService {
    supabase: SupabaseClient,
    consultations: ConsultationService,
}

impl MessageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            consultations: ConsultationService::new(config),
        }
    }

    pub async fn send_message(
        &self,
        user: &User,
        consultation_id: Uuid,
        content: &str,
        auth_token: &str,
    ) -> Result<Message, ConsultationError> {
        if !validate_length(content, 1, MAX_MESSAGE_LENGTH) {
            return Err(ConsultationError::ValidationError(format!(
                "Message must be between 1 and {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let consultation = self.consultations.get_consultation(consultation_id, auth_token).await?;

        if consultation.participant(&user.id).is_none() {
            return Err(ConsultationError::Unauthorized("not a participant of this consultation".to_string()));
        }
        if !self.consultations.lifecycle().allows_communication(consultation.status) {
            return Err(ConsultationError::CommunicationClosed(consultation.status));
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "consultation_id": consultation.id,
            "sender_id": user.id,
            "content": content.trim(),
            "is_read": false,
            "read_at": null,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Message> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/consultation_messages",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        let message = result
            .into_iter()
            .next()
            .ok_or_else(|| ConsultationError::DatabaseError("Message was not stored".to_string()))?;

        debug!("Message {} posted to consultation {}", message.id, consultation.id);
        Ok(message)
    }

    pub async fn list_messages(
        &self,
        user: &User,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Message>, ConsultationError> {
        // Ownership check lives in get_for_user.
        let consultation = self.consultations.get_for_user(user, consultation_id, auth_token).await?;

        let path = format!(
            "/rest/v1/consultation_messages?consultation_id=eq.{}&order=created_at.asc",
            consultation.id
        );
        self.supabase.request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))
    }

    /// Marks every unread message from the other participant as read.
    pub async fn mark_read(
        &self,
        user: &User,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<usize, ConsultationError> {
        let consultation = self.consultations.get_consultation(consultation_id, auth_token).await?;

        let sender = consultation.counterpart_of(&user.id).ok_or_else(|| {
            ConsultationError::Unauthorized("not a participant of this consultation".to_string())
        })?;

        let path = format!(
            "/rest/v1/consultation_messages?consultation_id=eq.{}&sender_id=eq.{}&is_read=eq.false",
            consultation.id, sender
        );
        let updated: Vec<Message> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "is_read": true,
                "read_at": Utc::now().to_rfc3339(),
            })),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        info!("{} messages marked read in consultation {}", updated.len(), consultation.id);
        Ok(updated.len())
    }
}
