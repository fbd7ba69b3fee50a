use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    ConsultationListQuery, CreateConsultationRequest, SendMessageRequest, UpdateNotesRequest,
    UpdateStatusRequest,
};
use crate::services::{ConsultationService, MessageService};

// ==============================================================================
// CONSULTATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_consultation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateConsultationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ConsultationService::new(&state);

    let consultation = service.create_consultation(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(consultation))))
}

#[axum::debug_handler]
pub async fn list_consultations(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ConsultationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&state);

    let consultations = service.list_for_user(&user, &query, auth.token()).await?;

    Ok(Json(json!({
        "total": consultations.len(),
        "consultations": consultations
    })))
}

#[axum::debug_handler]
pub async fn get_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&state);

    let consultation = service.get_for_user(&user, consultation_id, auth.token()).await?;

    Ok(Json(json!(consultation)))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&state);

    let consultation = service.update_status(&user, consultation_id, request, auth.token()).await?;

    Ok(Json(json!(consultation)))
}

#[axum::debug_handler]
pub async fn update_notes(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&state);

    let consultation = service.update_notes(&user, consultation_id, request, auth.token()).await?;

    Ok(Json(json!(consultation)))
}

// ==============================================================================
// MESSAGE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = MessageService::new(&state);

    let message = service
        .send_message(&user, consultation_id, &request.content, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(message))))
}

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = MessageService::new(&state);

    let messages = service.list_messages(&user, consultation_id, auth.token()).await?;

    Ok(Json(json!({ "messages": messages })))
}

#[axum::debug_handler]
pub async fn mark_messages_read(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = MessageService::new(&state);

    let updated = service.mark_read(&user, consultation_id, auth.token()).await?;

    Ok(Json(json!({ "marked_read": updated })))
}
