use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
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

use crate::models::{CallError, EndCallRequest, InitiateCallRequest};
use crate::services::CallService;

fn to_app_error(err: CallError) -> AppError {
    match err {
        CallError::CallNotFound | CallError::ConsultationNotFound => AppError::NotFound(err.to_string()),
        CallError::Unauthorized { message } => AppError::Forbidden(message),
        CallError::InvalidCallState { .. }
        | CallError::ConsultationClosed { .. }
        | CallError::CallInProgress
        | CallError::CallExpired
        | CallError::StaleCall => AppError::Conflict(err.to_string()),
        CallError::CallTypeNotPermitted { .. } => AppError::BadRequest(err.to_string()),
        CallError::DatabaseError { message } => AppError::Database(message),
        CallError::Internal { message } => AppError::Internal(message),
    }
}

// ==============================================================================
// CALL HANDLERS
// ==============================================================================

/// Place a call to the other participant of a consultation
#[axum::debug_handler]
pub async fn initiate_call(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<InitiateCallRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let call_service = CallService::new(&state);

    let call = call_service
        .initiate_call(&user, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok((StatusCode::CREATED, Json(json!(call))))
}

#[axum::debug_handler]
pub async fn get_active_call(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let call_service = CallService::new(&state);

    let call = call_service
        .get_active_call(&user, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "call": call })))
}

#[axum::debug_handler]
pub async fn get_call(
    State(state): State<Arc<AppConfig>>,
    Path(call_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let call_service = CallService::new(&state);

    let call = call_service
        .get_call(&user, call_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(call)))
}

#[axum::debug_handler]
pub async fn accept_call(
    State(state): State<Arc<AppConfig>>,
    Path(call_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let call_service = CallService::new(&state);

    let call = call_service
        .accept_call(&user, call_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(call)))
}

#[axum::debug_handler]
pub async fn reject_call(
    State(state): State<Arc<AppConfig>>,
    Path(call_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let call_service = CallService::new(&state);

    let call = call_service
        .reject_call(&user, call_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(call)))
}

/// Hang up or cancel a call; the body is optional
#[axum::debug_handler]
pub async fn end_call(
    State(state): State<Arc<AppConfig>>,
    Path(call_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    request: Option<Json<EndCallRequest>>,
) -> Result<Json<Value>, AppError> {
    let call_service = CallService::new(&state);
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let call = call_service
        .end_call(&user, call_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(call)))
}

#[axum::debug_handler]
pub async fn list_consultation_calls(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let call_service = CallService::new(&state);

    let calls = call_service
        .list_consultation_calls(&user, consultation_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "consultation_id": consultation_id,
        "calls": calls
    })))
}

#[axum::debug_handler]
pub async fn expire_stale_calls(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let call_service = CallService::new(&state);

    let expired = call_service
        .expire_stale_calls(&user, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "expired": expired })))
}
