use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    ApplicationListQuery, AvailabilityUpdate, DoctorSearchQuery, ReviewApplicationRequest,
    SubmitApplicationRequest, UpdateDoctorRequest, VerificationUpdate,
};
use crate::services::{DoctorApplicationService, DoctorService};

// ==============================================================================
// PUBLIC DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_doctors_public(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctors = doctor_service.search_doctors(&query, None).await?;

    Ok(Json(json!({
        "total": doctors.len(),
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.get_doctor(doctor_id, None).await?;

    Ok(Json(json!(doctor)))
}

// ==============================================================================
// PROTECTED DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.update_doctor(&user, doctor_id, request, auth.token()).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(payload): Json<AvailabilityUpdate>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .set_availability(&user, doctor_id, payload.is_available, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn verify_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(payload): Json<VerificationUpdate>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .verify_doctor(&user, doctor_id, payload.is_verified, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

// ==============================================================================
// DOCTOR APPLICATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_application(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = DoctorApplicationService::new(&state);

    let application = service.submit(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(application))))
}

#[axum::debug_handler]
pub async fn list_my_applications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorApplicationService::new(&state);

    let applications = service.list_mine(&user, auth.token()).await?;

    Ok(Json(json!({ "applications": applications })))
}

#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorApplicationService::new(&state);

    let applications = service.list_all(&user, &query, auth.token()).await?;

    Ok(Json(json!({
        "total": applications.len(),
        "applications": applications
    })))
}

#[axum::debug_handler]
pub async fn get_application(
    State(state): State<Arc<AppConfig>>,
    Path(application_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorApplicationService::new(&state);

    let application = service.get(&user, application_id, auth.token()).await?;

    Ok(Json(json!(application)))
}

#[axum::debug_handler]
pub async fn review_application(
    State(state): State<Arc<AppConfig>>,
    Path(application_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReviewApplicationRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorApplicationService::new(&state);

    let outcome = service.review(&user, application_id, request, auth.token()).await?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn withdraw_application(
    State(state): State<Arc<AppConfig>>,
    Path(application_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorApplicationService::new(&state);

    let application = service.withdraw(&user, application_id, auth.token()).await?;

    Ok(Json(json!(application)))
}
