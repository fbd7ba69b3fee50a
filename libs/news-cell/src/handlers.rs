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

use crate::models::{CreateArticleRequest, NewsListQuery, UpdateArticleRequest};
use crate::services::NewsService;

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_news(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<NewsListQuery>,
) -> Result<Json<Value>, AppError> {
    let news_service = NewsService::new(&state);

    let articles = news_service.list_published(&query).await?;

    Ok(Json(json!({
        "total": articles.len(),
        "articles": articles
    })))
}

#[axum::debug_handler]
pub async fn get_news(
    State(state): State<Arc<AppConfig>>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let news_service = NewsService::new(&state);

    let article = news_service.get_published(article_id).await?;

    Ok(Json(json!(article)))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_all_news(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<NewsListQuery>,
) -> Result<Json<Value>, AppError> {
    let news_service = NewsService::new(&state);

    let articles = news_service.list_all(&user, &query, auth.token()).await?;

    Ok(Json(json!({
        "total": articles.len(),
        "articles": articles
    })))
}

#[axum::debug_handler]
pub async fn create_news(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let news_service = NewsService::new(&state);

    let article = news_service.create_article(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(article))))
}

#[axum::debug_handler]
pub async fn update_news(
    State(state): State<Arc<AppConfig>>,
    Path(article_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateArticleRequest>,
) -> Result<Json<Value>, AppError> {
    let news_service = NewsService::new(&state);

    let article = news_service.update_article(&user, article_id, request, auth.token()).await?;

    Ok(Json(json!(article)))
}

#[axum::debug_handler]
pub async fn publish_news(
    State(state): State<Arc<AppConfig>>,
    Path(article_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let news_service = NewsService::new(&state);

    let article = news_service.set_published(&user, article_id, true, auth.token()).await?;

    Ok(Json(json!(article)))
}

#[axum::debug_handler]
pub async fn unpublish_news(
    State(state): State<Arc<AppConfig>>,
    Path(article_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let news_service = NewsService::new(&state);

    let article = news_service.set_published(&user, article_id, false, auth.token()).await?;

    Ok(Json(json!(article)))
}

#[axum::debug_handler]
pub async fn delete_news(
    State(state): State<Arc<AppConfig>>,
    Path(article_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let news_service = NewsService::new(&state);

    news_service.delete_article(&user, article_id, auth.token()).await?;

    Ok(StatusCode::NO_CONTENT)
}
