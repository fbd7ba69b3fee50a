use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub author_id: Uuid,
    #[serde(default)]
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub category: Option<String>,
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct NewsListQuery {
    pub category: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("Article not found")]
    NotFound,

    #[error("Only administrators can manage news")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<NewsError> for AppError {
    fn from(err: NewsError) -> Self {
        match err {
            NewsError::NotFound => AppError::NotFound(err.to_string()),
            NewsError::Unauthorized => AppError::Forbidden(err.to_string()),
            NewsError::ValidationError(msg) => AppError::ValidationError(msg),
            NewsError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
