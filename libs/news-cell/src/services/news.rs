use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::validate_length;

use crate::models::{CreateArticleRequest, NewsArticle, NewsError, NewsListQuery, UpdateArticleRequest};

const DEFAULT_PAGE_SIZE: i32 = 20;
const MAX_PAGE_SIZE: i32 = 100;

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"))
}

/// Lowercase ASCII alphanumerics joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    non_alphanumeric()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub struct NewsService {
    supabase: SupabaseClient,
}

impl NewsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn require_admin(user: &User) -> Result<(), NewsError> {
        if user.is_admin() {
            Ok(())
        } else {
            Err(NewsError::Unauthorized)
        }
    }

    fn validate_title(title: &str) -> Result<String, NewsError> {
        if !validate_length(title, 3, 200) {
            return Err(NewsError::ValidationError(
                "Title must be between 3 and 200 characters".to_string(),
            ));
        }
        let slug = slugify(title);
        if slug.is_empty() {
            return Err(NewsError::ValidationError(
                "Title must contain at least one letter or digit".to_string(),
            ));
        }
        Ok(slug)
    }

    fn validate_content(content: &str) -> Result<(), NewsError> {
        if content.trim().is_empty() {
            return Err(NewsError::ValidationError("Content cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn build_list_path(query: &NewsListQuery, published_only: bool) -> String {
        let mut parts = Vec::new();
        if published_only {
            parts.push("is_published=eq.true".to_string());
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
            parts.push(format!("category=eq.{}", urlencoding::encode(category.trim())));
        }
        parts.push(if published_only {
            "order=published_at.desc".to_string()
        } else {
            "order=created_at.desc".to_string()
        });
        parts.push(format!(
            "limit={}",
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
        ));
        parts.push(format!("offset={}", query.offset.unwrap_or(0).max(0)));

        format!("/rest/v1/news_articles?{}", parts.join("&"))
    }

    pub async fn list_published(&self, query: &NewsListQuery) -> Result<Vec<NewsArticle>, NewsError> {
        self.supabase.request(Method::GET, &Self::build_list_path(query, true), None, None)
            .await
            .map_err(|e| NewsError::DatabaseError(e.to_string()))
    }

    pub async fn get_published(&self, article_id: Uuid) -> Result<NewsArticle, NewsError> {
        let path = format!("/rest/v1/news_articles?id=eq.{}&is_published=eq.true", article_id);
        let result: Vec<NewsArticle> = self.supabase.request(Method::GET, &path, None, None)
            .await
            .map_err(|e| NewsError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(NewsError::NotFound)
    }

    pub async fn list_all(
        &self,
        user: &User,
        query: &NewsListQuery,
        auth_token: &str,
    ) -> Result<Vec<NewsArticle>, NewsError> {
        Self::require_admin(user)?;

        self.supabase.request(Method::GET, &Self::build_list_path(query, false), Some(auth_token), None)
            .await
            .map_err(|e| NewsError::DatabaseError(e.to_string()))
    }

    pub async fn create_article(
        &self,
        user: &User,
        request: CreateArticleRequest,
        auth_token: &str,
    ) -> Result<NewsArticle, NewsError> {
        Self::require_admin(user)?;
        let slug = Self::validate_title(&request.title)?;
        Self::validate_content(&request.content)?;

        let now = Utc::now().to_rfc3339();
        let body = json!({
            "id": Uuid::new_v4(),
            "title": request.title.trim(),
            "slug": slug,
            "summary": request.summary,
            "content": request.content,
            "category": request.category.map(|c| c.trim().to_string()),
            "author_id": user.id,
            "is_published": request.publish,
            "published_at": if request.publish { Some(now.clone()) } else { None },
            "created_at": now,
            "updated_at": now,
        });

        let result: Vec<NewsArticle> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/news_articles",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| NewsError::DatabaseError(e.to_string()))?;

        let article = result
            .into_iter()
            .next()
            .ok_or_else(|| NewsError::DatabaseError("Article was not stored".to_string()))?;

        info!("News article {} ({}) created by {}", article.id, article.slug, user.id);
        Ok(article)
    }

    async fn patch_article(
        &self,
        article_id: Uuid,
        mut update: Map<String, Value>,
        auth_token: &str,
    ) -> Result<NewsArticle, NewsError> {
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/news_articles?id=eq.{}", article_id);
        let result: Vec<NewsArticle> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| NewsError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(NewsError::NotFound)
    }

    pub async fn update_article(
        &self,
        user: &User,
        article_id: Uuid,
        request: UpdateArticleRequest,
        auth_token: &str,
    ) -> Result<NewsArticle, NewsError> {
        Self::require_admin(user)?;

        let mut update = Map::new();
        if let Some(title) = request.title {
            let slug = Self::validate_title(&title)?;
            update.insert("title".to_string(), json!(title.trim()));
            update.insert("slug".to_string(), json!(slug));
        }
        if let Some(content) = request.content {
            Self::validate_content(&content)?;
            update.insert("content".to_string(), json!(content));
        }
        if let Some(summary) = request.summary {
            update.insert("summary".to_string(), json!(summary));
        }
        if let Some(category) = request.category {
            update.insert("category".to_string(), json!(category.trim()));
        }
        if update.is_empty() {
            return Err(NewsError::ValidationError("Nothing to update".to_string()));
        }

        debug!("Updating news article {}", article_id);
        self.patch_article(article_id, update, auth_token).await
    }

    pub async fn set_published(
        &self,
        user: &User,
        article_id: Uuid,
        published: bool,
        auth_token: &str,
    ) -> Result<NewsArticle, NewsError> {
        Self::require_admin(user)?;

        let mut update = Map::new();
        update.insert("is_published".to_string(), json!(published));
        update.insert(
            "published_at".to_string(),
            if published { json!(Utc::now().to_rfc3339()) } else { Value::Null },
        );

        let article = self.patch_article(article_id, update, auth_token).await?;
        info!(
            "News article {} {} by {}",
            article.id,
            if published { "published" } else { "unpublished" },
            user.id
        );
        Ok(article)
    }

    pub async fn delete_article(&self, user: &User, article_id: Uuid, auth_token: &str) -> Result<(), NewsError> {
        Self::require_admin(user)?;

        let path = format!("/rest/v1/news_articles?id=eq.{}", article_id);
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| NewsError::DatabaseError(e.to_string()))?;

        if deleted.is_empty() {
            return Err(NewsError::NotFound);
        }

        info!("News article {} deleted by {}", article_id, user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn slug_generation() {
        assert_eq!(slugify("Flu Season: What You Need to Know"), "flu-season-what-you-need-to-know");
        assert_eq!(slugify("  --COVID-19   update!! "), "covid-19-update");
        assert_eq!(slugify("Café opening"), "caf-opening");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn title_rules() {
        assert_eq!(NewsService::validate_title("New clinic hours").unwrap(), "new-clinic-hours");
        assert_matches!(NewsService::validate_title("Hi"), Err(NewsError::ValidationError(_)));
        assert_matches!(NewsService::validate_title(&"x".repeat(201)), Err(NewsError::ValidationError(_)));
        assert_matches!(NewsService::validate_title("!!!!"), Err(NewsError::ValidationError(_)));
    }

    #[test]
    fn public_list_path() {
        let query = NewsListQuery {
            category: Some("Public Health".to_string()),
            limit: Some(500),
            offset: None,
        };
        let path = NewsService::build_list_path(&query, true);

        assert!(path.contains("is_published=eq.true"));
        assert!(path.contains("category=eq.Public%20Health"));
        assert!(path.contains("order=published_at.desc"));
        assert!(path.contains("limit=100"));

        let admin_path = NewsService::build_list_path(&NewsListQuery::default(), false);
        assert!(!admin_path.contains("is_published"));
        assert!(admin_path.contains("limit=20"));
    }
}
