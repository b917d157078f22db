//! Content service
//!
//! Study articles written in Markdown by mentors and admins:
//! - Unique slugs generated from the title
//! - HTML rendered on every body change
//! - Summary taken from the body when the author gives none
//! - `published_at` stamped on first publication only
//! - Cached reads by id and slug
//!
//! Drafts and archived contents are visible to their author and admins.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{CategoryRepository, CommentRepository, ContentRepository};
use crate::models::{
    normalize_list, Content, ContentFilter, ContentStatus, CreateContentInput, ListParams, PagedResult,
    UpdateContentInput, User,
};
use crate::services::category::generate_slug;
use crate::services::deck::non_empty;
use crate::services::markdown::MarkdownRenderer;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Default cache TTL for contents (10 minutes)
const CONTENT_CACHE_TTL_SECS: u64 = 600;

const CACHE_KEY_CONTENT_BY_ID: &str = "content:id:";
const CACHE_KEY_CONTENT_BY_SLUG: &str = "content:slug:";

pub const MAX_TITLE_LENGTH: usize = 200;

/// Slug used when a title has no sluggable characters
const FALLBACK_SLUG: &str = "conteudo";

/// Numeric suffixes tried before giving up on a readable slug
const MAX_SLUG_SUFFIX: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ContentService {
    repo: Arc<dyn ContentRepository>,
    categories: Arc<dyn CategoryRepository>,
    comments: Arc<dyn CommentRepository>,
    renderer: MarkdownRenderer,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl ContentService {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        categories: Arc<dyn CategoryRepository>,
        comments: Arc<dyn CommentRepository>,
        renderer: MarkdownRenderer,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repo,
            categories,
            comments,
            renderer,
            cache,
            cache_ttl: Duration::from_secs(CONTENT_CACHE_TTL_SECS),
        }
    }

    /// Create a new content service with custom cache TTL
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub async fn create(&self, actor: &User, input: CreateContentInput) -> Result<Content, ContentServiceError> {
        if !actor.is_mentor() {
            return Err(ContentServiceError::Forbidden(
                "Only mentors and admins can publish content".to_string(),
            ));
        }

        let title = validate_title(&input.title)?;
        let body = validate_body(&input.body)?;
        self.ensure_category(input.category_id).await?;

        let slug = self.unique_slug(&title, None).await?;
        let status = input.status.unwrap_or_default();
        let now = Utc::now();
        let content = Content {
            id: 0,
            slug,
            title,
            body_html: self.renderer.render(&body),
            summary: Some(
                non_empty(input.summary).unwrap_or_else(|| self.renderer.summary(&body)),
            )
            .filter(|s| !s.is_empty()),
            body,
            category_id: input.category_id,
            tags: normalize_list(input.tags),
            author_id: actor.id,
            status,
            published_at: (status == ContentStatus::Published).then_some(now),
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&content).await?;
        tracing::info!("User {} created content {} ({})", actor.id, created.id, created.slug);
        Ok(created)
    }

    /// Read a content by id and count the view
    pub async fn get(&self, viewer: Option<&User>, id: i64) -> Result<Content, ContentServiceError> {
        let content = self
            .cached_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::NotFound(id.to_string()))?;
        self.view(viewer, content).await
    }

    /// Read a content by slug and count the view
    pub async fn get_by_slug(&self, viewer: Option<&User>, slug: &str) -> Result<Content, ContentServiceError> {
        let slug_key = format!("{}{}", CACHE_KEY_CONTENT_BY_SLUG, slug);
        let cached_id = self.cache.get::<i64>(&slug_key).await.ok().flatten();
        let content = match cached_id {
            Some(id) => self.cached_by_id(id).await?.filter(|c| c.slug == slug),
            None => None,
        };
        let content = match content {
            Some(content) => content,
            None => {
                let content = self
                    .repo
                    .get_by_slug(slug)
                    .await?
                    .ok_or_else(|| ContentServiceError::NotFound(slug.to_string()))?;
                self.store(&content).await;
                content
            }
        };
        self.view(viewer, content).await
    }

    /// Paginated listing.
    ///
    /// Anonymous callers only see published content. Signed-in users may
    /// list their own drafts; admins see everything.
    pub async fn list(
        &self,
        viewer: Option<&User>,
        mut filter: ContentFilter,
        params: ListParams,
    ) -> Result<PagedResult<Content>, ContentServiceError> {
        match viewer {
            Some(user) if user.is_admin() => {}
            Some(user) => match filter.status {
                Some(ContentStatus::Published) => {}
                Some(_) => filter.author_id = Some(user.id),
                None => filter.status = Some(ContentStatus::Published),
            },
            None => filter.status = Some(ContentStatus::Published),
        }

        let params = ListParams::new(params.page, params.per_page);
        let (items, total) = self.repo.list(&filter, &params).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateContentInput,
    ) -> Result<Content, ContentServiceError> {
        let mut content = self.owned(actor, id).await?;
        let previous_slug = content.slug.clone();

        if let Some(title) = input.title {
            let title = validate_title(&title)?;
            if title != content.title {
                content.slug = self.unique_slug(&title, Some(content.id)).await?;
                content.title = title;
            }
        }
        let body_changed = match input.body {
            Some(body) => {
                let body = validate_body(&body)?;
                let changed = body != content.body;
                content.body = body;
                changed
            }
            None => false,
        };
        if body_changed {
            content.body_html = self.renderer.render(&content.body);
        }
        match input.summary {
            Some(summary) => content.summary = non_empty(summary),
            None if body_changed && content.summary.is_none() => {
                content.summary = Some(self.renderer.summary(&content.body)).filter(|s| !s.is_empty());
            }
            None => {}
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
            content.category_id = category_id;
        }
        if let Some(tags) = input.tags {
            content.tags = normalize_list(tags);
        }
        if let Some(status) = input.status {
            if status == ContentStatus::Published && content.published_at.is_none() {
                content.published_at = Some(Utc::now());
            }
            content.status = status;
        }

        let updated = self.repo.update(&content).await?;
        self.invalidate(updated.id, &previous_slug).await;
        self.invalidate(updated.id, &updated.slug).await;
        Ok(updated)
    }

    /// Delete a content with its comments and likes
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ContentServiceError> {
        let content = self.owned(actor, id).await?;
        let likes = self.comments.delete_likes_for_content(content.id).await?;
        self.repo.delete(content.id).await?;
        self.invalidate(content.id, &content.slug).await;
        tracing::info!(
            "User {} deleted content {} ({} likes removed)",
            actor.id,
            content.id,
            likes
        );
        Ok(())
    }

    async fn view(&self, viewer: Option<&User>, mut content: Content) -> Result<Content, ContentServiceError> {
        if !content.is_published() && !viewer.is_some_and(|u| u.can_manage(content.author_id)) {
            return Err(ContentServiceError::NotFound(content.id.to_string()));
        }
        self.repo.increment_views(content.id).await?;
        content.view_count += 1;
        self.store(&content).await;
        Ok(content)
    }

    async fn cached_by_id(&self, id: i64) -> Result<Option<Content>, ContentServiceError> {
        let key = format!("{}{}", CACHE_KEY_CONTENT_BY_ID, id);
        if let Some(content) = self.cache.get::<Content>(&key).await.ok().flatten() {
            return Ok(Some(content));
        }
        let content = self.repo.get_by_id(id).await?;
        if let Some(content) = &content {
            self.store(content).await;
        }
        Ok(content)
    }

    async fn store(&self, content: &Content) {
        let id_key = format!("{}{}", CACHE_KEY_CONTENT_BY_ID, content.id);
        let slug_key = format!("{}{}", CACHE_KEY_CONTENT_BY_SLUG, content.slug);
        let _ = self.cache.set(&id_key, content, self.cache_ttl).await;
        let _ = self.cache.set(&slug_key, &content.id, self.cache_ttl).await;
    }

    async fn invalidate(&self, id: i64, slug: &str) {
        forget_content(&self.cache, id).await;
        let _ = self.cache.delete(&format!("{}{}", CACHE_KEY_CONTENT_BY_SLUG, slug)).await;
    }

    async fn owned(&self, actor: &User, id: i64) -> Result<Content, ContentServiceError> {
        let content = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::NotFound(id.to_string()))?;
        if !actor.can_manage(content.author_id) {
            return Err(ContentServiceError::Forbidden(
                "Only the author or an admin can change this content".to_string(),
            ));
        }
        Ok(content)
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<(), ContentServiceError> {
        if let Some(id) = category_id {
            if self.categories.get_by_id(id).await?.is_none() {
                return Err(ContentServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Slug from the title, suffixed `-2`, `-3`... until free
    async fn unique_slug(&self, title: &str, exclude_id: Option<i64>) -> Result<String, ContentServiceError> {
        let mut base = generate_slug(title);
        if base.is_empty() {
            base = FALLBACK_SLUG.to_string();
        }
        if !self.repo.slug_exists(&base, exclude_id).await? {
            return Ok(base);
        }
        for suffix in 2..=MAX_SLUG_SUFFIX {
            let candidate = format!("{}-{}", base, suffix);
            if !self.repo.slug_exists(&candidate, exclude_id).await? {
                return Ok(candidate);
            }
        }
        Ok(format!("{}-{}", base, Utc::now().timestamp_millis()))
    }
}

/// Drop the cached copy of a content whose counters changed elsewhere
pub async fn forget_content(cache: &Cache, id: i64) {
    let _ = cache.delete(&format!("{}{}", CACHE_KEY_CONTENT_BY_ID, id)).await;
}

/// Drop every cached content
pub async fn forget_all_contents(cache: &Cache) {
    let _ = cache.delete_pattern("content:*").await;
}

fn validate_title(title: &str) -> Result<String, ContentServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentServiceError::ValidationError("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ContentServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_body(body: &str) -> Result<String, ContentServiceError> {
    if body.trim().is_empty() {
        return Err(ContentServiceError::ValidationError("Body is required".to_string()));
    }
    Ok(body.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxCommentRepository, SqlxContentRepository};
    use crate::db::DynDatabasePool;
    use crate::services::user::tests::setup_test_service;
    use crate::services::user::RegisterInput;

    pub(crate) fn content_service(pool: &DynDatabasePool) -> ContentService {
        content_service_with_cache(pool, Arc::new(Cache::new()))
    }

    pub(crate) fn content_service_with_cache(pool: &DynDatabasePool, cache: Arc<Cache>) -> ContentService {
        ContentService::new(
            SqlxContentRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            MarkdownRenderer::new(),
            cache,
        )
    }

    async fn setup() -> (ContentService, User, User) {
        let (pool, users) = setup_test_service().await;
        let admin = users
            .register(RegisterInput::new("editora", "editora@med.br", "senha-forte"))
            .await
            .unwrap();
        let student = users
            .register(RegisterInput::new("aluno", "aluno@med.br", "senha-forte"))
            .await
            .unwrap();
        (content_service(&pool), admin, student)
    }

    #[tokio::test]
    async fn test_create_renders_and_summarizes() {
        let (service, admin, student) = setup().await;

        let err = service
            .create(&student, CreateContentInput::new("Asma", "texto"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentServiceError::Forbidden(_)));

        let body = format!("# Asma\n\n{}", "Broncoespasmo reversível. ".repeat(20));
        let content = service
            .create(&admin, CreateContentInput::new("Asma grave", body))
            .await
            .unwrap();
        assert_eq!(content.slug, "asma-grave");
        assert!(content.body_html.contains("<h1>Asma</h1>"));
        assert_eq!(content.summary.as_deref().map(|s| s.chars().count() <= 200), Some(true));
        assert_eq!(content.status, ContentStatus::Draft);
        assert!(content.published_at.is_none());
    }

    #[tokio::test]
    async fn test_slug_gets_numeric_suffix() {
        let (service, admin, _) = setup().await;
        let first = service
            .create(&admin, CreateContentInput::new("Sepse", "a"))
            .await
            .unwrap();
        let second = service
            .create(&admin, CreateContentInput::new("Sepse", "b"))
            .await
            .unwrap();
        let third = service
            .create(&admin, CreateContentInput::new("SEPSE!", "c"))
            .await
            .unwrap();
        assert_eq!(first.slug, "sepse");
        assert_eq!(second.slug, "sepse-2");
        assert_eq!(third.slug, "sepse-3");
    }

    #[tokio::test]
    async fn test_validation() {
        let (service, admin, _) = setup().await;
        for input in [
            CreateContentInput::new("  ", "corpo"),
            CreateContentInput::new("x".repeat(201), "corpo"),
            CreateContentInput::new("Titulo", "   "),
            CreateContentInput::new("Titulo", "corpo").with_category(99),
        ] {
            assert!(matches!(
                service.create(&admin, input).await.unwrap_err(),
                ContentServiceError::ValidationError(_)
            ));
        }
    }

    #[tokio::test]
    async fn test_published_at_is_set_once() {
        let (service, admin, _) = setup().await;
        let content = service
            .create(&admin, CreateContentInput::new("DPOC", "corpo"))
            .await
            .unwrap();

        let published = service
            .update(&admin, content.id, UpdateContentInput::default().with_status(ContentStatus::Published))
            .await
            .unwrap();
        let first_published = published.published_at.expect("published_at set");

        service
            .update(&admin, content.id, UpdateContentInput::default().with_status(ContentStatus::Draft))
            .await
            .unwrap();
        let again = service
            .update(&admin, content.id, UpdateContentInput::default().with_status(ContentStatus::Published))
            .await
            .unwrap();
        assert_eq!(again.published_at, Some(first_published));
    }

    #[tokio::test]
    async fn test_visibility_and_views() {
        let (service, admin, student) = setup().await;
        let draft = service
            .create(&admin, CreateContentInput::new("Rascunho", "corpo"))
            .await
            .unwrap();
        let public = service
            .create(
                &admin,
                CreateContentInput::new("Publicado", "corpo").with_status(ContentStatus::Published),
            )
            .await
            .unwrap();

        assert!(matches!(
            service.get(Some(&student), draft.id).await.unwrap_err(),
            ContentServiceError::NotFound(_)
        ));
        assert!(service.get(Some(&admin), draft.id).await.is_ok());

        service.get(None, public.id).await.unwrap();
        let viewed = service.get_by_slug(None, "publicado").await.unwrap();
        assert_eq!(viewed.view_count, 2);

        let anonymous = service
            .list(None, ContentFilter::default(), ListParams::default())
            .await
            .unwrap();
        assert_eq!(anonymous.total, 1);
        let everything = service
            .list(Some(&admin), ContentFilter::default(), ListParams::default())
            .await
            .unwrap();
        assert_eq!(everything.total, 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_permissions() {
        let (service, admin, student) = setup().await;
        let content = service
            .create(&admin, CreateContentInput::new("ICC", "**corpo**"))
            .await
            .unwrap();

        assert!(matches!(
            service
                .update(&student, content.id, UpdateContentInput::default().with_title("x"))
                .await
                .unwrap_err(),
            ContentServiceError::Forbidden(_)
        ));

        let updated = service
            .update(
                &admin,
                content.id,
                UpdateContentInput::default()
                    .with_title("Insuficiência cardíaca")
                    .with_body("_novo_"),
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "insuficiencia-cardiaca");
        assert!(updated.body_html.contains("<em>novo</em>"));

        assert!(matches!(
            service.delete(&student, content.id).await.unwrap_err(),
            ContentServiceError::Forbidden(_)
        ));
        service.delete(&admin, content.id).await.unwrap();
        assert!(matches!(
            service.get(Some(&admin), content.id).await.unwrap_err(),
            ContentServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_update_is_visible_on_next_read() {
        let (service, admin, _) = setup().await;
        let content = service
            .create(
                &admin,
                CreateContentInput::new("Cetoacidose", "versão antiga").with_status(ContentStatus::Published),
            )
            .await
            .unwrap();

        let first = service.get(None, content.id).await.unwrap();
        assert_eq!(first.body, "versão antiga");
        service.get_by_slug(None, "cetoacidose").await.unwrap();

        service
            .update(
                &admin,
                content.id,
                UpdateContentInput::default()
                    .with_title("Cetoacidose diabética")
                    .with_body("versão nova"),
            )
            .await
            .unwrap();

        let by_id = service.get(None, content.id).await.unwrap();
        assert_eq!(by_id.body, "versão nova");
        assert_eq!(by_id.view_count, 3);
        let by_slug = service.get_by_slug(None, "cetoacidose-diabetica").await.unwrap();
        assert_eq!(by_slug.title, "Cetoacidose diabética");
        assert_eq!(by_slug.view_count, 4);
        assert!(matches!(
            service.get_by_slug(None, "cetoacidose").await.unwrap_err(),
            ContentServiceError::NotFound(_)
        ));

        service.delete(&admin, content.id).await.unwrap();
        assert!(matches!(
            service.get(None, content.id).await.unwrap_err(),
            ContentServiceError::NotFound(_)
        ));
    }
}
