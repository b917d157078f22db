//! Comment and like service

use crate::cache::Cache;
use crate::db::repositories::{CommentRepository, ContentRepository};
use crate::models::{
    Comment, CommentStatus, CommentWithMeta, Content, CreateCommentInput, LikeStatus, LikeTargetType, User,
};
use crate::services::content::forget_content;
use std::sync::Arc;

const MAX_COMMENT_LENGTH: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    contents: Arc<dyn ContentRepository>,
    cache: Arc<Cache>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, contents: Arc<dyn ContentRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, contents, cache }
    }

    /// Comment on a published content; signed-in comments skip moderation
    pub async fn create(&self, author: &User, input: CreateCommentInput) -> Result<Comment, CommentServiceError> {
        let body = input.body.trim();
        if body.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Comment cannot be empty".to_string(),
            ));
        }
        if body.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment must be at most {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let content = self.visible_content(Some(author), input.content_id).await?;
        if let Some(parent_id) = input.parent_id {
            let parent = self.find(parent_id).await?;
            if parent.content_id != content.id {
                return Err(CommentServiceError::ValidationError(
                    "Reply must belong to the same content".to_string(),
                ));
            }
        }

        let comment = self
            .repo
            .create(content.id, author.id, input.parent_id, body, CommentStatus::Approved)
            .await?;
        self.adjust_comments(content.id, 1).await?;
        Ok(comment)
    }

    /// Approved comments of a content as a reply tree
    pub async fn list(
        &self,
        viewer: Option<&User>,
        content_id: i64,
    ) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        let content = self.visible_content(viewer, content_id).await?;
        let comments = self.repo.list_by_content(content.id).await?;
        Ok(CommentWithMeta::into_tree(comments))
    }

    /// Delete a comment and its replies
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), CommentServiceError> {
        let comment = self.find(id).await?;
        if !actor.can_manage(comment.user_id) {
            return Err(CommentServiceError::Forbidden(
                "Only the author or an admin can delete this comment".to_string(),
            ));
        }

        let removed = self.repo.count_thread(comment.id).await?;
        self.repo.delete(comment.id).await?;
        self.adjust_comments(comment.content_id, -removed).await?;
        tracing::debug!("Deleted comment {} and {} replies", comment.id, removed - 1);
        Ok(())
    }

    /// Change a comment's moderation status (admin)
    pub async fn moderate(
        &self,
        actor: &User,
        id: i64,
        status: CommentStatus,
    ) -> Result<Comment, CommentServiceError> {
        if !actor.is_admin() {
            return Err(CommentServiceError::Forbidden(
                "Only admins can moderate comments".to_string(),
            ));
        }
        let comment = self.find(id).await?;
        if comment.status != status {
            self.repo.update_status(comment.id, status).await?;
            let delta = match (comment.status, status) {
                (CommentStatus::Approved, _) => -1,
                (_, CommentStatus::Approved) => 1,
                _ => 0,
            };
            if delta != 0 {
                self.adjust_comments(comment.content_id, delta).await?;
            }
        }
        self.find(id).await
    }

    /// Like the target, or take the like back when already given
    pub async fn toggle_like(
        &self,
        user: &User,
        target_type: LikeTargetType,
        target_id: i64,
    ) -> Result<LikeStatus, CommentServiceError> {
        match target_type {
            LikeTargetType::Content => {
                self.visible_content(Some(user), target_id).await?;
            }
            LikeTargetType::Comment => {
                self.find(target_id).await?;
            }
        }

        let liked = if self.repo.remove_like(user.id, target_type, target_id).await? {
            self.adjust_likes(target_type, target_id, -1).await?;
            false
        } else {
            self.repo.add_like(user.id, target_type, target_id).await?;
            self.adjust_likes(target_type, target_id, 1).await?;
            true
        };

        Ok(LikeStatus {
            liked,
            like_count: self.like_count(target_type, target_id).await?,
        })
    }

    /// Whether the user liked the target, with its current count
    pub async fn like_status(
        &self,
        user: &User,
        target_type: LikeTargetType,
        target_id: i64,
    ) -> Result<LikeStatus, CommentServiceError> {
        Ok(LikeStatus {
            liked: self.repo.has_liked(user.id, target_type, target_id).await?,
            like_count: self.like_count(target_type, target_id).await?,
        })
    }

    async fn adjust_likes(
        &self,
        target_type: LikeTargetType,
        target_id: i64,
        delta: i64,
    ) -> Result<(), CommentServiceError> {
        match target_type {
            LikeTargetType::Content => {
                self.contents.adjust_like_count(target_id, delta).await?;
                forget_content(&self.cache, target_id).await;
            }
            LikeTargetType::Comment => self.repo.adjust_like_count(target_id, delta).await?,
        }
        Ok(())
    }

    async fn adjust_comments(&self, content_id: i64, delta: i64) -> Result<(), CommentServiceError> {
        self.contents.adjust_comment_count(content_id, delta).await?;
        forget_content(&self.cache, content_id).await;
        Ok(())
    }

    async fn like_count(&self, target_type: LikeTargetType, target_id: i64) -> Result<i64, CommentServiceError> {
        let count = match target_type {
            LikeTargetType::Content => self.contents.get_by_id(target_id).await?.map(|c| c.like_count),
            LikeTargetType::Comment => self.repo.get_by_id(target_id).await?.map(|c| c.like_count),
        };
        count.ok_or_else(|| CommentServiceError::NotFound(format!("{} {}", target_type, target_id)))
    }

    async fn find(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(format!("comment {}", id)))
    }

    async fn visible_content(&self, viewer: Option<&User>, id: i64) -> Result<Content, CommentServiceError> {
        let content = self
            .contents
            .get_by_id(id)
            .await?
            .filter(|c| c.is_published() || viewer.is_some_and(|u| u.can_manage(c.author_id)))
            .ok_or_else(|| CommentServiceError::NotFound(format!("content {}", id)))?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCommentRepository, SqlxContentRepository};
    use crate::models::{ContentStatus, CreateContentInput};
    use crate::services::content::tests::content_service_with_cache;
    use crate::services::content::ContentService;
    use crate::services::user::tests::setup_test_service;
    use crate::services::user::RegisterInput;

    struct Fixture {
        service: CommentService,
        contents: ContentService,
        admin: User,
        reader: User,
        content: Content,
        draft: Content,
    }

    async fn setup() -> Fixture {
        let (pool, users) = setup_test_service().await;
        let admin = users
            .register(RegisterInput::new("editora", "editora@med.br", "senha-forte"))
            .await
            .unwrap();
        let reader = users
            .register(RegisterInput::new("leitor", "leitor@med.br", "senha-forte"))
            .await
            .unwrap();

        let cache = Arc::new(Cache::new());
        let contents = content_service_with_cache(&pool, cache.clone());
        let content = contents
            .create(
                &admin,
                CreateContentInput::new("Anemia", "corpo").with_status(ContentStatus::Published),
            )
            .await
            .unwrap();
        let draft = contents
            .create(&admin, CreateContentInput::new("Rascunho", "corpo"))
            .await
            .unwrap();

        Fixture {
            service: CommentService::new(
                SqlxCommentRepository::boxed(pool.clone()),
                SqlxContentRepository::boxed(pool.clone()),
                cache,
            ),
            contents,
            admin,
            reader,
            content,
            draft,
        }
    }

    fn comment(content_id: i64, parent_id: Option<i64>, body: &str) -> CreateCommentInput {
        CreateCommentInput {
            content_id,
            parent_id,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_comment_tree_and_counts() {
        let f = setup().await;
        let root = f
            .service
            .create(&f.reader, comment(f.content.id, None, " Muito bom "))
            .await
            .unwrap();
        assert_eq!(root.body, "Muito bom");
        assert_eq!(root.status, CommentStatus::Approved);
        f.service
            .create(&f.admin, comment(f.content.id, Some(root.id), "Obrigada"))
            .await
            .unwrap();

        let tree = f.service.list(None, f.content.id).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].author_name, "leitor");

        let err = f.service.delete(&f.reader, tree[0].replies[0].comment.id).await.unwrap_err();
        assert!(matches!(err, CommentServiceError::Forbidden(_)));

        f.service.delete(&f.reader, root.id).await.unwrap();
        assert!(f.service.list(None, f.content.id).await.unwrap().is_empty());
        let count = f
            .service
            .contents
            .get_by_id(f.content.id)
            .await
            .unwrap()
            .unwrap()
            .comment_count;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_reply_must_share_content() {
        let f = setup().await;
        let root = f
            .service
            .create(&f.reader, comment(f.content.id, None, "a"))
            .await
            .unwrap();

        let err = f
            .service
            .create(&f.admin, comment(f.draft.id, Some(root.id), "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::ValidationError(_)));

        let err = f
            .service
            .create(&f.reader, comment(f.draft.id, None, "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::NotFound(_)));

        let err = f
            .service
            .create(&f.reader, comment(f.content.id, None, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_like_toggle() {
        let f = setup().await;

        let status = f
            .service
            .toggle_like(&f.reader, LikeTargetType::Content, f.content.id)
            .await
            .unwrap();
        assert!(status.liked);
        assert_eq!(status.like_count, 1);

        let status = f
            .service
            .toggle_like(&f.admin, LikeTargetType::Content, f.content.id)
            .await
            .unwrap();
        assert_eq!(status.like_count, 2);

        let status = f
            .service
            .toggle_like(&f.reader, LikeTargetType::Content, f.content.id)
            .await
            .unwrap();
        assert!(!status.liked);
        assert_eq!(status.like_count, 1);

        let root = f
            .service
            .create(&f.reader, comment(f.content.id, None, "curti"))
            .await
            .unwrap();
        let status = f
            .service
            .toggle_like(&f.admin, LikeTargetType::Comment, root.id)
            .await
            .unwrap();
        assert!(status.liked);
        assert!(f
            .service
            .like_status(&f.admin, LikeTargetType::Comment, root.id)
            .await
            .unwrap()
            .liked);

        let err = f
            .service
            .toggle_like(&f.reader, LikeTargetType::Comment, 999)
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_moderation() {
        let f = setup().await;
        let root = f
            .service
            .create(&f.reader, comment(f.content.id, None, "compre agora"))
            .await
            .unwrap();

        let err = f
            .service
            .moderate(&f.reader, root.id, CommentStatus::Spam)
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::Forbidden(_)));

        let spam = f
            .service
            .moderate(&f.admin, root.id, CommentStatus::Spam)
            .await
            .unwrap();
        assert_eq!(spam.status, CommentStatus::Spam);
        assert!(f.service.list(None, f.content.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counters_show_through_cached_content() {
        let f = setup().await;
        let before = f.contents.get(None, f.content.id).await.unwrap();
        assert_eq!((before.comment_count, before.like_count), (0, 0));

        f.service
            .create(&f.reader, comment(f.content.id, None, "ótimo resumo"))
            .await
            .unwrap();
        f.service
            .toggle_like(&f.reader, LikeTargetType::Content, f.content.id)
            .await
            .unwrap();

        let after = f.contents.get(None, f.content.id).await.unwrap();
        assert_eq!((after.comment_count, after.like_count), (1, 1));
        assert_eq!(after.view_count, 2);
    }
}
