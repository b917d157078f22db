//! Comment and like models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum CommentStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Spam => "SPAM",
    }
    default = Approved;
}

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub status: CommentStatus,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Comment joined with its author, ready for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithMeta {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub replies: Vec<CommentWithMeta>,
}

impl CommentWithMeta {
    /// Gravatar URL for an email, falling back to the mystery-person image
    pub fn gravatar_url(email: &str) -> String {
        let email = email.trim();
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }

    /// Nest replies under their parents; top level keeps input order
    pub fn into_tree(comments: Vec<CommentWithMeta>) -> Vec<CommentWithMeta> {
        let mut children: std::collections::HashMap<i64, Vec<CommentWithMeta>> =
            std::collections::HashMap::new();
        let mut roots = Vec::new();
        let ids: std::collections::HashSet<i64> = comments.iter().map(|c| c.comment.id).collect();

        for comment in comments {
            match comment.comment.parent_id {
                Some(parent) if ids.contains(&parent) => children.entry(parent).or_default().push(comment),
                _ => roots.push(comment),
            }
        }

        fn attach(
            mut node: CommentWithMeta,
            children: &mut std::collections::HashMap<i64, Vec<CommentWithMeta>>,
        ) -> CommentWithMeta {
            let replies = children.remove(&node.comment.id).unwrap_or_default();
            node.replies = replies.into_iter().map(|r| attach(r, children)).collect();
            node
        }

        roots.into_iter().map(|r| attach(r, &mut children)).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub content_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
}

string_enum! {
    pub enum LikeTargetType {
        Content => "CONTENT",
        Comment => "COMMENT",
    }
    default = Content;
}

/// Result of a like toggle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub like_count: i64,
}
