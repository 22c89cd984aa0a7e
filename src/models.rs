use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directed follow edge: `follower_id` receives `followee_id`'s posts.
/// At most one edge per ordered pair; self-follows are rejected upstream.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FollowEdge {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Like record - set semantics on (post_id, account_id)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub post_id: Uuid,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Comment on a post. Append-only; deletable only by its author.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Post as seen through the external read interface. The core treats posts
/// as immutable, timestamp-ordered records it reads but never creates.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Denormalized follow counts for one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowStats {
    pub followers: i64,
    pub following: i64,
}

/// Denormalized engagement counts for one post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEngagement {
    pub like_count: i64,
    pub comment_count: i64,
}

/// Feed entry: a post annotated with its current display counts and whether
/// the viewer has liked it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    pub post: Post,
    pub like_count: i64,
    pub comment_count: i64,
    pub viewer_has_liked: bool,
}

/// One page of a viewer's feed. `next_cursor` is absent on the last page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub next_cursor: Option<String>,
}

/// Offset page for follower/like/comment listings
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}
