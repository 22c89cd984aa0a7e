//! Storage seams for the engagement core.
//!
//! Each mutation that reports an effective transition applies its counter
//! deltas inside the same atomic unit of work as the record write; callers
//! never touch counters directly. Two backends implement the traits: the
//! Postgres backend (source of truth in deployments) and the embedded
//! in-memory backend (tests and single-process use).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngagementResult;
use crate::models::{Comment, FollowStats, Like, Page, Post, PostEngagement};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryPosts, MemoryStore};
pub use postgres::{connect, PgPostReader, PgStore};

/// Durable record of directed follow edges plus the follow counters derived
/// from them.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Insert the edge and bump both follow counters in one atomic unit.
    /// Returns false (and applies no deltas) when the edge already exists.
    async fn insert_follow_edge(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> EngagementResult<bool>;

    /// Remove the edge and decrement both follow counters in one atomic
    /// unit. Returns false (zero deltas) when the edge is absent.
    async fn delete_follow_edge(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> EngagementResult<bool>;

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> EngagementResult<bool>;

    /// Followers of `account_id`, ordered by (edge created_at desc,
    /// follower id desc).
    async fn list_followers(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>>;

    /// Accounts `account_id` follows, ordered by (edge created_at desc,
    /// followee id desc).
    async fn list_following(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>>;

    /// Denormalized follow counts; never recomputed from edges on this path.
    async fn follow_stats(&self, account_id: Uuid) -> EngagementResult<FollowStats>;
}

/// Durable record of likes and comments plus per-post engagement counters.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Insert the like and bump the post's like counter in one atomic unit.
    /// Returns false (zero delta) when the pair already exists.
    async fn insert_like(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool>;

    /// Remove the like and decrement the counter in one atomic unit.
    /// Returns false (zero delta) when the pair is absent.
    async fn delete_like(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool>;

    async fn has_liked(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool>;

    /// Which of `post_ids` the account has liked; one batch lookup so feed
    /// annotation stays O(1) per post.
    async fn liked_set(
        &self,
        account_id: Uuid,
        post_ids: &[Uuid],
    ) -> EngagementResult<HashSet<Uuid>>;

    /// Likes on a post, ordered by (created_at desc, account id desc).
    async fn list_post_likes(&self, post_id: Uuid, page: Page) -> EngagementResult<Vec<Like>>;

    /// Append a comment and bump the post's comment counter in one atomic
    /// unit. Distinct comments are never deduplicated.
    async fn insert_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> EngagementResult<Comment>;

    async fn get_comment(&self, comment_id: Uuid) -> EngagementResult<Option<Comment>>;

    /// Remove the comment if it exists and belongs to `author_id`,
    /// decrementing the counter in the same atomic unit. Returns false
    /// (zero delta) otherwise; ownership policy lives in the service layer.
    async fn delete_comment(&self, comment_id: Uuid, author_id: Uuid) -> EngagementResult<bool>;

    /// Comments on a post, ordered by (created_at asc, id asc).
    async fn list_comments(&self, post_id: Uuid, page: Page) -> EngagementResult<Vec<Comment>>;

    /// Denormalized engagement counts for one post.
    async fn post_engagement(&self, post_id: Uuid) -> EngagementResult<PostEngagement>;

    /// Batch variant used on the feed read path.
    async fn batch_post_engagement(
        &self,
        post_ids: &[Uuid],
    ) -> EngagementResult<HashMap<Uuid, PostEngagement>>;
}

/// Read interface onto the external post subsystem. The core never writes
/// posts.
#[async_trait]
pub trait PostReader: Send + Sync {
    async fn get_post(&self, post_id: Uuid) -> EngagementResult<Option<Post>>;

    /// Posts authored by `authors`, strictly before `before` on the
    /// (created_at desc, id desc) total order; at most `limit` rows.
    async fn list_by_authors(
        &self,
        authors: &[Uuid],
        before: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> EngagementResult<Vec<Post>>;
}
