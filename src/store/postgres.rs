//! PostgreSQL backend: source of truth in deployments.
//!
//! Each mutation opens one transaction spanning the record write and its
//! counter deltas; an error before commit rolls the whole unit back, so an
//! edge is never persisted without its counter adjustment or vice versa.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::counters::{self, CounterDelta, CounterKind, Transition};
use crate::error::EngagementResult;
use crate::models::{Comment, FollowStats, Like, Page, Post, PostEngagement};
use crate::store::{EngagementStore, PostReader, RelationshipStore};

/// Build the process-wide connection pool. Owned by the caller and torn down
/// at shutdown; there is no hidden global client.
pub async fn connect(config: &DatabaseConfig) -> EngagementResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.url)
        .await?;

    // Verify the connection before handing the pool out
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

/// Relationship + engagement store over `follow_edges`, `likes`, `comments`
/// and `counters` tables
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded schema migrations
    pub async fn migrate(&self) -> EngagementResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::EngagementError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn apply_deltas(
        tx: &mut Transaction<'_, Postgres>,
        transition: Transition,
    ) -> EngagementResult<()> {
        for delta in counters::deltas_for(transition) {
            Self::apply_delta(tx, delta).await?;
        }
        Ok(())
    }

    async fn apply_delta(
        tx: &mut Transaction<'_, Postgres>,
        delta: CounterDelta,
    ) -> EngagementResult<()> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (entity_id, kind, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (entity_id, kind)
            DO UPDATE SET value = counters.value + $3
            RETURNING value
            "#,
        )
        .bind(delta.entity_id)
        .bind(delta.kind.as_str())
        .bind(delta.delta)
        .fetch_one(&mut **tx)
        .await?;

        if value < 0 {
            counters::record_underflow(delta.entity_id, delta.kind, value);
            sqlx::query("UPDATE counters SET value = 0 WHERE entity_id = $1 AND kind = $2")
                .bind(delta.entity_id)
                .bind(delta.kind.as_str())
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }

    async fn read_counter(&self, entity_id: Uuid, kind: CounterKind) -> EngagementResult<i64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT value FROM counters WHERE entity_id = $1 AND kind = $2")
                .bind(entity_id)
                .bind(kind.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.unwrap_or(0))
    }
}

#[async_trait]
impl RelationshipStore for PgStore {
    async fn insert_follow_edge(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> EngagementResult<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO follow_edges (follower_id, followee_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            Self::apply_deltas(
                &mut tx,
                Transition::FollowCreated {
                    follower_id,
                    followee_id,
                },
            )
            .await?;
        }

        tx.commit().await?;
        debug!(%follower_id, %followee_id, created = inserted, "follow edge upsert");
        Ok(inserted)
    }

    async fn delete_follow_edge(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> EngagementResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM follow_edges WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if removed {
            Self::apply_deltas(
                &mut tx,
                Transition::FollowRemoved {
                    follower_id,
                    followee_id,
                },
            )
            .await?;
        }

        tx.commit().await?;
        debug!(%follower_id, %followee_id, removed, "follow edge delete");
        Ok(removed)
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> EngagementResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follow_edges WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_followers(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT follower_id FROM follow_edges
            WHERE followee_id = $1
            ORDER BY created_at DESC, follower_id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn list_following(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT followee_id FROM follow_edges
            WHERE follower_id = $1
            ORDER BY created_at DESC, followee_id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn follow_stats(&self, account_id: Uuid) -> EngagementResult<FollowStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, value FROM counters WHERE entity_id = $1 AND kind IN ('followers', 'following')",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = FollowStats::default();
        for (kind, value) in rows {
            match kind.as_str() {
                "followers" => stats.followers = value,
                "following" => stats.following = value,
                _ => {}
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl EngagementStore for PgStore {
    async fn insert_like(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO likes (post_id, account_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (post_id, account_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(account_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            Self::apply_deltas(&mut tx, Transition::LikeCreated { post_id }).await?;
        }

        tx.commit().await?;
        debug!(%post_id, %account_id, created = inserted, "like upsert");
        Ok(inserted)
    }

    async fn delete_like(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND account_id = $2")
            .bind(post_id)
            .bind(account_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if removed {
            Self::apply_deltas(&mut tx, Transition::LikeRemoved { post_id }).await?;
        }

        tx.commit().await?;
        debug!(%post_id, %account_id, removed, "like delete");
        Ok(removed)
    }

    async fn has_liked(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = $1 AND account_id = $2)",
        )
        .bind(post_id)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn liked_set(
        &self,
        account_id: Uuid,
        post_ids: &[Uuid],
    ) -> EngagementResult<HashSet<Uuid>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let liked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT post_id FROM likes WHERE account_id = $1 AND post_id = ANY($2)",
        )
        .bind(account_id)
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(liked.into_iter().collect())
    }

    async fn list_post_likes(&self, post_id: Uuid, page: Page) -> EngagementResult<Vec<Like>> {
        let likes = sqlx::query_as::<_, Like>(
            r#"
            SELECT post_id, account_id, created_at
            FROM likes
            WHERE post_id = $1
            ORDER BY created_at DESC, account_id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(post_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(likes)
    }

    async fn insert_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> EngagementResult<Comment> {
        let mut tx = self.pool.begin().await?;

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, author_id, body, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, post_id, author_id, body, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        Self::apply_deltas(&mut tx, Transition::CommentAdded { post_id }).await?;

        tx.commit().await?;
        debug!(%post_id, %author_id, comment_id = %comment.id, "comment created");
        Ok(comment)
    }

    async fn get_comment(&self, comment_id: Uuid) -> EngagementResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, author_id, body, created_at FROM comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: Uuid, author_id: Uuid) -> EngagementResult<bool> {
        let mut tx = self.pool.begin().await?;

        let post_id: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM comments WHERE id = $1 AND author_id = $2 RETURNING post_id",
        )
        .bind(comment_id)
        .bind(author_id)
        .fetch_optional(&mut *tx)
        .await?;

        let removed = post_id.is_some();
        if let Some(post_id) = post_id {
            Self::apply_deltas(&mut tx, Transition::CommentRemoved { post_id }).await?;
        }

        tx.commit().await?;
        debug!(%comment_id, %author_id, removed, "comment delete");
        Ok(removed)
    }

    async fn list_comments(&self, post_id: Uuid, page: Page) -> EngagementResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_id, body, created_at
            FROM comments
            WHERE post_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(post_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn post_engagement(&self, post_id: Uuid) -> EngagementResult<PostEngagement> {
        Ok(PostEngagement {
            like_count: self.read_counter(post_id, CounterKind::PostLikes).await?,
            comment_count: self
                .read_counter(post_id, CounterKind::PostComments)
                .await?,
        })
    }

    async fn batch_post_engagement(
        &self,
        post_ids: &[Uuid],
    ) -> EngagementResult<HashMap<Uuid, PostEngagement>> {
        let mut result: HashMap<Uuid, PostEngagement> = post_ids
            .iter()
            .map(|id| (*id, PostEngagement::default()))
            .collect();
        if post_ids.is_empty() {
            return Ok(result);
        }

        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT entity_id, kind, value FROM counters
            WHERE entity_id = ANY($1) AND kind IN ('post_likes', 'post_comments')
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        for (entity_id, kind, value) in rows {
            if let Some(engagement) = result.get_mut(&entity_id) {
                match kind.as_str() {
                    "post_likes" => engagement.like_count = value,
                    "post_comments" => engagement.comment_count = value,
                    _ => {}
                }
            }
        }
        Ok(result)
    }
}

/// Post reader over the external post subsystem's `posts` table
#[derive(Clone)]
pub struct PgPostReader {
    pool: PgPool,
}

impl PgPostReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostReader for PgPostReader {
    async fn get_post(&self, post_id: Uuid) -> EngagementResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, author_id, body, created_at FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn list_by_authors(
        &self,
        authors: &[Uuid],
        before: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> EngagementResult<Vec<Post>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let posts = match before {
            Some((created_at, post_id)) => {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT id, author_id, body, created_at
                    FROM posts
                    WHERE author_id = ANY($1) AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(authors)
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT id, author_id, body, created_at
                    FROM posts
                    WHERE author_id = ANY($1)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(authors)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(posts)
    }
}
